//! Ethereum JSON-RPC status source

use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{EvmReceipt, EvmStatusSource};
use crate::redact::redact_url;

/// EVM RPC response wrapper
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// EVM RPC error
#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<Option<T>> {
        if let Some(error) = self.error {
            return Err(eyre!("RPC error: {} - {}", error.code, error.message));
        }
        Ok(self.result)
    }
}

/// Receipt lookups over `eth_getTransactionReceipt`
pub struct EvmRpcStatusSource {
    rpc_url: String,
    client: Client,
}

impl EvmRpcStatusSource {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl EvmStatusSource for EvmRpcStatusSource {
    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<EvmReceipt>> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_getTransactionReceipt",
            "params": [tx_hash],
            "id": 1
        });

        debug!(
            tx_hash = %tx_hash,
            rpc = %redact_url(&self.rpc_url),
            "Fetching transaction receipt"
        );

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .wrap_err("eth_getTransactionReceipt request failed")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "eth_getTransactionReceipt failed with status {}",
                response.status()
            ));
        }

        response
            .json::<RpcResponse<EvmReceipt>>()
            .await
            .wrap_err("Failed to parse eth_getTransactionReceipt response")?
            .into_result()
    }
}
