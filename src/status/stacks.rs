//! Stacks API status source

use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::{StacksStatusSource, StacksTransaction};
use crate::redact::Redacted;

/// Header carrying the optional Stacks API key
const API_KEY_HEADER: &str = "x-api-key";

/// Transaction lookups over `GET /extended/v1/tx/{txid}`
pub struct StacksApiStatusSource {
    api_url: String,
    api_key: Option<Redacted<String>>,
    client: Client,
}

impl StacksApiStatusSource {
    pub fn new(api_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(Redacted),
            client,
        })
    }

    fn tx_url(&self, txid: &str) -> String {
        format!("{}/extended/v1/tx/{}", self.api_url, txid)
    }
}

#[async_trait]
impl StacksStatusSource for StacksApiStatusSource {
    async fn transaction(&self, txid: &str) -> Result<Option<StacksTransaction>> {
        let url = self.tx_url(txid);
        debug!(txid = %txid, api_key = ?self.api_key, "Fetching Stacks transaction");

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key.0.as_str());
        }

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, txid = %txid, "Failed to query Stacks transaction");
                return Err(e).wrap_err("Stacks transaction request failed");
            }
        };

        // Not yet indexed: same as pending
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(eyre!(
                "Stacks transaction query failed with status {}",
                response.status()
            ));
        }

        let tx = response
            .json::<StacksTransaction>()
            .await
            .wrap_err("Failed to parse Stacks transaction response")?;
        Ok(Some(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_url_trims_trailing_slash() {
        let source = StacksApiStatusSource::new("https://api.testnet.hiro.so/", None).unwrap();
        assert_eq!(
            source.tx_url("0xabc"),
            "https://api.testnet.hiro.so/extended/v1/tx/0xabc"
        );
    }

    #[test]
    fn test_api_key_is_redacted_in_debug() {
        let source =
            StacksApiStatusSource::new("https://api.hiro.so", Some("secret".to_string())).unwrap();
        let rendered = format!("{:?}", source.api_key);
        assert!(!rendered.contains("secret"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_an_error() {
        let source = StacksApiStatusSource::new("http://127.0.0.1:1", None).unwrap();
        assert!(source.transaction("0xabc").await.is_err());
    }
}
