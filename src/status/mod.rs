//! Chain status sources and status vocabulary mapping
//!
//! Each chain reports transaction progress in its own vocabulary. The
//! mapping functions here fold both onto [`TransactionStatus`]:
//!
//! | Source   | Native status                                    | Canonical    |
//! |----------|--------------------------------------------------|--------------|
//! | Ethereum | no receipt                                       | `pending`    |
//! | Ethereum | receipt, status `0x1`                            | `completed`  |
//! | Ethereum | receipt, status `0x0`                            | `failed`     |
//! | Stacks   | not found (404)                                  | `pending`    |
//! | Stacks   | `success`                                        | `completed`  |
//! | Stacks   | `abort_by_response` / `abort_by_post_condition`  | `failed`     |
//! | Stacks   | anything else, including `pending`               | `processing` |
//!
//! Ethereum has no intermediate state; Stacks does.

pub mod evm;
pub mod stacks;

use async_trait::async_trait;
use serde::Deserialize;

pub use evm::EvmRpcStatusSource;
pub use stacks::StacksApiStatusSource;

use crate::types::TransactionStatus;

/// Subset of an `eth_getTransactionReceipt` result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EvmReceipt {
    #[serde(rename = "transactionHash", default)]
    pub transaction_hash: Option<String>,
    #[serde(rename = "blockNumber", default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl EvmReceipt {
    /// Status flag parsed from its hex quantity
    pub fn status_flag(&self) -> Option<u64> {
        parse_hex_quantity(self.status.as_deref()?)
    }

    pub fn block_number(&self) -> Option<u64> {
        parse_hex_quantity(self.block_number.as_deref()?)
    }
}

/// Subset of a Stacks API `/extended/v1/tx/{txid}` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StacksTransaction {
    #[serde(default)]
    pub tx_id: Option<String>,
    pub tx_status: String,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// Ethereum-family receipt lookup
#[async_trait]
pub trait EvmStatusSource: Send + Sync {
    /// `None` while the transaction is not yet mined
    async fn transaction_receipt(&self, tx_hash: &str) -> eyre::Result<Option<EvmReceipt>>;
}

/// Stacks-family transaction lookup
#[async_trait]
pub trait StacksStatusSource: Send + Sync {
    /// `None` when the API does not know the transaction yet
    async fn transaction(&self, txid: &str) -> eyre::Result<Option<StacksTransaction>>;
}

/// Map an Ethereum receipt onto the canonical status
///
/// A receipt with a missing or unreadable status flag carries no evidence
/// either way and stays `pending`.
pub fn map_evm_status(receipt: Option<&EvmReceipt>) -> TransactionStatus {
    match receipt.map(EvmReceipt::status_flag) {
        None => TransactionStatus::Pending,
        Some(Some(1)) => TransactionStatus::Completed,
        Some(Some(0)) => TransactionStatus::Failed,
        Some(_) => TransactionStatus::Pending,
    }
}

/// Map a Stacks API transaction onto the canonical status
pub fn map_stacks_status(tx: Option<&StacksTransaction>) -> TransactionStatus {
    match tx.map(|t| t.tx_status.as_str()) {
        None => TransactionStatus::Pending,
        Some("success") => TransactionStatus::Completed,
        Some("abort_by_response") | Some("abort_by_post_condition") => TransactionStatus::Failed,
        Some(_) => TransactionStatus::Processing,
    }
}

fn parse_hex_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(status: Option<&str>) -> EvmReceipt {
        EvmReceipt {
            transaction_hash: Some("0xabc".to_string()),
            block_number: Some("0x10".to_string()),
            status: status.map(str::to_string),
        }
    }

    fn stacks_tx(status: &str) -> StacksTransaction {
        StacksTransaction {
            tx_id: Some("0xabc".to_string()),
            tx_status: status.to_string(),
            block_height: None,
        }
    }

    #[test]
    fn test_map_evm_status() {
        assert_eq!(map_evm_status(None), TransactionStatus::Pending);
        assert_eq!(
            map_evm_status(Some(&receipt(Some("0x1")))),
            TransactionStatus::Completed
        );
        assert_eq!(
            map_evm_status(Some(&receipt(Some("0x0")))),
            TransactionStatus::Failed
        );
        assert_eq!(
            map_evm_status(Some(&receipt(None))),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn test_map_stacks_status() {
        assert_eq!(map_stacks_status(None), TransactionStatus::Pending);
        assert_eq!(
            map_stacks_status(Some(&stacks_tx("success"))),
            TransactionStatus::Completed
        );
        assert_eq!(
            map_stacks_status(Some(&stacks_tx("abort_by_response"))),
            TransactionStatus::Failed
        );
        assert_eq!(
            map_stacks_status(Some(&stacks_tx("abort_by_post_condition"))),
            TransactionStatus::Failed
        );
        // Explicit pending maps to the intermediate state
        assert_eq!(
            map_stacks_status(Some(&stacks_tx("pending"))),
            TransactionStatus::Processing
        );
        assert_eq!(
            map_stacks_status(Some(&stacks_tx("dropped_replace_by_fee"))),
            TransactionStatus::Processing
        );
    }

    #[test]
    fn test_receipt_block_number() {
        assert_eq!(receipt(Some("0x1")).block_number(), Some(16));
    }

    #[test]
    fn test_deserialize_receipt() {
        let json = r#"{"transactionHash":"0xabc","blockNumber":"0x1b4","status":"0x1","gasUsed":"0x5208"}"#;
        let parsed: EvmReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.block_number(), Some(436));
        assert_eq!(parsed.status_flag(), Some(1));
    }

    #[test]
    fn test_deserialize_stacks_tx() {
        let json = r#"{"tx_id":"0xabc","tx_status":"success","block_height":12345,"tx_type":"contract_call"}"#;
        let parsed: StacksTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tx_status, "success");
        assert_eq!(parsed.block_height, Some(12345));
    }
}
