//! Persisted bridge transaction record and its merge rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::MicroAmount;
use crate::types::{ChainFamily, Direction, TransactionStatus};

/// Source-chain confirmations required for Ethereum-sourced (deposit) records
pub const ETHEREUM_REQUIRED_CONFIRMATIONS: u32 = 12;

/// Source-chain confirmations required for Stacks-sourced (withdraw) records
pub const STACKS_REQUIRED_CONFIRMATIONS: u32 = 6;

/// Default confirmation requirement for a direction
pub fn default_required_confirmations(direction: Direction) -> u32 {
    match direction.source_chain() {
        ChainFamily::Ethereum => ETHEREUM_REQUIRED_CONFIRMATIONS,
        ChainFamily::Stacks => STACKS_REQUIRED_CONFIRMATIONS,
    }
}

/// One user-initiated cross-chain operation
///
/// Missing optional fields in persisted JSON fall back to defaults so older
/// layouts keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeTransactionRecord {
    pub id: String,
    pub direction: Direction,
    pub amount: MicroAmount,
    pub status: TransactionStatus,
    pub source_chain: ChainFamily,
    pub destination_chain: ChainFamily,
    pub source_address: String,
    pub destination_address: String,
    pub source_tx_hash: String,
    #[serde(default)]
    pub destination_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Bridge fee in display-decimal form
    #[serde(default)]
    pub bridge_fee: String,
    /// Source-chain gas fee in display-decimal form, filled by backfill when absent
    #[serde(default)]
    pub gas_fee: Option<String>,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub required_confirmations: u32,
}

impl BridgeTransactionRecord {
    /// New `pending` record for a just-submitted source transaction.
    ///
    /// The source transaction hash doubles as the record id.
    pub fn new_pending(
        direction: Direction,
        amount: MicroAmount,
        source_address: &str,
        destination_address: &str,
        source_tx_hash: &str,
        bridge_fee: String,
    ) -> Self {
        Self {
            id: source_tx_hash.to_string(),
            direction,
            amount,
            status: TransactionStatus::Pending,
            source_chain: direction.source_chain(),
            destination_chain: direction.destination_chain(),
            source_address: source_address.to_string(),
            destination_address: destination_address.to_string(),
            source_tx_hash: source_tx_hash.to_string(),
            destination_tx_hash: None,
            created_at: Utc::now(),
            updated_at: None,
            bridge_fee,
            gas_fee: None,
            confirmations: 0,
            required_confirmations: default_required_confirmations(direction),
        }
    }

    pub fn with_required_confirmations(mut self, required: u32) -> Self {
        self.required_confirmations = required;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Copy of this record with a new status, as produced by a status check
    pub fn with_status(&self, status: TransactionStatus) -> Self {
        let mut next = self.clone();
        next.status = status;
        if status == TransactionStatus::Completed {
            next.confirmations = next.confirmations.max(next.required_confirmations);
        }
        next
    }

    /// Merge the mutable fields of `incoming` into `self`.
    ///
    /// Only `status`, `confirmations`, `destination_tx_hash` and `gas_fee`
    /// are merged. Status never moves backward: a terminal status is final,
    /// and `processing` never returns to `pending`. Returns whether anything
    /// changed.
    pub fn merge_from(&mut self, incoming: &BridgeTransactionRecord) -> bool {
        let mut changed = false;

        if status_rank(incoming.status) > status_rank(self.status) {
            self.status = incoming.status;
            changed = true;
        }

        if incoming.confirmations > self.confirmations {
            self.confirmations = incoming.confirmations;
            changed = true;
        }

        if incoming.destination_tx_hash.is_some()
            && incoming.destination_tx_hash != self.destination_tx_hash
        {
            self.destination_tx_hash = incoming.destination_tx_hash.clone();
            changed = true;
        }

        if incoming.gas_fee.is_some() && incoming.gas_fee != self.gas_fee {
            self.gas_fee = incoming.gas_fee.clone();
            changed = true;
        }

        if changed {
            self.updated_at = Some(Utc::now());
        }
        changed
    }
}

/// Position in the lifecycle; terminal states share the top rank
fn status_rank(status: TransactionStatus) -> u8 {
    match status {
        TransactionStatus::Pending => 0,
        TransactionStatus::Processing => 1,
        TransactionStatus::Completed | TransactionStatus::Failed => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(direction: Direction) -> BridgeTransactionRecord {
        BridgeTransactionRecord::new_pending(
            direction,
            5_000_000,
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            "0xabc",
            "1".to_string(),
        )
    }

    #[test]
    fn test_new_pending_defaults() {
        let deposit = record(Direction::Deposit);
        assert_eq!(deposit.id, "0xabc");
        assert_eq!(deposit.status, TransactionStatus::Pending);
        assert_eq!(deposit.source_chain, ChainFamily::Ethereum);
        assert_eq!(deposit.destination_chain, ChainFamily::Stacks);
        assert_eq!(deposit.required_confirmations, 12);

        let withdraw = record(Direction::Withdraw);
        assert_eq!(withdraw.source_chain, ChainFamily::Stacks);
        assert_eq!(withdraw.required_confirmations, 6);
    }

    #[test]
    fn test_merge_forward_status() {
        let mut stored = record(Direction::Withdraw);
        let incoming = stored.with_status(TransactionStatus::Processing);
        assert!(stored.merge_from(&incoming));
        assert_eq!(stored.status, TransactionStatus::Processing);
        assert!(stored.updated_at.is_some());
    }

    #[test]
    fn test_merge_never_leaves_terminal() {
        let mut stored = record(Direction::Deposit).with_status(TransactionStatus::Completed);
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Failed,
        ] {
            let incoming = stored.with_status(status);
            assert!(!stored.merge_from(&incoming));
        }
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_merge_processing_does_not_return_to_pending() {
        let mut stored = record(Direction::Withdraw).with_status(TransactionStatus::Processing);
        let incoming = stored.with_status(TransactionStatus::Pending);
        assert!(!stored.merge_from(&incoming));
        assert_eq!(stored.status, TransactionStatus::Processing);
    }

    #[test]
    fn test_merge_only_mutable_fields() {
        let mut stored = record(Direction::Deposit);
        let mut incoming = stored.clone();
        incoming.amount = 1;
        incoming.source_address = "0xother".to_string();
        incoming.gas_fee = Some("2.5".to_string());
        incoming.destination_tx_hash = Some("0xdest".to_string());

        assert!(stored.merge_from(&incoming));
        assert_eq!(stored.amount, 5_000_000);
        assert_eq!(stored.source_address, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        assert_eq!(stored.gas_fee.as_deref(), Some("2.5"));
        assert_eq!(stored.destination_tx_hash.as_deref(), Some("0xdest"));
    }

    #[test]
    fn test_merge_identical_is_noop() {
        let mut stored = record(Direction::Deposit);
        let copy = stored.clone();
        assert!(!stored.merge_from(&copy));
        assert_eq!(stored, copy);
    }

    #[test]
    fn test_completed_sets_confirmations() {
        let completed = record(Direction::Deposit).with_status(TransactionStatus::Completed);
        assert_eq!(completed.confirmations, 12);
    }

    #[test]
    fn test_deserialize_missing_optional_fields() {
        let json = r#"{
            "id": "0x1",
            "direction": "deposit",
            "amount": 1000000,
            "status": "pending",
            "sourceChain": "ethereum",
            "destinationChain": "stacks",
            "sourceAddress": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "destinationAddress": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            "sourceTxHash": "0x1",
            "createdAt": "2024-01-01T00:00:00Z"
        }"#;
        let parsed: BridgeTransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.destination_tx_hash, None);
        assert_eq!(parsed.gas_fee, None);
        assert_eq!(parsed.bridge_fee, "");
        assert_eq!(parsed.confirmations, 0);
        assert_eq!(parsed.required_confirmations, 0);
    }
}
