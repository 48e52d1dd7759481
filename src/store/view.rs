//! Display-oriented view of a transaction record

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::amount::{from_micro_units, to_micro_units, DEFAULT_DISPLAY_DECIMALS};
use crate::store::record::{default_required_confirmations, BridgeTransactionRecord};
use crate::types::{ChainFamily, Direction, StacksNetwork, TransactionStatus};

/// Base URLs of the block explorers used for transaction links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerLinks {
    pub ethereum_base_url: String,
    pub stacks_base_url: String,
    pub stacks_network: StacksNetwork,
}

impl Default for ExplorerLinks {
    fn default() -> Self {
        Self {
            ethereum_base_url: "https://sepolia.etherscan.io".to_string(),
            stacks_base_url: "https://explorer.hiro.so".to_string(),
            stacks_network: StacksNetwork::Testnet,
        }
    }
}

impl ExplorerLinks {
    pub fn tx_url(&self, chain: ChainFamily, tx_hash: &str) -> String {
        match chain {
            ChainFamily::Ethereum => format!(
                "{}/tx/{}",
                self.ethereum_base_url.trim_end_matches('/'),
                tx_hash
            ),
            ChainFamily::Stacks => format!(
                "{}/txid/{}?chain={}",
                self.stacks_base_url.trim_end_matches('/'),
                tx_hash,
                self.stacks_network
            ),
        }
    }
}

/// What the UI renders for one bridge operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: String,
    pub direction: Direction,
    pub status: TransactionStatus,
    pub amount: String,
    pub from_chain: ChainFamily,
    pub to_chain: ChainFamily,
    pub from_address: String,
    pub to_address: String,
    pub source_tx_hash: String,
    pub destination_tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub bridge_fee: String,
    pub gas_fee: Option<String>,
    /// Bridge fee plus gas fee, rendered in dollars
    pub total_fee_usd: String,
    pub confirmations: u32,
    pub required_confirmations: u32,
    pub source_explorer_url: String,
    pub destination_explorer_url: Option<String>,
}

impl TransactionView {
    pub fn from_record(record: &BridgeTransactionRecord, explorers: &ExplorerLinks) -> Self {
        let required_confirmations = match record.required_confirmations {
            0 => default_required_confirmations(record.direction),
            n => n,
        };
        let confirmations = if record.status == TransactionStatus::Completed {
            required_confirmations
        } else {
            record.confirmations.min(required_confirmations)
        };

        let total_fee = fee_micro(&record.bridge_fee)
            + record.gas_fee.as_deref().map(fee_micro).unwrap_or_default();

        Self {
            id: record.id.clone(),
            direction: record.direction,
            status: record.status,
            amount: from_micro_units(record.amount, DEFAULT_DISPLAY_DECIMALS),
            from_chain: record.source_chain,
            to_chain: record.destination_chain,
            from_address: record.source_address.clone(),
            to_address: record.destination_address.clone(),
            source_tx_hash: record.source_tx_hash.clone(),
            destination_tx_hash: record.destination_tx_hash.clone(),
            created_at: record.created_at,
            bridge_fee: record.bridge_fee.clone(),
            gas_fee: record.gas_fee.clone(),
            total_fee_usd: format!("${}", from_micro_units(total_fee, DEFAULT_DISPLAY_DECIMALS)),
            confirmations,
            required_confirmations,
            source_explorer_url: explorers.tx_url(record.source_chain, &record.source_tx_hash),
            destination_explorer_url: record
                .destination_tx_hash
                .as_deref()
                .map(|hash| explorers.tx_url(record.destination_chain, hash)),
        }
    }
}

/// Unparseable persisted fees render as zero rather than failing the view
fn fee_micro(fee: &str) -> u128 {
    if fee.trim().is_empty() {
        return 0;
    }
    to_micro_units(fee).unwrap_or_default()
}
