//! Bridge Operation Orchestration
//!
//! Sequences the source-chain side of each bridge operation and records it.
//!
//! ## Deposit (Ethereum → Stacks)
//!
//! 1. Validate the connected Ethereum account and the Stacks recipient
//! 2. Convert the amount to micro-units and compute the bridge fee
//! 3. `approve` the bridge for the amount, wait for the approval receipt
//! 4. `depositToRemote` with the bytes32-encoded recipient
//! 5. Store a `pending` record keyed by the deposit transaction hash
//!
//! ## Withdraw (Stacks → Ethereum)
//!
//! 1. Validate the connected Stacks account and the Ethereum recipient
//! 2. `burn` with the bytes32-encoded recipient
//! 3. Store a `pending` record keyed by the burn transaction hash
//!
//! A failed or rejected submission creates no record.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::address_codec::{
    encode_to_bytes32, is_valid_stacks_address, normalize_address, require_stacks_network,
    require_valid_address,
};
use crate::amount::{micro_to_decimal_string, to_micro_units, FeeSchedule, MicroAmount};
use crate::error::{BridgeError, Result};
use crate::status::{map_evm_status, EvmStatusSource};
use crate::store::{
    BridgeTransactionRecord, TransactionRecordStore, ETHEREUM_REQUIRED_CONFIRMATIONS,
    STACKS_REQUIRED_CONFIRMATIONS,
};
use crate::types::{ChainFamily, Direction, StacksNetwork, TransactionStatus};
use crate::wallet::{TxIntent, WalletProvider, WalletSession};

// ============================================================================
// Settings
// ============================================================================

/// Contract addresses and domain ids the bridge calls target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeContracts {
    /// ERC-20 stablecoin on Ethereum
    pub ethereum_token: String,
    /// Bridge contract on Ethereum; the approval spender
    pub ethereum_bridge: String,
    /// Wrapped token contract principal on Stacks (`<address>.<name>`)
    pub stacks_token_contract: String,
    /// Domain id of Ethereum, target of burns
    pub ethereum_domain: u32,
    /// Domain id of Stacks, target of deposits
    pub stacks_domain: u32,
}

impl BridgeContracts {
    pub fn validate(&self) -> Result<()> {
        require_valid_address(&self.ethereum_token, ChainFamily::Ethereum)?;
        require_valid_address(&self.ethereum_bridge, ChainFamily::Ethereum)?;

        match self.stacks_token_contract.split_once('.') {
            Some((address, name)) if is_valid_stacks_address(address) && !name.is_empty() => Ok(()),
            _ => Err(BridgeError::validation(format!(
                "Invalid Stacks contract principal: {}",
                self.stacks_token_contract
            ))),
        }
    }
}

/// Bounded polling for the approval receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalPolling {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ApprovalPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 40,
        }
    }
}

/// Gas fee estimates per direction, in display decimals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasFeeEstimates {
    pub deposit: String,
    pub withdraw: String,
}

impl Default for GasFeeEstimates {
    fn default() -> Self {
        Self {
            deposit: "2.50".to_string(),
            withdraw: "0.05".to_string(),
        }
    }
}

impl GasFeeEstimates {
    pub fn for_direction(&self, direction: Direction) -> &str {
        match direction {
            Direction::Deposit => &self.deposit,
            Direction::Withdraw => &self.withdraw,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub contracts: BridgeContracts,
    /// Network Stacks recipients must belong to
    pub stacks_network: StacksNetwork,
    pub fees: FeeSchedule,
    pub approval_polling: ApprovalPolling,
    pub ethereum_confirmations: u32,
    pub stacks_confirmations: u32,
}

impl OrchestratorSettings {
    /// Testnet settings with default fees and confirmation targets
    pub fn new(contracts: BridgeContracts) -> Self {
        Self {
            contracts,
            stacks_network: StacksNetwork::Testnet,
            fees: FeeSchedule::default(),
            approval_polling: ApprovalPolling::default(),
            ethereum_confirmations: ETHEREUM_REQUIRED_CONFIRMATIONS,
            stacks_confirmations: STACKS_REQUIRED_CONFIRMATIONS,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Bridge `amount` from the connected Ethereum wallet to a Stacks recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub amount: String,
    pub recipient: String,
}

/// Bridge `amount` from the connected Stacks wallet to an Ethereum recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub amount: String,
    pub recipient: String,
}

/// Send the wrapped token to another Stacks principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount: String,
    pub recipient: String,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct BridgeOrchestrator {
    store: Arc<TransactionRecordStore>,
    session: Arc<WalletSession>,
    evm_status: Arc<dyn EvmStatusSource>,
    settings: OrchestratorSettings,
}

impl BridgeOrchestrator {
    pub fn new(
        store: Arc<TransactionRecordStore>,
        session: Arc<WalletSession>,
        evm_status: Arc<dyn EvmStatusSource>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            session,
            evm_status,
            settings,
        }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Ethereum → Stacks
    pub async fn deposit(&self, request: &DepositRequest) -> Result<BridgeTransactionRecord> {
        let (provider, source) = self.connected(ChainFamily::Ethereum)?;
        let destination = self.stacks_recipient(&request.recipient)?;
        let recipient = encode_to_bytes32(&destination, ChainFamily::Stacks)?;
        let amount = self.bridge_amount(&request.amount)?;
        let fee = self.settings.fees.compute_bridge_fee_micro(amount)?;
        let contracts = &self.settings.contracts;

        info!(
            source = %source,
            recipient = %destination,
            amount = amount,
            fee = fee,
            "Starting deposit"
        );

        let approve_hash = submit(
            provider.as_ref(),
            TxIntent::Approve {
                token: contracts.ethereum_token.clone(),
                spender: contracts.ethereum_bridge.clone(),
                amount,
            },
        )
        .await?;
        self.wait_for_approval(&approve_hash).await?;

        let deposit_hash = submit(
            provider.as_ref(),
            TxIntent::DepositToRemote {
                bridge: contracts.ethereum_bridge.clone(),
                token: contracts.ethereum_token.clone(),
                amount,
                remote_domain: contracts.stacks_domain,
                recipient,
            },
        )
        .await?;

        let record = BridgeTransactionRecord::new_pending(
            Direction::Deposit,
            amount,
            &source,
            &destination,
            &deposit_hash,
            micro_to_decimal_string(fee),
        )
        .with_required_confirmations(self.settings.ethereum_confirmations);

        self.record(record)
    }

    /// Stacks → Ethereum
    pub async fn withdraw(&self, request: &WithdrawRequest) -> Result<BridgeTransactionRecord> {
        let (provider, source) = self.connected(ChainFamily::Stacks)?;
        let destination = normalize_address(&request.recipient, ChainFamily::Ethereum)?;
        let recipient = encode_to_bytes32(&destination, ChainFamily::Ethereum)?;
        let amount = self.bridge_amount(&request.amount)?;
        let fee = self.settings.fees.compute_bridge_fee_micro(amount)?;
        let contracts = &self.settings.contracts;

        info!(
            source = %source,
            recipient = %destination,
            amount = amount,
            fee = fee,
            "Starting withdrawal"
        );

        let burn_hash = submit(
            provider.as_ref(),
            TxIntent::Burn {
                token_contract: contracts.stacks_token_contract.clone(),
                amount,
                native_domain: contracts.ethereum_domain,
                recipient,
            },
        )
        .await?;

        let record = BridgeTransactionRecord::new_pending(
            Direction::Withdraw,
            amount,
            &source,
            &destination,
            &burn_hash,
            micro_to_decimal_string(fee),
        )
        .with_required_confirmations(self.settings.stacks_confirmations);

        self.record(record)
    }

    /// Peer-to-peer transfer on Stacks; returns the transaction hash
    pub async fn transfer(&self, request: &TransferRequest) -> Result<String> {
        let (provider, source) = self.connected(ChainFamily::Stacks)?;
        let recipient = self.stacks_recipient(&request.recipient)?;
        if recipient.eq_ignore_ascii_case(&source) {
            return Err(BridgeError::validation("Cannot transfer to the sending account"));
        }

        let amount = to_micro_units(&request.amount)?;
        if amount == 0 {
            return Err(BridgeError::validation("Amount must be greater than zero"));
        }

        let tx_hash = submit(
            provider.as_ref(),
            TxIntent::Transfer {
                token_contract: self.settings.contracts.stacks_token_contract.clone(),
                recipient: recipient.clone(),
                amount,
            },
        )
        .await?;

        info!(
            source = %source,
            recipient = %recipient,
            amount = amount,
            tx_hash = %tx_hash,
            "Transfer submitted"
        );
        Ok(tx_hash)
    }

    /// Fill `gas_fee` on records that lack one; returns how many changed
    pub fn backfill_missing_gas_fees(&self, estimates: &GasFeeEstimates) -> Result<usize> {
        let mut filled = 0;
        for record in self.store.get_all()? {
            if record.gas_fee.as_deref().is_some_and(|fee| !fee.is_empty()) {
                continue;
            }
            if self
                .store
                .backfill_gas_fee(&record.id, estimates.for_direction(record.direction))?
            {
                filled += 1;
            }
        }

        if filled > 0 {
            info!(count = filled, "Backfilled missing gas fees");
        }
        Ok(filled)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn connected(&self, chain: ChainFamily) -> Result<(Arc<dyn WalletProvider>, String)> {
        let not_connected = || BridgeError::validation(format!("{} wallet is not connected", chain));

        let address = self.session.address(chain).ok_or_else(not_connected)?;
        let provider = self.session.provider(chain).ok_or_else(not_connected)?;
        require_valid_address(&address, chain)?;
        Ok((provider, address))
    }

    /// Canonical Stacks recipient on the configured network
    fn stacks_recipient(&self, address: &str) -> Result<String> {
        let normalized = normalize_address(address, ChainFamily::Stacks)?;
        require_stacks_network(&normalized, self.settings.stacks_network)?;
        Ok(normalized)
    }

    /// Parsed amount that is non-zero and larger than its own fee
    fn bridge_amount(&self, amount: &str) -> Result<MicroAmount> {
        let micro = to_micro_units(amount)?;
        if micro == 0 {
            return Err(BridgeError::validation("Amount must be greater than zero"));
        }

        let fee = self.settings.fees.compute_bridge_fee_micro(micro)?;
        if micro <= fee {
            return Err(BridgeError::validation(format!(
                "Amount {} does not cover the bridge fee {}",
                micro_to_decimal_string(micro),
                micro_to_decimal_string(fee)
            )));
        }
        Ok(micro)
    }

    async fn wait_for_approval(&self, tx_hash: &str) -> Result<()> {
        let polling = self.settings.approval_polling;

        for attempt in 1..=polling.max_attempts {
            match self.evm_status.transaction_receipt(tx_hash).await {
                Ok(receipt) => match map_evm_status(receipt.as_ref()) {
                    TransactionStatus::Completed => {
                        debug!(tx_hash = %tx_hash, attempt, "Approval confirmed");
                        return Ok(());
                    }
                    TransactionStatus::Failed => {
                        return Err(BridgeError::submission(format!(
                            "Approval transaction {} reverted",
                            tx_hash
                        )));
                    }
                    _ => {}
                },
                Err(err) => {
                    warn!(tx_hash = %tx_hash, attempt, error = %err, "Approval receipt lookup failed");
                }
            }

            if attempt < polling.max_attempts {
                tokio::time::sleep(polling.interval).await;
            }
        }

        Err(BridgeError::submission(format!(
            "Approval transaction {} not confirmed after {} attempts",
            tx_hash, polling.max_attempts
        )))
    }

    fn record(&self, record: BridgeTransactionRecord) -> Result<BridgeTransactionRecord> {
        if let Err(err) = self.store.upsert(&record) {
            warn!(
                record_id = %record.id,
                error = %err,
                "Submitted transaction could not be recorded"
            );
            return Err(err);
        }
        Ok(record)
    }
}

async fn submit(provider: &dyn WalletProvider, intent: TxIntent) -> Result<String> {
    let name = intent.name();
    let chain = intent.chain();

    match provider.sign_and_submit(intent).await {
        Ok(tx_hash) => {
            info!(chain = %chain, intent = name, tx_hash = %tx_hash, "Transaction submitted");
            Ok(tx_hash)
        }
        Err(err) => {
            warn!(chain = %chain, intent = name, error = %err, "Transaction submission failed");
            Err(BridgeError::submission(format!("{} failed: {:#}", name, err)))
        }
    }
}
