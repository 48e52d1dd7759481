//! Stacks-Bridge-RS: Client Core for an Ethereum ⇄ Stacks Stablecoin Bridge
//!
//! This crate provides the protocol layer a bridge front-end sits on:
//!
//! - **Address Codec** - Ethereum and Stacks address validation, c32check, and
//!   the 32-byte cross-chain recipient encoding
//! - **Amounts** - Exact decimal ⇄ micro-unit conversion and the bridge fee schedule
//! - **Record Store** - Durable local records of every bridge operation
//! - **Status Reconciliation** - Polls both chains and folds their status
//!   vocabularies onto one canonical status
//! - **Orchestration** - Deposit, withdraw and peer-to-peer transfer flows
//! - **Wallet Session** - One observable session for both wallets
//! - **Testing** - Scripted status sources and a mock wallet
//!
//! ## Usage
//!
//! ```ignore
//! let config = BridgeConfig::load()?;
//! let store = config.record_store();
//! let reconciler = Arc::new(TransactionStatusReconciler::new(
//!     store.clone(),
//!     config.evm_status_source()?,
//!     config.stacks_status_source()?,
//! ));
//! let scheduler = ReconcileScheduler::start(reconciler, config.reconcile_interval());
//! ```

pub mod address_codec;
pub mod amount;
pub mod c32;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod redact;
pub mod status;
pub mod store;
pub mod testing;
pub mod types;
pub mod wallet;

// Re-export commonly used items at the crate root
pub use address_codec::{
    decode_bytes32_to_evm_address, decode_bytes32_to_stacks_address, decode_hex_to_stacks_address,
    encode_to_bytes32, is_valid_address, parse_stacks_address, StacksAddress, StacksVersion,
};
pub use amount::{from_micro_units, to_micro_units, FeeSchedule, MicroAmount};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use orchestrator::{
    BridgeContracts, BridgeOrchestrator, DepositRequest, GasFeeEstimates, OrchestratorSettings,
    TransferRequest, WithdrawRequest,
};
pub use reconciler::{ReconcileScheduler, TransactionStatusReconciler};
pub use status::{EvmRpcStatusSource, EvmStatusSource, StacksApiStatusSource, StacksStatusSource};
pub use store::{
    BridgeTransactionRecord, ExplorerLinks, FileStorage, MemoryStorage, StorageBackend,
    TransactionRecordStore, TransactionView,
};
pub use types::{Bytes32, ChainFamily, Direction, StacksNetwork, TransactionStatus};
pub use wallet::{
    select_provider, ProviderCapability, ProviderProbe, SessionSnapshot, TxIntent, WalletProvider,
    WalletSession,
};
