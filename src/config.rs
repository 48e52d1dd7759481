//! Bridge client configuration
//!
//! Loaded from a `.env` file when present, then from the environment.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, WrapErr};

use crate::amount::FeeSchedule;
use crate::error::{BridgeError, Result};
use crate::orchestrator::{ApprovalPolling, BridgeContracts, GasFeeEstimates, OrchestratorSettings};
use crate::redact::{redact_url, Redacted};
use crate::status::{EvmRpcStatusSource, StacksApiStatusSource};
use crate::store::{ExplorerLinks, FileStorage, TransactionRecordStore};
use crate::types::StacksNetwork;

/// Complete client configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub ethereum: EthereumConfig,
    pub stacks: StacksConfig,
    pub fees: FeeConfig,
    pub reconcile: ReconcileConfig,
    pub store_dir: PathBuf,
}

/// Ethereum side
#[derive(Clone)]
pub struct EthereumConfig {
    pub rpc_url: String,
    pub explorer_url: String,
    pub token_address: String,
    pub bridge_address: String,
    pub domain_id: u32,
    pub confirmations: u32,
}

/// Custom Debug that keeps only the RPC host (the path often carries an API key).
impl fmt::Debug for EthereumConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthereumConfig")
            .field("rpc_url", &redact_url(&self.rpc_url))
            .field("explorer_url", &self.explorer_url)
            .field("token_address", &self.token_address)
            .field("bridge_address", &self.bridge_address)
            .field("domain_id", &self.domain_id)
            .field("confirmations", &self.confirmations)
            .finish()
    }
}

/// Stacks side
#[derive(Debug, Clone)]
pub struct StacksConfig {
    pub api_url: String,
    pub api_key: Option<Redacted<String>>,
    pub network: StacksNetwork,
    pub explorer_url: String,
    /// Wrapped token contract principal
    pub token_contract: String,
    pub domain_id: u32,
    pub confirmations: u32,
}

/// Fee settings, kept as decimal strings until parsed
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub fee_percent: String,
    pub min_fee: String,
    pub deposit_gas_estimate: String,
    pub withdraw_gas_estimate: String,
}

/// Polling cadence
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
    pub approval_poll_interval_ms: u64,
    pub approval_poll_attempts: u32,
}

/// Default functions
fn default_stacks_network() -> StacksNetwork {
    StacksNetwork::Testnet
}

fn default_fee_percent() -> String {
    "0.25".to_string()
}

fn default_min_fee() -> String {
    "1.00".to_string()
}

fn default_deposit_gas_estimate() -> String {
    "2.50".to_string()
}

fn default_withdraw_gas_estimate() -> String {
    "0.05".to_string()
}

fn default_reconcile_interval() -> u64 {
    30
}

fn default_ethereum_confirmations() -> u32 {
    12
}

fn default_stacks_confirmations() -> u32 {
    6
}

fn default_ethereum_domain() -> u32 {
    0
}

fn default_stacks_domain() -> u32 {
    10003
}

fn default_approval_poll_interval() -> u64 {
    3000
}

fn default_approval_poll_attempts() -> u32 {
    40
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".bridge-store")
}

fn default_ethereum_explorer(network: StacksNetwork) -> String {
    match network {
        StacksNetwork::Mainnet => "https://etherscan.io".to_string(),
        StacksNetwork::Testnet => "https://sepolia.etherscan.io".to_string(),
    }
}

fn default_stacks_explorer() -> String {
    "https://explorer.hiro.so".to_string()
}

impl BridgeConfig {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))
                .map_err(config_error)?;
        }
        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let config = Self::read_env().map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    fn read_env() -> eyre::Result<Self> {
        let network = match env::var("STACKS_NETWORK") {
            Ok(value) => value
                .parse::<StacksNetwork>()
                .map_err(|e| eyre!("{}", e))?,
            Err(_) => default_stacks_network(),
        };

        let ethereum = EthereumConfig {
            rpc_url: required("ETHEREUM_RPC_URL")?,
            explorer_url: env::var("ETHEREUM_EXPLORER_URL")
                .unwrap_or_else(|_| default_ethereum_explorer(network)),
            token_address: required("ETHEREUM_TOKEN_ADDRESS")?,
            bridge_address: required("ETHEREUM_BRIDGE_ADDRESS")?,
            domain_id: parsed_or("ETHEREUM_DOMAIN_ID", default_ethereum_domain()),
            confirmations: parsed_or("ETHEREUM_CONFIRMATIONS", default_ethereum_confirmations()),
        };

        let stacks = StacksConfig {
            api_url: required("STACKS_API_URL")?,
            api_key: env::var("STACKS_API_KEY")
                .ok()
                .filter(|key| !key.is_empty())
                .map(Redacted),
            network,
            explorer_url: env::var("STACKS_EXPLORER_URL").unwrap_or_else(|_| default_stacks_explorer()),
            token_contract: required("STACKS_TOKEN_CONTRACT")?,
            domain_id: parsed_or("STACKS_DOMAIN_ID", default_stacks_domain()),
            confirmations: parsed_or("STACKS_CONFIRMATIONS", default_stacks_confirmations()),
        };

        let fees = FeeConfig {
            fee_percent: env::var("BRIDGE_FEE_PERCENT").unwrap_or_else(|_| default_fee_percent()),
            min_fee: env::var("BRIDGE_MIN_FEE").unwrap_or_else(|_| default_min_fee()),
            deposit_gas_estimate: env::var("DEPOSIT_GAS_FEE_ESTIMATE")
                .unwrap_or_else(|_| default_deposit_gas_estimate()),
            withdraw_gas_estimate: env::var("WITHDRAW_GAS_FEE_ESTIMATE")
                .unwrap_or_else(|_| default_withdraw_gas_estimate()),
        };

        let reconcile = ReconcileConfig {
            interval_secs: parsed_or("RECONCILE_INTERVAL_SECS", default_reconcile_interval()),
            approval_poll_interval_ms: parsed_or(
                "APPROVAL_POLL_INTERVAL_MS",
                default_approval_poll_interval(),
            ),
            approval_poll_attempts: parsed_or(
                "APPROVAL_POLL_ATTEMPTS",
                default_approval_poll_attempts(),
            ),
        };

        Ok(Self {
            ethereum,
            stacks,
            fees,
            reconcile,
            store_dir: env::var("STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_store_dir()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ethereum.rpc_url.is_empty() {
            return Err(BridgeError::Config("ethereum.rpc_url cannot be empty".to_string()));
        }
        if self.stacks.api_url.is_empty() {
            return Err(BridgeError::Config("stacks.api_url cannot be empty".to_string()));
        }

        self.bridge_contracts()
            .validate()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        self.fee_schedule()?;

        for (name, value) in [
            ("DEPOSIT_GAS_FEE_ESTIMATE", &self.fees.deposit_gas_estimate),
            ("WITHDRAW_GAS_FEE_ESTIMATE", &self.fees.withdraw_gas_estimate),
        ] {
            crate::amount::to_micro_units(value)
                .map_err(|e| BridgeError::Config(format!("{}: {}", name, e)))?;
        }

        if self.reconcile.interval_secs == 0 {
            return Err(BridgeError::Config(
                "RECONCILE_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if self.reconcile.approval_poll_attempts == 0 {
            return Err(BridgeError::Config(
                "APPROVAL_POLL_ATTEMPTS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fee_schedule(&self) -> Result<FeeSchedule> {
        FeeSchedule::from_strs(&self.fees.fee_percent, &self.fees.min_fee)
    }

    pub fn gas_fee_estimates(&self) -> GasFeeEstimates {
        GasFeeEstimates {
            deposit: self.fees.deposit_gas_estimate.clone(),
            withdraw: self.fees.withdraw_gas_estimate.clone(),
        }
    }

    pub fn explorer_links(&self) -> ExplorerLinks {
        ExplorerLinks {
            ethereum_base_url: self.ethereum.explorer_url.trim_end_matches('/').to_string(),
            stacks_base_url: self.stacks.explorer_url.trim_end_matches('/').to_string(),
            stacks_network: self.stacks.network,
        }
    }

    pub fn bridge_contracts(&self) -> BridgeContracts {
        BridgeContracts {
            ethereum_token: self.ethereum.token_address.clone(),
            ethereum_bridge: self.ethereum.bridge_address.clone(),
            stacks_token_contract: self.stacks.token_contract.clone(),
            ethereum_domain: self.ethereum.domain_id,
            stacks_domain: self.stacks.domain_id,
        }
    }

    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings> {
        Ok(OrchestratorSettings {
            contracts: self.bridge_contracts(),
            stacks_network: self.stacks.network,
            fees: self.fee_schedule()?,
            approval_polling: ApprovalPolling {
                interval: Duration::from_millis(self.reconcile.approval_poll_interval_ms),
                max_attempts: self.reconcile.approval_poll_attempts,
            },
            ethereum_confirmations: self.ethereum.confirmations,
            stacks_confirmations: self.stacks.confirmations,
        })
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.interval_secs)
    }

    pub fn evm_status_source(&self) -> Result<Arc<EvmRpcStatusSource>> {
        EvmRpcStatusSource::new(&self.ethereum.rpc_url)
            .map(Arc::new)
            .map_err(config_error)
    }

    pub fn stacks_status_source(&self) -> Result<Arc<StacksApiStatusSource>> {
        let api_key = self.stacks.api_key.as_ref().map(|key| key.expose().clone());
        StacksApiStatusSource::new(&self.stacks.api_url, api_key)
            .map(Arc::new)
            .map_err(config_error)
    }

    /// File-backed record store under `store_dir`
    pub fn record_store(&self) -> Arc<TransactionRecordStore> {
        Arc::new(TransactionRecordStore::new(Arc::new(FileStorage::new(
            self.store_dir.clone(),
        ))))
    }
}

fn required(name: &str) -> eyre::Result<String> {
    env::var(name).map_err(|_| eyre!("{} environment variable is required", name))
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn config_error(err: eyre::Report) -> BridgeError {
    BridgeError::Config(format!("{:#}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ETHEREUM_RPC_URL",
        "ETHEREUM_EXPLORER_URL",
        "ETHEREUM_TOKEN_ADDRESS",
        "ETHEREUM_BRIDGE_ADDRESS",
        "ETHEREUM_DOMAIN_ID",
        "ETHEREUM_CONFIRMATIONS",
        "STACKS_API_URL",
        "STACKS_API_KEY",
        "STACKS_NETWORK",
        "STACKS_EXPLORER_URL",
        "STACKS_TOKEN_CONTRACT",
        "STACKS_DOMAIN_ID",
        "STACKS_CONFIRMATIONS",
        "BRIDGE_FEE_PERCENT",
        "BRIDGE_MIN_FEE",
        "DEPOSIT_GAS_FEE_ESTIMATE",
        "WITHDRAW_GAS_FEE_ESTIMATE",
        "RECONCILE_INTERVAL_SECS",
        "APPROVAL_POLL_INTERVAL_MS",
        "APPROVAL_POLL_ATTEMPTS",
        "STORE_DIR",
    ];

    fn reset_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn set_required() {
        env::set_var("ETHEREUM_RPC_URL", "https://eth-sepolia.g.alchemy.com/v2/secret-key");
        env::set_var(
            "ETHEREUM_TOKEN_ADDRESS",
            "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238",
        );
        env::set_var(
            "ETHEREUM_BRIDGE_ADDRESS",
            "0x5fbdb2315678afecb367f032d93f642f64180aa3",
        );
        env::set_var("STACKS_API_URL", "https://api.testnet.hiro.so");
        env::set_var(
            "STACKS_TOKEN_CONTRACT",
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM.usdcx",
        );
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_reconcile_interval(), 30);
        assert_eq!(default_ethereum_confirmations(), 12);
        assert_eq!(default_stacks_confirmations(), 6);
        assert_eq!(default_fee_percent(), "0.25");
        assert_eq!(default_min_fee(), "1.00");
        assert_eq!(default_stacks_network(), StacksNetwork::Testnet);
    }

    #[test]
    #[serial]
    fn test_from_env_with_defaults() {
        reset_env();
        set_required();

        let config = BridgeConfig::from_env().unwrap();
        assert_eq!(config.stacks.network, StacksNetwork::Testnet);
        assert_eq!(config.reconcile_interval(), Duration::from_secs(30));
        assert_eq!(config.ethereum.confirmations, 12);
        assert_eq!(config.stacks.confirmations, 6);
        assert_eq!(config.store_dir, PathBuf::from(".bridge-store"));
        assert_eq!(config.fee_schedule().unwrap(), FeeSchedule::default());
        assert_eq!(config.gas_fee_estimates(), GasFeeEstimates::default());
        assert_eq!(config.explorer_links(), ExplorerLinks::default());
        assert!(config.stacks.api_key.is_none());

        let settings = config.orchestrator_settings().unwrap();
        assert_eq!(settings.approval_polling, ApprovalPolling::default());
        reset_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        reset_env();
        set_required();
        env::set_var("STACKS_NETWORK", "mainnet");
        env::set_var("STACKS_API_KEY", "hiro-secret");
        env::set_var("BRIDGE_FEE_PERCENT", "0.5");
        env::set_var("RECONCILE_INTERVAL_SECS", "10");
        env::set_var("STACKS_CONFIRMATIONS", "not-a-number");

        let config = BridgeConfig::from_env().unwrap();
        assert_eq!(config.stacks.network, StacksNetwork::Mainnet);
        assert_eq!(config.ethereum.explorer_url, "https://etherscan.io");
        assert_eq!(config.reconcile.interval_secs, 10);
        // Unparseable numbers fall back to the default
        assert_eq!(config.stacks.confirmations, 6);
        assert_eq!(
            config.stacks.api_key.as_ref().map(|k| k.0.as_str()),
            Some("hiro-secret")
        );
        reset_env();
    }

    #[test]
    #[serial]
    fn test_missing_required_var() {
        reset_env();
        set_required();
        env::remove_var("STACKS_API_URL");

        let err = BridgeConfig::from_env().unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
        assert!(err.to_string().contains("STACKS_API_URL"));
        reset_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_rejected() {
        reset_env();
        set_required();
        env::set_var("BRIDGE_MIN_FEE", "-1");
        assert!(matches!(
            BridgeConfig::from_env(),
            Err(BridgeError::Config(_))
        ));

        env::remove_var("BRIDGE_MIN_FEE");
        env::set_var("ETHEREUM_BRIDGE_ADDRESS", "0xdead");
        assert!(matches!(
            BridgeConfig::from_env(),
            Err(BridgeError::Config(_))
        ));

        env::remove_var("ETHEREUM_BRIDGE_ADDRESS");
        set_required();
        env::set_var("STACKS_NETWORK", "devnet");
        assert!(matches!(
            BridgeConfig::from_env(),
            Err(BridgeError::Config(_))
        ));
        reset_env();
    }

    #[test]
    #[serial]
    fn test_debug_redacts_secrets() {
        reset_env();
        set_required();
        env::set_var("STACKS_API_KEY", "hiro-secret");

        let config = BridgeConfig::from_env().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("hiro-secret"));
        assert!(rendered.contains("eth-sepolia.g.alchemy.com"));
        reset_env();
    }

    #[test]
    #[serial]
    fn test_builds_collaborators() {
        reset_env();
        set_required();
        let config = BridgeConfig::from_env().unwrap();

        assert!(config.evm_status_source().is_ok());
        assert!(config.stacks_status_source().is_ok());
        assert_eq!(
            config.orchestrator_settings().unwrap().stacks_network,
            StacksNetwork::Testnet
        );
        reset_env();
    }
}
