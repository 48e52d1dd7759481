//! Wallet Session
//!
//! One [`WalletSession`] holds the connection state for both chain families.
//! It is created by the composition root and passed to whatever consumes it;
//! observers subscribe to snapshots through a `watch` channel.
//!
//! Wallet software itself stays behind [`WalletProvider`]. Provider detection
//! is a ranked list of [`ProviderProbe`]s evaluated once per connect.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::address_codec::require_valid_address;
use crate::amount::MicroAmount;
use crate::error::{BridgeError, Result};
use crate::types::{Bytes32, ChainFamily};

// ============================================================================
// Transaction Intents
// ============================================================================

/// Contract call a wallet is asked to sign and broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxIntent {
    /// ERC-20 `approve(spender, amount)` on the Ethereum token
    Approve {
        token: String,
        spender: String,
        amount: MicroAmount,
    },
    /// Lock on Ethereum and mint to `recipient` on the remote domain
    DepositToRemote {
        bridge: String,
        token: String,
        amount: MicroAmount,
        remote_domain: u32,
        recipient: Bytes32,
    },
    /// Burn the wrapped token on Stacks and release to `recipient` on Ethereum
    Burn {
        token_contract: String,
        amount: MicroAmount,
        native_domain: u32,
        recipient: Bytes32,
    },
    /// SIP-010 transfer of the wrapped token between Stacks principals
    Transfer {
        token_contract: String,
        recipient: String,
        amount: MicroAmount,
    },
}

impl TxIntent {
    /// Chain the intent executes on
    pub fn chain(&self) -> ChainFamily {
        match self {
            TxIntent::Approve { .. } | TxIntent::DepositToRemote { .. } => ChainFamily::Ethereum,
            TxIntent::Burn { .. } | TxIntent::Transfer { .. } => ChainFamily::Stacks,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TxIntent::Approve { .. } => "approve",
            TxIntent::DepositToRemote { .. } => "deposit_to_remote",
            TxIntent::Burn { .. } => "burn",
            TxIntent::Transfer { .. } => "transfer",
        }
    }

    pub fn amount(&self) -> MicroAmount {
        match self {
            TxIntent::Approve { amount, .. }
            | TxIntent::DepositToRemote { amount, .. }
            | TxIntent::Burn { amount, .. }
            | TxIntent::Transfer { amount, .. } => *amount,
        }
    }
}

// ============================================================================
// Providers
// ============================================================================

/// A connected or connectable wallet for one chain family
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Stable provider identifier, e.g. `metamask` or `leather`
    fn id(&self) -> &str;

    fn chain(&self) -> ChainFamily;

    /// Ask the user to connect; returns the selected account
    async fn connect(&self) -> eyre::Result<String>;

    /// Currently selected account, if any
    async fn address(&self) -> eyre::Result<Option<String>>;

    /// Sign and broadcast; returns the transaction hash
    async fn sign_and_submit(&self, intent: TxIntent) -> eyre::Result<String>;

    /// Account switches (`Some`) and disconnects (`None`)
    fn account_changes(&self) -> broadcast::Receiver<Option<String>>;
}

/// Result of probing for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCapability {
    pub id: String,
    pub available: bool,
}

/// Detects whether a particular provider can be used
pub trait ProviderProbe: Send + Sync {
    fn probe(&self) -> ProviderCapability;

    fn provider(&self) -> Arc<dyn WalletProvider>;
}

/// Probe with a fixed availability decided by the embedding application
pub struct StaticProviderProbe {
    available: bool,
    provider: Arc<dyn WalletProvider>,
}

impl StaticProviderProbe {
    pub fn new(provider: Arc<dyn WalletProvider>, available: bool) -> Self {
        Self {
            available,
            provider,
        }
    }
}

impl ProviderProbe for StaticProviderProbe {
    fn probe(&self) -> ProviderCapability {
        ProviderCapability {
            id: self.provider.id().to_string(),
            available: self.available,
        }
    }

    fn provider(&self) -> Arc<dyn WalletProvider> {
        self.provider.clone()
    }
}

/// First available provider for `chain`, in rank order
pub fn select_provider(
    chain: ChainFamily,
    ranked: &[Arc<dyn ProviderProbe>],
) -> Result<(ProviderCapability, Arc<dyn WalletProvider>)> {
    for probe in ranked {
        let provider = probe.provider();
        if provider.chain() != chain {
            continue;
        }

        let capability = probe.probe();
        debug!(
            chain = %chain,
            provider = %capability.id,
            available = capability.available,
            "Probed wallet provider"
        );
        if capability.available {
            return Ok((capability, provider));
        }
    }

    Err(BridgeError::wallet(format!(
        "No {} wallet provider available",
        chain
    )))
}

// ============================================================================
// Session State
// ============================================================================

/// Connection state of one chain slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Disconnected,
    Connected { provider_id: String, address: String },
}

impl SlotState {
    pub fn address(&self) -> Option<&str> {
        match self {
            SlotState::Connected { address, .. } => Some(address),
            SlotState::Disconnected => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SlotState::Connected { .. })
    }
}

/// Observable view of both wallet slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub ethereum: SlotState,
    pub stacks: SlotState,
}

impl SessionSnapshot {
    pub fn slot(&self, chain: ChainFamily) -> &SlotState {
        match chain {
            ChainFamily::Ethereum => &self.ethereum,
            ChainFamily::Stacks => &self.stacks,
        }
    }

    fn slot_mut(&mut self, chain: ChainFamily) -> &mut SlotState {
        match chain {
            ChainFamily::Ethereum => &mut self.ethereum,
            ChainFamily::Stacks => &mut self.stacks,
        }
    }

    pub fn address(&self, chain: ChainFamily) -> Option<&str> {
        self.slot(chain).address()
    }

    /// Both wallets connected, as a bridge operation requires
    pub fn is_fully_connected(&self) -> bool {
        self.ethereum.is_connected() && self.stacks.is_connected()
    }
}

#[derive(Default)]
struct ProviderSlots {
    ethereum: Option<Arc<dyn WalletProvider>>,
    stacks: Option<Arc<dyn WalletProvider>>,
}

impl ProviderSlots {
    fn slot_mut(&mut self, chain: ChainFamily) -> &mut Option<Arc<dyn WalletProvider>> {
        match chain {
            ChainFamily::Ethereum => &mut self.ethereum,
            ChainFamily::Stacks => &mut self.stacks,
        }
    }
}

/// Two-wallet session shared by reference across the application
pub struct WalletSession {
    providers: Mutex<ProviderSlots>,
    state: watch::Sender<SessionSnapshot>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSession {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            providers: Mutex::new(ProviderSlots::default()),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn address(&self, chain: ChainFamily) -> Option<String> {
        self.state.borrow().address(chain).map(str::to_string)
    }

    /// Provider of a connected slot
    pub fn provider(&self, chain: ChainFamily) -> Option<Arc<dyn WalletProvider>> {
        if !self.state.borrow().slot(chain).is_connected() {
            return None;
        }
        self.slots().slot_mut(chain).clone()
    }

    /// Connect `provider` into the slot of its chain.
    ///
    /// The returned account must validate for that chain; otherwise the slot
    /// is left disconnected and a `Validation` error is returned.
    pub async fn connect(&self, provider: Arc<dyn WalletProvider>) -> Result<String> {
        let chain = provider.chain();
        let address = provider.connect().await.map_err(|e| {
            BridgeError::wallet(format!("{} connection failed: {:#}", provider.id(), e))
        })?;

        if let Err(err) = require_valid_address(&address, chain) {
            warn!(chain = %chain, provider = %provider.id(), "Wallet returned an invalid address");
            self.disconnect(chain);
            return Err(err);
        }

        let provider_id = provider.id().to_string();
        *self.slots().slot_mut(chain) = Some(provider);
        self.state.send_modify(|snapshot| {
            *snapshot.slot_mut(chain) = SlotState::Connected {
                provider_id: provider_id.clone(),
                address: address.clone(),
            };
        });

        info!(chain = %chain, provider = %provider_id, address = %address, "Wallet connected");
        Ok(address)
    }

    /// Select the first available provider for `chain` and connect it
    pub async fn connect_with(
        &self,
        chain: ChainFamily,
        ranked: &[Arc<dyn ProviderProbe>],
    ) -> Result<String> {
        let (_, provider) = select_provider(chain, ranked)?;
        self.connect(provider).await
    }

    pub async fn connect_ethereum(&self, ranked: &[Arc<dyn ProviderProbe>]) -> Result<String> {
        self.connect_with(ChainFamily::Ethereum, ranked).await
    }

    pub async fn connect_stacks(&self, ranked: &[Arc<dyn ProviderProbe>]) -> Result<String> {
        self.connect_with(ChainFamily::Stacks, ranked).await
    }

    pub fn disconnect(&self, chain: ChainFamily) {
        *self.slots().slot_mut(chain) = None;
        let changed = self.state.send_if_modified(|snapshot| {
            let slot = snapshot.slot_mut(chain);
            if slot.is_connected() {
                *slot = SlotState::Disconnected;
                true
            } else {
                false
            }
        });
        if changed {
            info!(chain = %chain, "Wallet disconnected");
        }
    }

    pub fn disconnect_ethereum(&self) {
        self.disconnect(ChainFamily::Ethereum);
    }

    pub fn disconnect_stacks(&self) {
        self.disconnect(ChainFamily::Stacks);
    }

    /// Apply an account-change event from the provider of `chain`.
    ///
    /// `None` disconnects the slot. An invalid address disconnects it too and
    /// is reported as a `Validation` error.
    pub fn apply_account_change(&self, chain: ChainFamily, account: Option<String>) -> Result<()> {
        let Some(address) = account else {
            self.disconnect(chain);
            return Ok(());
        };

        if let Err(err) = require_valid_address(&address, chain) {
            self.disconnect(chain);
            return Err(err);
        }

        let updated = self.state.send_if_modified(|snapshot| match snapshot.slot_mut(chain) {
            SlotState::Connected {
                address: current, ..
            } if *current != address => {
                *current = address.clone();
                true
            }
            _ => false,
        });
        if updated {
            info!(chain = %chain, address = %address, "Wallet account changed");
        }
        Ok(())
    }

    fn slots(&self) -> MutexGuard<'_, ProviderSlots> {
        self.providers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Forward account-change events of the connected `chain` provider into the
/// session until the provider closes its channel.
pub fn watch_account_changes(session: Arc<WalletSession>, chain: ChainFamily) -> Option<JoinHandle<()>> {
    let provider = session.provider(chain)?;
    let mut changes = provider.account_changes();

    Some(tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(account) => {
                    if let Err(err) = session.apply_account_change(chain, account) {
                        warn!(chain = %chain, error = %err, "Rejected account change");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(chain = %chain, skipped, "Missed account changes, re-reading account");
                    match provider.address().await {
                        Ok(account) => {
                            if let Err(err) = session.apply_account_change(chain, account) {
                                warn!(chain = %chain, error = %err, "Rejected account change");
                            }
                        }
                        Err(err) => warn!(chain = %chain, error = %err, "Failed to read account"),
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!(chain = %chain, "Account change watcher stopped");
    }))
}
