//! Test doubles for the chain collaborators
//!
//! - [`MockEvmStatusSource`] / [`MockStacksStatusSource`] - scripted status
//!   responses and failures per transaction hash
//! - [`MockWalletProvider`] - records submitted intents, can refuse or reject
//! - fixtures for addresses, hashes and contracts

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result};
use tokio::sync::broadcast;

use crate::amount::MicroAmount;
use crate::orchestrator::BridgeContracts;
use crate::status::{EvmReceipt, EvmStatusSource, StacksStatusSource, StacksTransaction};
use crate::store::BridgeTransactionRecord;
use crate::types::{ChainFamily, Direction};
use crate::wallet::{TxIntent, WalletProvider};

/// Anvil's first development account
pub const EVM_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Testnet single-sig principal
pub const STACKS_ADDRESS: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

/// Deterministic `0x` + 64 hex transaction hash
pub fn tx_hash(n: u64) -> String {
    format!("0x{:064x}", n)
}

pub fn evm_receipt(status: &str) -> EvmReceipt {
    EvmReceipt {
        transaction_hash: None,
        block_number: Some("0x10".to_string()),
        status: Some(status.to_string()),
    }
}

pub fn stacks_tx(status: &str) -> StacksTransaction {
    StacksTransaction {
        tx_id: None,
        tx_status: status.to_string(),
        block_height: None,
    }
}

pub fn sample_contracts() -> BridgeContracts {
    BridgeContracts {
        ethereum_token: "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238".to_string(),
        ethereum_bridge: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
        stacks_token_contract: format!("{}.usdcx", STACKS_ADDRESS),
        ethereum_domain: 0,
        stacks_domain: 10003,
    }
}

/// Pending record as the orchestrator would write it
pub fn pending_record(direction: Direction, hash: &str, amount: MicroAmount) -> BridgeTransactionRecord {
    let (source, destination) = match direction {
        Direction::Deposit => (EVM_ADDRESS, STACKS_ADDRESS),
        Direction::Withdraw => (STACKS_ADDRESS, EVM_ADDRESS),
    };
    BridgeTransactionRecord::new_pending(direction, amount, source, destination, hash, "1".to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Status Sources
// ============================================================================

#[derive(Debug, Clone)]
enum Scripted<T> {
    Respond(Option<T>),
    Fail(String),
}

/// Status source answering from a per-hash script
pub struct ScriptedStatusSource<T> {
    responses: Mutex<HashMap<String, Scripted<T>>>,
    fallback: Mutex<Scripted<T>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

pub type MockEvmStatusSource = ScriptedStatusSource<EvmReceipt>;
pub type MockStacksStatusSource = ScriptedStatusSource<StacksTransaction>;

impl<T: Clone> Default for ScriptedStatusSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> ScriptedStatusSource<T> {
    /// Every hash is unknown until scripted
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            fallback: Mutex::new(Scripted::Respond(None)),
            delays: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(&self, hash: &str, response: Option<T>) {
        lock(&self.responses).insert(hash.to_string(), Scripted::Respond(response));
    }

    pub fn fail(&self, hash: &str, message: &str) {
        lock(&self.responses).insert(hash.to_string(), Scripted::Fail(message.to_string()));
    }

    /// Response for hashes without a script
    pub fn set_default(&self, response: Option<T>) {
        *lock(&self.fallback) = Scripted::Respond(response);
    }

    pub fn fail_all(&self, message: &str) {
        *lock(&self.fallback) = Scripted::Fail(message.to_string());
    }

    /// Hold the answer for `hash` back by `delay`
    pub fn delay(&self, hash: &str, delay: Duration) {
        lock(&self.delays).insert(hash.to_string(), delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, hash: &str) -> Result<Option<T>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = lock(&self.delays).get(hash).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = lock(&self.responses)
            .get(hash)
            .cloned()
            .unwrap_or_else(|| lock(&self.fallback).clone());
        match scripted {
            Scripted::Respond(response) => Ok(response),
            Scripted::Fail(message) => Err(eyre!(message)),
        }
    }
}

impl ScriptedStatusSource<EvmReceipt> {
    /// Unscripted hashes get a successful receipt
    pub fn confirm_all(&self) {
        self.set_default(Some(evm_receipt("0x1")));
    }
}

#[async_trait]
impl EvmStatusSource for ScriptedStatusSource<EvmReceipt> {
    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<EvmReceipt>> {
        self.answer(tx_hash).await
    }
}

#[async_trait]
impl StacksStatusSource for ScriptedStatusSource<StacksTransaction> {
    async fn transaction(&self, txid: &str) -> Result<Option<StacksTransaction>> {
        self.answer(txid).await
    }
}

// ============================================================================
// Wallet
// ============================================================================

static NEXT_TX: AtomicU64 = AtomicU64::new(0x1000_0000);

/// Wallet provider that signs nothing and returns fresh hashes
pub struct MockWalletProvider {
    id: String,
    chain: ChainFamily,
    address: String,
    refuse_connection: AtomicBool,
    rejected: Mutex<Vec<&'static str>>,
    submitted: Mutex<Vec<TxIntent>>,
    accounts: broadcast::Sender<Option<String>>,
}

impl MockWalletProvider {
    pub fn new(id: &str, chain: ChainFamily, address: &str) -> Self {
        let (accounts, _) = broadcast::channel(16);
        Self {
            id: id.to_string(),
            chain,
            address: address.to_string(),
            refuse_connection: AtomicBool::new(false),
            rejected: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            accounts,
        }
    }

    pub fn ethereum(id: &str, address: &str) -> Self {
        Self::new(id, ChainFamily::Ethereum, address)
    }

    pub fn stacks(id: &str, address: &str) -> Self {
        Self::new(id, ChainFamily::Stacks, address)
    }

    pub fn refuse_connection(&self) {
        self.refuse_connection.store(true, Ordering::SeqCst);
    }

    /// Reject intents with this name as a user would
    pub fn reject(&self, intent_name: &'static str) {
        lock(&self.rejected).push(intent_name);
    }

    /// Intents accepted so far, in submission order
    pub fn submitted(&self) -> Vec<TxIntent> {
        lock(&self.submitted).clone()
    }

    pub fn emit_account_change(&self, account: Option<String>) {
        let _ = self.accounts.send(account);
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn chain(&self) -> ChainFamily {
        self.chain
    }

    async fn connect(&self) -> Result<String> {
        if self.refuse_connection.load(Ordering::SeqCst) {
            return Err(eyre!("User rejected the connection request"));
        }
        Ok(self.address.clone())
    }

    async fn address(&self) -> Result<Option<String>> {
        Ok(Some(self.address.clone()))
    }

    async fn sign_and_submit(&self, intent: TxIntent) -> Result<String> {
        if intent.chain() != self.chain {
            return Err(eyre!("{} cannot sign a {} intent", self.id, intent.chain()));
        }
        if lock(&self.rejected).contains(&intent.name()) {
            return Err(eyre!("User rejected the request"));
        }

        lock(&self.submitted).push(intent);
        Ok(tx_hash(NEXT_TX.fetch_add(1, Ordering::SeqCst)))
    }

    fn account_changes(&self) -> broadcast::Receiver<Option<String>> {
        self.accounts.subscribe()
    }
}
