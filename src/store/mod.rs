//! Local Transaction Record Store
//!
//! Durable, chain-independent record of every bridge operation the user
//! started. All records live as one JSON array under [`STORAGE_KEY`].
//!
//! Every operation reads the persisted array, applies its change, and writes
//! it back before returning, all under one mutex. The backend is therefore
//! the single source of truth and a second writer sharing it only ever races
//! on an individual read-merge-write, never on a stale in-memory copy.

pub mod backend;
pub mod record;
pub mod view;

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use record::{
    default_required_confirmations, BridgeTransactionRecord, ETHEREUM_REQUIRED_CONFIRMATIONS,
    STACKS_REQUIRED_CONFIRMATIONS,
};
pub use view::{ExplorerLinks, TransactionView};

use crate::error::{BridgeError, Result};
use crate::types::TransactionStatus;

/// Storage key holding the record array
pub const STORAGE_KEY: &str = "bridge_transactions";

/// Persistent store of [`BridgeTransactionRecord`]s
pub struct TransactionRecordStore {
    backend: Arc<dyn StorageBackend>,
    key: String,
    lock: Mutex<()>,
}

impl TransactionRecordStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_key(backend, STORAGE_KEY)
    }

    pub fn with_key(backend: Arc<dyn StorageBackend>, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Store backed by process memory only
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// All records, most recent first
    pub fn get_all(&self) -> Result<Vec<BridgeTransactionRecord>> {
        let _guard = self.guard()?;
        let mut records = self.load()?;
        sort_most_recent_first(&mut records);
        Ok(records)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<BridgeTransactionRecord>> {
        let _guard = self.guard()?;
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    /// Records whose status matches `predicate`, most recent first
    pub fn find_by_status<F>(&self, predicate: F) -> Result<Vec<BridgeTransactionRecord>>
    where
        F: Fn(TransactionStatus) -> bool,
    {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| predicate(r.status))
            .collect())
    }

    /// Records still awaiting a terminal status
    pub fn non_terminal(&self) -> Result<Vec<BridgeTransactionRecord>> {
        self.find_by_status(|status| !status.is_terminal())
    }

    /// Insert an unseen record or merge an existing one.
    ///
    /// Returns `true` when the stored state changed. Upserting the same
    /// record twice leaves the store as upserting it once.
    pub fn upsert(&self, record: &BridgeTransactionRecord) -> Result<bool> {
        let _guard = self.guard()?;
        let mut records = self.load()?;

        let changed = match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                let before = existing.status;
                let changed = existing.merge_from(record);
                if changed && existing.status != before {
                    info!(
                        record_id = %record.id,
                        from = %before,
                        to = %existing.status,
                        "Transaction status updated"
                    );
                }
                changed
            }
            None => {
                info!(
                    record_id = %record.id,
                    direction = %record.direction,
                    status = %record.status,
                    "Transaction record created"
                );
                records.push(record.clone());
                true
            }
        };

        if changed {
            self.persist(&records)?;
        }
        Ok(changed)
    }

    /// Fill in a missing gas fee; an existing value is never replaced
    pub fn backfill_gas_fee(&self, id: &str, gas_fee: &str) -> Result<bool> {
        let _guard = self.guard()?;
        let mut records = self.load()?;

        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        if record.gas_fee.as_deref().is_some_and(|fee| !fee.is_empty()) {
            return Ok(false);
        }

        record.gas_fee = Some(gas_fee.to_string());
        debug!(record_id = %id, gas_fee = %gas_fee, "Backfilled gas fee");
        self.persist(&records)?;
        Ok(true)
    }

    /// Remove every record
    pub fn clear(&self) -> Result<()> {
        let _guard = self.guard()?;
        self.persist(&[])
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| BridgeError::Storage("record store lock poisoned".to_string()))
    }

    /// Corrupt data is set aside under `<key>.corrupt` and treated as empty
    fn load(&self) -> Result<Vec<BridgeTransactionRecord>> {
        let Some(raw) = self.backend.load(&self.key)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable transaction records");
                self.backend.save(&format!("{}.corrupt", self.key), &raw)?;
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, records: &[BridgeTransactionRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        self.backend.save(&self.key, &json)
    }
}

fn sort_most_recent_first(records: &mut [BridgeTransactionRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;
    use chrono::{Duration, Utc};

    fn record(id: &str, age_secs: i64) -> BridgeTransactionRecord {
        let mut record = BridgeTransactionRecord::new_pending(
            Direction::Deposit,
            1_000_000,
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM",
            id,
            "1".to_string(),
        );
        record.created_at = Utc::now() - Duration::seconds(age_secs);
        record
    }

    #[test]
    fn test_get_all_most_recent_first() {
        let store = TransactionRecordStore::in_memory();
        store.upsert(&record("0xold", 300)).unwrap();
        store.upsert(&record("0xnew", 10)).unwrap();
        store.upsert(&record("0xmid", 100)).unwrap();

        let ids: Vec<_> = store.get_all().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["0xnew", "0xmid", "0xold"]);
    }

    #[test]
    fn test_upsert_idempotent() {
        let store = TransactionRecordStore::in_memory();
        let r = record("0x1", 0);

        assert!(store.upsert(&r).unwrap());
        let once = store.get_all().unwrap();

        assert!(!store.upsert(&r).unwrap());
        assert_eq!(store.get_all().unwrap(), once);
    }

    #[test]
    fn test_upsert_monotonic_status() {
        let store = TransactionRecordStore::in_memory();
        let r = record("0x1", 0);
        store.upsert(&r).unwrap();
        store.upsert(&r.with_status(TransactionStatus::Failed)).unwrap();

        assert!(!store.upsert(&r.with_status(TransactionStatus::Pending)).unwrap());
        assert!(!store.upsert(&r.with_status(TransactionStatus::Completed)).unwrap());

        let stored = store.find_by_id("0x1").unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_find_by_status() {
        let store = TransactionRecordStore::in_memory();
        let a = record("0xa", 0);
        let b = record("0xb", 0);
        store.upsert(&a).unwrap();
        store.upsert(&b).unwrap();
        store.upsert(&b.with_status(TransactionStatus::Completed)).unwrap();

        let pending = store
            .find_by_status(|s| s == TransactionStatus::Pending)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "0xa");
        assert_eq!(store.non_terminal().unwrap().len(), 1);
        assert!(store.find_by_id("0xmissing").unwrap().is_none());
    }

    #[test]
    fn test_backfill_gas_fee_only_when_missing() {
        let store = TransactionRecordStore::in_memory();
        store.upsert(&record("0x1", 0)).unwrap();

        assert!(store.backfill_gas_fee("0x1", "2.5").unwrap());
        assert!(!store.backfill_gas_fee("0x1", "9.9").unwrap());
        assert!(!store.backfill_gas_fee("0xmissing", "1").unwrap());

        let stored = store.find_by_id("0x1").unwrap().unwrap();
        assert_eq!(stored.gas_fee.as_deref(), Some("2.5"));
    }

    #[test]
    fn test_persists_every_mutation() {
        let backend = Arc::new(MemoryStorage::new());
        let store = TransactionRecordStore::new(backend.clone());
        store.upsert(&record("0x1", 0)).unwrap();

        // A second store over the same backend sees the write immediately
        let other = TransactionRecordStore::new(backend.clone());
        assert!(other.find_by_id("0x1").unwrap().is_some());

        let raw = backend.load(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.starts_with('['));
    }

    #[test]
    fn test_corrupt_data_is_set_aside() {
        let backend = Arc::new(MemoryStorage::new());
        backend.save(STORAGE_KEY, "{not json").unwrap();

        let store = TransactionRecordStore::new(backend.clone());
        assert!(store.get_all().unwrap().is_empty());
        assert_eq!(
            backend
                .load(&format!("{}.corrupt", STORAGE_KEY))
                .unwrap()
                .as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_clear() {
        let store = TransactionRecordStore::in_memory();
        store.upsert(&record("0x1", 0)).unwrap();
        store.clear().unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }
}
