//! Transaction Status Reconciliation
//!
//! A pass selects every non-terminal record, asks the source chain of each
//! one for its current status, and merges any change into the store.
//!
//! # Pass Semantics
//!
//! 1. Select records with status `pending` or `processing`
//! 2. Route by direction:
//!    - `deposit` → Ethereum receipt by source tx hash
//!    - `withdraw` → Stacks API by source tx hash
//! 3. Map the native status onto [`TransactionStatus`]
//! 4. Upsert only when the status differs from the stored one
//! 5. Return the full record set
//!
//! Queries run concurrently and results are applied as they resolve. A failed
//! query leaves its record untouched for this pass. Passes may overlap: every
//! write is a per-record merge that never moves status backward.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::address_codec::is_valid_tx_hash;
use crate::error::{BridgeError, Result};
use crate::status::{map_evm_status, map_stacks_status, EvmStatusSource, StacksStatusSource};
use crate::store::{BridgeTransactionRecord, TransactionRecordStore};
use crate::types::{Direction, TransactionStatus};

/// Default time between scheduled passes
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Counts for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Polls both status sources and merges results into the record store
pub struct TransactionStatusReconciler {
    store: Arc<TransactionRecordStore>,
    evm: Arc<dyn EvmStatusSource>,
    stacks: Arc<dyn StacksStatusSource>,
}

impl TransactionStatusReconciler {
    pub fn new(
        store: Arc<TransactionRecordStore>,
        evm: Arc<dyn EvmStatusSource>,
        stacks: Arc<dyn StacksStatusSource>,
    ) -> Self {
        Self { store, evm, stacks }
    }

    pub fn store(&self) -> &Arc<TransactionRecordStore> {
        &self.store
    }

    /// Run one pass and return every record afterwards
    pub async fn reconcile(&self) -> Result<Vec<BridgeTransactionRecord>> {
        let alive = AtomicBool::new(true);
        self.reconcile_while(&alive).await?;
        self.store.get_all()
    }

    /// Run one pass, applying results only while `alive` is set
    pub async fn reconcile_while(&self, alive: &AtomicBool) -> Result<PassSummary> {
        let candidates = self.store.non_terminal()?;
        let mut summary = PassSummary {
            checked: candidates.len(),
            ..PassSummary::default()
        };
        if candidates.is_empty() {
            return Ok(summary);
        }

        debug!(count = candidates.len(), "Reconciling non-terminal transactions");

        let mut in_flight: FuturesUnordered<_> = candidates
            .into_iter()
            .map(|record| async move {
                let outcome = self.check_record(&record).await;
                (record, outcome)
            })
            .collect();

        while let Some((record, outcome)) = in_flight.next().await {
            if !alive.load(Ordering::Acquire) {
                debug!(record_id = %record.id, "Reconciler stopped, dropping result");
                continue;
            }

            let status = match outcome {
                Ok(status) => status,
                Err(err) => {
                    warn!(
                        record_id = %record.id,
                        tx_hash = %record.source_tx_hash,
                        error = %err,
                        "Status check failed, leaving record unchanged"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            if status == record.status {
                continue;
            }

            match self.store.upsert(&record.with_status(status)) {
                Ok(true) => summary.updated += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(record_id = %record.id, error = %err, "Failed to store status update");
                    summary.failed += 1;
                }
            }
        }

        info!(
            checked = summary.checked,
            updated = summary.updated,
            failed = summary.failed,
            "Reconciliation pass complete"
        );
        Ok(summary)
    }

    /// Current canonical status of one record according to its source chain
    pub async fn check_record(&self, record: &BridgeTransactionRecord) -> Result<TransactionStatus> {
        let tx_hash = record.source_tx_hash.as_str();
        if !is_valid_tx_hash(tx_hash) {
            return Err(BridgeError::StatusQuery {
                tx_hash: tx_hash.to_string(),
                reason: "malformed transaction hash".to_string(),
            });
        }

        let query_error = |err: eyre::Report| BridgeError::StatusQuery {
            tx_hash: tx_hash.to_string(),
            reason: format!("{:#}", err),
        };

        let status = match record.direction {
            Direction::Deposit => {
                let receipt = self
                    .evm
                    .transaction_receipt(tx_hash)
                    .await
                    .map_err(query_error)?;
                map_evm_status(receipt.as_ref())
            }
            Direction::Withdraw => {
                let tx = self.stacks.transaction(tx_hash).await.map_err(query_error)?;
                map_stacks_status(tx.as_ref())
            }
        };

        debug!(
            record_id = %record.id,
            direction = %record.direction,
            stored = %record.status,
            observed = %status,
            "Checked transaction status"
        );
        Ok(status)
    }
}

// ============================================================================
// Scheduling
// ============================================================================

/// Background task running reconciliation passes on an interval and on demand.
///
/// `trigger_now` covers the "view became visible again" path. `stop` stops
/// scheduling and clears the liveness flag so a pass already in flight
/// discards its results instead of writing them.
pub struct ReconcileScheduler {
    alive: Arc<AtomicBool>,
    trigger: Arc<Notify>,
    shutdown: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReconcileScheduler {
    /// Spawn the task; the first pass runs immediately
    pub fn start(reconciler: Arc<TransactionStatusReconciler>, interval: Duration) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let trigger = Arc::new(Notify::new());
        let (shutdown, shutdown_rx) = mpsc::channel(1);

        let handle = tokio::spawn(run_loop(
            reconciler,
            interval,
            alive.clone(),
            trigger.clone(),
            shutdown_rx,
        ));

        Self {
            alive,
            trigger,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Request a pass as soon as the current one (if any) finishes
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::Acquire)
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop scheduling; an in-flight pass will not apply further results
    pub fn stop(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            info!("Stopping reconciliation scheduler");
            let _ = self.shutdown.try_send(());
        }
    }

    /// Stop and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ReconcileScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    reconciler: Arc<TransactionStatusReconciler>,
    interval: Duration,
    alive: Arc<AtomicBool>,
    trigger: Arc<Notify>,
    mut shutdown: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(interval_secs = interval.as_secs(), "Starting reconciliation scheduler");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                break;
            }
            _ = ticker.tick() => {}
            _ = trigger.notified() => {
                debug!("Reconciliation triggered on demand");
            }
        }

        if !alive.load(Ordering::Acquire) {
            break;
        }
        if let Err(err) = reconciler.reconcile_while(&alive).await {
            warn!(error = %err, "Reconciliation pass failed");
        }
    }

    info!("Reconciliation scheduler stopped");
}
