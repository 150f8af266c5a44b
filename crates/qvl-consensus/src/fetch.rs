//! Background ledger acquisition.
//!
//! Ledger lookups on the admission path must never wait for the network.
//! Missing ledgers are handed to a [`LedgerFetcher`], whose worker task runs
//! acquisitions against an [`InboundLedgers`] implementation with bounded
//! concurrency. Requests are best effort: when the queue is full they are
//! dropped and logged, and a later validation for the same ledger will ask
//! again.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use qvl_ledger::Ledger;
use qvl_types::{LedgerId, Seq};

use crate::config::FetchConfig;

/// Why a ledger is being acquired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchReason {
    /// Needed for consensus or preferred-ledger analysis.
    Consensus,
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Consensus => "consensus",
        };
        f.write_str(s)
    }
}

/// One queued acquisition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub hash: LedgerId,
    /// Sequence of the wanted ledger, or 0 when unknown.
    pub seq: Seq,
    pub reason: FetchReason,
}

/// Network-facing ledger acquisition.
#[async_trait]
pub trait InboundLedgers: Send + Sync {
    /// Acquire the ledger `hash` from peers. `seq` is 0 when unknown.
    ///
    /// Implementations make the ledger available to the local
    /// [`LedgerStore`](qvl_ledger::LedgerStore) on success.
    async fn acquire(&self, hash: LedgerId, seq: Seq, reason: FetchReason) -> Option<Arc<Ledger>>;
}

/// Non-blocking request to acquire a ledger in the background.
pub trait AcquireScheduler: Send + Sync {
    fn schedule_acquire(&self, hash: LedgerId, reason: FetchReason);
}

/// Queue front-end for the acquisition worker.
///
/// Dropping every clone of the fetcher closes the queue; the worker then
/// finishes its in-flight acquisitions and exits.
#[derive(Clone)]
pub struct LedgerFetcher {
    tx: mpsc::Sender<FetchRequest>,
}

impl LedgerFetcher {
    /// Start the worker task on the current tokio runtime.
    pub fn spawn(inbound: Arc<dyn InboundLedgers>, config: &FetchConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(run_worker(rx, inbound, config.max_in_flight.max(1)));
        (Self { tx }, handle)
    }

    #[cfg(test)]
    fn from_sender(tx: mpsc::Sender<FetchRequest>) -> Self {
        Self { tx }
    }
}

impl AcquireScheduler for LedgerFetcher {
    fn schedule_acquire(&self, hash: LedgerId, reason: FetchReason) {
        let request = FetchRequest { hash, seq: 0, reason };
        match self.tx.try_send(request) {
            Ok(()) => {
                debug!(ledger = %hash.short_hex(), %reason, "scheduled ledger acquisition");
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    ledger = %hash.short_hex(),
                    %reason,
                    "fetch queue full, dropping acquisition"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    ledger = %hash.short_hex(),
                    %reason,
                    "fetch worker stopped, dropping acquisition"
                );
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<FetchRequest>,
    inbound: Arc<dyn InboundLedgers>,
    max_in_flight: usize,
) {
    let permits = Arc::new(Semaphore::new(max_in_flight));
    let mut tasks = JoinSet::new();

    while let Some(request) = rx.recv().await {
        while tasks.try_join_next().is_some() {}

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let inbound = Arc::clone(&inbound);
        tasks.spawn(async move {
            let _permit = permit;
            let FetchRequest { hash, seq, reason } = request;
            match inbound.acquire(hash, seq, reason).await {
                Some(ledger) => {
                    debug!(
                        ledger = %hash.short_hex(),
                        seq = ledger.seq(),
                        %reason,
                        "acquired ledger"
                    );
                }
                None => {
                    debug!(ledger = %hash.short_hex(), %reason, "ledger acquisition failed");
                }
            }
        });
    }

    while tasks.join_next().await.is_some() {}
    debug!("fetch worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use qvl_types::NetTime;

    #[derive(Default)]
    struct RecordingInbound {
        requests: Mutex<Vec<FetchRequest>>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl InboundLedgers for RecordingInbound {
        async fn acquire(
            &self,
            hash: LedgerId,
            seq: Seq,
            reason: FetchReason,
        ) -> Option<Arc<Ledger>> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.requests
                .lock()
                .unwrap()
                .push(FetchRequest { hash, seq, reason });
            self.running.fetch_sub(1, Ordering::SeqCst);
            Some(Arc::new(Ledger::genesis(NetTime::from_secs(0))))
        }
    }

    #[tokio::test]
    async fn worker_runs_every_request() {
        let inbound = Arc::new(RecordingInbound::default());
        let config = FetchConfig {
            queue_capacity: 16,
            max_in_flight: 2,
        };
        let (fetcher, handle) = LedgerFetcher::spawn(inbound.clone(), &config);

        for i in 0..6u8 {
            fetcher.schedule_acquire(LedgerId::from_bytes(&[i]), FetchReason::Consensus);
        }
        drop(fetcher);
        handle.await.unwrap();

        let requests = inbound.requests.lock().unwrap();
        assert_eq!(requests.len(), 6);
        assert!(requests
            .iter()
            .all(|r| r.seq == 0 && r.reason == FetchReason::Consensus));
        assert!(inbound.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn full_queue_drops_request() {
        let (tx, mut rx) = mpsc::channel(1);
        let fetcher = LedgerFetcher::from_sender(tx);
        fetcher.schedule_acquire(LedgerId::from_bytes(b"a"), FetchReason::Consensus);
        fetcher.schedule_acquire(LedgerId::from_bytes(b"b"), FetchReason::Consensus);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.hash, LedgerId::from_bytes(b"a"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_not_fatal() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let fetcher = LedgerFetcher::from_sender(tx);
        fetcher.schedule_acquire(LedgerId::from_bytes(b"a"), FetchReason::Consensus);
    }

    #[test]
    fn reason_display() {
        assert_eq!(FetchReason::Consensus.to_string(), "consensus");
    }
}
