use std::sync::Arc;

use tracing::{debug, error};

use qvl_ledger::{LedgerAncestryView, LedgerError, LedgerStore};
use qvl_types::{LedgerId, NetTime};

use crate::clock::NetClock;
use crate::fetch::{AcquireScheduler, FetchReason};

/// Read side of the ledger world as seen by validation processing.
///
/// Answers the current network time and turns locally held ledgers into
/// [`LedgerAncestryView`]s. A ledger that is not held locally is scheduled
/// for background acquisition and reported as absent; `acquire` never
/// waits on the network.
pub struct LedgerSource {
    clock: Arc<dyn NetClock>,
    ledgers: Arc<dyn LedgerStore>,
    scheduler: Arc<dyn AcquireScheduler>,
}

impl LedgerSource {
    pub fn new(
        clock: Arc<dyn NetClock>,
        ledgers: Arc<dyn LedgerStore>,
        scheduler: Arc<dyn AcquireScheduler>,
    ) -> Self {
        Self {
            clock,
            ledgers,
            scheduler,
        }
    }

    /// Current network close time.
    pub fn now(&self) -> NetTime {
        self.clock.now()
    }

    /// Look up the ledger `hash` and build its ancestry view.
    ///
    /// Returns `Ok(None)` when the ledger is not held locally, after
    /// scheduling its acquisition. A stored ledger that is still open, or
    /// whose id does not match `hash`, is an integrity violation and is
    /// returned as an error.
    pub fn acquire(&self, hash: &LedgerId) -> Result<Option<LedgerAncestryView>, LedgerError> {
        let Some(ledger) = self.ledgers.ledger_by_hash(hash) else {
            debug!(
                ledger = %hash.short_hex(),
                "need validated ledger for preferred ledger analysis"
            );
            self.scheduler.schedule_acquire(*hash, FetchReason::Consensus);
            return Ok(None);
        };

        if !ledger.is_immutable() {
            error!(ledger = %hash.short_hex(), seq = ledger.seq(), "stored ledger is still open");
            return Err(LedgerError::NotImmutable {
                id: ledger.id(),
                seq: ledger.seq(),
            });
        }

        if ledger.id() != *hash {
            error!(
                requested = %hash.short_hex(),
                actual = %ledger.id().short_hex(),
                "stored ledger hash mismatch"
            );
            return Err(LedgerError::HashMismatch {
                requested: *hash,
                actual: ledger.id(),
            });
        }

        if let Some(record) = ledger.ancestor_hashes() {
            if record.last_seq != ledger.seq().saturating_sub(1) {
                error!(
                    ledger = %hash.short_hex(),
                    seq = ledger.seq(),
                    last_seq = record.last_seq,
                    "ancestor record does not end at parent"
                );
                return Err(LedgerError::IntegrityViolation {
                    seq: ledger.seq(),
                    reason: format!("ancestor record ends at seq {}", record.last_seq),
                });
            }
        }

        Ok(Some(LedgerAncestryView::from_ledger(&ledger)))
    }
}
