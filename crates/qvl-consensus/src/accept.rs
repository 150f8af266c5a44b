use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use qvl_ledger::{mismatch, LedgerAncestryView};
use qvl_types::{LedgerId, Seq};

use crate::source::LedgerSource;
use crate::store::ValidationStore;

/// Decides whether a ledger has gathered enough trusted validations to be
/// accepted as validated.
pub trait LedgerAcceptor: Send + Sync {
    /// Called once for each trusted validation admitted as current.
    fn check_accept(&self, hash: LedgerId, seq: Seq);
}

/// Accepts a ledger once `quorum` trusted validations name it.
///
/// Acceptance is only evaluated when a trusted validation is admitted. A
/// ledger that reaches quorum before it is held locally gets a background
/// fetch, and is accepted by the first trusted validation for it that
/// arrives after the fetch completes. Nothing re-checks on fetch completion,
/// so when every trusted validator has already voted for that ledger it
/// stays unaccepted until a validation for a later ledger supersedes it.
pub struct QuorumAcceptor {
    store: Arc<dyn ValidationStore>,
    source: Arc<LedgerSource>,
    quorum: usize,
    validated: Mutex<Option<LedgerAncestryView>>,
}

impl QuorumAcceptor {
    pub fn new(store: Arc<dyn ValidationStore>, source: Arc<LedgerSource>, quorum: usize) -> Self {
        Self {
            store,
            source,
            quorum,
            validated: Mutex::new(None),
        }
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// The most recently accepted ledger.
    pub fn validated(&self) -> Option<LedgerAncestryView> {
        self.validated.lock().expect("lock poisoned").clone()
    }

    /// Sequence of the most recently accepted ledger, or 0.
    pub fn validated_seq(&self) -> Seq {
        self.validated
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(LedgerAncestryView::seq)
            .unwrap_or(0)
    }
}

impl LedgerAcceptor for QuorumAcceptor {
    fn check_accept(&self, hash: LedgerId, seq: Seq) {
        if seq <= self.validated_seq() {
            return;
        }

        let count = self.store.num_trusted_for_ledger(&hash);
        if count < self.quorum {
            debug!(ledger = %hash.short_hex(), seq, count, quorum = self.quorum, "below quorum");
            return;
        }

        let view = match self.source.acquire(&hash) {
            Ok(Some(view)) => view,
            Ok(None) => {
                debug!(ledger = %hash.short_hex(), seq, "quorum reached, waiting for ledger");
                return;
            }
            Err(e) => {
                error!(ledger = %hash.short_hex(), seq, error = %e, "cannot accept ledger");
                return;
            }
        };

        if view.seq() != seq {
            warn!(
                ledger = %hash.short_hex(),
                claimed = seq,
                actual = view.seq(),
                "validations name a different sequence than the ledger"
            );
        }

        let mut validated = self.validated.lock().expect("lock poisoned");
        if let Some(prev) = validated.as_ref() {
            if view.seq() <= prev.seq() {
                return;
            }
            let diverge = mismatch(prev, &view);
            if diverge <= prev.seq() {
                warn!(
                    ledger = %hash.short_hex(),
                    seq = view.seq(),
                    previous = %prev.id().short_hex(),
                    diverge,
                    "validated ledger does not extend previous validated ledger"
                );
            }
        }

        info!(ledger = %hash.short_hex(), seq = view.seq(), count, "accepted validated ledger");
        *validated = Some(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use qvl_ledger::{InMemoryLedgerStore, Ledger};
    use qvl_types::{NetTime, NodeId};

    use crate::clock::ManualClock;
    use crate::fetch::{AcquireScheduler, FetchReason};
    use crate::store::ValStatus;
    use crate::validation::Validation;

    /// Store stub with fixed trusted counts.
    #[derive(Default)]
    struct FixedCounts(Mutex<HashMap<LedgerId, usize>>);

    impl FixedCounts {
        fn set(&self, ledger: LedgerId, count: usize) {
            self.0.lock().unwrap().insert(ledger, count);
        }
    }

    impl ValidationStore for FixedCounts {
        fn add(&self, _: NodeId, _: Arc<Validation>) -> ValStatus {
            ValStatus::Current
        }
        fn num_trusted_for_ledger(&self, ledger: &LedgerId) -> usize {
            self.0.lock().unwrap().get(ledger).copied().unwrap_or(0)
        }
        fn current(&self, _: &NodeId) -> Option<Arc<Validation>> {
            None
        }
    }

    #[derive(Default)]
    struct CountingScheduler(Mutex<usize>);

    impl AcquireScheduler for CountingScheduler {
        fn schedule_acquire(&self, _: LedgerId, _: FetchReason) {
            *self.0.lock().unwrap() += 1;
        }
    }

    struct Fixture {
        ledgers: Arc<InMemoryLedgerStore>,
        counts: Arc<FixedCounts>,
        scheduler: Arc<CountingScheduler>,
        acceptor: QuorumAcceptor,
    }

    fn fixture(quorum: usize) -> Fixture {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let counts = Arc::new(FixedCounts::default());
        let scheduler = Arc::new(CountingScheduler::default());
        let clock = Arc::new(ManualClock::new(NetTime::from_secs(0)));
        let source = Arc::new(LedgerSource::new(clock, ledgers.clone(), scheduler.clone()));
        let acceptor = QuorumAcceptor::new(counts.clone(), source, quorum);
        Fixture {
            ledgers,
            counts,
            scheduler,
            acceptor,
        }
    }

    fn chain(len: usize, salt: u8) -> Vec<Ledger> {
        let mut out = vec![Ledger::genesis(NetTime::from_secs(0))];
        for i in 1..len {
            let next = out[i - 1].child(NetTime::from_secs(i as u32 * 10), [salt; 32]);
            out.push(next);
        }
        out
    }

    #[test]
    fn below_quorum_does_nothing() {
        let f = fixture(2);
        let ledgers = chain(3, 1);
        let tip = f.ledgers.insert(ledgers[2].clone());
        f.counts.set(tip.id(), 1);
        f.acceptor.check_accept(tip.id(), 3);
        assert!(f.acceptor.validated().is_none());
        assert_eq!(*f.scheduler.0.lock().unwrap(), 0);
    }

    #[test]
    fn quorum_accepts_local_ledger() {
        let f = fixture(2);
        let ledgers = chain(3, 1);
        let tip = f.ledgers.insert(ledgers[2].clone());
        f.counts.set(tip.id(), 2);
        f.acceptor.check_accept(tip.id(), 3);
        let validated = f.acceptor.validated().unwrap();
        assert_eq!(validated.id(), tip.id());
        assert_eq!(f.acceptor.validated_seq(), 3);
    }

    #[test]
    fn quorum_on_missing_ledger_schedules_fetch() {
        let f = fixture(1);
        let hash = LedgerId::from_bytes(b"remote");
        f.counts.set(hash, 1);
        f.acceptor.check_accept(hash, 4);
        assert!(f.acceptor.validated().is_none());
        assert_eq!(*f.scheduler.0.lock().unwrap(), 1);
    }

    #[test]
    fn fetched_ledger_waits_for_next_validation() {
        let f = fixture(2);
        let ledgers = chain(3, 1);
        let tip = &ledgers[2];
        f.counts.set(tip.id(), 2);
        f.acceptor.check_accept(tip.id(), 3);
        assert!(f.acceptor.validated().is_none());
        assert_eq!(*f.scheduler.0.lock().unwrap(), 1);

        // The fetch lands, but nothing re-evaluates the ledger by itself.
        f.ledgers.insert(tip.clone());
        assert!(f.acceptor.validated().is_none());

        f.counts.set(tip.id(), 3);
        f.acceptor.check_accept(tip.id(), 3);
        assert_eq!(f.acceptor.validated().unwrap().id(), tip.id());
        assert_eq!(*f.scheduler.0.lock().unwrap(), 1);
    }

    #[test]
    fn older_sequences_are_ignored() {
        let f = fixture(1);
        let ledgers = chain(4, 1);
        let tip = f.ledgers.insert(ledgers[3].clone());
        let older = f.ledgers.insert(ledgers[1].clone());
        f.counts.set(tip.id(), 1);
        f.counts.set(older.id(), 1);
        f.acceptor.check_accept(tip.id(), 4);
        f.acceptor.check_accept(older.id(), 2);
        assert_eq!(f.acceptor.validated().unwrap().id(), tip.id());
    }

    #[test]
    fn accepts_successor_and_fork() {
        let f = fixture(1);
        let main = chain(5, 1);
        let fork = {
            let mut fork = main[..3].to_vec();
            for i in 3..6 {
                let next = fork[i - 1].child(NetTime::from_secs(i as u32 * 10 + 1), [2u8; 32]);
                fork.push(next);
            }
            fork
        };

        let a = f.ledgers.insert(main[3].clone());
        f.counts.set(a.id(), 1);
        f.acceptor.check_accept(a.id(), 4);
        assert_eq!(f.acceptor.validated_seq(), 4);

        // A ledger on a competing branch is still accepted; the divergence
        // is only reported.
        let b = f.ledgers.insert(fork[5].clone());
        f.counts.set(b.id(), 1);
        f.acceptor.check_accept(b.id(), 6);
        let validated = f.acceptor.validated().unwrap();
        assert_eq!(validated.id(), b.id());
        assert_eq!(mismatch(&LedgerAncestryView::from_ledger(&main[3]), &validated), 4);
    }

    #[test]
    fn integrity_error_blocks_acceptance() {
        let f = fixture(1);
        let ledgers = chain(2, 1);
        let open = f.ledgers.insert(ledgers[1].open_child(NetTime::from_secs(99)));
        f.counts.set(open.id(), 1);
        f.acceptor.check_accept(open.id(), 3);
        assert!(f.acceptor.validated().is_none());
    }
}
