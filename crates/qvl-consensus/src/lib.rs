//! Validation admission and ledger acceptance for the Quorum Validation Layer.
//!
//! Validations arriving from the network pass through a
//! [`ValidationHandler`], which resolves the signer against the
//! [`ValidatorList`], sequences the validation per validator in a
//! [`ValidationStore`], and tells a [`LedgerAcceptor`] about every fresh
//! trusted validation. Ledgers that are not held locally are fetched in the
//! background by a [`LedgerFetcher`]; nothing on the admission path waits
//! for the network.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use qvl_consensus::{
//!     InMemoryValidationStore, LedgerAcceptor, Validation, ValidationHandler, ValidatorList,
//! };
//! use qvl_types::{LedgerId, NetTime, PublicKey, Seq};
//!
//! struct Ignore;
//! impl LedgerAcceptor for Ignore {
//!     fn check_accept(&self, _hash: LedgerId, _seq: Seq) {}
//! }
//!
//! let validator = PublicKey::from_bytes([7u8; 32]);
//! let keys = Arc::new(ValidatorList::new());
//! keys.trust(validator);
//!
//! let handler = ValidationHandler::new(
//!     keys,
//!     Arc::new(InMemoryValidationStore::new()),
//!     Arc::new(Ignore),
//! );
//! let val = Arc::new(Validation::new(
//!     validator,
//!     LedgerId::from_bytes(b"ledger 12"),
//!     Some(12),
//!     NetTime::from_secs(1_000),
//! ));
//! assert!(handler.handle_new_validation(&val, "peer"));
//! assert!(!handler.handle_new_validation(&val, "peer"));
//! ```

pub mod accept;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod node;
pub mod source;
pub mod store;
pub mod trust;
pub mod validation;

pub use accept::{LedgerAcceptor, QuorumAcceptor};
pub use clock::{ManualClock, NetClock, SystemClock};
pub use config::{ClockConfig, FetchConfig, NodeConfig, ValidatorEntry, ValidatorsConfig};
pub use error::{ConsensusError, Result};
pub use fetch::{AcquireScheduler, FetchReason, FetchRequest, InboundLedgers, LedgerFetcher};
pub use handler::{Admission, Disposition, ValidationHandler};
pub use node::ValidationNode;
pub use source::LedgerSource;
pub use store::{InMemoryValidationStore, ValStatus, ValidationStore};
pub use trust::{ValidatorKeys, ValidatorList};
pub use validation::Validation;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use qvl_ledger::{mismatch, InMemoryLedgerStore, Ledger, LedgerAncestryView};
    use qvl_types::{LedgerId, NetTime, PublicKey};

    fn key(byte: u8) -> PublicKey {
        PublicKey::from_bytes([byte; 32])
    }

    #[derive(Default)]
    struct DropScheduler(Mutex<Vec<LedgerId>>);

    impl AcquireScheduler for DropScheduler {
        fn schedule_acquire(&self, hash: LedgerId, _reason: FetchReason) {
            self.0.lock().unwrap().push(hash);
        }
    }

    /// Everything except the fetch worker, wired by hand.
    struct Harness {
        keys: Arc<ValidatorList>,
        ledgers: Arc<InMemoryLedgerStore>,
        scheduler: Arc<DropScheduler>,
        acceptor: Arc<QuorumAcceptor>,
        handler: ValidationHandler,
    }

    fn harness(quorum: usize) -> Harness {
        let keys = Arc::new(ValidatorList::new());
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let scheduler = Arc::new(DropScheduler::default());
        let store = Arc::new(InMemoryValidationStore::new());
        let clock = Arc::new(ManualClock::new(NetTime::from_secs(0)));
        let source = Arc::new(LedgerSource::new(clock, ledgers.clone(), scheduler.clone()));
        let acceptor = Arc::new(QuorumAcceptor::new(store.clone(), source, quorum));
        let handler = ValidationHandler::new(keys.clone(), store, acceptor.clone());
        Harness {
            keys,
            ledgers,
            scheduler,
            acceptor,
            handler,
        }
    }

    fn build_chain(ledgers: &InMemoryLedgerStore, len: u32, salt: u8) -> Vec<Arc<Ledger>> {
        let mut chain = vec![ledgers.insert(Ledger::genesis(NetTime::from_secs(0)))];
        for i in 1..len {
            let next = chain[i as usize - 1].child(NetTime::from_secs(i * 10), [salt; 32]);
            chain.push(ledgers.insert(next));
        }
        chain
    }

    fn vote(signer: PublicKey, ledger: &Ledger, sign_secs: u32) -> Arc<Validation> {
        Arc::new(Validation::new(
            signer,
            ledger.id(),
            Some(ledger.seq()),
            NetTime::from_secs(sign_secs),
        ))
    }

    // -----------------------------------------------------------------------
    // Sequencing: 5 then 5 again then 6
    // -----------------------------------------------------------------------
    #[test]
    fn repeated_sequence_then_successor() {
        let h = harness(1);
        h.keys.trust(key(1));
        let chain = build_chain(&h.ledgers, 6, 1);

        assert!(h.handler.handle_new_validation(&vote(key(1), &chain[4], 50), "a"));
        assert_eq!(h.acceptor.validated_seq(), 5);

        let again = h.handler.evaluate(&vote(key(1), &chain[4], 51), "b");
        assert!(matches!(
            again.disposition,
            Disposition::Admitted {
                status: ValStatus::BadSeq,
                ..
            }
        ));
        assert!(!again.relay);

        assert!(h.handler.handle_new_validation(&vote(key(1), &chain[5], 60), "c"));
        assert_eq!(h.acceptor.validated_seq(), 6);
    }

    // -----------------------------------------------------------------------
    // Listed validators never move the validated ledger
    // -----------------------------------------------------------------------
    #[test]
    fn listed_validators_cannot_validate() {
        let h = harness(1);
        for b in 1..=5 {
            h.keys.list(key(b));
        }
        let chain = build_chain(&h.ledgers, 3, 1);
        for b in 1..=5 {
            assert!(!h.handler.handle_new_validation(&vote(key(b), &chain[2], 30), "p"));
        }
        assert!(h.acceptor.validated().is_none());
    }

    // -----------------------------------------------------------------------
    // Quorum across several validators, then a competing branch
    // -----------------------------------------------------------------------
    #[test]
    fn quorum_then_fork_detection() {
        let h = harness(2);
        for b in 1..=3 {
            h.keys.trust(key(b));
        }
        let main = build_chain(&h.ledgers, 4, 1);

        assert!(h.handler.handle_new_validation(&vote(key(1), &main[3], 40), "p1"));
        assert!(h.acceptor.validated().is_none());
        assert!(h.handler.handle_new_validation(&vote(key(2), &main[3], 40), "p2"));
        let first = h.acceptor.validated().unwrap();
        assert_eq!(first.id(), main[3].id());

        // A branch that left the main chain after seq 2.
        let mut branch = vec![Arc::clone(&main[1])];
        for i in 0..3u32 {
            let next = branch[i as usize].child(NetTime::from_secs(100 + i), [9u8; 32]);
            branch.push(h.ledgers.insert(next));
        }
        let tip = &branch[3];
        assert_eq!(tip.seq(), 5);

        assert!(h.handler.handle_new_validation(&vote(key(2), tip, 50), "p2"));
        assert!(h.handler.handle_new_validation(&vote(key(3), tip, 50), "p3"));
        let second = h.acceptor.validated().unwrap();
        assert_eq!(second.id(), tip.id());
        assert_eq!(mismatch(&first, &second), 3);
    }

    // -----------------------------------------------------------------------
    // Missing ledgers are requested, not waited for
    // -----------------------------------------------------------------------
    #[test]
    fn unknown_ledger_is_requested() {
        let h = harness(1);
        h.keys.trust(key(1));
        let remote = LedgerId::from_bytes(b"not here");
        let v = Arc::new(Validation::new(key(1), remote, Some(9), NetTime::from_secs(5)));
        assert!(h.handler.handle_new_validation(&v, "p"));
        assert!(h.acceptor.validated().is_none());
        assert_eq!(*h.scheduler.0.lock().unwrap(), vec![remote]);
    }

    // -----------------------------------------------------------------------
    // Views built from stored ledgers agree with the chain
    // -----------------------------------------------------------------------
    #[test]
    fn views_follow_the_chain() {
        let h = harness(1);
        let chain = build_chain(&h.ledgers, 8, 1);
        let view = LedgerAncestryView::from_ledger(&chain[7]);
        for ledger in &chain {
            assert_eq!(view.at(ledger.seq()), ledger.id());
        }
        assert_eq!(mismatch(&view, &view), 9);
    }
}
