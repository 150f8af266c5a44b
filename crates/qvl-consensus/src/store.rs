//! Per-validator validation sequencing.
//!
//! The [`ValidationStore`] is the single serialization point for admission:
//! validations from one validator identity are admitted in strictly
//! increasing sequence order, and anything at or below the highest sequence
//! already admitted for that identity is rejected.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::trace;

use qvl_types::{LedgerId, NodeId, Seq};

use crate::validation::Validation;

/// Outcome of offering a validation to the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValStatus {
    /// Accepted as the validator's newest validation.
    Current,
    /// Signed earlier than the validator's current validation.
    Stale,
    /// Asserts a sequence at or behind one this validator already validated.
    BadSeq,
}

impl fmt::Display for ValStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Current => "current",
            Self::Stale => "stale",
            Self::BadSeq => "badSeq",
        };
        f.write_str(s)
    }
}

/// Per-validator sequencing store.
///
/// Implementations must make `add` atomic per [`NodeId`]: two validations
/// for the same identity are never admitted concurrently.
pub trait ValidationStore: Send + Sync {
    /// Offer a validation from the validator identified by `node`.
    fn add(&self, node: NodeId, validation: Arc<Validation>) -> ValStatus;

    /// Number of admitted validations for `ledger` that are currently
    /// marked trusted.
    fn num_trusted_for_ledger(&self, ledger: &LedgerId) -> usize;

    /// The newest admitted validation from `node`.
    fn current(&self, node: &NodeId) -> Option<Arc<Validation>>;
}

#[derive(Default)]
struct StoreState {
    current: HashMap<NodeId, Arc<Validation>>,
    highest_seq: HashMap<NodeId, Seq>,
    /// Each validator's current validation, grouped by ledger.
    by_ledger: HashMap<LedgerId, HashMap<NodeId, Arc<Validation>>>,
}

/// In-memory [`ValidationStore`] guarded by a single mutex.
#[derive(Default)]
pub struct InMemoryValidationStore {
    inner: Mutex<StoreState>,
}

impl InMemoryValidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of validators with at least one admitted validation.
    pub fn validator_count(&self) -> usize {
        self.inner.lock().expect("lock poisoned").current.len()
    }

    /// Highest sequence admitted for `node`.
    pub fn highest_seq(&self, node: &NodeId) -> Option<Seq> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .highest_seq
            .get(node)
            .copied()
    }
}

impl ValidationStore for InMemoryValidationStore {
    fn add(&self, node: NodeId, validation: Arc<Validation>) -> ValStatus {
        let Some(seq) = validation.ledger_seq() else {
            return ValStatus::BadSeq;
        };

        let mut state = self.inner.lock().expect("lock poisoned");

        if let Some(&highest) = state.highest_seq.get(&node) {
            if seq <= highest {
                trace!(node = %node, seq, highest, "validation sequence not increasing");
                return ValStatus::BadSeq;
            }
        }

        if let Some(current) = state.current.get(&node) {
            if validation.sign_time() < current.sign_time() {
                trace!(node = %node, seq, "validation signed before current");
                return ValStatus::Stale;
            }
        }

        state.highest_seq.insert(node, seq);
        if let Some(previous) = state.current.get(&node).map(|v| v.ledger_hash()) {
            if let Some(votes) = state.by_ledger.get_mut(&previous) {
                votes.remove(&node);
                if votes.is_empty() {
                    state.by_ledger.remove(&previous);
                }
            }
        }
        state
            .by_ledger
            .entry(validation.ledger_hash())
            .or_default()
            .insert(node, Arc::clone(&validation));
        state.current.insert(node, validation);
        ValStatus::Current
    }

    fn num_trusted_for_ledger(&self, ledger: &LedgerId) -> usize {
        let state = self.inner.lock().expect("lock poisoned");
        state
            .by_ledger
            .get(ledger)
            .map(|vals| vals.values().filter(|v| v.is_trusted()).count())
            .unwrap_or(0)
    }

    fn current(&self, node: &NodeId) -> Option<Arc<Validation>> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .current
            .get(node)
            .cloned()
    }
}
