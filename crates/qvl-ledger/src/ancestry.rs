//! Bounded ancestry views and fork detection.
//!
//! A [`LedgerAncestryView`] captures a ledger's own id and sequence plus
//! the trailing window of ancestor hashes recorded in its state. Two views
//! can be compared with [`mismatch`] without holding either chain's full
//! history.
//!
//! # Invariants
//!
//! - `at(s)` is defined for every `s` in `[min_seq(), seq()]`.
//! - `at(seq())` is always `id()`.
//! - Outside that range `at` answers [`LedgerId::zero`], which sorts below
//!   every real ledger id.

use serde::{Deserialize, Serialize};
use tracing::warn;

use qvl_types::{LedgerId, Seq};

use crate::ledger::Ledger;

/// Immutable view of one ledger's identity and recent ancestry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAncestryView {
    id: LedgerId,
    seq: Seq,
    /// Ancestor hashes, oldest first, not including `id`.
    #[serde(default)]
    ancestors: Vec<LedgerId>,
}

impl LedgerAncestryView {
    /// The "no ledger" view: sequence 0, sentinel id, no ancestors.
    pub fn genesis() -> Self {
        Self {
            id: LedgerId::zero(),
            seq: 0,
            ancestors: Vec::new(),
        }
    }

    /// Build a view from explicit parts.
    pub fn new(id: LedgerId, seq: Seq, ancestors: Vec<LedgerId>) -> Self {
        Self { id, seq, ancestors }
    }

    /// Build a view of a ledger using the ancestor record in its state.
    ///
    /// A ledger without the record still yields a usable view; it can only
    /// answer for its own sequence.
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let ancestors = match ledger.ancestor_hashes() {
            Some(record) => {
                debug_assert_eq!(record.last_seq, ledger.seq().saturating_sub(1));
                record.hashes.clone()
            }
            None => {
                warn!(
                    seq = ledger.seq(),
                    ledger = %ledger.id(),
                    "ledger missing recent ancestor hashes"
                );
                Vec::new()
            }
        };

        Self {
            id: ledger.id(),
            seq: ledger.seq(),
            ancestors,
        }
    }

    pub fn id(&self) -> LedgerId {
        self.id
    }

    pub fn seq(&self) -> Seq {
        self.seq
    }

    pub fn ancestors(&self) -> &[LedgerId] {
        &self.ancestors
    }

    /// Lowest sequence this view can answer for.
    pub fn min_seq(&self) -> Seq {
        let window = Seq::try_from(self.ancestors.len()).unwrap_or(Seq::MAX);
        self.seq - self.seq.min(window)
    }

    /// The id of the ledger at sequence `s` on this view's chain.
    ///
    /// Returns [`LedgerId::zero`] (and logs) when `s` is outside
    /// `[min_seq(), seq()]`. Callers must treat that value as "unknown".
    pub fn at(&self, s: Seq) -> LedgerId {
        if s >= self.min_seq() && s <= self.seq {
            if s == self.seq {
                return self.id;
            }
            let diff = (self.seq - s) as usize;
            return self.ancestors[self.ancestors.len() - diff];
        }

        warn!(
            seq = s,
            ledger = %self.id,
            ledger_seq = self.seq,
            "unable to determine hash of ancestor"
        );
        LedgerId::zero()
    }
}

/// Sequence number of the earliest ledger at which `a` and `b` may differ.
///
/// Only the range both views can answer for is searched. If the two agree
/// nowhere in that range (including when the ranges do not overlap at all)
/// the divergence is assumed to start right after genesis and `1` is
/// returned.
pub fn mismatch(a: &LedgerAncestryView, b: &LedgerAncestryView) -> Seq {
    let lower = a.min_seq().max(b.min_seq());
    let upper = a.seq().min(b.seq());

    let mut curr = upper;
    while curr != 0 && curr >= lower && a.at(curr) != b.at(curr) {
        curr -= 1;
    }

    if curr < lower {
        1
    } else {
        curr + 1
    }
}
