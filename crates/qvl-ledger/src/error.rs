use qvl_types::{LedgerId, Seq};

/// Errors produced by ledger operations.
///
/// These indicate a broken invariant somewhere in the node, not bad data
/// from the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: Seq, reason: String },

    #[error("ledger {id} at seq {seq} is still open")]
    NotImmutable { id: LedgerId, seq: Seq },

    #[error("ledger hash mismatch: requested {requested}, store returned {actual}")]
    HashMismatch { requested: LedgerId, actual: LedgerId },
}
