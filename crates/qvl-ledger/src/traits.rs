use std::sync::Arc;

use qvl_types::LedgerId;

use crate::ledger::Ledger;

/// Read boundary for locally held ledgers.
pub trait LedgerStore: Send + Sync {
    /// Look up a ledger by hash. Returns `None` if it is not held locally.
    fn ledger_by_hash(&self, id: &LedgerId) -> Option<Arc<Ledger>>;

    /// Whether the ledger is held locally.
    fn contains(&self, id: &LedgerId) -> bool {
        self.ledger_by_hash(id).is_some()
    }
}
