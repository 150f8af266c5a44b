use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use qvl_types::LedgerId;

use crate::ledger::Ledger;
use crate::traits::LedgerStore;

/// In-memory, HashMap-based ledger store for tests and embedding.
///
/// Ledgers are held as `Arc<Ledger>` behind a `RwLock`; lookups clone the
/// `Arc`, never the ledger.
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<LedgerId, Arc<Ledger>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            ledgers: RwLock::new(HashMap::new()),
        }
    }

    /// Store a ledger under its own id, replacing any previous entry.
    pub fn insert(&self, ledger: Ledger) -> Arc<Ledger> {
        let ledger = Arc::new(ledger);
        self.insert_shared(Arc::clone(&ledger));
        ledger
    }

    /// Store an already shared ledger under its own id.
    pub fn insert_shared(&self, ledger: Arc<Ledger>) {
        debug!(ledger = %ledger.id().short_hex(), seq = ledger.seq(), "stored ledger");
        self.ledgers
            .write()
            .expect("lock poisoned")
            .insert(ledger.id(), ledger);
    }

    /// Store a ledger under an arbitrary key.
    ///
    /// Only useful for exercising the hash check done by ledger consumers;
    /// a well-behaved store always keys ledgers by their own id.
    pub fn insert_as(&self, key: LedgerId, ledger: Ledger) {
        self.ledgers
            .write()
            .expect("lock poisoned")
            .insert(key, Arc::new(ledger));
    }

    pub fn len(&self) -> usize {
        self.ledgers.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn ledger_by_hash(&self, id: &LedgerId) -> Option<Arc<Ledger>> {
        self.ledgers
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
    }
}
