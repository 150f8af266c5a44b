use serde::{Deserialize, Serialize};

use qvl_types::{LedgerId, NetTime, Seq};

/// Maximum number of ancestor hashes a ledger carries in its
/// [`AncestorHashes`] record.
pub const ANCESTOR_WINDOW: usize = 256;

/// Identity and position of a ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub id: LedgerId,
    pub seq: Seq,
    pub parent_id: LedgerId,
    pub close_time: NetTime,
    /// Root hash of the transaction set applied on top of the parent.
    pub tx_root: [u8; 32],
}

/// Trailing window of ancestor hashes stored in a ledger's state.
///
/// `hashes` is ordered oldest-first and ends with the parent's hash, so
/// `last_seq` is always the ledger's own sequence minus one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorHashes {
    pub last_seq: Seq,
    pub hashes: Vec<LedgerId>,
}

/// An immutable (closed) or still-open ledger snapshot.
///
/// Closed ledgers are shared as `Arc<Ledger>`; nothing mutates them after
/// construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    header: LedgerHeader,
    open: bool,
    ancestors: Option<AncestorHashes>,
}

impl Ledger {
    /// The first real ledger (sequence 1). It has no ancestors and so no
    /// ancestor record.
    pub fn genesis(close_time: NetTime) -> Self {
        let tx_root = [0u8; 32];
        let id = compute_id(&LedgerId::zero(), 1, close_time, &tx_root);
        Self {
            header: LedgerHeader {
                id,
                seq: 1,
                parent_id: LedgerId::zero(),
                close_time,
                tx_root,
            },
            open: false,
            ancestors: None,
        }
    }

    /// Build the closed successor of this ledger.
    pub fn child(&self, close_time: NetTime, tx_root: [u8; 32]) -> Self {
        let seq = self.header.seq + 1;
        let id = compute_id(&self.header.id, seq, close_time, &tx_root);

        let mut hashes = self
            .ancestors
            .as_ref()
            .map(|a| a.hashes.clone())
            .unwrap_or_default();
        hashes.push(self.header.id);
        if hashes.len() > ANCESTOR_WINDOW {
            let excess = hashes.len() - ANCESTOR_WINDOW;
            hashes.drain(..excess);
        }

        Self {
            header: LedgerHeader {
                id,
                seq,
                parent_id: self.header.id,
                close_time,
                tx_root,
            },
            open: false,
            ancestors: Some(AncestorHashes {
                last_seq: self.header.seq,
                hashes,
            }),
        }
    }

    /// Build a successor that is still open for modification.
    pub fn open_child(&self, close_time: NetTime) -> Self {
        Self {
            open: true,
            ..self.child(close_time, [0u8; 32])
        }
    }

    /// Assemble a ledger from already-known parts.
    pub fn from_parts(header: LedgerHeader, ancestors: Option<AncestorHashes>, open: bool) -> Self {
        Self {
            header,
            open,
            ancestors,
        }
    }

    pub fn id(&self) -> LedgerId {
        self.header.id
    }

    pub fn seq(&self) -> Seq {
        self.header.seq
    }

    pub fn parent_id(&self) -> LedgerId {
        self.header.parent_id
    }

    pub fn close_time(&self) -> NetTime {
        self.header.close_time
    }

    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    /// Returns `true` if the ledger is still being built.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns `true` once the ledger is closed and can no longer change.
    pub fn is_immutable(&self) -> bool {
        !self.open
    }

    /// The ancestor-hash record, if the ledger's state carries one.
    pub fn ancestor_hashes(&self) -> Option<&AncestorHashes> {
        self.ancestors.as_ref()
    }
}

fn compute_id(parent: &LedgerId, seq: Seq, close_time: NetTime, tx_root: &[u8; 32]) -> LedgerId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"qvl-ledger-v1:");
    hasher.update(parent.as_bytes());
    hasher.update(&seq.to_be_bytes());
    hasher.update(&close_time.as_secs().to_be_bytes());
    hasher.update(tx_root);
    LedgerId::from_hash(*hasher.finalize().as_bytes())
}
