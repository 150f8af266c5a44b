use std::sync::atomic::{AtomicBool, Ordering};

use qvl_types::{LedgerId, NetTime, PublicKey, Seq};

/// A parsed validation: a signer's claim that `ledger_hash` is the ledger at
/// `ledger_seq`.
///
/// Signature checks happen before a `Validation` is built. Validations are
/// shared as `Arc<Validation>` between the admission pipeline and the
/// validation store, so the only mutable part, the trusted flag, is atomic
/// and can only ever be raised.
#[derive(Debug)]
pub struct Validation {
    ledger_hash: LedgerId,
    ledger_seq: Option<Seq>,
    signing_key: PublicKey,
    sign_time: NetTime,
    full: bool,
    trusted: AtomicBool,
}

impl Validation {
    /// A full, untrusted validation.
    pub fn new(
        signing_key: PublicKey,
        ledger_hash: LedgerId,
        ledger_seq: Option<Seq>,
        sign_time: NetTime,
    ) -> Self {
        Self {
            ledger_hash,
            ledger_seq,
            signing_key,
            sign_time,
            full: true,
            trusted: AtomicBool::new(false),
        }
    }

    /// Mark this as a partial validation.
    pub fn partial(mut self) -> Self {
        self.full = false;
        self
    }

    pub fn ledger_hash(&self) -> LedgerId {
        self.ledger_hash
    }

    /// The asserted ledger sequence, if the message carried one.
    pub fn ledger_seq(&self) -> Option<Seq> {
        self.ledger_seq
    }

    pub fn signing_key(&self) -> PublicKey {
        self.signing_key
    }

    pub fn sign_time(&self) -> NetTime {
        self.sign_time
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::Acquire)
    }

    /// Mark the validation as coming from a trusted validator. There is no
    /// inverse.
    pub fn set_trusted(&self) {
        self.trusted.store(true, Ordering::Release);
    }
}
