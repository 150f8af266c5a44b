//! Admission of validations received from the network.
//!
//! [`ValidationHandler::handle_new_validation`] resolves the signer's
//! identity, feeds the validation to the sequencing store, triggers a
//! ledger-acceptance check for fresh trusted validations, and answers
//! whether the validation should be relayed to peers.
//!
//! Only trusted validations admitted as current are ever relayed. Listed
//! but untrusted validations are recorded for bookkeeping and go no
//! further.

use std::fmt;
use std::sync::Arc;

use qvl_types::{NodeId, PublicKey};

use crate::accept::LedgerAcceptor;
use crate::store::{ValStatus, ValidationStore};
use crate::trust::ValidatorKeys;
use crate::validation::Validation;

/// Logs one event carrying the validation's diagnostic fields.
macro_rules! dump {
    ($lvl:ident, $val:expr, $master:expr, $src:expr, $($rest:tt)+) => {
        tracing::$lvl!(
            ledger = %$val.ledger_hash(),
            trusted = $val.is_trusted(),
            full = $val.is_full(),
            master = %MasterDisplay($master),
            signing_key = %$val.signing_key(),
            src = $src,
            $($rest)+
        )
    };
}

struct MasterDisplay(Option<PublicKey>);

impl fmt::Display for MasterDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(key) => write!(f, "{key}"),
            None => f.write_str("unknown"),
        }
    }
}

/// Which path a validation took through the handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// The validation carried no ledger sequence.
    MissingSequence,
    /// The signer is neither trusted nor listed.
    Unlisted,
    /// The validation was offered to the store under `node`.
    Admitted { node: NodeId, status: ValStatus },
}

/// Full result of handling one validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admission {
    pub disposition: Disposition,
    /// The signer's resolved master key, if any.
    pub master: Option<PublicKey>,
    pub relay: bool,
}

impl Admission {
    pub fn should_relay(&self) -> bool {
        self.relay
    }
}

/// The validation admission pipeline.
pub struct ValidationHandler {
    keys: Arc<dyn ValidatorKeys>,
    store: Arc<dyn ValidationStore>,
    acceptor: Arc<dyn LedgerAcceptor>,
}

impl ValidationHandler {
    pub fn new(
        keys: Arc<dyn ValidatorKeys>,
        store: Arc<dyn ValidationStore>,
        acceptor: Arc<dyn LedgerAcceptor>,
    ) -> Self {
        Self {
            keys,
            store,
            acceptor,
        }
    }

    /// Process a validation received from `source` and report whether it
    /// should be relayed.
    pub fn handle_new_validation(&self, validation: &Arc<Validation>, source: &str) -> bool {
        self.evaluate(validation, source).should_relay()
    }

    /// Process a validation and report the full outcome.
    pub fn evaluate(&self, validation: &Arc<Validation>, source: &str) -> Admission {
        let signing_key = validation.signing_key();

        let master = match self.keys.trusted_master_key(&signing_key) {
            Some(master) => {
                if !validation.is_trusted() {
                    validation.set_trusted();
                }
                Some(master)
            }
            None => self.keys.listed_master_key(&signing_key),
        };

        let Some(seq) = validation.ledger_seq() else {
            dump!(error, validation, master, source, "validation missing ledger sequence");
            return Admission {
                disposition: Disposition::MissingSequence,
                master,
                relay: false,
            };
        };

        let Some(master_key) = master else {
            dump!(debug, validation, master, source, seq, "not added, unlisted signer");
            return Admission {
                disposition: Disposition::Unlisted,
                master,
                relay: false,
            };
        };

        let node = NodeId::derive(&master_key);
        let status = self.store.add(node, Arc::clone(validation));
        dump!(
            debug,
            validation,
            master,
            source,
            seq,
            outcome = %status,
            "validation offered to store"
        );

        if status == ValStatus::BadSeq {
            dump!(
                warn,
                validation,
                master,
                source,
                seq,
                "already validated sequence at or past {seq}"
            );
        }

        let relay = status == ValStatus::Current && validation.is_trusted();
        if relay {
            self.acceptor.check_accept(validation.ledger_hash(), seq);
        }

        Admission {
            disposition: Disposition::Admitted { node, status },
            master,
            relay,
        }
    }
}
