use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use qvl_ledger::{LedgerAncestryView, LedgerStore};

use crate::accept::QuorumAcceptor;
use crate::clock::NetClock;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::fetch::{InboundLedgers, LedgerFetcher};
use crate::handler::{Admission, ValidationHandler};
use crate::source::LedgerSource;
use crate::store::InMemoryValidationStore;
use crate::trust::ValidatorList;
use crate::validation::Validation;

/// A wired-up validation node.
///
/// Owns every collaborator of the admission pipeline. Nothing here is
/// global: two nodes in one process share no state.
pub struct ValidationNode {
    store: Arc<InMemoryValidationStore>,
    acceptor: Arc<QuorumAcceptor>,
    handler: ValidationHandler,
    fetcher: LedgerFetcher,
    fetch_task: JoinHandle<()>,
}

impl ValidationNode {
    /// Build a node from configuration. Must be called inside a tokio
    /// runtime; the ledger fetch worker is spawned onto it.
    pub fn start(
        config: &NodeConfig,
        ledgers: Arc<dyn LedgerStore>,
        inbound: Arc<dyn InboundLedgers>,
        clock: Arc<dyn NetClock>,
    ) -> Result<Self> {
        config.validate()?;

        let validators = Arc::new(ValidatorList::from_config(&config.validators));
        let store = Arc::new(InMemoryValidationStore::new());
        let (fetcher, fetch_task) = LedgerFetcher::spawn(inbound, &config.fetch);
        let source = Arc::new(LedgerSource::new(
            clock,
            ledgers,
            Arc::new(fetcher.clone()),
        ));
        let acceptor = Arc::new(QuorumAcceptor::new(
            store.clone(),
            Arc::clone(&source),
            config.quorum,
        ));
        let handler = ValidationHandler::new(validators.clone(), store.clone(), acceptor.clone());

        info!(
            trusted = validators.trusted_count(),
            quorum = config.quorum,
            "validation node started"
        );

        Ok(Self {
            store,
            acceptor,
            handler,
            fetcher,
            fetch_task,
        })
    }

    pub fn store(&self) -> &InMemoryValidationStore {
        &self.store
    }

    pub fn handle_new_validation(&self, validation: &Arc<Validation>, source: &str) -> bool {
        self.handler.handle_new_validation(validation, source)
    }

    pub fn evaluate(&self, validation: &Arc<Validation>, source: &str) -> Admission {
        self.handler.evaluate(validation, source)
    }

    /// The most recently accepted ledger.
    pub fn validated(&self) -> Option<LedgerAncestryView> {
        self.acceptor.validated()
    }

    /// Stop accepting fetch requests and wait for in-flight acquisitions.
    pub async fn shutdown(self) {
        let Self {
            store,
            acceptor,
            handler,
            fetcher,
            fetch_task,
        } = self;
        drop(handler);
        drop(acceptor);
        drop(fetcher);
        drop(store);
        if let Err(e) = fetch_task.await {
            debug!(error = %e, "fetch worker ended abnormally");
        }
    }
}
