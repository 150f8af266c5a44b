use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use tracing::debug;

use qvl_types::PublicKey;

use crate::config::ValidatorsConfig;

/// Resolves a validation's signing key to the validator's master key.
///
/// A key is *trusted* when it belongs to the local trusted validator set and
/// *listed* when a validator list publisher names it. Trusted keys are
/// always listed.
pub trait ValidatorKeys: Send + Sync {
    /// Master key of the trusted validator using `signing_key`.
    fn trusted_master_key(&self, signing_key: &PublicKey) -> Option<PublicKey>;

    /// Master key of the listed validator using `signing_key`.
    fn listed_master_key(&self, signing_key: &PublicKey) -> Option<PublicKey>;
}

#[derive(Default)]
struct ListState {
    trusted: HashSet<PublicKey>,
    listed: HashSet<PublicKey>,
    /// Ephemeral signing key -> master key, as announced by manifests.
    signing: HashMap<PublicKey, PublicKey>,
}

impl ListState {
    fn master_for(&self, signing_key: &PublicKey) -> PublicKey {
        self.signing.get(signing_key).copied().unwrap_or(*signing_key)
    }
}

/// In-memory validator list with signing-key bindings.
///
/// A signing key that was never bound is looked up as its own master key.
#[derive(Default)]
pub struct ValidatorList {
    state: RwLock<ListState>,
}

impl ValidatorList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from configuration, binding any signing keys given.
    pub fn from_config(config: &ValidatorsConfig) -> Self {
        let list = Self::new();
        for entry in &config.trusted {
            list.trust(entry.master);
            if let Some(signing) = entry.signing {
                list.bind_signing_key(entry.master, signing);
            }
        }
        for entry in &config.listed {
            list.list(entry.master);
            if let Some(signing) = entry.signing {
                list.bind_signing_key(entry.master, signing);
            }
        }
        list
    }

    /// Add `master` to the trusted set.
    pub fn trust(&self, master: PublicKey) {
        let mut state = self.state.write().expect("lock poisoned");
        state.trusted.insert(master);
        state.listed.insert(master);
    }

    /// Add `master` to the listed set without trusting it.
    pub fn list(&self, master: PublicKey) {
        self.state
            .write()
            .expect("lock poisoned")
            .listed
            .insert(master);
    }

    /// Record that `master` now signs with `signing`.
    ///
    /// Any earlier signing key of `master` stops resolving.
    pub fn bind_signing_key(&self, master: PublicKey, signing: PublicKey) {
        let mut state = self.state.write().expect("lock poisoned");
        state.signing.retain(|_, m| *m != master);
        state.signing.insert(signing, master);
        debug!(master = %master.short_id(), signing = %signing.short_id(), "bound signing key");
    }

    pub fn trusted_count(&self) -> usize {
        self.state.read().expect("lock poisoned").trusted.len()
    }
}

impl ValidatorKeys for ValidatorList {
    fn trusted_master_key(&self, signing_key: &PublicKey) -> Option<PublicKey> {
        let state = self.state.read().expect("lock poisoned");
        let master = state.master_for(signing_key);
        state.trusted.contains(&master).then_some(master)
    }

    fn listed_master_key(&self, signing_key: &PublicKey) -> Option<PublicKey> {
        let state = self.state.read().expect("lock poisoned");
        let master = state.master_for(signing_key);
        state.listed.contains(&master).then_some(master)
    }
}
