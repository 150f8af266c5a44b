use std::path::Path;

use serde::{Deserialize, Serialize};

use qvl_types::PublicKey;

use crate::error::{ConsensusError, Result};

/// Configuration for a validation node.
///
/// Every section has defaults, so an empty file is a valid (if not very
/// useful) configuration: no trusted validators, quorum of one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Trusted validations required before a ledger is accepted.
    pub quorum: usize,
    pub fetch: FetchConfig,
    pub clock: ClockConfig,
    pub validators: ValidatorsConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            quorum: 1,
            fetch: FetchConfig::default(),
            clock: ClockConfig::default(),
            validators: ValidatorsConfig::default(),
        }
    }
}

/// Background ledger acquisition limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Pending acquisitions queued before new requests are dropped.
    pub queue_capacity: usize,
    /// Acquisitions allowed to run at the same time.
    pub max_in_flight: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_in_flight: 8,
        }
    }
}

/// Network clock adjustment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Seconds added to the local wall clock to obtain network close time.
    pub close_offset_secs: i64,
}

/// Trusted and publisher-listed validators.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorsConfig {
    pub trusted: Vec<ValidatorEntry>,
    pub listed: Vec<ValidatorEntry>,
}

/// One validator's master key and, optionally, its current signing key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEntry {
    pub master: PublicKey,
    #[serde(default)]
    pub signing: Option<PublicKey>,
}

impl NodeConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check that the configuration can drive a node.
    pub fn validate(&self) -> Result<()> {
        if self.quorum == 0 {
            return Err(ConsensusError::Config("quorum must be at least 1".into()));
        }
        if self.fetch.queue_capacity == 0 {
            return Err(ConsensusError::Config(
                "fetch.queue_capacity must be at least 1".into(),
            ));
        }
        if self.fetch.max_in_flight == 0 {
            return Err(ConsensusError::Config(
                "fetch.max_in_flight must be at least 1".into(),
            ));
        }
        if self.quorum > self.validators.trusted.len() && !self.validators.trusted.is_empty() {
            return Err(ConsensusError::Config(format!(
                "quorum {} exceeds the {} trusted validators",
                self.quorum,
                self.validators.trusted.len()
            )));
        }
        Ok(())
    }
}
