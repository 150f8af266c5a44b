use std::io;

/// Errors produced while configuring or running the validation node.
///
/// Admission itself never fails: rejected validations are reported through
/// the relay decision and the log, not through this type.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// I/O error while reading configuration.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The configuration file is not valid TOML for [`NodeConfig`].
    ///
    /// [`NodeConfig`]: crate::config::NodeConfig
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the consensus crate.
pub type Result<T> = std::result::Result<T, ConsensusError>;
