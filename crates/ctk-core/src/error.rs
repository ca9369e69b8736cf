//! Error handling for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while locating, reading or validating the configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::CtkConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override carried an unusable value.
    #[error("invalid value for {name}: {value}")]
    InvalidOverride {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// The configuration parsed but describes an unusable setup.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Returns true if the user has to edit the configuration to recover.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::InvalidOverride { .. } | Self::Validation(_)
        )
    }
}
