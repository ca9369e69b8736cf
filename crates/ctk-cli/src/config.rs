//! CLI configuration handling.

use std::path::Path;

use ctk_core::CtkConfig;
use serde::{Deserialize, Serialize};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default).
    #[default]
    Table,
    /// JSON format.
    Json,
}

/// Loads the run configuration from `path`, or from `~/.ctk/ctk.toml` when
/// no path is given, with `CTK_*` environment overrides applied.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, an override is
/// malformed, or the result fails validation.
pub fn load(path: Option<&Path>) -> crate::CliResult<CtkConfig> {
    let config = CtkConfig::load(path)?;
    tracing::debug!(
        idp = %config.idp.entity_id,
        service_providers = config.service_providers.len(),
        "configuration loaded"
    );
    Ok(config)
}
