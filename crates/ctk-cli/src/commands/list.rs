//! `ctk list`.

use ctk_runner::{Scenario, ScenarioKind};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::SelectionArgs;
use crate::config::OutputFormat;
use crate::output::output;

/// Scenario for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ScenarioRow {
    /// Name.
    #[tabled(rename = "Scenario")]
    pub name: String,
    /// Suite.
    #[tabled(rename = "Suite")]
    pub suite: &'static str,
    /// Binding short name.
    #[tabled(rename = "Binding")]
    pub binding: &'static str,
    /// Summary.
    #[tabled(rename = "Description")]
    pub description: String,
}

impl From<&Scenario> for ScenarioRow {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name.clone(),
            suite: match scenario.kind {
                ScenarioKind::Sso => "sso",
                ScenarioKind::Slo(_) => "slo",
            },
            binding: scenario.binding.short_name(),
            description: scenario.description.clone(),
        }
    }
}

/// Prints the scenarios the selection matches.
///
/// # Errors
///
/// Returns an error if JSON output fails.
pub fn run_list(args: &SelectionArgs, output_format: OutputFormat) -> crate::CliResult<()> {
    let rows: Vec<ScenarioRow> = super::selected(args).iter().map(ScenarioRow::from).collect();
    output(&rows, output_format)
}
