//! `ctk run`: executes scenarios and reports the verdicts.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use ctk_runner::{
    catalogue, Environment, OutcomeStatus, ReqwestTransportFactory, Scenario, ScenarioOutcome,
    ScenarioRunner,
};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::RunArgs;
use crate::config::{self, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output::{error, info, output_json, success, table, warning};

/// Outcome for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct OutcomeRow {
    /// Scenario name.
    #[tabled(rename = "Scenario")]
    pub scenario: String,
    /// Binding.
    #[tabled(rename = "Binding")]
    pub binding: String,
    /// Verdict.
    #[tabled(rename = "Result")]
    pub status: OutcomeStatus,
    /// Number of broken rules.
    #[tabled(rename = "Violations")]
    pub violations: usize,
    /// Where the session ended.
    #[tabled(rename = "Final Phase")]
    pub phase: String,
    /// Duration.
    #[tabled(rename = "Time (ms)")]
    pub duration_ms: u64,
}

impl From<&ScenarioOutcome> for OutcomeRow {
    fn from(outcome: &ScenarioOutcome) -> Self {
        Self {
            scenario: outcome.scenario.clone(),
            binding: outcome.binding.clone(),
            status: outcome.status,
            violations: outcome.violations.len(),
            phase: outcome
                .final_phase
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string),
            duration_ms: outcome.duration_ms,
        }
    }
}

/// Runs the selected scenarios against the configured identity provider.
///
/// # Errors
///
/// Returns an error if the configuration is unusable, a named scenario does
/// not exist, or any scenario did not pass.
pub async fn run_scenarios(
    args: RunArgs,
    config_path: Option<&Path>,
    output_format: OutputFormat,
) -> CliResult<()> {
    let scenarios = choose(&args)?;
    let config = config::load(config_path)?;
    let transports =
        ReqwestTransportFactory::new(Duration::from_secs(config.timeouts.request_secs));
    let runner = ScenarioRunner::new(Environment::from_config(&config)?, transports);

    tracing::info!(
        scenarios = scenarios.len(),
        parallel = args.parallel,
        idp = %config.idp.entity_id,
        "starting run"
    );
    let outcomes = runner.run_all(scenarios, args.parallel).await;

    match output_format {
        OutputFormat::Json => output_json(&outcomes)?,
        OutputFormat::Table => report(&outcomes),
    }

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::ScenariosFailed {
            failed,
            total: outcomes.len(),
        })
    }
}

/// Scenarios to run: the named ones, or everything the filter selects.
fn choose(args: &RunArgs) -> CliResult<Vec<Scenario>> {
    if args.scenarios.is_empty() {
        let scenarios = super::selected(&args.selection);
        if scenarios.is_empty() {
            return Err(CliError::InvalidArgument(
                "the suite and binding filter match no scenario".into(),
            ));
        }
        return Ok(scenarios);
    }

    let available = catalogue();
    args.scenarios
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .ok_or_else(|| {
                    CliError::InvalidArgument(format!(
                        "unknown scenario '{name}' (see `ctk list`)"
                    ))
                })
        })
        .collect()
}

fn report(outcomes: &[ScenarioOutcome]) {
    if outcomes.is_empty() {
        info("No scenarios were run.");
        return;
    }
    let rows: Vec<OutcomeRow> = outcomes.iter().map(OutcomeRow::from).collect();
    println!("{}", table(&rows));

    for outcome in outcomes {
        match outcome.status {
            OutcomeStatus::Passed => {}
            OutcomeStatus::Failed => {
                println!();
                println!("{}", outcome.scenario.bold());
                for violation in &outcome.violations {
                    println!("  {violation}");
                }
            }
            OutcomeStatus::Error => {
                println!();
                warning(&format!(
                    "{}: {}",
                    outcome.scenario,
                    outcome.error.as_deref().unwrap_or("aborted")
                ));
            }
        }
    }

    println!();
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    if passed == outcomes.len() {
        success(&format!("{passed} scenario(s) passed"));
    } else {
        error(&format!("{passed} of {} scenario(s) passed", outcomes.len()));
    }
}
