//! The scenario catalogue and the runner that executes it.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use ctk_saml::SamlBinding;
use ctk_verification::ComplianceViolation;
use serde::Serialize;
use tracing::Instrument;

use crate::environment::Environment;
use crate::error::ScenarioResult;
use crate::session::{ExchangeRecord, LogoutPhase, SessionState};
use crate::slo::{single_logout, LogoutOptions};
use crate::sso::single_sign_on;
use crate::transport::TransportFactory;

/// Bindings every scenario is offered in.
pub const BINDINGS: [SamlBinding; 2] = [SamlBinding::HttpRedirect, SamlBinding::HttpPost];

/// Group of scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// Single Sign-On.
    Sso,
    /// Single Logout.
    Slo,
    /// Everything.
    All,
}

impl Suite {
    fn includes(self, other: Self) -> bool {
        self == Self::All || self == other
    }
}

/// What a scenario exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "flow", rename_all = "lowercase")]
pub enum ScenarioKind {
    /// Login and Response verification.
    Sso,
    /// SP-initiated logout.
    Slo(LogoutOptions),
}

/// One runnable scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    /// Stable identifier, e.g. `slo-post-multi-sp`.
    pub name: String,
    /// Human-readable summary.
    pub description: String,
    /// Binding of the initial request.
    #[serde(serialize_with = "serialize_binding")]
    pub binding: SamlBinding,
    /// Flow and its options.
    pub kind: ScenarioKind,
}

fn serialize_binding<S: serde::Serializer>(binding: &SamlBinding, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(binding.short_name())
}

impl Scenario {
    /// The SSO scenario for `binding`.
    #[must_use]
    pub fn sso(binding: SamlBinding) -> Self {
        Self {
            name: format!("sso-{}", binding.short_name()),
            description: format!(
                "{} AuthnRequest; verify the Response and its ACS",
                binding.short_name()
            ),
            binding,
            kind: ScenarioKind::Sso,
        }
    }

    /// An SLO scenario for `binding`.
    #[must_use]
    pub fn slo(binding: SamlBinding, options: LogoutOptions) -> Self {
        let (suffix, what) = match (options.failing_sp, options.multiple_sp, options.relay_state) {
            (true, ..) => ("multi-sp-error", "second SP fails, partial logout expected"),
            (false, true, true) => ("multi-sp-relay-state", "multiple SPs with relay state"),
            (false, true, false) => ("multi-sp", "multiple SPs"),
            (false, false, true) => ("single-sp-relay-state", "single SP with relay state"),
            (false, false, false) => ("single-sp", "single SP"),
        };
        Self {
            name: format!("slo-{}-{suffix}", binding.short_name()),
            description: format!("{} LogoutRequest, {what}", binding.short_name()),
            binding,
            kind: ScenarioKind::Slo(options),
        }
    }

    /// Suite the scenario belongs to.
    #[must_use]
    pub const fn suite(&self) -> Suite {
        match self.kind {
            ScenarioKind::Sso => Suite::Sso,
            ScenarioKind::Slo(_) => Suite::Slo,
        }
    }
}

/// Every shipped scenario, SSO first.
#[must_use]
pub fn catalogue() -> Vec<Scenario> {
    let logout_variants = [
        LogoutOptions::default(),
        LogoutOptions {
            multiple_sp: true,
            ..LogoutOptions::default()
        },
        LogoutOptions {
            relay_state: true,
            ..LogoutOptions::default()
        },
        LogoutOptions {
            multiple_sp: true,
            relay_state: true,
            failing_sp: false,
        },
        LogoutOptions {
            multiple_sp: true,
            relay_state: true,
            failing_sp: true,
        },
    ];

    let mut scenarios: Vec<Scenario> = BINDINGS.into_iter().map(Scenario::sso).collect();
    for binding in BINDINGS {
        scenarios.extend(
            logout_variants
                .iter()
                .map(|options| Scenario::slo(binding, *options)),
        );
    }
    scenarios
}

/// Scenarios of `suite`, optionally restricted to one binding.
#[must_use]
pub fn select(suite: Suite, binding: Option<SamlBinding>) -> Vec<Scenario> {
    catalogue()
        .into_iter()
        .filter(|s| suite.includes(s.suite()))
        .filter(|s| binding.map_or(true, |b| s.binding == b))
        .collect()
}

/// Verdict of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Every message complied.
    Passed,
    /// The system under test broke at least one rule.
    Failed,
    /// The scenario could not be completed.
    Error,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of one scenario, ready for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub scenario: String,
    /// Binding short name.
    pub binding: String,
    /// Verdict.
    pub status: OutcomeStatus,
    /// Broken rules, for `Failed`.
    pub violations: Vec<ComplianceViolation>,
    /// Cause, for `Error`.
    pub error: Option<String>,
    /// Where the logout stood when the scenario ended.
    pub final_phase: Option<LogoutPhase>,
    /// Messages exchanged.
    pub exchanges: Vec<ExchangeRecord>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ScenarioOutcome {
    fn new(scenario: &Scenario, result: ScenarioResult<()>, session: SessionState, started: Instant) -> Self {
        let (status, violations, error) = match result {
            Ok(()) => (OutcomeStatus::Passed, Vec::new(), None),
            Err(err) if err.is_compliance_failure() => {
                (OutcomeStatus::Failed, err.violations(), None)
            }
            Err(err) => (OutcomeStatus::Error, Vec::new(), Some(err.to_string())),
        };
        Self {
            scenario: scenario.name.clone(),
            binding: scenario.binding.short_name().to_string(),
            status,
            violations,
            error,
            final_phase: session.phase().cloned(),
            exchanges: session.log().to_vec(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn aborted(scenario: &Scenario, cause: &str) -> Self {
        Self {
            scenario: scenario.name.clone(),
            binding: scenario.binding.short_name().to_string(),
            status: OutcomeStatus::Error,
            violations: Vec::new(),
            error: Some(cause.to_string()),
            final_phase: None,
            exchanges: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Returns true if the scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == OutcomeStatus::Passed
    }
}

/// Executes scenarios against the system under test.
#[derive(Clone)]
pub struct ScenarioRunner {
    environment: Arc<Environment>,
    transports: Arc<dyn TransportFactory>,
}

impl fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ScenarioRunner {
    /// Creates a runner; every scenario gets its own transport from
    /// `transports`.
    #[must_use]
    pub fn new(environment: Environment, transports: impl TransportFactory + 'static) -> Self {
        Self {
            environment: Arc::new(environment),
            transports: Arc::new(transports),
        }
    }

    /// Runs one scenario to completion. Never fails: problems are reported
    /// in the outcome.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioOutcome {
        let started = Instant::now();
        let mut session = SessionState::new();
        let span = tracing::info_span!("scenario", name = %scenario.name);

        let result = self.execute(scenario, &mut session).instrument(span).await;
        let outcome = ScenarioOutcome::new(scenario, result, session, started);
        match outcome.status {
            OutcomeStatus::Passed => tracing::info!(scenario = %scenario.name, "passed"),
            OutcomeStatus::Failed => tracing::warn!(
                scenario = %scenario.name,
                violations = outcome.violations.len(),
                "failed"
            ),
            OutcomeStatus::Error => tracing::error!(
                scenario = %scenario.name,
                error = outcome.error.as_deref().unwrap_or_default(),
                "error"
            ),
        }
        outcome
    }

    async fn execute(&self, scenario: &Scenario, session: &mut SessionState) -> ScenarioResult<()> {
        let transport = self.transports.create()?;
        let env = self.environment.as_ref();
        match scenario.kind {
            ScenarioKind::Sso => {
                single_sign_on(env, transport.as_ref(), scenario.binding, session).await
            }
            ScenarioKind::Slo(options) => {
                single_logout(env, transport.as_ref(), scenario.binding, options, session).await
            }
        }
    }

    /// Runs `scenarios` one after another, or as independent tokio tasks
    /// with `parallel`. Outcomes are returned in input order either way.
    pub async fn run_all(&self, scenarios: Vec<Scenario>, parallel: bool) -> Vec<ScenarioOutcome> {
        if !parallel {
            let mut outcomes = Vec::with_capacity(scenarios.len());
            for scenario in &scenarios {
                outcomes.push(self.run(scenario).await);
            }
            return outcomes;
        }

        let handles: Vec<_> = scenarios
            .iter()
            .cloned()
            .map(|scenario| {
                let runner = self.clone();
                tokio::spawn(async move { runner.run(&scenario).await })
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(&scenarios)
            .map(|(joined, scenario)| {
                joined.unwrap_or_else(|e| ScenarioOutcome::aborted(scenario, &e.to_string()))
            })
            .collect()
    }
}
