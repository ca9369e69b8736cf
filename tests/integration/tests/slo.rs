//! Single Logout scenarios.

use ctk_runner::slo::LogoutOptions;
use ctk_runner::{catalogue, select, LogoutPhase, OutcomeStatus, Scenario, Suite};
use ctk_saml::SamlBinding;
use ctk_verification::ViolationKind;

use crate::common::{Quirks, TestEnv, SP1};

fn options(multiple_sp: bool, relay_state: bool, failing_sp: bool) -> LogoutOptions {
    LogoutOptions {
        multiple_sp,
        relay_state,
        failing_sp,
    }
}

/// Tests that a conforming IdP passes the whole catalogue, run in parallel.
#[tokio::test]
async fn test_catalogue_passes_against_conforming_idp() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let scenarios = catalogue();
    let names: Vec<String> = scenarios.iter().map(|s| s.name.clone()).collect();

    let outcomes = env.runner.run_all(scenarios, true).await;

    let reported: Vec<String> = outcomes.iter().map(|o| o.scenario.clone()).collect();
    assert_eq!(reported, names, "outcomes come back in catalogue order");
    for outcome in &outcomes {
        assert!(
            outcome.passed(),
            "{} did not pass: {:?} {:?}",
            outcome.scenario,
            outcome.error,
            outcome.violations
        );
    }
    for outcome in outcomes.iter().filter(|o| o.scenario.starts_with("slo-")) {
        assert_eq!(outcome.final_phase, Some(LogoutPhase::Complete));
    }
    Ok(())
}

/// Tests the message sequence of a multi-participant logout.
#[tokio::test]
async fn test_logout_is_propagated_to_second_participant() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let scenario = Scenario::slo(SamlBinding::HttpRedirect, options(true, true, false));

    let outcome = env.runner.run(&scenario).await;

    assert!(outcome.passed(), "{:?} {:?}", outcome.error, outcome.violations);
    let messages: Vec<&str> = outcome.exchanges.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(
        messages,
        [
            "AuthnRequest",
            "Response",
            "AuthnRequest",
            "Response",
            "LogoutRequest",
            "LogoutRequest",
            "LogoutResponse",
            "LogoutResponse",
        ]
    );
    let final_response = outcome.exchanges.last().expect("exchanges");
    assert_eq!(final_response.participant, SP1);
    Ok(())
}

/// Tests that a dropped RelayState is reported under the binding's clause.
#[tokio::test]
async fn test_dropped_relay_state_is_a_violation() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        drop_relay_state: true,
        ..Quirks::default()
    });

    for binding in [SamlBinding::HttpRedirect, SamlBinding::HttpPost] {
        let scenario = Scenario::slo(binding, options(false, true, false));
        let outcome = env.runner.run(&scenario).await;

        assert_eq!(outcome.status, OutcomeStatus::Failed, "{}", outcome.scenario);
        let violation = &outcome.violations[0];
        assert_eq!(violation.kind(), ViolationKind::RelayStateMismatch);
        let expected = match binding {
            SamlBinding::HttpPost => "SAMLBindings.3.5.3_a",
            _ => "SAMLBindings.3.4.3_a",
        };
        assert_eq!(violation.citations()[0].id(), expected);
        assert_eq!(outcome.final_phase, Some(LogoutPhase::ResponseReceived(SP1.to_string())));
    }
    Ok(())
}

/// Tests that without a RelayState a dropped one goes unnoticed.
#[tokio::test]
async fn test_relay_state_is_only_checked_when_sent() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        drop_relay_state: true,
        ..Quirks::default()
    });

    let outcome = env
        .runner
        .run(&Scenario::slo(SamlBinding::HttpPost, LogoutOptions::default()))
        .await;

    assert!(outcome.passed(), "{:?}", outcome.violations);
    Ok(())
}

/// Tests that a failed participant logout must be reported as partial.
#[tokio::test]
async fn test_missing_partial_logout_is_a_violation() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        ignore_partial_logout: true,
        ..Quirks::default()
    });

    let failing = Scenario::slo(SamlBinding::HttpPost, options(true, true, true));
    let outcome = env.runner.run(&failing).await;
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    let kinds: Vec<ViolationKind> = outcome.violations.iter().map(|v| v.kind()).collect();
    assert_eq!(kinds, [ViolationKind::InvalidStatus]);

    // When every participant succeeds the same IdP is compliant.
    let succeeding = Scenario::slo(SamlBinding::HttpPost, options(true, true, false));
    assert!(env.runner.run(&succeeding).await.passed());
    Ok(())
}

/// Tests that an IdP that never propagates the logout aborts the scenario.
#[tokio::test]
async fn test_skipped_propagation_is_misrouted() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        skip_propagation: true,
        ..Quirks::default()
    });

    let outcome = env
        .runner
        .run(&Scenario::slo(SamlBinding::HttpRedirect, options(true, false, false)))
        .await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    let error = outcome.error.clone().unwrap_or_default();
    assert!(error.contains("https://sp2.test/saml/slo"), "unexpected error: {error}");
    assert_eq!(outcome.final_phase, Some(LogoutPhase::RequestSent(SP1.to_string())));
    Ok(())
}

/// Tests that unsigned logout messages are refused.
#[tokio::test]
async fn test_unsigned_logout_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        unsigned: true,
        ..Quirks::default()
    });

    let outcomes = env
        .runner
        .run_all(select(Suite::Slo, Some(SamlBinding::HttpRedirect)), false)
        .await;

    assert_eq!(outcomes.len(), 5);
    for outcome in &outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Failed, "{}", outcome.scenario);
        assert_eq!(outcome.violations[0].kind(), ViolationKind::SignatureInvalid);
        // The first unsigned message is the login response.
        assert_eq!(outcome.final_phase, None);
    }
    Ok(())
}

/// Tests the JSON report shape.
#[tokio::test]
async fn test_outcome_serializes_for_reports() -> anyhow::Result<()> {
    let env = TestEnv::new();
    let outcome = env
        .runner
        .run(&Scenario::slo(SamlBinding::HttpPost, LogoutOptions::default()))
        .await;

    let json = serde_json::to_value(&outcome)?;
    assert_eq!(json["scenario"], "slo-post-single-sp");
    assert_eq!(json["status"], "passed");
    assert_eq!(json["final_phase"]["phase"], "complete");
    assert_eq!(json["exchanges"][2]["direction"], "sent");
    assert_eq!(json["exchanges"][2]["message"], "LogoutRequest");
    Ok(())
}
