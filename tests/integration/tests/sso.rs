//! Web Browser SSO scenarios.

use ctk_runner::{OutcomeStatus, Scenario, ScenarioOutcome};
use ctk_runner::session::Direction;
use ctk_saml::SamlBinding;
use ctk_verification::ViolationKind;

use crate::common::{Quirks, TestEnv};

fn kinds(outcome: &ScenarioOutcome) -> Vec<ViolationKind> {
    outcome.violations.iter().map(|v| v.kind()).collect()
}

/// Tests that a conforming IdP passes the SSO scenario with both bindings.
#[tokio::test]
async fn test_sso_passes_with_both_bindings() -> anyhow::Result<()> {
    let env = TestEnv::new();

    for binding in [SamlBinding::HttpRedirect, SamlBinding::HttpPost] {
        let outcome = env.runner.run(&Scenario::sso(binding)).await;
        assert_eq!(
            outcome.status,
            OutcomeStatus::Passed,
            "{} failed: {:?} {:?}",
            outcome.scenario,
            outcome.error,
            outcome.violations
        );
        assert_eq!(outcome.binding, binding.short_name());

        let messages: Vec<(Direction, &str)> = outcome
            .exchanges
            .iter()
            .map(|r| (r.direction, r.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            [(Direction::Sent, "AuthnRequest"), (Direction::Received, "Response")]
        );
        assert_eq!(outcome.exchanges[1].binding, "post", "the ACS is bound to POST");
    }
    Ok(())
}

/// Tests that an assertion restricted to another audience is reported.
#[tokio::test]
async fn test_wrong_audience_is_a_violation() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        wrong_audience: true,
        ..Quirks::default()
    });

    let outcome = env.runner.run(&Scenario::sso(SamlBinding::HttpPost)).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert!(kinds(&outcome).contains(&ViolationKind::AudienceMismatch));
    let audience = outcome
        .violations
        .iter()
        .find(|v| v.kind() == ViolationKind::AudienceMismatch)
        .expect("audience violation");
    let citations: Vec<String> = audience.citations().iter().map(|c| c.id()).collect();
    assert!(citations.contains(&"SAMLCore.3.4.1.4_d".to_string()));
    Ok(())
}

/// Tests that delivery to an ACS other than the requested one is reported.
#[tokio::test]
async fn test_response_to_wrong_acs_is_a_violation() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        wrong_acs: true,
        ..Quirks::default()
    });

    let outcome = env.runner.run(&Scenario::sso(SamlBinding::HttpRedirect)).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(kinds(&outcome), [ViolationKind::AcsMismatch]);
    Ok(())
}

/// Tests that unsigned responses fail signature verification.
#[tokio::test]
async fn test_unsigned_response_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::with_quirks(Quirks {
        unsigned: true,
        ..Quirks::default()
    });

    let outcome = env.runner.run(&Scenario::sso(SamlBinding::HttpPost)).await;

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(kinds(&outcome), [ViolationKind::SignatureInvalid]);
    Ok(())
}

/// Tests that a rejected login ends the scenario with an error rather than
/// a verdict about the IdP.
#[tokio::test]
async fn test_rejected_login_is_an_error() -> anyhow::Result<()> {
    let env = TestEnv::with_password("not-the-password");

    let outcome = env.runner.run(&Scenario::sso(SamlBinding::HttpRedirect)).await;

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert!(outcome.violations.is_empty());
    let error = outcome.error.unwrap_or_default();
    assert!(
        error.contains("neither a login page nor a SAML message"),
        "unexpected error: {error}"
    );
    Ok(())
}
