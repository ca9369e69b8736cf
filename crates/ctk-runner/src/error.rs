//! Scenario and transport errors.
//!
//! Everything here aborts the scenario it occurs in and is never retried.

use ctk_saml::SamlError;
use ctk_verification::citation::SAML_CORE_5_1_A;
use ctk_verification::{ComplianceViolation, VerificationFailure, ViolationKind};
use thiserror::Error;

/// Result type for scenario steps.
pub type ScenarioResult<T> = Result<T, ScenarioError>;

/// HTTP exchange failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the configured timeout.
    #[error("request to {url} timed out")]
    Timeout {
        /// Request URL.
        url: String,
    },

    /// The connection failed or the response could not be read.
    #[error("connection to {url} failed: {message}")]
    Connection {
        /// Request URL.
        url: String,
        /// Cause.
        message: String,
    },

    /// The HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

/// Why a scenario stopped.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Network failure talking to the system under test.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A signature did not verify, or a required one was missing.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// The envelope or document could not be decoded.
    #[error("malformed message: {0}")]
    Malformed(SamlError),

    /// The message was decoded but breaks compliance rules.
    #[error("{0}")]
    Compliance(#[from] VerificationFailure),

    /// The system under test answered with something the flow cannot use.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A message was delivered to the wrong participant.
    #[error("message for {expected} was delivered to {actual}")]
    Misrouted {
        /// Endpoint the message should have gone to.
        expected: String,
        /// Endpoint it went to.
        actual: String,
    },

    /// The session state machine refused a step.
    #[error("cannot {event} while {phase}")]
    InvalidTransition {
        /// Current phase.
        phase: String,
        /// Attempted step.
        event: &'static str,
    },

    /// The configuration cannot support the scenario.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<SamlError> for ScenarioError {
    fn from(err: SamlError) -> Self {
        match err {
            SamlError::SignatureInvalid(message) => Self::SignatureInvalid(message),
            other => Self::Malformed(other),
        }
    }
}

impl ScenarioError {
    /// Returns true if the system under test broke a rule, as opposed to the
    /// run failing for environmental reasons.
    #[must_use]
    pub const fn is_compliance_failure(&self) -> bool {
        matches!(self, Self::Compliance(_) | Self::SignatureInvalid(_))
    }

    /// The violations behind a compliance failure. A bad signature is
    /// reported as a single [`ViolationKind::SignatureInvalid`].
    #[must_use]
    pub fn violations(&self) -> Vec<ComplianceViolation> {
        match self {
            Self::Compliance(failure) => failure.violations().to_vec(),
            Self::SignatureInvalid(message) => vec![ComplianceViolation::new(
                ViolationKind::SignatureInvalid,
                &SAML_CORE_5_1_A,
                message.clone(),
            )],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_errors_are_compliance_failures() {
        let err = ScenarioError::from(SamlError::SignatureInvalid("bad rsa".to_string()));
        assert!(err.is_compliance_failure());
        let violations = err.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind(), ViolationKind::SignatureInvalid);
        assert!(violations[0].cites(&SAML_CORE_5_1_A));
    }

    #[test]
    fn transport_errors_are_environmental() {
        let err = ScenarioError::from(TransportError::Timeout {
            url: "https://idp.example.org/slo".to_string(),
        });
        assert!(!err.is_compliance_failure());
        assert!(err.violations().is_empty());
        assert_eq!(
            err.to_string(),
            "transport failure: request to https://idp.example.org/slo timed out"
        );
    }

    #[test]
    fn decoding_errors_are_malformed() {
        let err = ScenarioError::from(SamlError::Deflate("truncated".to_string()));
        assert!(matches!(err, ScenarioError::Malformed(_)));
    }
}
