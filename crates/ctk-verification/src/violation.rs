//! Compliance violations and verification failures.

use std::fmt;

use ctk_saml::NodePath;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::citation::SpecCitation;

/// What kind of rule a violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The document is not the message it should be.
    MalformedDocument,
    /// A URI-typed value is not an absolute URI.
    InvalidUriSyntax,
    /// A string-typed value is empty.
    EmptyRequiredString,
    /// A validity window is inverted or does not contain the evaluation
    /// instant.
    TimeWindowInvalid,
    /// A dateTime value is unparseable or not UTC.
    InvalidDateTime,
    /// An attribute not defined by SAML sits in the SAML attribute space.
    UnexpectedExtensionAttribute,
    /// A required element is absent.
    MissingRequiredElement,
    /// A required attribute is absent.
    MissingRequiredAttribute,
    /// An element appears more often than allowed.
    DuplicateElement,
    /// No Audience names the requester.
    AudienceMismatch,
    /// The response arrived somewhere other than the expected ACS.
    AcsMismatch,
    /// The Issuer is not the expected entity.
    IssuerMismatch,
    /// A status code is not permitted where it appears.
    InvalidStatus,
    /// InResponseTo does not point at the request.
    InResponseToMismatch,
    /// RelayState was not echoed exactly.
    RelayStateMismatch,
    /// The returned NameID does not satisfy the requested policy.
    NameIdPolicyMismatch,
    /// A signature failed or could not be checked.
    SignatureInvalid,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedDocument => "MalformedDocument",
            Self::InvalidUriSyntax => "InvalidUriSyntax",
            Self::EmptyRequiredString => "EmptyRequiredString",
            Self::TimeWindowInvalid => "TimeWindowInvalid",
            Self::InvalidDateTime => "InvalidDateTime",
            Self::UnexpectedExtensionAttribute => "UnexpectedExtensionAttribute",
            Self::MissingRequiredElement => "MissingRequiredElement",
            Self::MissingRequiredAttribute => "MissingRequiredAttribute",
            Self::DuplicateElement => "DuplicateElement",
            Self::AudienceMismatch => "AudienceMismatch",
            Self::AcsMismatch => "AcsMismatch",
            Self::IssuerMismatch => "IssuerMismatch",
            Self::InvalidStatus => "InvalidStatus",
            Self::InResponseToMismatch => "InResponseToMismatch",
            Self::RelayStateMismatch => "RelayStateMismatch",
            Self::NameIdPolicyMismatch => "NameIdPolicyMismatch",
            Self::SignatureInvalid => "SignatureInvalid",
        };
        f.write_str(name)
    }
}

/// One broken rule.
///
/// A violation always carries at least one citation: the constructor takes
/// the first one, [`ComplianceViolation::also`] adds more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceViolation {
    kind: ViolationKind,
    citations: Vec<&'static SpecCitation>,
    message: String,
    #[serde(serialize_with = "serialize_path")]
    node: Option<NodePath>,
}

impl ComplianceViolation {
    /// Creates a violation of `citation`.
    #[must_use]
    pub fn new(
        kind: ViolationKind,
        citation: &'static SpecCitation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            citations: vec![citation],
            message: message.into(),
            node: None,
        }
    }

    /// Adds another clause the same finding breaks.
    #[must_use]
    pub fn also(mut self, citation: &'static SpecCitation) -> Self {
        if !self.citations.iter().any(|c| std::ptr::eq(*c, citation)) {
            self.citations.push(citation);
        }
        self
    }

    /// Points the violation at the offending node.
    #[must_use]
    pub fn at(mut self, node: &NodePath) -> Self {
        self.node = Some(node.clone());
        self
    }

    /// The rule category.
    #[must_use]
    pub const fn kind(&self) -> ViolationKind {
        self.kind
    }

    /// Cited clauses, first one primary.
    #[must_use]
    pub fn citations(&self) -> &[&'static SpecCitation] {
        &self.citations
    }

    /// Returns true if `citation` is among the cited clauses.
    #[must_use]
    pub fn cites(&self, citation: &SpecCitation) -> bool {
        self.citations.iter().any(|c| std::ptr::eq(*c, citation))
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Offending node, if known.
    #[must_use]
    pub const fn node(&self) -> Option<&NodePath> {
        self.node.as_ref()
    }
}

impl fmt::Display for ComplianceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(node) = &self.node {
            write!(f, " (at {node})")?;
        }
        for citation in &self.citations {
            write!(f, "\n    {citation}")?;
        }
        Ok(())
    }
}

fn serialize_path<S: Serializer>(node: &Option<NodePath>, s: S) -> Result<S::Ok, S::Error> {
    match node {
        Some(path) => s.collect_str(path),
        None => s.serialize_none(),
    }
}

/// A failed protocol verification: one or more violations in the order they
/// were raised.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub struct VerificationFailure {
    violations: Vec<ComplianceViolation>,
}

impl VerificationFailure {
    /// Wraps a non-empty list of violations.
    ///
    /// Returns `None` for an empty list, which is a pass.
    #[must_use]
    pub fn from_violations(violations: Vec<ComplianceViolation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    /// Turns collected violations into a verification outcome.
    ///
    /// # Errors
    ///
    /// Returns the failure if any violation was collected.
    pub fn check(violations: Vec<ComplianceViolation>) -> Result<(), Self> {
        Self::from_violations(violations).map_or(Ok(()), Err)
    }

    /// The violations, first raised first.
    #[must_use]
    pub fn violations(&self) -> &[ComplianceViolation] {
        &self.violations
    }

    /// The first violation.
    #[must_use]
    pub fn first(&self) -> &ComplianceViolation {
        &self.violations[0]
    }

    /// Returns true if any violation is of `kind`.
    #[must_use]
    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// Returns true if any violation cites `citation`.
    #[must_use]
    pub fn cites(&self, citation: &SpecCitation) -> bool {
        self.violations.iter().any(|v| v.cites(citation))
    }
}

impl From<ComplianceViolation> for VerificationFailure {
    fn from(violation: ComplianceViolation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} compliance violation(s)", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n  {violation}")?;
        }
        Ok(())
    }
}
