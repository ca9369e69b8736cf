//! Issuer of a protocol message or assertion.

use ctk_saml::{Element, NameIdFormat, NodePath};

use super::ElementVerifier;
use crate::citation::SpecCitation;
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Checks the direct `Issuer` child of a node.
///
/// The clause depends on the profile step, so each verifier is built with the
/// citation it reports under.
#[derive(Debug, Clone, Copy)]
pub struct IssuerVerifier {
    citation: &'static SpecCitation,
    format_citation: &'static SpecCitation,
    required: bool,
}

impl IssuerVerifier {
    /// Creates a verifier reporting under `citation`; Format problems are
    /// reported under `format_citation`.
    #[must_use]
    pub const fn new(
        citation: &'static SpecCitation,
        format_citation: &'static SpecCitation,
    ) -> Self {
        Self {
            citation,
            format_citation,
            required: true,
        }
    }

    /// Allows the Issuer to be omitted.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl ElementVerifier for IssuerVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let Some(issuer) = node.child("Issuer") else {
            if !self.required {
                return Vec::new();
            }
            return vec![ComplianceViolation::new(
                ViolationKind::MissingRequiredElement,
                self.citation,
                format!("{} has no Issuer element.", at.leaf()),
            )
            .at(at)];
        };

        let path = at.child("Issuer", 0);
        let mut found = Vec::new();

        if let Some(expected) = ctx.expected_issuer() {
            if issuer.text() != expected {
                found.push(
                    ComplianceViolation::new(
                        ViolationKind::IssuerMismatch,
                        self.citation,
                        format!(
                            "The Issuer [{}] does not match the expected entity [{expected}].",
                            issuer.text()
                        ),
                    )
                    .at(&path),
                );
            }
        }

        if let Some(format) = issuer.optional_attribute("Format") {
            if format != NameIdFormat::Entity.uri() {
                found.push(
                    ComplianceViolation::new(
                        ViolationKind::IssuerMismatch,
                        self.format_citation,
                        format!("The Issuer Format [{format}] is neither omitted nor entity."),
                    )
                    .at(&path),
                );
            }
        }
        found
    }
}
