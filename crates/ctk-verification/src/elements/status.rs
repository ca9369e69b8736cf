//! Response status (Core §3.2.2.1, §3.2.2.2).

use ctk_saml::{status_codes, Element, NodePath};

use super::{collect, ElementVerifier};
use crate::citation::{SAML_CORE_3_2_2_2_A, SAML_CORE_3_2_2_C};
use crate::common::{require_attribute, verify_uri};
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Checks the direct `Status` child of a response.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusVerifier;

impl StatusVerifier {
    /// Top-level status code value of a response, if present.
    #[must_use]
    pub fn top_level_code(response: &Element) -> Option<&str> {
        response
            .child("Status")?
            .child("StatusCode")?
            .optional_attribute("Value")
    }

    /// All status code values, top level first, then nested ones in order.
    #[must_use]
    pub fn all_codes(response: &Element) -> Vec<&str> {
        let mut codes = Vec::new();
        let mut current = response.child("Status").and_then(|s| s.child("StatusCode"));
        while let Some(code) = current {
            if let Some(value) = code.optional_attribute("Value") {
                codes.push(value);
            }
            current = code.child("StatusCode");
        }
        codes
    }
}

impl ElementVerifier for StatusVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        _ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let missing = |what: &str, path: &NodePath| {
            ComplianceViolation::new(
                ViolationKind::MissingRequiredElement,
                &SAML_CORE_3_2_2_C,
                format!("{} has no {what}.", path.leaf()),
            )
            .at(path)
        };

        let Some(status) = node.child("Status") else {
            return vec![missing("Status element", at)];
        };
        let status_path = at.child("Status", 0);
        let Some(top) = status.child("StatusCode") else {
            return vec![missing("StatusCode element", &status_path)];
        };

        let mut found = Vec::new();
        let mut path = status_path.child("StatusCode", 0);
        match require_attribute(top, "Value", &SAML_CORE_3_2_2_C, &path) {
            Ok(value) if !status_codes::TOP_LEVEL.contains(&value) => found.push(
                ComplianceViolation::new(
                    ViolationKind::InvalidStatus,
                    &SAML_CORE_3_2_2_2_A,
                    format!("The top-level StatusCode [{value}] is not a top-level status code."),
                )
                .at(&path),
            ),
            Ok(_) => {}
            Err(violation) => found.push(violation),
        }

        let mut nested = top.child("StatusCode");
        while let Some(code) = nested {
            path = path.child("StatusCode", 0);
            collect(
                &mut found,
                require_attribute(code, "Value", &SAML_CORE_3_2_2_C, &path)
                    .and_then(|value| verify_uri(value, "Value attribute", &path)),
            );
            nested = code.child("StatusCode");
        }
        found
    }
}
