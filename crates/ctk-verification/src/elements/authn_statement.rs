//! Authentication statements (Core §2.7.2).

use ctk_saml::{Element, NodePath};

use super::{collect, ElementVerifier};
use crate::citation::SAML_CORE_2_7_2_A;
use crate::common::{require_attribute, verify_time_values};
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Checks every `AuthnStatement` below a node.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthnStatementVerifier;

impl ElementVerifier for AuthnStatementVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        _ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let mut found = Vec::new();
        for (path, statement) in node.recursive_children_located("AuthnStatement", at) {
            collect(
                &mut found,
                require_attribute(statement, "AuthnInstant", &SAML_CORE_2_7_2_A, &path)
                    .and_then(|_| verify_time_values(statement, "AuthnInstant", &path))
                    .map(drop),
            );
            collect(
                &mut found,
                verify_time_values(statement, "SessionNotOnOrAfter", &path).map(drop),
            );
            if statement.child("AuthnContext").is_none() {
                found.push(
                    ComplianceViolation::new(
                        ViolationKind::MissingRequiredElement,
                        &SAML_CORE_2_7_2_A,
                        "AuthnStatement contains no AuthnContext.",
                    )
                    .at(&path),
                );
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_saml::document::parse_element;

    fn verify(xml: &str) -> Vec<ComplianceViolation> {
        let node = parse_element(xml).unwrap();
        AuthnStatementVerifier.verify(
            &node,
            &NodePath::root("Assertion"),
            &VerificationContext::new("sp"),
        )
    }

    #[test]
    fn conforming_statement_passes() {
        let violations = verify(
            r#"<Assertion><AuthnStatement AuthnInstant="2024-06-01T12:00:00Z" SessionIndex="s1">
                <AuthnContext><AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</AuthnContextClassRef></AuthnContext>
               </AuthnStatement></Assertion>"#,
        );
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn missing_parts_are_reported() {
        let violations = verify(
            r#"<Assertion><AuthnStatement SessionNotOnOrAfter="2024-06-01T14:00:00+01:00"/></Assertion>"#,
        );
        let kinds: Vec<ViolationKind> = violations.iter().map(ComplianceViolation::kind).collect();
        assert_eq!(
            kinds,
            [
                ViolationKind::MissingRequiredAttribute,
                ViolationKind::InvalidDateTime,
                ViolationKind::MissingRequiredElement,
            ]
        );
    }
}
