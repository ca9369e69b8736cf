//! Assertions (Core §2.3.3).

use ctk_saml::{Element, NodePath, SAML_VERSION};

use super::{
    collect, AuthnStatementVerifier, ConditionsVerifier, ElementVerifier, IssuerVerifier,
    SubjectVerifier,
};
use crate::citation::{SAML_CORE_2_3_3_A, SAML_PROFILES_4_1_4_2_A, SAML_PROFILES_4_1_4_2_B};
use crate::common::{require_attribute, verify_id_values, verify_time_values};
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Checks an `Assertion` and runs the subject, conditions and statement
/// verifiers over it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssertionVerifier;

impl AssertionVerifier {
    fn verify_attributes(
        assertion: &Element,
        at: &NodePath,
        found: &mut Vec<ComplianceViolation>,
    ) {
        collect(
            found,
            verify_id_values(assertion, "ID", at).map_err(|v| v.also(&SAML_CORE_2_3_3_A)),
        );
        collect(
            found,
            require_attribute(assertion, "Version", &SAML_CORE_2_3_3_A, at).and_then(|version| {
                if version == SAML_VERSION {
                    Ok(())
                } else {
                    Err(ComplianceViolation::new(
                        ViolationKind::MalformedDocument,
                        &SAML_CORE_2_3_3_A,
                        format!("Assertion Version is [{version}], expected {SAML_VERSION}."),
                    )
                    .at(at))
                }
            }),
        );
        collect(
            found,
            require_attribute(assertion, "IssueInstant", &SAML_CORE_2_3_3_A, at)
                .and_then(|_| verify_time_values(assertion, "IssueInstant", at))
                .map(drop),
        );
    }
}

impl ElementVerifier for AssertionVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let mut found = Vec::new();
        Self::verify_attributes(node, at, &mut found);

        if node.child("Issuer").is_none() {
            found.push(
                ComplianceViolation::new(
                    ViolationKind::MissingRequiredElement,
                    &SAML_CORE_2_3_3_A,
                    "Assertion has no Issuer element.",
                )
                .at(at),
            );
        } else {
            found.extend(
                IssuerVerifier::new(&SAML_PROFILES_4_1_4_2_A, &SAML_PROFILES_4_1_4_2_B)
                    .verify(node, at, ctx),
            );
        }

        found.extend(SubjectVerifier.verify(node, at, ctx));
        found.extend(ConditionsVerifier.verify(node, at, ctx));
        found.extend(AuthnStatementVerifier.verify(node, at, ctx));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::parse_utc;
    use ctk_saml::document::parse_element;

    fn verify(xml: &str) -> Vec<ComplianceViolation> {
        let ctx = VerificationContext::new("https://sp.example.org")
            .with_expected_issuer("https://idp.example.org")
            .at_instant(parse_utc("2024-06-01T12:00:00Z").unwrap());
        let node = parse_element(xml).unwrap();
        AssertionVerifier.verify(&node, &NodePath::root("Assertion"), &ctx)
    }

    #[test]
    fn minimal_assertion_passes() {
        let violations = verify(
            r#"<Assertion ID="_a1" Version="2.0" IssueInstant="2024-06-01T12:00:00Z"><Issuer>https://idp.example.org</Issuer></Assertion>"#,
        );
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn required_parts() {
        let violations = verify(r#"<Assertion Version="1.1"/>"#);
        let kinds: Vec<ViolationKind> = violations.iter().map(ComplianceViolation::kind).collect();
        assert_eq!(
            kinds,
            [
                ViolationKind::MissingRequiredAttribute,
                ViolationKind::MalformedDocument,
                ViolationKind::MissingRequiredAttribute,
                ViolationKind::MissingRequiredElement,
            ]
        );
        assert!(violations.iter().all(|v| v.cites(&SAML_CORE_2_3_3_A)));
    }

    #[test]
    fn nested_verifiers_run() {
        let violations = verify(
            r#"<Assertion ID="_a1" Version="2.0" IssueInstant="2024-06-01T12:00:00Z">
                <Issuer>https://other.example.org</Issuer>
                <Subject><SubjectConfirmation Method="bearer"/></Subject>
               </Assertion>"#,
        );
        let kinds: Vec<ViolationKind> = violations.iter().map(ComplianceViolation::kind).collect();
        assert_eq!(
            kinds,
            [ViolationKind::IssuerMismatch, ViolationKind::InvalidUriSyntax]
        );
    }
}
