//! Conditions (Core §2.5).

use ctk_saml::{Element, NodePath};

use super::{collect, ElementVerifier};
use crate::citation::{SAML_CORE_2_5_1_4_A, SAML_CORE_2_5_1_A, SAML_CORE_2_5_1_B};
use crate::common::{validate_time_window, verify_uri};
use crate::context::VerificationContext;
use crate::navigation::located_children;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Checks every `Conditions` element below a node: its validity window,
/// single-occurrence conditions, and audience restrictions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionsVerifier;

impl ConditionsVerifier {
    fn verify_conditions(
        conditions: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
        found: &mut Vec<ComplianceViolation>,
    ) {
        collect(found, validate_time_window(conditions, at, &SAML_CORE_2_5_1_A, ctx));

        for name in ["OneTimeUse", "ProxyRestriction"] {
            let count = conditions.children(name).len();
            if count > 1 {
                found.push(
                    ComplianceViolation::new(
                        ViolationKind::DuplicateElement,
                        &SAML_CORE_2_5_1_B,
                        format!("Conditions contains {count} {name} elements."),
                    )
                    .at(at),
                );
            }
        }

        for (path, restriction) in located_children(conditions, "AudienceRestriction", at) {
            let audiences = located_children(restriction, "Audience", &path);
            if audiences.is_empty() {
                found.push(
                    ComplianceViolation::new(
                        ViolationKind::MissingRequiredElement,
                        &SAML_CORE_2_5_1_4_A,
                        "AudienceRestriction contains no Audience element.",
                    )
                    .at(&path),
                );
            }
            for (audience_path, audience) in audiences {
                collect(
                    found,
                    verify_uri(audience.text(), "text", &audience_path)
                        .map_err(|v| v.also(&SAML_CORE_2_5_1_4_A)),
                );
            }
        }
    }
}

impl ElementVerifier for ConditionsVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let mut found = Vec::new();
        for (path, conditions) in node.recursive_children_located("Conditions", at) {
            Self::verify_conditions(conditions, &path, ctx, &mut found);
        }
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
            .at_instant(parse_utc("2024-06-01T12:00:00Z").unwrap());
        let node = parse_element(xml).unwrap();
        ConditionsVerifier.verify(&node, &NodePath::root("Assertion"), &ctx)
    }

    #[test]
    fn conforming_conditions_pass() {
        let violations = verify(
            r#"<Assertion><Conditions NotBefore="2024-06-01T11:59:00Z" NotOnOrAfter="2024-06-01T12:05:00Z">
                <AudienceRestriction><Audience>https://sp.example.org</Audience></AudienceRestriction>
                <OneTimeUse/></Conditions></Assertion>"#,
        );
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn every_problem_is_collected() {
        let violations = verify(
            r#"<Assertion><Conditions NotOnOrAfter="2024-06-01T10:00:00Z">
                <AudienceRestriction/>
                <AudienceRestriction><Audience>not a uri</Audience></AudienceRestriction>
                <OneTimeUse/><OneTimeUse/></Conditions></Assertion>"#,
        );
        let kinds: Vec<ViolationKind> = violations.iter().map(ComplianceViolation::kind).collect();
        assert_eq!(
            kinds,
            [
                ViolationKind::TimeWindowInvalid,
                ViolationKind::DuplicateElement,
                ViolationKind::MissingRequiredElement,
                ViolationKind::InvalidUriSyntax,
            ]
        );
        assert_eq!(
            violations[3].node().unwrap().to_string(),
            "Assertion/Conditions[0]/AudienceRestriction[1]/Audience[0]"
        );
    }
}
