//! NameIDPolicy satisfaction (Core §3.4.1.1).

use ctk_saml::messages::NameIdPolicy;
use ctk_saml::{Element, NameIdFormat, NodePath};

use super::ElementVerifier;
use crate::citation::{SAML_CORE_3_4_1_1_A, SAML_CORE_3_4_1_1_B};
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Checks that subjects satisfy the NameIDPolicy of the original request.
#[derive(Debug, Clone)]
pub struct NameIdPolicyVerifier {
    policy: NameIdPolicy,
}

impl NameIdPolicyVerifier {
    /// Creates a verifier for the requested policy.
    #[must_use]
    pub const fn new(policy: NameIdPolicy) -> Self {
        Self { policy }
    }

    /// When the encrypted format was requested, every `Subject` below `node`
    /// must carry an `EncryptedID`.
    #[must_use]
    pub fn verify_encrypted_ids(&self, node: &Element, at: &NodePath) -> Vec<ComplianceViolation> {
        if self.policy.format != Some(NameIdFormat::Encrypted) {
            return Vec::new();
        }
        node.recursive_children_located("Subject", at)
            .into_iter()
            .filter(|(_, subject)| subject.child("EncryptedID").is_none())
            .map(|(path, _)| {
                ComplianceViolation::new(
                    ViolationKind::NameIdPolicyMismatch,
                    &SAML_CORE_3_4_1_1_B,
                    "The encrypted NameID format was requested but the Subject has no EncryptedID.",
                )
                .at(&path)
            })
            .collect()
    }
}

impl ElementVerifier for NameIdPolicyVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        _ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let Some(format) = self.policy.format else {
            return Vec::new();
        };
        if matches!(format, NameIdFormat::Unspecified | NameIdFormat::Encrypted) {
            return Vec::new();
        }

        let mut found = Vec::new();
        for (path, subject) in node.recursive_children_located("Subject", at) {
            let Some(name_id) = subject.child("NameID") else {
                continue;
            };
            let actual = name_id.optional_attribute("Format");
            if actual != Some(format.uri()) {
                found.push(
                    ComplianceViolation::new(
                        ViolationKind::NameIdPolicyMismatch,
                        &SAML_CORE_3_4_1_1_A,
                        format!(
                            "The NameID Format [{}] does not match the requested [{}].",
                            actual.unwrap_or("none"),
                            format.uri()
                        ),
                    )
                    .at(&path.child("NameID", 0)),
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

    fn response(subject: &str) -> Element {
        parse_element(&format!("<Response><Assertion>{subject}</Assertion></Response>")).unwrap()
    }

    fn at() -> NodePath {
        NodePath::root("Response")
    }

    #[test]
    fn requested_format_must_be_returned() {
        let verifier = NameIdPolicyVerifier::new(NameIdPolicy::with_format(NameIdFormat::Persistent));
        let ctx = VerificationContext::new("sp");

        let good = response(&format!(
            r#"<Subject><NameID Format="{}">x</NameID></Subject>"#,
            NameIdFormat::Persistent.uri()
        ));
        assert!(verifier.verify(&good, &at(), &ctx).is_empty());

        let bad = response(r#"<Subject><NameID>x</NameID></Subject>"#);
        let violations = verifier.verify(&bad, &at(), &ctx);
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].node().unwrap().to_string(),
            "Response/Assertion[0]/Subject[0]/NameID[0]"
        );
    }

    #[test]
    fn encrypted_format_requires_encrypted_id() {
        let verifier = NameIdPolicyVerifier::new(NameIdPolicy::with_format(NameIdFormat::Encrypted));
        let plain = response("<Subject><NameID>x</NameID></Subject>");
        assert_eq!(verifier.verify_encrypted_ids(&plain, &at()).len(), 1);

        let encrypted = response("<Subject><EncryptedID><EncryptedData/></EncryptedID></Subject>");
        assert!(verifier.verify_encrypted_ids(&encrypted, &at()).is_empty());
    }

    #[test]
    fn unspecified_policy_accepts_anything() {
        let verifier = NameIdPolicyVerifier::new(NameIdPolicy::default());
        let node = response("<Subject><NameID>x</NameID></Subject>");
        assert!(verifier
            .verify(&node, &at(), &VerificationContext::new("sp"))
            .is_empty());
        assert!(verifier.verify_encrypted_ids(&node, &at()).is_empty());
    }
}
