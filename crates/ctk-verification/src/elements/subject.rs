//! Subjects (Core §2.4).

use ctk_saml::{Element, NodePath};

use super::{collect, ElementVerifier};
use crate::citation::{SAML_CORE_2_4_1_1_A, SAML_CORE_2_4_1_2_A, SAML_CORE_2_4_1_2_B};
use crate::common::{
    require_attribute, validate_time_window, verify_saml_extensions, verify_string_values,
    verify_uri_values,
};
use crate::context::VerificationContext;
use crate::violation::ComplianceViolation;

/// SAML attributes defined on `SubjectConfirmationData`.
pub const SUBJECT_CONFIRMATION_DATA_ATTRIBUTES: [&str; 5] =
    ["NotBefore", "NotOnOrAfter", "Recipient", "InResponseTo", "Address"];

/// Checks every `SubjectConfirmation` and `SubjectConfirmationData` below a
/// node.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubjectVerifier;

impl SubjectVerifier {
    /// 2.4.1.1 `SubjectConfirmation`: `Method` is a required URI.
    fn verify_subject_confirmation(
        node: &Element,
        at: &NodePath,
        found: &mut Vec<ComplianceViolation>,
    ) {
        for (path, confirmation) in node.recursive_children_located("SubjectConfirmation", at) {
            let check = require_attribute(confirmation, "Method", &SAML_CORE_2_4_1_1_A, &path)
                .and_then(|_| {
                    verify_uri_values(confirmation, "Method", &path)
                        .map_err(|v| v.also(&SAML_CORE_2_4_1_1_A))
                });
            collect(found, check);
        }
    }

    /// 2.4.1.2 `SubjectConfirmationData`.
    fn verify_subject_confirmation_data(
        node: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
        found: &mut Vec<ComplianceViolation>,
    ) {
        for (path, data) in node.recursive_children_located("SubjectConfirmationData", at) {
            collect(found, validate_time_window(data, &path, &SAML_CORE_2_4_1_2_A, ctx));
            collect(found, verify_uri_values(data, "Recipient", &path));
            collect(found, verify_string_values(data, "Address", &path));
            found.extend(verify_saml_extensions(
                data.attribute_list(),
                &SUBJECT_CONFIRMATION_DATA_ATTRIBUTES,
                &SAML_CORE_2_4_1_2_B,
                &path,
            ));
        }
    }
}

impl ElementVerifier for SubjectVerifier {
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let mut found = Vec::new();
        Self::verify_subject_confirmation(node, at, &mut found);
        Self::verify_subject_confirmation_data(node, at, ctx, &mut found);
        found
    }
}
