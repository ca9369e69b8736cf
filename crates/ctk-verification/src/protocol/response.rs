//! Rules shared by every `StatusResponseType` message (Core §3.2.2).

use ctk_saml::ProtocolMessage;

use super::pipeline::{Pipeline, Stage};
use super::verify_message_attributes;
use crate::citation::{SAML_CORE_3_2_2_A, SAML_CORE_3_2_2_B};
use crate::context::VerificationContext;
use crate::elements::{ElementVerifier, IssuerVerifier, StatusVerifier};
use crate::violation::{ComplianceViolation, ViolationKind};

/// Generic response checks: identifier and version attributes,
/// `InResponseTo` linkage, issuer and status.
#[derive(Debug, Clone, Copy)]
pub struct ResponseVerifier {
    issuer: IssuerVerifier,
}

impl ResponseVerifier {
    /// Creates the verifier; `issuer` carries the profile's Issuer clauses.
    #[must_use]
    pub const fn new(issuer: IssuerVerifier) -> Self {
        Self { issuer }
    }

    /// Runs the generic checks on the message root.
    #[must_use]
    pub fn verify_response(
        &self,
        message: &ProtocolMessage,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let root = message.root();
        let at = message.root_path();

        let mut found = verify_message_attributes(root, &at, &SAML_CORE_3_2_2_A);
        if let Some(request) = ctx.request() {
            match root.optional_attribute("InResponseTo") {
                Some(id) if id == request.id => {}
                actual => found.push(
                    ComplianceViolation::new(
                        ViolationKind::InResponseToMismatch,
                        &SAML_CORE_3_2_2_B,
                        format!(
                            "InResponseTo [{}] does not match the request ID [{}].",
                            actual.unwrap_or("none"),
                            request.id
                        ),
                    )
                    .at(&at),
                ),
            }
        }
        found.extend(self.issuer.verify(root, &at, ctx));
        found.extend(StatusVerifier.verify(root, &at, ctx));
        found
    }

    /// Appends the generic checks to `pipeline` as a core stage.
    #[must_use]
    pub fn stages(self, pipeline: Pipeline) -> Pipeline {
        pipeline.stage(Stage::Core, "status-response", move |message, ctx| {
            Ok(self.verify_response(message, ctx))
        })
    }
}
