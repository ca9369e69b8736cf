//! Rules shared by every `RequestAbstractType` message (Core §3.2.1).

use ctk_saml::ProtocolMessage;

use super::pipeline::{Pipeline, Stage};
use super::verify_message_attributes;
use crate::citation::SAML_CORE_3_2_1_A;
use crate::context::VerificationContext;
use crate::elements::{ElementVerifier, IssuerVerifier};
use crate::violation::ComplianceViolation;

/// Generic request checks: identifier and version attributes and issuer.
#[derive(Debug, Clone, Copy)]
pub struct RequestVerifier {
    issuer: IssuerVerifier,
}

impl RequestVerifier {
    /// Creates the verifier; `issuer` carries the profile's Issuer clauses.
    #[must_use]
    pub const fn new(issuer: IssuerVerifier) -> Self {
        Self { issuer }
    }

    /// Runs the generic checks on the message root.
    #[must_use]
    pub fn verify_request(
        &self,
        message: &ProtocolMessage,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation> {
        let root = message.root();
        let at = message.root_path();
        let mut found = verify_message_attributes(root, &at, &SAML_CORE_3_2_1_A);
        found.extend(self.issuer.verify(root, &at, ctx));
        found
    }

    /// Appends the generic checks to `pipeline` as a core stage.
    #[must_use]
    pub fn stages(self, pipeline: Pipeline) -> Pipeline {
        pipeline.stage(Stage::Core, "request", move |message, ctx| {
            Ok(self.verify_request(message, ctx))
        })
    }
}
