//! Protocol-flow verifiers.
//!
//! Each verifier owns a [`Pipeline`] of stages. The generic request and
//! response rules are stages too, so a protocol verifier is the generic
//! stages plus its own, composed when the verifier is built.

mod authn;
mod logout_request;
mod logout_response;
mod pipeline;
mod request;
mod response;

pub use authn::CoreAuthnRequestProtocolVerifier;
pub use logout_request::CoreLogoutRequestProtocolVerifier;
pub use logout_response::CoreLogoutResponseProtocolVerifier;
pub use pipeline::{Pipeline, Stage, StageResult};
pub use request::RequestVerifier;
pub use response::ResponseVerifier;

use ctk_saml::{Element, NodePath, ProtocolMessage, SAML_VERSION};

use crate::citation::SpecCitation;
use crate::common::{require_attribute, verify_id_values, verify_time_values, verify_uri_values};
use crate::context::VerificationContext;
use crate::elements::collect;
use crate::violation::{ComplianceViolation, VerificationFailure, ViolationKind};

/// A whole-message check for one protocol exchange.
pub trait ProtocolVerifier {
    /// The stages this verifier runs.
    fn pipeline(&self) -> &Pipeline;

    /// Verifies a message that has already been through signature checking.
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    fn verify(
        &self,
        message: &ProtocolMessage,
        ctx: &VerificationContext,
    ) -> Result<(), VerificationFailure> {
        self.pipeline().run(message, ctx)
    }
}

/// `ID`, `Version`, `IssueInstant`, `Destination` and `Consent` on a request
/// or response root, reported under `citation`.
pub(crate) fn verify_message_attributes(
    root: &Element,
    at: &NodePath,
    citation: &'static SpecCitation,
) -> Vec<ComplianceViolation> {
    let mut found = Vec::new();
    collect(
        &mut found,
        verify_id_values(root, "ID", at).map_err(|v| v.also(citation)),
    );
    collect(
        &mut found,
        require_attribute(root, "Version", citation, at).and_then(|version| {
            if version == SAML_VERSION {
                Ok(())
            } else {
                Err(ComplianceViolation::new(
                    ViolationKind::MalformedDocument,
                    citation,
                    format!("{} Version is [{version}], expected {SAML_VERSION}.", at.leaf()),
                )
                .at(at))
            }
        }),
    );
    collect(
        &mut found,
        require_attribute(root, "IssueInstant", citation, at)
            .and_then(|_| verify_time_values(root, "IssueInstant", at))
            .map(drop),
    );
    collect(&mut found, verify_uri_values(root, "Destination", at));
    collect(&mut found, verify_uri_values(root, "Consent", at));
    found
}

/// Fails unless the root element is named `expected`.
pub(crate) fn require_root(
    message: &ProtocolMessage,
    expected: &str,
    citation: &'static SpecCitation,
) -> Result<(), ComplianceViolation> {
    if message.kind() == expected {
        Ok(())
    } else {
        Err(ComplianceViolation::new(
            ViolationKind::MissingRequiredElement,
            citation,
            format!("Expected a {expected} but received a {}.", message.kind()),
        )
        .at(&message.root_path()))
    }
}
