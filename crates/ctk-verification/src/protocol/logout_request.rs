//! Single Logout: the `LogoutRequest` an identity provider propagates to a
//! session participant (Core §3.7.1, Profiles §4.4.4.1).

use ctk_saml::ProtocolMessage;

use super::pipeline::{Pipeline, Stage};
use super::request::RequestVerifier;
use super::{require_root, ProtocolVerifier};
use crate::binding::verify_signed_destination;
use crate::citation::{SAML_CORE_3_7_1_A, SAML_PROFILES_4_4_4_1_A};
use crate::common::{verify_string_content, verify_time_values, verify_uri_values};
use crate::elements::{collect, IssuerVerifier};
use crate::navigation::located_children;
use crate::violation::{ComplianceViolation, ViolationKind};

const IDENTIFIERS: [&str; 3] = ["BaseID", "NameID", "EncryptedID"];

/// Verifies a received `LogoutRequest`.
#[derive(Debug)]
pub struct CoreLogoutRequestProtocolVerifier {
    pipeline: Pipeline,
}

impl Default for CoreLogoutRequestProtocolVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreLogoutRequestProtocolVerifier {
    /// Builds the verifier.
    #[must_use]
    pub fn new() -> Self {
        let pipeline = Pipeline::new("logout-request").stage(Stage::Core, "root", |message, _| {
            require_root(message, "LogoutRequest", &SAML_CORE_3_7_1_A).map(|()| Vec::new())
        });
        let issuer = IssuerVerifier::new(&SAML_PROFILES_4_4_4_1_A, &SAML_PROFILES_4_4_4_1_A);
        let pipeline = RequestVerifier::new(issuer)
            .stages(pipeline)
            .stage(Stage::Core, "principal", |message, _| {
                Ok(principal_identifier(message).err().into_iter().collect())
            })
            .stage(Stage::Core, "logout-attributes", |message, _| {
                Ok(logout_attributes(message))
            })
            .stage(Stage::Binding, "signed-destination", |message, ctx| {
                Ok(verify_signed_destination(message, ctx).err().into_iter().collect())
            });
        Self { pipeline }
    }
}

impl ProtocolVerifier for CoreLogoutRequestProtocolVerifier {
    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

fn principal_identifier(message: &ProtocolMessage) -> Result<(), ComplianceViolation> {
    let root = message.root();
    let present: Vec<&str> = IDENTIFIERS
        .into_iter()
        .flat_map(|name| root.children(name).into_iter().map(move |_| name))
        .collect();
    let problem = match present.as_slice() {
        [_] => return Ok(()),
        [] => (
            ViolationKind::MissingRequiredElement,
            "The LogoutRequest identifies no principal.".to_string(),
        ),
        many => (
            ViolationKind::DuplicateElement,
            format!(
                "The LogoutRequest identifies the principal more than once: {}.",
                many.join(", ")
            ),
        ),
    };
    Err(ComplianceViolation::new(problem.0, &SAML_CORE_3_7_1_A, problem.1).at(&message.root_path()))
}

fn logout_attributes(message: &ProtocolMessage) -> Vec<ComplianceViolation> {
    let root = message.root();
    let at = message.root_path();
    let mut found = Vec::new();
    collect(&mut found, verify_uri_values(root, "Reason", &at));
    collect(
        &mut found,
        verify_time_values(root, "NotOnOrAfter", &at).map(drop),
    );
    for (path, index) in located_children(root, "SessionIndex", &at) {
        collect(&mut found, verify_string_content(index, &path));
    }
    found
}
