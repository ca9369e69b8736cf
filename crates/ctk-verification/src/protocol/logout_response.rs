//! Single Logout: the final `LogoutResponse` (Core §3.7.3.2, Profiles §4.4.4.2).

use ctk_saml::{status_codes, sub_status_codes, ProtocolMessage};

use super::pipeline::{Pipeline, Stage};
use super::response::ResponseVerifier;
use super::{require_root, ProtocolVerifier};
use crate::binding::verify_signed_destination;
use crate::citation::{SAML_CORE_3_7_3_2_A, SAML_CORE_3_7_3_2_D, SAML_PROFILES_4_4_4_2_A};
use crate::elements::{IssuerVerifier, StatusVerifier};
use crate::violation::{ComplianceViolation, ViolationKind};

/// Verifies a received `LogoutResponse`.
///
/// With `partial_logout` set, the logout was expected to fail for at least
/// one participant and the response must say so with a `PartialLogout`
/// status code at any level; `Success` alone is then a violation.
#[derive(Debug)]
pub struct CoreLogoutResponseProtocolVerifier {
    partial_logout: bool,
    pipeline: Pipeline,
}

impl CoreLogoutResponseProtocolVerifier {
    /// Builds the verifier.
    #[must_use]
    pub fn new(partial_logout: bool) -> Self {
        let pipeline = Pipeline::new("logout-response").stage(Stage::Core, "root", |message, _| {
            require_root(message, "LogoutResponse", &SAML_CORE_3_7_3_2_A).map(|()| Vec::new())
        });
        let issuer = IssuerVerifier::new(&SAML_PROFILES_4_4_4_2_A, &SAML_PROFILES_4_4_4_2_A);
        let pipeline = ResponseVerifier::new(issuer)
            .stages(pipeline)
            .stage(Stage::Core, "logout-status", move |message, _| {
                Ok(logout_status(message, partial_logout).err().into_iter().collect())
            })
            .stage(Stage::Binding, "signed-destination", |message, ctx| {
                Ok(verify_signed_destination(message, ctx).err().into_iter().collect())
            });
        Self {
            partial_logout,
            pipeline,
        }
    }

    /// Whether a partial logout is expected.
    #[must_use]
    pub const fn expects_partial_logout(&self) -> bool {
        self.partial_logout
    }
}

impl ProtocolVerifier for CoreLogoutResponseProtocolVerifier {
    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

fn logout_status(message: &ProtocolMessage, partial_logout: bool) -> Result<(), ComplianceViolation> {
    let root = message.root();
    // A missing status is reported by the generic response checks.
    let Some(top) = StatusVerifier::top_level_code(root) else {
        return Ok(());
    };
    let at = message.root_path().child("Status", 0);

    if partial_logout {
        if StatusVerifier::all_codes(root).contains(&sub_status_codes::PARTIAL_LOGOUT) {
            return Ok(());
        }
        return Err(ComplianceViolation::new(
            ViolationKind::InvalidStatus,
            &SAML_CORE_3_7_3_2_D,
            format!("A participant failed to log out but the status is [{top}] without PartialLogout."),
        )
        .at(&at));
    }

    if top == status_codes::SUCCESS {
        Ok(())
    } else {
        Err(ComplianceViolation::new(
            ViolationKind::InvalidStatus,
            &SAML_CORE_3_7_3_2_A,
            format!("Every participant logged out but the status is [{top}]."),
        )
        .at(&at))
    }
}
