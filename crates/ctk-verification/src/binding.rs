//! Binding-level rules (Bindings §3.4, §3.5).

use ctk_saml::document::SignatureStatus;
use ctk_saml::{ProtocolMessage, SamlBinding};

use crate::citation::{
    SpecCitation, SAML_BINDINGS_3_4_3_A, SAML_BINDINGS_3_4_5_2_A, SAML_BINDINGS_3_5_3_A,
    SAML_BINDINGS_3_5_5_2_A,
};
use crate::common::CheckResult;
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

const fn relay_state_citation(binding: Option<SamlBinding>) -> &'static SpecCitation {
    match binding {
        Some(SamlBinding::HttpPost) => &SAML_BINDINGS_3_5_3_A,
        _ => &SAML_BINDINGS_3_4_3_A,
    }
}

const fn destination_citation(binding: Option<SamlBinding>) -> &'static SpecCitation {
    match binding {
        Some(SamlBinding::HttpPost) => &SAML_BINDINGS_3_5_5_2_A,
        _ => &SAML_BINDINGS_3_4_5_2_A,
    }
}

/// Checks that the RelayState sent with the request came back unchanged.
///
/// Nothing is checked when no RelayState was sent.
///
/// # Errors
///
/// Returns `RelayStateMismatch` if the value is missing or differs.
pub fn verify_relay_state(ctx: &VerificationContext, received: Option<&str>) -> CheckResult {
    let Some(expected) = ctx.expected_relay_state() else {
        return Ok(());
    };
    if received == Some(expected) {
        return Ok(());
    }
    let message = match received {
        Some(actual) => format!("RelayState [{actual}] differs from the one sent [{expected}]."),
        None => format!("RelayState [{expected}] was sent but none came back."),
    };
    Err(ComplianceViolation::new(
        ViolationKind::RelayStateMismatch,
        relay_state_citation(ctx.binding()),
        message,
    ))
}

/// Checks that a signed message names its `Destination`.
///
/// A message is signed if it came with a detached Redirect signature or its
/// root carries an enveloped `Signature`. The rule can be switched off with
/// [`RulePolicy::require_signed_destination`](crate::RulePolicy).
///
/// # Errors
///
/// Returns `MissingRequiredAttribute` if a signed message has no
/// `Destination`.
pub fn verify_signed_destination(
    message: &ProtocolMessage,
    ctx: &VerificationContext,
) -> CheckResult {
    if !ctx.policy().require_signed_destination {
        return Ok(());
    }
    let root = message.root();
    let signed = message.signature_status() == SignatureStatus::VerifiedDetached
        || root.child("Signature").is_some();
    if !signed || root.optional_attribute("Destination").is_some() {
        return Ok(());
    }
    Err(ComplianceViolation::new(
        ViolationKind::MissingRequiredAttribute,
        destination_citation(ctx.binding()),
        format!("The signed {} has no Destination attribute.", message.kind()),
    )
    .at(&message.root_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RulePolicy;
    use ctk_saml::{MessageParser, XmlMessageParser};

    fn parse(xml: &str) -> ProtocolMessage {
        XmlMessageParser::default().parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn relay_state_must_be_echoed() {
        let ctx = VerificationContext::new("sp")
            .with_relay_state("state-1")
            .with_binding(SamlBinding::HttpPost);
        assert!(verify_relay_state(&ctx, Some("state-1")).is_ok());

        let changed = verify_relay_state(&ctx, Some("state-2")).unwrap_err();
        assert_eq!(changed.kind(), ViolationKind::RelayStateMismatch);
        assert!(changed.cites(&SAML_BINDINGS_3_5_3_A));

        let dropped = verify_relay_state(&ctx, None).unwrap_err();
        assert!(dropped.message().contains("none came back"));
    }

    #[test]
    fn relay_state_not_sent_is_not_checked() {
        let ctx = VerificationContext::new("sp");
        assert!(verify_relay_state(&ctx, Some("anything")).is_ok());
        assert!(verify_relay_state(&ctx, None).is_ok());
    }

    #[test]
    fn signed_redirect_message_needs_destination() {
        let ctx = VerificationContext::new("sp").with_binding(SamlBinding::HttpRedirect);
        let message = parse(r#"<LogoutResponse ID="_r"/>"#);
        assert!(verify_signed_destination(&message, &ctx).is_ok());

        let signed = message.with_detached_signature();
        let violation = verify_signed_destination(&signed, &ctx).unwrap_err();
        assert!(violation.cites(&SAML_BINDINGS_3_4_5_2_A));

        let relaxed = ctx.with_policy(RulePolicy {
            require_signed_destination: false,
            ..RulePolicy::default()
        });
        assert!(verify_signed_destination(&signed, &relaxed).is_ok());
    }

    #[test]
    fn destination_present_passes() {
        let ctx = VerificationContext::new("sp");
        let signed = parse(r#"<LogoutResponse ID="_r" Destination="https://sp.example.org/slo"/>"#)
            .with_detached_signature();
        assert!(verify_signed_destination(&signed, &ctx).is_ok());
    }
}
