//! Authentication Request protocol (Core §3.4, Profiles §4.1).

use ctk_saml::ProtocolMessage;

use super::pipeline::{Pipeline, Stage};
use super::response::ResponseVerifier;
use super::{require_root, ProtocolVerifier};
use crate::binding::verify_signed_destination;
use crate::citation::{
    SAML_CORE_3_4_1_4_A, SAML_CORE_3_4_1_4_C, SAML_CORE_3_4_1_4_D, SAML_CORE_3_4_1_A,
    SAML_CORE_3_4_A, SAML_PROFILES_4_1_4_2_A, SAML_PROFILES_4_1_4_2_B,
};
use crate::context::VerificationContext;
use crate::elements::{AssertionVerifier, ElementVerifier, IssuerVerifier, NameIdPolicyVerifier};
use crate::navigation::{children, located_children, recursive_children};
use crate::violation::{ComplianceViolation, VerificationFailure, ViolationKind};

/// Verifies the `Response` an identity provider returns to an
/// `AuthnRequest`, and the ACS it was delivered to.
#[derive(Debug)]
pub struct CoreAuthnRequestProtocolVerifier {
    pipeline: Pipeline,
}

impl Default for CoreAuthnRequestProtocolVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreAuthnRequestProtocolVerifier {
    /// Builds the verifier.
    #[must_use]
    pub fn new() -> Self {
        let pipeline = Pipeline::new("authn-request").stage(
            Stage::Core,
            "response-with-assertion",
            |message, _| response_with_assertion(message).map(|()| Vec::new()),
        );
        let issuer =
            IssuerVerifier::new(&SAML_PROFILES_4_1_4_2_A, &SAML_PROFILES_4_1_4_2_B).optional();
        let pipeline = ResponseVerifier::new(issuer)
            .stages(pipeline)
            .stage(Stage::Core, "authn-statement", |message, _| {
                Ok(authn_statement_present(message).err().into_iter().collect())
            })
            .stage(Stage::Core, "audience", |message, ctx| {
                Ok(audience_restrictions(message, ctx))
            })
            .stage(Stage::Core, "assertions", |message, ctx| {
                let at = message.root_path();
                Ok(located_children(message.root(), "Assertion", &at)
                    .into_iter()
                    .flat_map(|(path, assertion)| AssertionVerifier.verify(assertion, &path, ctx))
                    .collect())
            })
            .stage(Stage::Core, "name-id-policy", |message, ctx| {
                Ok(name_id_policy(ctx).map_or_else(Vec::new, |verifier| {
                    verifier.verify(message.root(), &message.root_path(), ctx)
                }))
            })
            .stage(Stage::Binding, "signed-destination", |message, ctx| {
                Ok(verify_signed_destination(message, ctx).err().into_iter().collect())
            })
            .stage(Stage::EncryptedElements, "encrypted-ids", |message, ctx| {
                Ok(name_id_policy(ctx).map_or_else(Vec::new, |verifier| {
                    verifier.verify_encrypted_ids(message.root(), &message.root_path())
                }))
            });
        Self { pipeline }
    }

    /// Checks that the redirect target actually used is the ACS the original
    /// request asked for.
    ///
    /// The expected URL is resolved from the Service Provider's metadata
    /// when the context has it, otherwise taken from the request's explicit
    /// `AssertionConsumerServiceURL`. Query and fragment of `location` are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `AcsMismatch` if `location` is missing, no expected ACS can be
    /// resolved, or the two differ.
    pub fn verify_assertion_consumer_service(
        &self,
        location: Option<&str>,
        ctx: &VerificationContext,
    ) -> Result<(), VerificationFailure> {
        let mismatch = |message: String| {
            ComplianceViolation::new(ViolationKind::AcsMismatch, &SAML_CORE_3_4_1_A, message)
        };

        let expected = expected_acs(ctx).ok_or_else(|| {
            mismatch("No expected AssertionConsumerService could be resolved.".to_string())
        })?;
        let Some(location) = location else {
            return Err(mismatch(format!(
                "No redirect target was received; expected [{expected}]."
            ))
            .into());
        };

        let actual = location.split(['?', '#']).next().unwrap_or(location);
        if actual == expected {
            tracing::debug!(acs = %actual, "assertion consumer service matches");
            Ok(())
        } else {
            Err(mismatch(format!(
                "The response was delivered to [{actual}], expected [{expected}]."
            ))
            .into())
        }
    }
}

impl ProtocolVerifier for CoreAuthnRequestProtocolVerifier {
    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

fn expected_acs(ctx: &VerificationContext) -> Option<&str> {
    let request = ctx.request();
    let (url, binding, index) = request.map_or((None, None, None), |r| {
        (r.acs_url.as_deref(), r.protocol_binding, r.acs_index)
    });
    match ctx.service_provider() {
        Some(sp) => sp
            .assertion_consumer_service(url, binding, index)
            .map(|endpoint| endpoint.location.as_str()),
        None => url,
    }
}

fn name_id_policy(ctx: &VerificationContext) -> Option<NameIdPolicyVerifier> {
    if !ctx.policy().enforce_name_id_policy {
        return None;
    }
    ctx.expected_name_id_policy()
        .cloned()
        .map(NameIdPolicyVerifier::new)
}

fn response_with_assertion(message: &ProtocolMessage) -> Result<(), ComplianceViolation> {
    require_root(message, "Response", &SAML_CORE_3_4_1_4_A)?;
    if children(message.root(), "Assertion").is_empty() {
        return Err(ComplianceViolation::new(
            ViolationKind::MissingRequiredElement,
            &SAML_CORE_3_4_1_4_A,
            "The Response contains no Assertion.",
        )
        .at(&message.root_path()));
    }
    Ok(())
}

fn authn_statement_present(message: &ProtocolMessage) -> Result<(), ComplianceViolation> {
    let found = children(message.root(), "Assertion")
        .into_iter()
        .any(|assertion| !children(assertion, "AuthnStatement").is_empty());
    if found {
        Ok(())
    } else {
        Err(ComplianceViolation::new(
            ViolationKind::MissingRequiredElement,
            &SAML_CORE_3_4_A,
            "AuthnStatement not found in any of the Assertions.",
        )
        .also(&SAML_CORE_3_4_1_4_C)
        .at(&message.root_path()))
    }
}

fn audience_restrictions(
    message: &ProtocolMessage,
    ctx: &VerificationContext,
) -> Vec<ComplianceViolation> {
    let expected = ctx.expected_audience();
    located_children(message.root(), "Assertion", &message.root_path())
        .into_iter()
        .filter(|(_, assertion)| {
            !recursive_children(assertion, "AudienceRestriction")
                .into_iter()
                .flat_map(|restriction| children(restriction, "Audience"))
                .any(|audience| audience.text() == expected)
        })
        .map(|(path, _)| {
            ComplianceViolation::new(
                ViolationKind::AudienceMismatch,
                &SAML_CORE_3_4_1_4_D,
                format!("The Assertion has no AudienceRestriction naming [{expected}]."),
            )
            .at(&path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::parse_utc;
    use crate::context::RulePolicy;
    use ctk_saml::messages::{AuthnRequest, NameIdPolicy};
    use ctk_saml::metadata::SpMetadata;
    use ctk_saml::{MessageParser, NameIdFormat, SamlBinding, XmlMessageParser};

    const SP: &str = "https://sp.example.org";
    const IDP: &str = "https://idp.example.org";

    fn assertion(audience: &str, with_statement: bool) -> String {
        let statement = if with_statement {
            r#"<AuthnStatement AuthnInstant="2024-06-01T11:59:00Z"><AuthnContext><AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:Password</AuthnContextClassRef></AuthnContext></AuthnStatement>"#
        } else {
            ""
        };
        format!(
            r#"<Assertion ID="_a{}" Version="2.0" IssueInstant="2024-06-01T12:00:00Z">
                 <Issuer>{IDP}</Issuer>
                 <Subject><NameID>alice</NameID>
                   <SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer">
                     <SubjectConfirmationData NotOnOrAfter="2024-06-01T12:05:00Z" Recipient="{SP}/acs" InResponseTo="_req"/>
                   </SubjectConfirmation>
                 </Subject>
                 <Conditions NotBefore="2024-06-01T11:59:00Z" NotOnOrAfter="2024-06-01T12:05:00Z">
                   <AudienceRestriction><Audience>{audience}</Audience></AudienceRestriction>
                 </Conditions>
                 {statement}
               </Assertion>"#,
            audience.len()
        )
    }

    fn response(assertions: &str) -> ProtocolMessage {
        let xml = format!(
            r#"<Response ID="_resp" Version="2.0" IssueInstant="2024-06-01T12:00:00Z" InResponseTo="_req" Destination="{SP}/acs">
                 <Issuer>{IDP}</Issuer>
                 <Status><StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></Status>
                 {assertions}
               </Response>"#
        );
        XmlMessageParser::default().parse(xml.as_bytes()).unwrap()
    }

    fn request() -> AuthnRequest {
        let mut request = AuthnRequest::new(SP).with_acs_url(format!("{SP}/acs"), SamlBinding::HttpPost);
        request.id = "_req".to_string();
        request
    }

    fn ctx() -> VerificationContext {
        VerificationContext::new(SP)
            .with_expected_issuer(IDP)
            .with_request(&request())
            .at_instant(parse_utc("2024-06-01T12:00:30Z").unwrap())
    }

    #[test]
    fn conforming_response_passes() {
        let verifier = CoreAuthnRequestProtocolVerifier::new();
        let result = verifier.verify(&response(&assertion(SP, true)), &ctx());
        assert!(result.is_ok(), "{}", result.unwrap_err());
    }

    #[test]
    fn response_without_assertion_is_structural() {
        let failure = CoreAuthnRequestProtocolVerifier::new()
            .verify(&response(""), &ctx())
            .unwrap_err();
        assert_eq!(failure.violations().len(), 1);
        assert_eq!(failure.first().kind(), ViolationKind::MissingRequiredElement);
        assert!(failure.cites(&SAML_CORE_3_4_1_4_A));
    }

    #[test]
    fn wrong_root_is_structural() {
        let message = XmlMessageParser::default()
            .parse(b"<LogoutResponse/>")
            .unwrap();
        let failure = CoreAuthnRequestProtocolVerifier::new()
            .verify(&message, &ctx())
            .unwrap_err();
        assert_eq!(failure.violations().len(), 1);
    }

    #[test]
    fn missing_authn_statement_cites_both_clauses() {
        let failure = CoreAuthnRequestProtocolVerifier::new()
            .verify(&response(&assertion(SP, false)), &ctx())
            .unwrap_err();
        assert_eq!(failure.violations().len(), 1);
        assert!(failure.first().cites(&SAML_CORE_3_4_A));
        assert!(failure.first().cites(&SAML_CORE_3_4_1_4_C));
    }

    #[test]
    fn one_character_audience_change_fails() {
        let tampered = SP.replace("sp.", "sq.");
        let failure = CoreAuthnRequestProtocolVerifier::new()
            .verify(&response(&assertion(&tampered, true)), &ctx())
            .unwrap_err();
        assert_eq!(failure.violations().len(), 1);
        assert_eq!(failure.first().kind(), ViolationKind::AudienceMismatch);
        assert_eq!(
            failure.first().node().unwrap().to_string(),
            "Response/Assertion[0]"
        );
    }

    #[test]
    fn any_nonconforming_assertion_fails_the_response() {
        let both = format!("{}{}", assertion(SP, true), assertion("https://x.example.org", true));
        let failure = CoreAuthnRequestProtocolVerifier::new()
            .verify(&response(&both), &ctx())
            .unwrap_err();
        assert!(failure.has_kind(ViolationKind::AudienceMismatch));
        assert_eq!(
            failure.first().node().unwrap().to_string(),
            "Response/Assertion[1]"
        );
    }

    #[test]
    fn verification_is_idempotent() {
        let verifier = CoreAuthnRequestProtocolVerifier::new();
        let message = response(&assertion("https://x.example.org", false));
        let context = ctx();
        assert_eq!(
            verifier.verify(&message, &context),
            verifier.verify(&message, &context)
        );
    }

    #[test]
    fn name_id_policy_is_a_toggle() {
        let mut request = request();
        request.name_id_policy = Some(NameIdPolicy::with_format(NameIdFormat::Persistent));
        let message = response(&assertion(SP, true));
        let verifier = CoreAuthnRequestProtocolVerifier::new();

        let lenient = ctx().with_request(&request);
        assert!(verifier.verify(&message, &lenient).is_ok());

        let strict = lenient.with_policy(RulePolicy {
            enforce_name_id_policy: true,
            ..RulePolicy::default()
        });
        let failure = verifier.verify(&message, &strict).unwrap_err();
        assert!(failure.has_kind(ViolationKind::NameIdPolicyMismatch));
    }

    #[test]
    fn acs_from_request_url() {
        let verifier = CoreAuthnRequestProtocolVerifier::new();
        assert!(verifier
            .verify_assertion_consumer_service(Some(&format!("{SP}/acs?x=1")), &ctx())
            .is_ok());

        let wrong = verifier
            .verify_assertion_consumer_service(Some("https://evil.example.org/acs"), &ctx())
            .unwrap_err();
        assert!(wrong.has_kind(ViolationKind::AcsMismatch));

        let missing = verifier
            .verify_assertion_consumer_service(None, &ctx())
            .unwrap_err();
        assert!(missing.cites(&SAML_CORE_3_4_1_A));
    }

    #[test]
    fn acs_from_metadata_index() {
        let metadata = SpMetadata::parse(
            &format!(
                r#"<EntityDescriptor entityID="{SP}"><SPSSODescriptor>
                     <AssertionConsumerService index="0" Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{SP}/acs/0"/>
                     <AssertionConsumerService index="1" Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{SP}/acs/1"/>
                   </SPSSODescriptor></EntityDescriptor>"#
            ),
            &[SamlBinding::HttpPost],
        )
        .unwrap();
        let mut request = AuthnRequest::new(SP).with_acs_index(1);
        request.id = "_req".to_string();
        let ctx = VerificationContext::new(SP)
            .with_request(&request)
            .with_service_provider(metadata.require(SP).unwrap().clone());

        let verifier = CoreAuthnRequestProtocolVerifier::new();
        assert!(verifier
            .verify_assertion_consumer_service(Some(&format!("{SP}/acs/1")), &ctx)
            .is_ok());
        assert!(verifier
            .verify_assertion_consumer_service(Some(&format!("{SP}/acs/0")), &ctx)
            .is_err());
    }
}
