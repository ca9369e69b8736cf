//! Binding envelopes on the wire: encoding what the kit sends and
//! decoding and signature-checking what the identity provider sends back.

use ctk_saml::bindings::{DecodedMessage, HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use ctk_saml::document::SignatureStatus;
use ctk_saml::signature::{RedirectSignatureValidator, VerificationKey, XmlSignatureValidator};
use ctk_saml::{MessageParser, ProtocolMessage, SamlBinding, XmlMessageParser};

use crate::error::{ScenarioError, ScenarioResult};
use crate::participants::ServiceProvider;
use crate::transport::{HttpExchange, OutboundRequest};

/// Works out which binding an HTTP response uses: a redirect whose Location
/// carries `SAMLRequest`/`SAMLResponse` is HTTP-Redirect, a page with a form
/// carrying one of them is HTTP-POST.
#[must_use]
pub fn determine_binding(exchange: &HttpExchange) -> Option<SamlBinding> {
    if exchange.is_redirect() {
        let location = exchange.location.as_deref().unwrap_or_default();
        let carries_saml = location
            .split_once('?')
            .map(|(_, query)| query)
            .unwrap_or_default()
            .split('&')
            .filter_map(|pair| pair.split('=').next())
            .any(|name| SamlMessageType::from_param(name).is_some());
        return carries_saml.then_some(SamlBinding::HttpRedirect);
    }
    HttpPostBinding::extract_form(&exchange.body)
        .ok()
        .filter(|form| form.carries_saml())
        .map(|_| SamlBinding::HttpPost)
}

/// Encodes and signs a message the kit sends on behalf of `sp`.
///
/// Redirect messages carry a detached signature over the query string; POST
/// messages carry an enveloped signature over the element with ID `id`.
///
/// # Errors
///
/// Returns an error if signing fails or the binding is not Redirect or POST.
pub fn encode_outbound(
    sp: &ServiceProvider,
    binding: SamlBinding,
    xml: &str,
    id: &str,
    destination: &str,
    relay_state: Option<&str>,
    message_type: SamlMessageType,
) -> ScenarioResult<OutboundRequest> {
    match binding {
        SamlBinding::HttpRedirect => {
            let url = HttpRedirectBinding::encode_signed(
                xml,
                destination,
                relay_state,
                message_type,
                &sp.redirect_signer(),
            )?;
            Ok(OutboundRequest::Get { url })
        }
        SamlBinding::HttpPost => {
            let signed = sp.xml_signer().sign(xml, id)?;
            Ok(OutboundRequest::PostForm {
                url: destination.to_string(),
                fields: HttpPostBinding::form_fields(&signed, relay_state, message_type),
            })
        }
        other => Err(ScenarioError::Configuration(format!(
            "the {} binding is not supported",
            other.short_name()
        ))),
    }
}

/// A message the identity provider sent, decoded and signature-checked.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// The parsed document.
    pub message: ProtocolMessage,
    /// Binding it arrived with.
    pub binding: SamlBinding,
    /// Request or response parameter.
    pub message_type: SamlMessageType,
    /// `RelayState`, if any.
    pub relay_state: Option<String>,
    /// Where the IdP sent it: the absolute Location or form action.
    pub target: String,
}

impl ReceivedMessage {
    /// The `target` without query string or fragment.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.target
            .split(['?', '#'])
            .next()
            .unwrap_or(&self.target)
    }

    /// The document's `ID` attribute.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.message.root().optional_attribute("ID")
    }
}

/// Strips the binding envelope from IdP responses and checks signatures.
pub struct BindingVerifier {
    parser: XmlMessageParser,
    redirect: RedirectSignatureValidator,
    require_signature: bool,
}

impl std::fmt::Debug for BindingVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingVerifier")
            .field("require_signature", &self.require_signature)
            .finish_non_exhaustive()
    }
}

impl BindingVerifier {
    /// Trusts `keys` for both signature shapes. With `require_signature`,
    /// an unsigned message is rejected.
    #[must_use]
    pub fn new(keys: &[VerificationKey], require_signature: bool) -> Self {
        let parser = if keys.is_empty() {
            XmlMessageParser::default()
        } else {
            XmlMessageParser::default().with_validator(XmlSignatureValidator::from_keys(keys.to_vec()))
        };
        Self {
            parser,
            redirect: RedirectSignatureValidator::new(keys.to_vec()),
            require_signature,
        }
    }

    /// Decodes the SAML message in `exchange`, verifies its detached or
    /// embedded signature and parses it.
    ///
    /// # Errors
    ///
    /// - [`ScenarioError::UnexpectedResponse`] when the response carries no
    ///   SAML message
    /// - [`ScenarioError::SignatureInvalid`] when a signature fails, or none
    ///   is present and one is required
    /// - [`ScenarioError::Malformed`] when the envelope or XML is broken
    pub fn decode_and_verify(&self, exchange: &HttpExchange) -> ScenarioResult<ReceivedMessage> {
        let binding = determine_binding(exchange).ok_or_else(|| {
            ScenarioError::UnexpectedResponse(format!(
                "HTTP {} from {} carries no SAML message",
                exchange.status, exchange.url
            ))
        })?;

        let (decoded, target) = self.open_envelope(exchange, binding)?;
        tracing::debug!(
            binding = binding.short_name(),
            parameter = decoded.message_type.form_param(),
            %target,
            "decoded message envelope"
        );

        let detached = match decoded.raw_query.as_deref() {
            Some(raw) if decoded.has_detached_signature() => {
                self.redirect.verify_raw_query(raw)?;
                true
            }
            _ => false,
        };

        let mut message = self.parser.parse(decoded.xml.as_bytes())?;
        if detached {
            message = message.with_detached_signature();
        }
        if self.require_signature && message.signature_status() == SignatureStatus::Unsigned {
            return Err(ScenarioError::SignatureInvalid(format!(
                "{} from the identity provider is not signed",
                message.kind()
            )));
        }
        tracing::info!(
            kind = message.kind(),
            binding = binding.short_name(),
            signature = ?message.signature_status(),
            "received message"
        );

        Ok(ReceivedMessage {
            message,
            binding,
            message_type: decoded.message_type,
            relay_state: decoded.relay_state,
            target,
        })
    }

    fn open_envelope(
        &self,
        exchange: &HttpExchange,
        binding: SamlBinding,
    ) -> ScenarioResult<(DecodedMessage, String)> {
        let unresolvable =
            |e: url::ParseError| ScenarioError::UnexpectedResponse(format!("bad target URL: {e}"));
        match binding {
            SamlBinding::HttpRedirect => {
                let location = exchange.location.as_deref().unwrap_or_default();
                let target = exchange.resolve(location).map_err(unresolvable)?;
                Ok((HttpRedirectBinding::decode_url(&target)?, target))
            }
            _ => {
                let form = HttpPostBinding::extract_form(&exchange.body)?;
                let target = exchange.resolve(&form.action).map_err(unresolvable)?;
                Ok((form.decode()?, target))
            }
        }
    }
}
