//! SAML binding envelopes.
//!
//! - **HTTP-Redirect** - deflated, base64-encoded and URL-encoded into the
//!   query string, optionally signed over the query string itself
//! - **HTTP-POST** - base64-encoded into a hidden field of an auto-submitting
//!   HTML form
//!
//! Both directions are needed: the kit encodes its own synthetic requests and
//! decodes whatever the system under test sends back.

mod post;
mod redirect;

pub use post::{HttpPostBinding, PostForm};
pub use redirect::HttpRedirectBinding;

/// Which parameter a SAML message travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// `SAMLRequest` (AuthnRequest, LogoutRequest).
    Request,
    /// `SAMLResponse` (Response, LogoutResponse).
    Response,
}

impl SamlMessageType {
    /// Returns the form or query parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }

    /// Parses a parameter name.
    #[must_use]
    pub fn from_param(name: &str) -> Option<Self> {
        match name {
            "SAMLRequest" => Some(Self::Request),
            "SAMLResponse" => Some(Self::Response),
            _ => None,
        }
    }
}

/// A SAML message with its binding envelope removed.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML.
    pub xml: String,
    /// Request or response parameter.
    pub message_type: SamlMessageType,
    /// `RelayState`, decoded.
    pub relay_state: Option<String>,
    /// `Signature` query parameter (Redirect only), decoded.
    pub signature: Option<String>,
    /// `SigAlg` query parameter (Redirect only), decoded.
    pub sig_alg: Option<String>,
    /// Raw, still-encoded query string the message arrived in (Redirect only).
    pub raw_query: Option<String>,
}

impl DecodedMessage {
    /// Returns true if the envelope carried a detached signature.
    #[must_use]
    pub fn has_detached_signature(&self) -> bool {
        self.signature.is_some() && self.sig_alg.is_some()
    }
}
