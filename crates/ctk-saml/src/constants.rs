//! SAML 2.0 URIs used on the wire.
//!
//! Namespaces, binding URIs, NameID formats, status codes and the algorithm
//! URIs that can appear in a `SigAlg` query parameter or a `ds:SignedInfo`.

use ctk_crypto::{DigestAlgorithm, RsaAlgorithm};
use serde::{Deserialize, Serialize};

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 2.0 metadata namespace URI.
pub const MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// SAML protocol version carried in every `Version` attribute.
pub const SAML_VERSION: &str = "2.0";

// ============================================================================
// Bindings
// ============================================================================

/// SAML bindings the kit knows about.
///
/// Only Redirect and POST are driven by scenarios; the other two are
/// recognized so that metadata listing them parses cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP-Redirect binding (Bindings §3.4).
    HttpRedirect,
    /// HTTP-POST binding (Bindings §3.5).
    HttpPost,
    /// HTTP-Artifact binding.
    HttpArtifact,
    /// SOAP binding.
    Soap,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::HttpRedirect, Self::HttpPost, Self::HttpArtifact, Self::Soap]
            .into_iter()
            .find(|b| b.uri() == uri)
    }

    /// Short lowercase name used in configuration and reports.
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::HttpRedirect => "redirect",
            Self::HttpPost => "post",
            Self::HttpArtifact => "artifact",
            Self::Soap => "soap",
        }
    }
}

impl std::fmt::Display for SamlBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

// ============================================================================
// NameID formats
// ============================================================================

/// NameID formats (Core §8.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameIdFormat {
    /// Unspecified.
    #[default]
    Unspecified,
    /// Email address.
    Email,
    /// Persistent identifier.
    Persistent,
    /// Transient identifier.
    Transient,
    /// Entity identifier.
    Entity,
    /// Encrypted identifier; the IdP must answer with `EncryptedID`.
    Encrypted,
}

impl NameIdFormat {
    /// Returns the URI for this format.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::Email => "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
            Self::Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
            Self::Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
            Self::Entity => "urn:oasis:names:tc:SAML:2.0:nameid-format:entity",
            Self::Encrypted => "urn:oasis:names:tc:SAML:2.0:nameid-format:encrypted",
        }
    }

    /// Parses a format from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [
            Self::Unspecified,
            Self::Email,
            Self::Persistent,
            Self::Transient,
            Self::Entity,
            Self::Encrypted,
        ]
        .into_iter()
        .find(|f| f.uri() == uri)
    }
}

/// Subject confirmation method used by the Web Browser SSO profile.
pub const CM_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

// ============================================================================
// Status codes
// ============================================================================

/// Top-level status codes (Core §3.2.2.2).
pub mod status_codes {
    /// Success.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";
    /// Requester error.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";
    /// Responder error.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";
    /// Version mismatch.
    pub const VERSION_MISMATCH: &str = "urn:oasis:names:tc:SAML:2.0:status:VersionMismatch";

    /// All codes permitted at the top level.
    pub const TOP_LEVEL: [&str; 4] = [SUCCESS, REQUESTER, RESPONDER, VERSION_MISMATCH];
}

/// Second-level status codes the kit inspects.
pub mod sub_status_codes {
    /// Authentication failed.
    pub const AUTHN_FAILED: &str = "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed";
    /// The requested NameID policy cannot be satisfied.
    pub const INVALID_NAMEID_POLICY: &str = "urn:oasis:names:tc:SAML:2.0:status:InvalidNameIDPolicy";
    /// Not every session participant could be logged out.
    pub const PARTIAL_LOGOUT: &str = "urn:oasis:names:tc:SAML:2.0:status:PartialLogout";
    /// The request was refused.
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";
    /// The principal is unknown.
    pub const UNKNOWN_PRINCIPAL: &str = "urn:oasis:names:tc:SAML:2.0:status:UnknownPrincipal";
}

// ============================================================================
// Algorithms
// ============================================================================

/// Maps a signature algorithm URI to the RSA algorithm that verifies it.
#[must_use]
pub fn rsa_algorithm_from_uri(uri: &str) -> Option<RsaAlgorithm> {
    [
        RsaAlgorithm::Rs1,
        RsaAlgorithm::Rs256,
        RsaAlgorithm::Rs384,
        RsaAlgorithm::Rs512,
    ]
    .into_iter()
    .find(|alg| alg.xml_dsig_uri() == uri)
}

/// Maps a `ds:DigestMethod` URI to a digest algorithm.
#[must_use]
pub fn digest_algorithm_from_uri(uri: &str) -> Option<DigestAlgorithm> {
    match uri {
        "http://www.w3.org/2000/09/xmldsig#sha1" => Some(DigestAlgorithm::Sha1),
        "http://www.w3.org/2001/04/xmlenc#sha256" => Some(DigestAlgorithm::Sha256),
        "http://www.w3.org/2001/04/xmldsig-more#sha384" => Some(DigestAlgorithm::Sha384),
        "http://www.w3.org/2001/04/xmlenc#sha512" => Some(DigestAlgorithm::Sha512),
        _ => None,
    }
}
