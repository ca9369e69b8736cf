//! SAML error types.
//!
//! Errors raised while moving SAML messages on and off the wire: binding
//! decoding, XML parsing, signature checks and metadata lookups. Compliance
//! findings are not errors at this layer; they live in the verification
//! engine.

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML wire-layer errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// The binding envelope did not carry a usable SAML message.
    #[error("invalid binding message: {0}")]
    InvalidMessage(String),

    /// XML parsing error (malformed document).
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XML or query-string signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// Signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// A signed subtree could not be canonicalized.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Unknown or unsupported binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression or decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Metadata could not be read or did not describe a usable entity.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Unknown service provider.
    #[error("unknown service provider: {0}")]
    UnknownServiceProvider(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl SamlError {
    /// Returns true if this error means the document itself is malformed,
    /// as opposed to a signature or transport-side problem.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage(_)
                | Self::XmlParse(_)
                | Self::MissingElement(_)
                | Self::Base64Decode(_)
                | Self::Deflate(_)
        )
    }

    /// Returns true if this error is a failed signature check.
    #[must_use]
    pub const fn is_signature_failure(&self) -> bool {
        matches!(self, Self::SignatureInvalid(_))
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<ctk_crypto::SignatureError> for SamlError {
    fn from(err: ctk_crypto::SignatureError) -> Self {
        Self::Crypto(err.to_string())
    }
}
