//! Signing and signature validation for SAML messages.
//!
//! Two signature shapes exist on the wire:
//!
//! - **Detached** - HTTP-Redirect messages are signed over the query string
//!   (`SAMLRequest=..&RelayState=..&SigAlg=..`); see [`RedirectSigner`] and
//!   [`RedirectSignatureValidator`].
//! - **Embedded** - POST messages and assertions carry an enveloped
//!   `<ds:Signature>`; see [`XmlSigner`] and [`XmlSignatureValidator`].
//!   Digests and `SignedInfo` are computed over the raw document with
//!   exclusive or inclusive C14N, see [`canonicalize`].
//!
//! Only RSA PKCS#1 v1.5 is supported. `rsa-sha1` is accepted when verifying
//! and refused when signing.

mod c14n;
mod query;
mod signer;
mod validator;

pub use c14n::{canonicalize, Apex, Canonicalization};
pub use query::{RedirectSignatureValidator, RedirectSigner, SignedQuery};
pub use signer::XmlSigner;
pub use validator::{ReferenceTransforms, XmlSignature, XmlSignatureValidator};

use base64::Engine;
use ctk_crypto::RsaAlgorithm;

use crate::error::{SamlError, SamlResult};

/// Private key material used to sign outbound messages.
#[derive(Clone)]
pub struct SigningKey {
    der: Vec<u8>,
    algorithm: RsaAlgorithm,
}

impl SigningKey {
    /// Wraps a DER private key (PKCS#1 or PKCS#8).
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm cannot be used for signing.
    pub fn new(der: Vec<u8>, algorithm: RsaAlgorithm) -> SamlResult<Self> {
        if !algorithm.can_sign() {
            return Err(SamlError::SignatureCreation(format!(
                "{} may only be used for verification",
                algorithm.xml_dsig_uri()
            )));
        }
        Ok(Self { der, algorithm })
    }

    /// Reads a PEM private key (`PRIVATE KEY` or `RSA PRIVATE KEY`).
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM block is missing or not base64.
    pub fn from_pem(pem: &str, algorithm: RsaAlgorithm) -> SamlResult<Self> {
        let der = pem_to_der(pem, "PRIVATE KEY")
            .or_else(|| pem_to_der(pem, "RSA PRIVATE KEY"))
            .ok_or_else(|| SamlError::Crypto("invalid private key PEM".to_string()))?;
        Self::new(der, algorithm)
    }

    /// Signature algorithm this key signs with.
    #[must_use]
    pub const fn algorithm(&self) -> RsaAlgorithm {
        self.algorithm
    }

    pub(crate) fn sign(&self, data: &[u8]) -> SamlResult<Vec<u8>> {
        ctk_crypto::rsa_sign(&self.der, data, self.algorithm)
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// A trusted public key, taken from an X.509 certificate, a
/// `SubjectPublicKeyInfo` or a bare PKCS#1 `RSAPublicKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    public_key: Vec<u8>,
}

impl VerificationKey {
    /// Builds a key from DER bytes in any of the accepted shapes.
    #[must_use]
    pub fn from_der(der_or_raw: &[u8]) -> Self {
        use x509_parser::prelude::FromDer;

        if let Ok((_, cert)) = x509_parser::parse_x509_certificate(der_or_raw) {
            return Self {
                public_key: cert.tbs_certificate.subject_pki.subject_public_key.data.to_vec(),
            };
        }
        if let Ok((_, spki)) = x509_parser::x509::SubjectPublicKeyInfo::from_der(der_or_raw) {
            return Self {
                public_key: spki.subject_public_key.data.to_vec(),
            };
        }
        Self {
            public_key: der_or_raw.to_vec(),
        }
    }

    /// Reads a PEM `CERTIFICATE`, `PUBLIC KEY` or `RSA PUBLIC KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if no recognised PEM block is found.
    pub fn from_pem(pem: &str) -> SamlResult<Self> {
        ["CERTIFICATE", "PUBLIC KEY", "RSA PUBLIC KEY"]
            .iter()
            .find_map(|label| pem_to_der(pem, label))
            .map(|der| Self::from_der(&der))
            .ok_or_else(|| SamlError::Crypto("invalid certificate PEM".to_string()))
    }

    /// Reads a base64 `ds:X509Certificate` or metadata certificate value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not base64.
    pub fn from_base64(value: &str) -> SamlResult<Self> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD.decode(compact)?;
        Ok(Self::from_der(&der))
    }

    /// Checks `sig` over `data`. A well-formed but wrong signature is
    /// `Ok(false)`.
    pub(crate) fn verify(&self, data: &[u8], sig: &[u8], algorithm: RsaAlgorithm) -> bool {
        ctk_crypto::rsa_verify(&self.public_key, data, sig, algorithm).unwrap_or(false)
    }
}

/// Extracts DER data from a PEM block with the given label.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem[start..].find(&end)? + start;

    let b64: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD.decode(b64).ok()
}

/// Wraps DER bytes in a PEM block.
#[must_use]
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {label}-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}
