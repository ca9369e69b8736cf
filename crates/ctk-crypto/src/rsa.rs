//! RSA PKCS#1 v1.5 signatures.
//!
//! SAML deployments sign with `rsa-sha256` almost universally and still
//! verify `rsa-sha1`, so both are supported here even though neither would
//! be chosen for a new protocol.

use aws_lc_rs::{
    encoding::AsDer,
    rand::SystemRandom,
    rsa::KeySize,
    signature::{self, KeyPair, RsaKeyPair, UnparsedPublicKey},
};

use crate::error::SignatureError;

/// RSA signature algorithms used by the SAML bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RsaAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-1 (verification only).
    Rs1,
    /// RSA PKCS#1 v1.5 with SHA-256.
    Rs256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    Rs384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    Rs512,
}

impl RsaAlgorithm {
    /// Returns the XML-DSig algorithm URI.
    #[must_use]
    pub const fn xml_dsig_uri(self) -> &'static str {
        match self {
            Self::Rs1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::Rs256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::Rs384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::Rs512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }

    /// Returns true if this algorithm may be used to create signatures.
    #[must_use]
    pub const fn can_sign(self) -> bool {
        !matches!(self, Self::Rs1)
    }
}

/// A freshly generated RSA key pair in DER form.
#[derive(Clone)]
pub struct RsaKeyMaterial {
    /// PKCS#8 v1 encoded private key.
    pub private_key_pkcs8: Vec<u8>,
    /// PKCS#1 `RSAPublicKey` encoded public key.
    pub public_key_der: Vec<u8>,
}

impl std::fmt::Debug for RsaKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyMaterial")
            .field("private_key_pkcs8", &"[redacted]")
            .field("public_key_der", &self.public_key_der.len())
            .finish()
    }
}

/// Generates a 2048-bit RSA key pair.
///
/// Used for the synthetic Service Providers the kit impersonates; they never
/// sign anything outside a conformance run.
///
/// # Errors
///
/// Returns an error if key generation or encoding fails.
pub fn generate_rsa_key() -> Result<RsaKeyMaterial, SignatureError> {
    let key_pair = RsaKeyPair::generate(KeySize::Rsa2048)
        .map_err(|e| SignatureError::KeyGeneration(format!("RSA generation failed: {e}")))?;

    let pkcs8 = key_pair
        .as_der()
        .map_err(|e| SignatureError::KeyGeneration(format!("PKCS#8 encoding failed: {e}")))?;

    Ok(RsaKeyMaterial {
        private_key_pkcs8: pkcs8.as_ref().to_vec(),
        public_key_der: key_pair.public_key().as_ref().to_vec(),
    })
}

/// Signs data using RSA PKCS#1 v1.5.
///
/// # Arguments
///
/// * `key_der` - RSA private key in DER format (PKCS#1 or PKCS#8)
/// * `data` - Data to sign
/// * `algorithm` - Signature algorithm
///
/// # Errors
///
/// Returns an error if the key is invalid, the algorithm cannot sign, or
/// signing fails.
pub fn rsa_sign(
    key_der: &[u8],
    data: &[u8],
    algorithm: RsaAlgorithm,
) -> Result<Vec<u8>, SignatureError> {
    let padding = match algorithm {
        RsaAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
        RsaAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
        RsaAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
        RsaAlgorithm::Rs1 => {
            return Err(SignatureError::UnsupportedAlgorithm(
                "rsa-sha1 signatures can only be verified".to_string(),
            ));
        }
    };

    let key_pair = RsaKeyPair::from_der(key_der)
        .or_else(|_| RsaKeyPair::from_pkcs8(key_der))
        .map_err(|e| SignatureError::InvalidKey(format!("Invalid RSA key: {e}")))?;

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public_modulus_len()];

    key_pair
        .sign(padding, &rng, data, &mut sig)
        .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(sig)
}

/// Verifies an RSA PKCS#1 v1.5 signature.
///
/// `public_key_der` may be a PKCS#1 `RSAPublicKey` or an X.509
/// `SubjectPublicKeyInfo`. A well-formed but wrong signature yields
/// `Ok(false)`.
///
/// # Errors
///
/// This function currently never fails; the `Result` leaves room for key
/// formats that need parsing up front.
pub fn rsa_verify(
    public_key_der: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: RsaAlgorithm,
) -> Result<bool, SignatureError> {
    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        RsaAlgorithm::Rs1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        RsaAlgorithm::Rs256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::Rs384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::Rs512 => &signature::RSA_PKCS1_2048_8192_SHA512,
    };

    let public_key = UnparsedPublicKey::new(verification_alg, public_key_der);

    Ok(public_key.verify(data, sig).is_ok())
}
