//! Detached query-string signatures for the HTTP-Redirect binding
//! (Bindings §3.4.4.1).
//!
//! The signed octets are `SAMLRequest=value&RelayState=value&SigAlg=value`
//! (or `SAMLResponse=...`), with `RelayState` omitted when absent and each
//! value exactly as URL-encoded on the wire. Verification therefore works on
//! the raw query string and never re-encodes decoded values.

use base64::Engine;

use super::{SigningKey, VerificationKey};
use crate::bindings::SamlMessageType;
use crate::constants::rsa_algorithm_from_uri;
use crate::error::{SamlError, SamlResult};

/// Output of [`RedirectSigner::sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedQuery {
    /// The octets the signature covers.
    pub signed_content: String,
    /// Base64 signature value (not yet URL-encoded).
    pub signature: String,
    /// `SigAlg` URI.
    pub sig_alg: &'static str,
}

impl SignedQuery {
    /// Full query string including the trailing `Signature` parameter.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        format!(
            "{}&Signature={}",
            self.signed_content,
            urlencoding::encode(&self.signature)
        )
    }
}

/// Signs Redirect-bound messages.
#[derive(Debug, Clone)]
pub struct RedirectSigner {
    key: SigningKey,
}

impl RedirectSigner {
    /// Creates a signer for the given key.
    #[must_use]
    pub const fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Signs an already deflated and base64-encoded message.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(
        &self,
        message_type: SamlMessageType,
        encoded_message: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<SignedQuery> {
        let sig_alg = self.key.algorithm().xml_dsig_uri();
        let signed_content = canonical_query(
            message_type.form_param(),
            &urlencoding::encode(encoded_message),
            relay_state.map(urlencoding::encode).as_deref(),
            &urlencoding::encode(sig_alg),
        );

        let signature = self.key.sign(signed_content.as_bytes())?;

        Ok(SignedQuery {
            signed_content,
            signature: base64::engine::general_purpose::STANDARD.encode(signature),
            sig_alg,
        })
    }
}

fn canonical_query(param: &str, message: &str, relay_state: Option<&str>, sig_alg: &str) -> String {
    let mut out = format!("{param}={message}");
    if let Some(rs) = relay_state {
        out.push_str("&RelayState=");
        out.push_str(rs);
    }
    out.push_str("&SigAlg=");
    out.push_str(sig_alg);
    out
}

/// Raw query parameters relevant to signature verification.
struct RawParams<'a> {
    message: (&'a str, &'a str),
    relay_state: Option<&'a str>,
    sig_alg: Option<&'a str>,
    signature: Option<&'a str>,
}

impl<'a> RawParams<'a> {
    fn split(raw_query: &'a str) -> SamlResult<Self> {
        let mut message = None;
        let mut relay_state = None;
        let mut sig_alg = None;
        let mut signature = None;

        for pair in raw_query.trim_start_matches('?').split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let slot = match key {
                "SAMLRequest" | "SAMLResponse" => {
                    if message.replace((key, value)).is_some() {
                        return Err(SamlError::SignatureInvalid(
                            "more than one SAML message parameter".to_string(),
                        ));
                    }
                    continue;
                }
                "RelayState" => &mut relay_state,
                "SigAlg" => &mut sig_alg,
                "Signature" => &mut signature,
                _ => continue,
            };
            if slot.replace(value).is_some() {
                return Err(SamlError::SignatureInvalid(format!("duplicate {key} parameter")));
            }
        }

        let message = message.ok_or_else(|| {
            SamlError::SignatureInvalid("no SAMLRequest or SAMLResponse parameter".to_string())
        })?;

        Ok(Self {
            message,
            relay_state,
            sig_alg,
            signature,
        })
    }
}

/// Verifies detached Redirect-binding signatures.
#[derive(Debug, Clone, Default)]
pub struct RedirectSignatureValidator {
    trusted_keys: Vec<VerificationKey>,
}

impl RedirectSignatureValidator {
    /// Creates a validator trusting the given keys.
    #[must_use]
    pub fn new(trusted_keys: Vec<VerificationKey>) -> Self {
        Self { trusted_keys }
    }

    /// Rebuilds the signed octets from a raw query string.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid` if the query has no message parameter or no
    /// `SigAlg`.
    pub fn signed_content(raw_query: &str) -> SamlResult<String> {
        let params = RawParams::split(raw_query)?;
        let sig_alg = params
            .sig_alg
            .ok_or_else(|| SamlError::SignatureInvalid("missing SigAlg parameter".to_string()))?;
        Ok(canonical_query(
            params.message.0,
            params.message.1,
            params.relay_state,
            sig_alg,
        ))
    }

    /// Verifies the signature carried in a raw (still URL-encoded) query
    /// string against any trusted key.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid` if the signature or algorithm is missing,
    /// unsupported, malformed, or does not verify.
    pub fn verify_raw_query(&self, raw_query: &str) -> SamlResult<()> {
        let params = RawParams::split(raw_query)?;

        let raw_sig_alg = params
            .sig_alg
            .ok_or_else(|| SamlError::SignatureInvalid("missing SigAlg parameter".to_string()))?;
        let raw_signature = params
            .signature
            .ok_or_else(|| SamlError::SignatureInvalid("missing Signature parameter".to_string()))?;

        let sig_alg = form_decode(raw_sig_alg)?;
        let algorithm = rsa_algorithm_from_uri(&sig_alg).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("unsupported SigAlg {sig_alg}"))
        })?;

        let signature = base64::engine::general_purpose::STANDARD
            .decode(form_decode(raw_signature)?)
            .map_err(|e| SamlError::SignatureInvalid(format!("signature is not base64: {e}")))?;

        if self.trusted_keys.is_empty() {
            return Err(SamlError::SignatureInvalid(
                "no trusted key configured".to_string(),
            ));
        }

        let signed = canonical_query(
            params.message.0,
            params.message.1,
            params.relay_state,
            raw_sig_alg,
        );

        if self
            .trusted_keys
            .iter()
            .any(|key| key.verify(signed.as_bytes(), &signature, algorithm))
        {
            Ok(())
        } else {
            Err(SamlError::SignatureInvalid(
                "query signature does not verify with any trusted key".to_string(),
            ))
        }
    }
}

/// Decodes a form-urlencoded value (`+` is a space).
fn form_decode(raw: &str) -> SamlResult<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| SamlError::SignatureInvalid(format!("bad URL encoding: {e}")))
}
