//! HTTP-Redirect binding (Bindings §3.4).

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};
use crate::signature::RedirectSigner;

use super::{DecodedMessage, SamlMessageType};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes a request into a redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let query = Self::unsigned_query(xml, relay_state, SamlMessageType::Request)?;
        Ok(append_query(destination, &query))
    }

    /// Encodes a response into a redirect URL.
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let query = Self::unsigned_query(xml, relay_state, SamlMessageType::Response)?;
        Ok(append_query(destination, &query))
    }

    /// Encodes and signs a message into a redirect URL. The signature covers
    /// `SAMLRequest=..[&RelayState=..]&SigAlg=..` exactly as it appears in
    /// the URL.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or signing fails.
    pub fn encode_signed(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
        signer: &RedirectSigner,
    ) -> SamlResult<String> {
        let encoded = Self::deflate_and_encode(xml)?;
        let signed = signer.sign(message_type, &encoded, relay_state)?;
        Ok(append_query(destination, &signed.to_query_string()))
    }

    /// Deflates and base64-encodes a message (not yet URL-encoded).
    ///
    /// # Errors
    ///
    /// Returns an error if compression fails.
    pub fn deflate_and_encode(xml: &str) -> SamlResult<String> {
        let compressed = deflate_compress(xml.as_bytes())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
    }

    fn unsigned_query(
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let encoded = Self::deflate_and_encode(xml)?;
        let mut query = format!(
            "{}={}",
            message_type.form_param(),
            urlencoding::encode(&encoded)
        );
        if let Some(rs) = relay_state {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(rs));
        }
        Ok(query)
    }

    /// Decodes already URL-decoded query parameter values.
    ///
    /// # Errors
    ///
    /// Returns an error if neither message parameter is present, or if the
    /// value is not base64 of a raw DEFLATE stream of UTF-8 text.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
        signature: Option<&str>,
        sig_alg: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = match (saml_request, saml_response) {
            (Some(req), None) => (req, SamlMessageType::Request),
            (None, Some(resp)) => (resp, SamlMessageType::Response),
            (Some(_), Some(_)) => {
                return Err(SamlError::InvalidMessage(
                    "both SAMLRequest and SAMLResponse present".to_string(),
                ));
            }
            (None, None) => {
                return Err(SamlError::InvalidMessage(
                    "no SAMLRequest or SAMLResponse parameter".to_string(),
                ));
            }
        };

        let compressed = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        let xml_bytes = deflate_decompress(&compressed)?;
        let xml = String::from_utf8(xml_bytes)
            .map_err(|e| SamlError::InvalidMessage(format!("message is not UTF-8: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: signature.map(String::from),
            sig_alg: sig_alg.map(String::from),
            raw_query: None,
        })
    }

    /// Decodes a message from a full redirect URL, keeping the raw query for
    /// signature verification.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or carries no decodable message.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::InvalidMessage(format!("invalid redirect URL: {e}")))?;

        let mut saml_request = None;
        let mut saml_response = None;
        let mut relay_state = None;
        let mut signature = None;
        let mut sig_alg = None;

        for (key, value) in parsed.query_pairs() {
            let slot = match key.as_ref() {
                "SAMLRequest" => &mut saml_request,
                "SAMLResponse" => &mut saml_response,
                "RelayState" => &mut relay_state,
                "Signature" => &mut signature,
                "SigAlg" => &mut sig_alg,
                _ => continue,
            };
            if slot.replace(value.into_owned()).is_some() {
                return Err(SamlError::InvalidMessage(format!(
                    "duplicate {key} parameter"
                )));
            }
        }

        let mut decoded = Self::decode(
            saml_request.as_deref(),
            saml_response.as_deref(),
            relay_state.as_deref(),
            signature.as_deref(),
            sig_alg.as_deref(),
        )?;
        decoded.raw_query = parsed.query().map(String::from);
        Ok(decoded)
    }
}

fn append_query(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}

/// Compresses data using raw DEFLATE (no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("compression finish error: {e}")))
}

/// Decompresses raw DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("decompression error: {e}")))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_survives_the_envelope() {
        let xml = r#"<samlp:LogoutRequest ID="_1">a &amp; b</samlp:LogoutRequest>"#;
        let url = HttpRedirectBinding::encode_request(
            xml,
            "https://idp.example.com/slo",
            Some("state 1/2"),
        )
        .unwrap();

        assert!(url.starts_with("https://idp.example.com/slo?SAMLRequest="));
        assert!(url.contains("&RelayState=state%201%2F2"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.relay_state.as_deref(), Some("state 1/2"));
        assert!(!decoded.has_detached_signature());
        assert!(decoded.raw_query.unwrap().starts_with("SAMLRequest="));
    }

    #[test]
    fn encoded_value_is_raw_deflate() {
        let encoded = HttpRedirectBinding::deflate_and_encode("<x/>").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        // A zlib stream would start with 0x78.
        assert_ne!(bytes[0], 0x78);
        assert_eq!(deflate_decompress(&bytes).unwrap(), b"<x/>");
    }

    #[test]
    fn existing_query_is_extended() {
        let url =
            HttpRedirectBinding::encode_response("<x/>", "https://sp.example.com/slo?a=b", None)
                .unwrap();
        assert!(url.contains("?a=b&SAMLResponse="));
    }

    #[test]
    fn missing_or_duplicate_parameters() {
        let err = HttpRedirectBinding::decode_url("https://sp.example.com/slo?foo=bar").unwrap_err();
        assert!(matches!(err, SamlError::InvalidMessage(_)));

        let err = HttpRedirectBinding::decode_url(
            "https://sp.example.com/slo?SAMLResponse=a&SAMLResponse=b",
        )
        .unwrap_err();
        assert!(matches!(err, SamlError::InvalidMessage(_)));
    }

    #[test]
    fn garbage_payloads_are_malformed() {
        let err = HttpRedirectBinding::decode(Some("%%%"), None, None, None, None).unwrap_err();
        assert!(err.is_malformed());

        let not_deflate = base64::engine::general_purpose::STANDARD.encode([0xffu8; 16]);
        let err = HttpRedirectBinding::decode(None, Some(&not_deflate), None, None, None)
            .unwrap_err();
        assert!(err.is_malformed());
    }
}
