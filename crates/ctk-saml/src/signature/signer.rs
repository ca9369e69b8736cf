//! Enveloped XML signature creation.
//!
//! Used to sign POST-bound requests and, in tests, to play an Identity
//! Provider that signs its responses.

use base64::Engine;
use ctk_crypto::{DigestAlgorithm, RsaAlgorithm};

use super::c14n::{self, Apex, Canonicalization, ENVELOPED_SIGNATURE};
use super::SigningKey;
use crate::constants::XMLDSIG_NS;
use crate::document::parse_element;
use crate::error::{SamlError, SamlResult};

/// Signs SAML documents with an enveloped `ds:Signature`.
#[derive(Debug, Clone)]
pub struct XmlSigner {
    key: SigningKey,
    certificate_der: Option<Vec<u8>>,
}

impl XmlSigner {
    /// Creates a signer without an embedded certificate.
    #[must_use]
    pub const fn new(key: SigningKey) -> Self {
        Self {
            key,
            certificate_der: None,
        }
    }

    /// Embeds the given certificate in `ds:KeyInfo`.
    #[must_use]
    pub fn with_certificate(mut self, certificate_der: Vec<u8>) -> Self {
        self.certificate_der = Some(certificate_der);
        self
    }

    /// Signs the element whose `ID` is `reference_id`, inserting the
    /// signature right after its `Issuer` (or first thing inside it when it
    /// has none).
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed, the element is missing
    /// or empty, or signing fails.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let root = parse_element(xml)?;
        if root.find_by_id(reference_id).is_none() {
            return Err(SamlError::SignatureCreation(format!(
                "no element with ID {reference_id}"
            )));
        }

        let method = Canonicalization::exclusive();
        let canonical = c14n::canonicalize(xml, Apex::Id(reference_id), &method, None)
            .map_err(creation)?;
        let (digest_algorithm, digest_uri) = digest_for(self.key.algorithm());
        let digest = ctk_crypto::digest(digest_algorithm, canonical.as_bytes());

        let signed_info = format!(
            concat!(
                r#"<ds:SignedInfo>"#,
                r#"<ds:CanonicalizationMethod Algorithm="{c14n}"/>"#,
                r#"<ds:SignatureMethod Algorithm="{alg}"/>"#,
                r##"<ds:Reference URI="#{id}">"##,
                r#"<ds:Transforms>"#,
                r#"<ds:Transform Algorithm="{enveloped}"/>"#,
                r#"<ds:Transform Algorithm="{c14n}"/>"#,
                r#"</ds:Transforms>"#,
                r#"<ds:DigestMethod Algorithm="{digest_uri}"/>"#,
                r#"<ds:DigestValue>{digest}</ds:DigestValue>"#,
                r#"</ds:Reference>"#,
                r#"</ds:SignedInfo>"#
            ),
            c14n = method.uri(),
            alg = self.key.algorithm().xml_dsig_uri(),
            id = reference_id,
            enveloped = ENVELOPED_SIGNATURE,
            digest_uri = digest_uri,
            digest = base64::engine::general_purpose::STANDARD.encode(digest),
        );

        // Exclusive C14N of SignedInfo only depends on the ds declaration of
        // the enclosing Signature.
        let canonical_signed_info = c14n::canonicalize(
            &format!(r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}</ds:Signature>"#),
            Apex::SignedInfo(0),
            &method,
            None,
        )
        .map_err(creation)?;

        let signature_value = base64::engine::general_purpose::STANDARD
            .encode(self.key.sign(canonical_signed_info.as_bytes())?);

        let key_info = self
            .certificate_der
            .as_ref()
            .map(|cert| {
                format!(
                    "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>",
                    base64::engine::general_purpose::STANDARD.encode(cert)
                )
            })
            .unwrap_or_default();

        let signature = format!(
            r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}<ds:SignatureValue>{signature_value}</ds:SignatureValue>{key_info}</ds:Signature>"#
        );

        let position = insert_position(xml, reference_id)?;
        Ok(format!("{}{}{}", &xml[..position], signature, &xml[position..]))
    }
}

fn creation(err: SamlError) -> SamlError {
    SamlError::SignatureCreation(err.to_string())
}

const fn digest_for(algorithm: RsaAlgorithm) -> (DigestAlgorithm, &'static str) {
    match algorithm {
        RsaAlgorithm::Rs1 => (DigestAlgorithm::Sha1, "http://www.w3.org/2000/09/xmldsig#sha1"),
        RsaAlgorithm::Rs256 => (DigestAlgorithm::Sha256, "http://www.w3.org/2001/04/xmlenc#sha256"),
        RsaAlgorithm::Rs384 => (
            DigestAlgorithm::Sha384,
            "http://www.w3.org/2001/04/xmldsig-more#sha384",
        ),
        RsaAlgorithm::Rs512 => (DigestAlgorithm::Sha512, "http://www.w3.org/2001/04/xmlenc#sha512"),
    }
}

/// Byte offset right after the signed element's `Issuer`, or right after its
/// start tag.
fn insert_position(xml: &str, reference_id: &str) -> SamlResult<usize> {
    let id_attr = format!(" ID=\"{reference_id}\"");
    let attr_pos = xml.find(&id_attr).ok_or_else(|| {
        SamlError::SignatureCreation(format!("ID attribute {reference_id} not found"))
    })?;

    let tag_close = xml[attr_pos..]
        .find('>')
        .map(|p| attr_pos + p)
        .ok_or_else(|| SamlError::SignatureCreation("unterminated start tag".to_string()))?;
    if xml[..tag_close].ends_with('/') {
        return Err(SamlError::SignatureCreation(
            "cannot envelope a signature in an empty element".to_string(),
        ));
    }
    let after_start = tag_close + 1;

    let rest = &xml[after_start..];
    let leading = rest.len() - rest.trim_start().len();
    let next = &rest[leading..];
    let qname: String = next
        .strip_prefix('<')
        .unwrap_or_default()
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect();
    let is_issuer = qname.rsplit(':').next() == Some("Issuer");

    if is_issuer {
        let close_tag = format!("</{qname}>");
        if let Some(close) = next.find(&close_tag) {
            return Ok(after_start + leading + close + close_tag.len());
        }
    }
    Ok(after_start)
}
