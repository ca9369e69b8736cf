//! Enveloped XML signature validation.
//!
//! The parsed [`Element`] tree locates each signature and the element it
//! envelops, whose `ID` must be the one the `ds:Reference` points at; a
//! signature that references some other element is rejected. Digests and
//! the signed `SignedInfo` bytes are computed from the raw document with the
//! canonicalization and transforms the signature itself lists.

use base64::Engine;
use ctk_crypto::{DigestAlgorithm, RsaAlgorithm};

use super::c14n::{self, Apex, Canonicalization, ENVELOPED_SIGNATURE};
use super::VerificationKey;
use crate::constants::{digest_algorithm_from_uri, rsa_algorithm_from_uri};
use crate::document::Element;
use crate::error::{SamlError, SamlResult};

/// The parts of a `ds:Signature` needed for validation.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    /// `SignatureMethod` algorithm.
    pub algorithm: RsaAlgorithm,
    /// `DigestMethod` algorithm.
    pub digest_algorithm: DigestAlgorithm,
    /// `Reference/@URI`, e.g. `#_abc`.
    pub reference_uri: String,
    /// Base64 digest value.
    pub digest_value: String,
    /// Base64 signature value.
    pub signature_value: String,
    /// Embedded base64 certificate, if any.
    pub x509_certificate: Option<String>,
    /// `SignedInfo/CanonicalizationMethod`.
    pub canonicalization: Canonicalization,
    /// Reference transforms.
    pub transforms: ReferenceTransforms,
}

/// What a `ds:Reference` does to the referenced element before digesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTransforms {
    /// The enveloped-signature transform is listed.
    pub enveloped: bool,
    /// The canonicalization transform, inclusive C14N when none is listed.
    pub canonicalization: Canonicalization,
}

impl ReferenceTransforms {
    fn from_reference(reference: &Element) -> SamlResult<Self> {
        let mut enveloped = false;
        let mut canonicalization = None;
        let transforms = reference
            .child("Transforms")
            .map(|t| t.children("Transform"))
            .unwrap_or_default();
        for transform in transforms {
            let algorithm = transform
                .optional_attribute("Algorithm")
                .ok_or_else(|| invalid("Transform without Algorithm"))?;
            if algorithm == ENVELOPED_SIGNATURE {
                enveloped = true;
            } else {
                canonicalization = Some(canonicalization_of(transform)?);
            }
        }
        Ok(Self {
            enveloped,
            canonicalization: canonicalization.unwrap_or_else(Canonicalization::inclusive),
        })
    }
}

/// Reads a canonicalization algorithm and its `InclusiveNamespaces` child.
fn canonicalization_of(method: &Element) -> SamlResult<Canonicalization> {
    let algorithm = method.optional_attribute("Algorithm").unwrap_or_default();
    let canonicalization = Canonicalization::from_uri(algorithm)
        .ok_or_else(|| invalid(&format!("unsupported canonicalization or transform {algorithm}")))?;
    match method.child("InclusiveNamespaces") {
        Some(list) if canonicalization.exclusive => Ok(canonicalization
            .with_inclusive_prefixes(list.optional_attribute("PrefixList").unwrap_or_default())),
        _ => Ok(canonicalization),
    }
}

impl XmlSignature {
    /// Reads a `ds:Signature` element.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid` if a required part is missing or uses an
    /// unsupported algorithm.
    pub fn from_element(signature: &Element) -> SamlResult<Self> {
        let signed_info = signature
            .child("SignedInfo")
            .ok_or_else(|| invalid("no SignedInfo"))?;

        let method = signed_info
            .child("SignatureMethod")
            .and_then(|m| m.optional_attribute("Algorithm"))
            .ok_or_else(|| invalid("no SignatureMethod"))?;
        let algorithm = rsa_algorithm_from_uri(method)
            .ok_or_else(|| invalid(&format!("unsupported signature algorithm {method}")))?;

        let reference = signed_info
            .child("Reference")
            .ok_or_else(|| invalid("no Reference"))?;
        if signed_info.children("Reference").len() != 1 {
            return Err(invalid("exactly one Reference is allowed"));
        }

        let digest_method = reference
            .child("DigestMethod")
            .and_then(|m| m.optional_attribute("Algorithm"))
            .ok_or_else(|| invalid("no DigestMethod"))?;
        let digest_algorithm = digest_algorithm_from_uri(digest_method)
            .ok_or_else(|| invalid(&format!("unsupported digest algorithm {digest_method}")))?;

        let digest_value = reference
            .child("DigestValue")
            .map(|d| compact(d.text()))
            .ok_or_else(|| invalid("no DigestValue"))?;

        let canonicalization = signed_info
            .child("CanonicalizationMethod")
            .ok_or_else(|| invalid("no CanonicalizationMethod"))
            .and_then(canonicalization_of)?;
        let transforms = ReferenceTransforms::from_reference(reference)?;

        let signature_value = signature
            .child("SignatureValue")
            .map(|s| compact(s.text()))
            .ok_or_else(|| invalid("no SignatureValue"))?;

        let x509_certificate = signature
            .recursive_children("X509Certificate")
            .first()
            .map(|c| compact(c.text()));

        Ok(Self {
            algorithm,
            digest_algorithm,
            reference_uri: reference
                .optional_attribute("URI")
                .unwrap_or_default()
                .to_string(),
            digest_value,
            signature_value,
            x509_certificate,
            canonicalization,
            transforms,
        })
    }
}

/// Validates enveloped signatures against trusted keys.
#[derive(Debug, Clone)]
pub struct XmlSignatureValidator {
    trusted_keys: Vec<VerificationKey>,
    allow_sha1: bool,
}

impl XmlSignatureValidator {
    /// Creates a validator from DER certificates or public keys.
    #[must_use]
    pub fn new(trusted_certificates: Vec<Vec<u8>>) -> Self {
        Self::from_keys(
            trusted_certificates
                .iter()
                .map(|der| VerificationKey::from_der(der))
                .collect(),
        )
    }

    /// Creates a validator from already parsed keys.
    #[must_use]
    pub fn from_keys(trusted_keys: Vec<VerificationKey>) -> Self {
        Self {
            trusted_keys,
            allow_sha1: true,
        }
    }

    /// Whether SHA-1 signatures and digests are accepted (default: yes).
    #[must_use]
    pub fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Validates every `ds:Signature` in the tree parsed from `xml` and
    /// returns how many were checked.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid` on the first signature that fails.
    pub fn validate_tree(&self, xml: &str, root: &Element) -> SamlResult<usize> {
        let mut checked = 0;
        self.walk(xml, root, root, &mut checked)?;
        Ok(checked)
    }

    fn walk(&self, xml: &str, root: &Element, element: &Element, checked: &mut usize) -> SamlResult<()> {
        for child in element.all_children() {
            if child.local_name() == "Signature" {
                if let Some(id) = element.optional_attribute("ID") {
                    if count_ids(root, id) > 1 {
                        return Err(invalid(&format!("ID {id} occurs more than once")));
                    }
                }
                self.validate(xml, element, child, *checked)?;
                *checked += 1;
            } else {
                self.walk(xml, root, child, checked)?;
            }
        }
        Ok(())
    }

    /// Validates one signature enveloped in `signed`. `ordinal` is the
    /// signature's position among the document's signatures, nested ones not
    /// counted.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid` if the reference, digest or signature value
    /// does not check out.
    pub fn validate(
        &self,
        xml: &str,
        signed: &Element,
        signature: &Element,
        ordinal: usize,
    ) -> SamlResult<XmlSignature> {
        let parsed = XmlSignature::from_element(signature)?;

        if !self.allow_sha1
            && (parsed.algorithm == RsaAlgorithm::Rs1
                || parsed.digest_algorithm == DigestAlgorithm::Sha1)
        {
            return Err(invalid("SHA-1 signatures are not allowed"));
        }

        let id = signed
            .optional_attribute("ID")
            .ok_or_else(|| invalid(&format!("signed {} has no ID", signed.local_name())))?;
        if parsed.reference_uri.strip_prefix('#') != Some(id) {
            return Err(invalid(&format!(
                "Reference {} does not point at enclosing {} {id}",
                parsed.reference_uri,
                signed.local_name()
            )));
        }

        let referenced = c14n::canonicalize(
            xml,
            Apex::Id(id),
            &parsed.transforms.canonicalization,
            parsed.transforms.enveloped.then_some(ordinal),
        )
        .map_err(|e| invalid(&e.to_string()))?;
        let digest = ctk_crypto::digest(parsed.digest_algorithm, referenced.as_bytes());
        if base64::engine::general_purpose::STANDARD.encode(digest) != parsed.digest_value {
            return Err(invalid("digest value mismatch"));
        }

        let signed_info = c14n::canonicalize(xml, Apex::SignedInfo(ordinal), &parsed.canonicalization, None)
            .map_err(|e| invalid(&e.to_string()))?;
        let signature_bytes = base64::engine::general_purpose::STANDARD
            .decode(&parsed.signature_value)
            .map_err(|e| invalid(&format!("signature value is not base64: {e}")))?;

        if self.trusted_keys.is_empty() {
            return Err(invalid("no trusted key configured"));
        }
        if self
            .trusted_keys
            .iter()
            .any(|key| key.verify(signed_info.as_bytes(), &signature_bytes, parsed.algorithm))
        {
            Ok(parsed)
        } else {
            Err(invalid("signature does not verify with any trusted key"))
        }
    }
}

fn count_ids(element: &Element, id: &str) -> usize {
    usize::from(element.optional_attribute("ID") == Some(id))
        + element
            .all_children()
            .iter()
            .map(|c| count_ids(c, id))
            .sum::<usize>()
}

fn invalid(reason: &str) -> SamlError {
    SamlError::SignatureInvalid(reason.to_string())
}

fn compact(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{parse_element, MessageParser, SignatureStatus, XmlMessageParser};
    use crate::signature::{test_keys, XmlSigner};

    const RESPONSE: &str = r#"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp" Version="2.0" InResponseTo="_req">
    <saml:Issuer>https://idp.example.org</saml:Issuer>
    <samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>
</samlp:LogoutResponse>"#;

    /// A Response whose nested Assertion was signed outside this crate with
    /// exclusive C14N and an `InclusiveNamespaces` prefix list.
    const SIGNED_ASSERTION_RESPONSE: &str =
        include_str!("../../testdata/signed_assertion_response.xml");

    fn signed() -> String {
        XmlSigner::new(test_keys::signing_key())
            .sign(RESPONSE, "_resp")
            .unwrap()
    }

    fn validator() -> XmlSignatureValidator {
        XmlSignatureValidator::from_keys(vec![test_keys::verification_key()])
    }

    fn check(xml: &str, validator: &XmlSignatureValidator) -> SamlResult<usize> {
        validator.validate_tree(xml, &parse_element(xml)?)
    }

    fn embedded_certificate(xml: &str) -> VerificationKey {
        let start = xml.find("<ds:X509Certificate>").unwrap() + "<ds:X509Certificate>".len();
        let end = xml.find("</ds:X509Certificate>").unwrap();
        VerificationKey::from_base64(&xml[start..end]).unwrap()
    }

    fn external_validator() -> XmlSignatureValidator {
        XmlSignatureValidator::from_keys(vec![embedded_certificate(SIGNED_ASSERTION_RESPONSE)])
    }

    #[test]
    fn signed_message_validates() {
        assert_eq!(check(&signed(), &validator()).unwrap(), 1);
    }

    #[test]
    fn parser_reports_verified() {
        let parser = XmlMessageParser::default()
            .with_validator(validator())
            .require_signature(true);
        let msg = parser.parse(signed().as_bytes()).unwrap();
        assert_eq!(msg.signature_status(), SignatureStatus::Verified);
    }

    #[test]
    fn tampered_content_fails_digest() {
        let tampered = signed().replace("_req", "_other");
        let err = check(&tampered, &validator()).unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn untrusted_key_is_rejected() {
        let err = check(
            &signed(),
            &XmlSignatureValidator::from_keys(vec![test_keys::other_verification_key()]),
        )
        .unwrap_err();
        assert!(err.is_signature_failure());
    }

    #[test]
    fn reference_must_point_at_parent() {
        let moved = signed().replace("URI=\"#_resp\"", "URI=\"#_elsewhere\"");
        let err = check(&moved, &validator()).unwrap_err();
        assert!(err.to_string().contains("does not point at"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let wrapped = signed().replace(
            "<samlp:Status>",
            "<saml:Advice ID=\"_resp\"/><samlp:Status>",
        );
        let err = check(&wrapped, &validator()).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn sha1_can_be_refused() {
        let sha1 = signed().replace(
            "http://www.w3.org/2001/04/xmlenc#sha256",
            "http://www.w3.org/2000/09/xmldsig#sha1",
        );
        let err = check(&sha1, &validator().allow_sha1(false)).unwrap_err();
        assert!(err.to_string().contains("SHA-1"));
    }

    #[test]
    fn externally_signed_assertion_validates() {
        assert_eq!(check(SIGNED_ASSERTION_RESPONSE, &external_validator()).unwrap(), 1);

        let parser = XmlMessageParser::default()
            .with_validator(external_validator())
            .require_signature(true);
        let msg = parser.parse(SIGNED_ASSERTION_RESPONSE.as_bytes()).unwrap();
        assert_eq!(msg.signature_status(), SignatureStatus::Verified);
    }

    #[test]
    fn externally_signed_assertion_lists_its_canonicalization() {
        let root = parse_element(SIGNED_ASSERTION_RESPONSE).unwrap();
        let signature = root.recursive_children("Signature")[0];
        let parsed = XmlSignature::from_element(signature).unwrap();

        assert_eq!(parsed.reference_uri, "#_assert1");
        assert_eq!(parsed.canonicalization, Canonicalization::exclusive());
        assert!(parsed.transforms.enveloped);
        assert_eq!(parsed.transforms.canonicalization.inclusive_prefixes, vec!["xs".to_string()]);
        assert!(parsed.x509_certificate.is_some());
    }

    #[test]
    fn whitespace_inside_the_assertion_is_signed() {
        let reindented = SIGNED_ASSERTION_RESPONSE.replacen(
            "\n    <saml:Subject>",
            "\n      <saml:Subject>",
            1,
        );
        assert_ne!(reindented, SIGNED_ASSERTION_RESPONSE);
        let err = check(&reindented, &external_validator()).unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn whitespace_outside_the_assertion_is_not_signed() {
        let reindented = SIGNED_ASSERTION_RESPONSE.replacen(
            "\n  <saml:Issuer>",
            "\n\n  <saml:Issuer>",
            1,
        );
        assert_ne!(reindented, SIGNED_ASSERTION_RESPONSE);
        assert_eq!(check(&reindented, &external_validator()).unwrap(), 1);
    }

    #[test]
    fn externally_signed_assertion_detects_tampering() {
        let tampered = SIGNED_ASSERTION_RESPONSE.replace(">alice<", ">mallory<");
        let err = check(&tampered, &external_validator()).unwrap_err();
        assert!(err.to_string().contains("digest"));
    }

    #[test]
    fn unknown_transform_is_rejected() {
        let xpath = SIGNED_ASSERTION_RESPONSE.replace(
            "http://www.w3.org/2000/09/xmldsig#enveloped-signature",
            "http://www.w3.org/TR/1999/REC-xpath-19991116",
        );
        let err = check(&xpath, &external_validator()).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
