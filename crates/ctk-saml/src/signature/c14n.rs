//! XML canonicalization for embedded signatures.
//!
//! The subtree a `ds:Reference` or `ds:SignedInfo` covers is cut out of the
//! raw document with its whitespace intact. It is re-rooted with exactly the
//! namespace declarations the chosen algorithm renders (visibly utilized
//! prefixes plus the `InclusiveNamespaces` list for exclusive C14N, every
//! in-scope binding for inclusive C14N) and then serialized by
//! `xml_canonicalization`, which sorts attributes and namespace nodes and
//! normalizes escaping and empty elements.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use xml_canonicalization::Canonicalizer;

use crate::error::{SamlError, SamlResult};

/// Exclusive XML Canonicalization 1.0, comments omitted.
pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
/// Exclusive XML Canonicalization 1.0 with comments.
pub const EXCLUSIVE_C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";
/// Canonical XML 1.0, comments omitted.
pub const INCLUSIVE_C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
/// Canonical XML 1.0 with comments.
pub const INCLUSIVE_C14N_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
/// Enveloped-signature transform.
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// A canonicalization algorithm and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonicalization {
    /// Exclusive (`xml-exc-c14n`) rather than inclusive (`xml-c14n`).
    pub exclusive: bool,
    /// Keep comment nodes.
    pub with_comments: bool,
    /// `InclusiveNamespaces/@PrefixList`; `""` stands for `#default`.
    pub inclusive_prefixes: Vec<String>,
}

impl Canonicalization {
    /// Exclusive C14N without comments, the SAML default.
    #[must_use]
    pub const fn exclusive() -> Self {
        Self {
            exclusive: true,
            with_comments: false,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Canonical XML 1.0 without comments. XML-DSig applies it when a
    /// reference lists no canonicalization transform.
    #[must_use]
    pub const fn inclusive() -> Self {
        Self {
            exclusive: false,
            with_comments: false,
            inclusive_prefixes: Vec::new(),
        }
    }

    /// Looks up an algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (exclusive, with_comments) = match uri {
            EXCLUSIVE_C14N => (true, false),
            EXCLUSIVE_C14N_WITH_COMMENTS => (true, true),
            INCLUSIVE_C14N => (false, false),
            INCLUSIVE_C14N_WITH_COMMENTS => (false, true),
            _ => return None,
        };
        Some(Self {
            exclusive,
            with_comments,
            inclusive_prefixes: Vec::new(),
        })
    }

    /// Algorithm URI.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match (self.exclusive, self.with_comments) {
            (true, false) => EXCLUSIVE_C14N,
            (true, true) => EXCLUSIVE_C14N_WITH_COMMENTS,
            (false, false) => INCLUSIVE_C14N,
            (false, true) => INCLUSIVE_C14N_WITH_COMMENTS,
        }
    }

    /// Sets the prefixes treated the inclusive way, from a whitespace
    /// separated `PrefixList`.
    #[must_use]
    pub fn with_inclusive_prefixes(mut self, prefix_list: &str) -> Self {
        self.inclusive_prefixes = prefix_list
            .split_whitespace()
            .map(|p| if p == "#default" { String::new() } else { p.to_string() })
            .collect();
        self
    }
}

/// The element a canonicalized subtree starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apex<'a> {
    /// First element, in document order, whose `ID` attribute has this value.
    Id(&'a str),
    /// `SignedInfo` of the n-th `Signature` in document order. Signatures
    /// nested inside another signature are not counted.
    SignedInfo(usize),
}

/// Canonicalizes the subtree at `apex`.
///
/// `enveloped` names the ordinal (counted like [`Apex::SignedInfo`]) of a
/// `Signature` to leave out, as the enveloped-signature transform does.
///
/// # Errors
///
/// Returns `Canonicalization` if the document is malformed or the apex does
/// not exist.
pub fn canonicalize(
    xml: &str,
    apex: Apex<'_>,
    method: &Canonicalization,
    enveloped: Option<usize>,
) -> SamlResult<String> {
    let rerooted = Subtree::new(apex, method, enveloped).extract(xml)?;

    let mut output = Vec::new();
    Canonicalizer::read_from_str(&rerooted)
        .write_to_writer(&mut output)
        .canonicalize(method.with_comments)
        .map_err(|e| SamlError::Canonicalization(e.to_string()))?;
    String::from_utf8(output)
        .map_err(|e| SamlError::Canonicalization(format!("output is not UTF-8: {e}")))
}

/// Cuts one subtree out of a document, declaring namespaces on each element
/// the way the canonicalization method renders them.
struct Subtree<'m> {
    apex: Apex<'m>,
    method: &'m Canonicalization,
    enveloped: Option<usize>,
    /// Namespace declarations per open element of the whole document.
    scopes: Vec<Vec<(String, String)>>,
    /// `xml:*` attributes per open element, inherited by an inclusive apex.
    xml_attributes: Vec<Vec<(String, String)>>,
    /// Namespace declarations rendered per open output element.
    rendered: Vec<Vec<(String, String)>>,
    signatures_seen: usize,
    /// Ordinal and depth of the top-level signature being read.
    signature: Option<(usize, usize)>,
    /// Depth of the apex once found.
    capturing: Option<usize>,
    /// Depth of the enveloped signature being left out.
    skipping: Option<usize>,
    done: bool,
    out: String,
}

impl<'m> Subtree<'m> {
    fn new(apex: Apex<'m>, method: &'m Canonicalization, enveloped: Option<usize>) -> Self {
        Self {
            apex,
            method,
            enveloped,
            scopes: Vec::new(),
            xml_attributes: Vec::new(),
            rendered: Vec::new(),
            signatures_seen: 0,
            signature: None,
            capturing: None,
            skipping: None,
            done: false,
            out: String::new(),
        }
    }

    fn extract(mut self, xml: &str) -> SamlResult<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => self.start(e, false)?,
                Ok(Event::Empty(ref e)) => self.start(e, true)?,
                Ok(Event::End(ref e)) => {
                    let name = e.name();
                    let qname = utf8(name.as_ref())?.to_string();
                    self.end(&qname);
                }
                Ok(Event::Text(ref t)) if self.emitting() => self.out.push_str(utf8(t)?),
                Ok(Event::CData(ref c)) if self.emitting() => {
                    self.out.push_str("<![CDATA[");
                    self.out.push_str(utf8(c)?);
                    self.out.push_str("]]>");
                }
                Ok(Event::Comment(ref c)) if self.emitting() && self.method.with_comments => {
                    self.out.push_str("<!--");
                    self.out.push_str(utf8(c)?);
                    self.out.push_str("-->");
                }
                Ok(Event::PI(ref p)) if self.emitting() => {
                    self.out.push_str("<?");
                    self.out.push_str(utf8(p)?);
                    self.out.push_str("?>");
                }
                Ok(Event::DocType(_)) => {
                    return Err(SamlError::Canonicalization("DOCTYPE is not allowed".to_string()));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(SamlError::Canonicalization(format!(
                        "at position {}: {e}",
                        reader.error_position()
                    )));
                }
            }
            if self.done {
                return Ok(self.out);
            }
        }

        Err(SamlError::Canonicalization(match self.apex {
            Apex::Id(id) => format!("no element with ID {id}"),
            Apex::SignedInfo(n) => format!("no SignedInfo in signature {n}"),
        }))
    }

    const fn emitting(&self) -> bool {
        self.capturing.is_some() && self.skipping.is_none()
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool) -> SamlResult<()> {
        let depth = self.scopes.len();
        let name = e.name();
        let qname = utf8(name.as_ref())?.to_string();
        let local_name = qname.rsplit(':').next().unwrap_or_default();

        let mut declarations = Vec::new();
        let mut xml_attributes = Vec::new();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| SamlError::Canonicalization(err.to_string()))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            if key == "xmlns" || key.starts_with("xmlns:") {
                let value = attr
                    .unescape_value()
                    .map_err(|err| SamlError::Canonicalization(err.to_string()))?
                    .into_owned();
                let prefix = key.strip_prefix("xmlns:").unwrap_or_default().to_string();
                declarations.push((prefix, value));
                continue;
            }
            let raw = utf8(&attr.value)?.replace('"', "&quot;");
            if key.starts_with("xml:") {
                xml_attributes.push((key.clone(), raw.clone()));
            }
            attributes.push((key, raw));
        }
        self.scopes.push(declarations);
        self.xml_attributes.push(xml_attributes);

        let ordinal = if local_name == "Signature" && self.signature.is_none() {
            let ordinal = self.signatures_seen;
            self.signatures_seen += 1;
            if !empty {
                self.signature = Some((ordinal, depth));
            }
            Some(ordinal)
        } else {
            None
        };

        if self.capturing.is_some() {
            if self.skipping.is_none() {
                if ordinal.is_some() && ordinal == self.enveloped {
                    if !empty {
                        self.skipping = Some(depth);
                    }
                } else {
                    self.open(&qname, attributes, false);
                    if empty {
                        self.close(&qname);
                    }
                }
            }
        } else if self.is_apex(local_name, &attributes, depth) {
            self.capturing = Some(depth);
            self.open(&qname, attributes, true);
            if empty {
                self.close(&qname);
                self.done = true;
            }
        }

        if empty {
            self.pop(depth);
        }
        Ok(())
    }

    fn end(&mut self, qname: &str) {
        let depth = self.scopes.len().saturating_sub(1);
        if self.skipping == Some(depth) {
            self.skipping = None;
        } else if self.emitting() {
            self.close(qname);
            self.done = self.capturing == Some(depth);
        }
        self.pop(depth);
    }

    fn pop(&mut self, depth: usize) {
        self.scopes.pop();
        self.xml_attributes.pop();
        if self.signature.is_some_and(|(_, d)| d == depth) {
            self.signature = None;
        }
    }

    fn is_apex(&self, local_name: &str, attributes: &[(String, String)], depth: usize) -> bool {
        match self.apex {
            Apex::Id(id) => attributes
                .iter()
                .any(|(k, v)| k == "ID" && unescape_raw(v).as_deref() == Some(id)),
            Apex::SignedInfo(n) => {
                local_name == "SignedInfo" && self.signature == Some((n, depth.saturating_sub(1)))
            }
        }
    }

    /// Nearest in-scope binding of `prefix` in the document.
    fn in_scope(&self, prefix: &str) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|s| s.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Nearest binding of `prefix` already rendered by an output ancestor.
    fn rendered(&self, prefix: &str) -> Option<&str> {
        self.rendered
            .iter()
            .rev()
            .flat_map(|s| s.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn open(&mut self, qname: &str, mut attributes: Vec<(String, String)>, apex: bool) {
        let mut candidates: Vec<String> = if self.method.exclusive {
            let mut utilized = vec![qname
                .split_once(':')
                .map_or(String::new(), |(p, _)| p.to_string())];
            utilized.extend(
                attributes
                    .iter()
                    .filter_map(|(k, _)| k.split_once(':').map(|(p, _)| p.to_string())),
            );
            utilized.extend(self.method.inclusive_prefixes.iter().cloned());
            utilized
        } else {
            let mut all: Vec<String> = self
                .scopes
                .iter()
                .flat_map(|s| s.iter().map(|(p, _)| p.clone()))
                .collect();
            all.push(String::new());
            all
        };
        candidates.sort();
        candidates.dedup();

        let mut rendered = Vec::new();
        for prefix in candidates.into_iter().filter(|p| p != "xml" && p != "xmlns") {
            let uri = match (self.in_scope(&prefix), prefix.is_empty()) {
                (Some(uri), _) => uri.to_string(),
                (None, true) => String::new(),
                (None, false) => continue,
            };
            let already = self.rendered(&prefix).unwrap_or_default();
            if uri != already && !(uri.is_empty() && !prefix.is_empty()) {
                rendered.push((prefix, uri));
            }
        }

        if apex && !self.method.exclusive {
            for inherited in self.xml_attributes.iter().rev().skip(1).flatten() {
                if !attributes.iter().any(|(k, _)| *k == inherited.0) {
                    attributes.push(inherited.clone());
                }
            }
        }

        self.out.push('<');
        self.out.push_str(qname);
        for (prefix, uri) in &rendered {
            self.out.push_str(" xmlns");
            if !prefix.is_empty() {
                self.out.push(':');
                self.out.push_str(prefix);
            }
            self.out.push_str("=\"");
            self.out.push_str(&quick_xml::escape::escape(uri.as_str()));
            self.out.push('"');
        }
        for (key, raw) in &attributes {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push_str("=\"");
            self.out.push_str(raw);
            self.out.push('"');
        }
        self.out.push('>');
        self.rendered.push(rendered);
    }

    fn close(&mut self, qname: &str) {
        self.out.push_str("</");
        self.out.push_str(qname);
        self.out.push('>');
        self.rendered.pop();
    }
}

fn unescape_raw(raw: &str) -> Option<String> {
    quick_xml::escape::unescape(raw).ok().map(|v| v.into_owned())
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::Canonicalization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNED_RESPONSE: &str = include_str!("../../testdata/signed_assertion_response.xml");
    const SIGNED_ASSERTION_C14N: &str =
        include_str!("../../testdata/signed_assertion_response.assertion.c14n");
    const SIGNED_INFO_C14N: &str =
        include_str!("../../testdata/signed_assertion_response.signed_info.c14n");

    #[test]
    fn nested_assertion_takes_its_namespace_along() {
        let xml = "<samlp:Response xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\"><saml:Assertion Version=\"2.0\" ID=\"_a\">\n  <saml:Issuer>x</saml:Issuer>\n</saml:Assertion></samlp:Response>";
        let canonical = canonicalize(xml, Apex::Id("_a"), &Canonicalization::exclusive(), None).unwrap();
        assert_eq!(
            canonical,
            "<saml:Assertion xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\" ID=\"_a\" Version=\"2.0\">\n  <saml:Issuer>x</saml:Issuer>\n</saml:Assertion>"
        );
    }

    #[test]
    fn exclusive_assertion_matches_known_answer() {
        let method = Canonicalization::exclusive().with_inclusive_prefixes("xs");
        let canonical = canonicalize(SIGNED_RESPONSE, Apex::Id("_assert1"), &method, Some(0)).unwrap();
        assert_eq!(canonical, SIGNED_ASSERTION_C14N);
    }

    #[test]
    fn exclusive_signed_info_matches_known_answer() {
        let canonical = canonicalize(
            SIGNED_RESPONSE,
            Apex::SignedInfo(0),
            &Canonicalization::exclusive(),
            None,
        )
        .unwrap();
        assert_eq!(canonical, SIGNED_INFO_C14N);
    }

    #[test]
    fn default_namespace_is_declared_where_used() {
        let xml = r#"<a:R xmlns:a="urn:a" xmlns="urn:d"><a:X ID="_x"><Y>t</Y></a:X></a:R>"#;
        let exclusive = canonicalize(xml, Apex::Id("_x"), &Canonicalization::exclusive(), None).unwrap();
        assert_eq!(exclusive, r#"<a:X xmlns:a="urn:a" ID="_x"><Y xmlns="urn:d">t</Y></a:X>"#);

        let inclusive = canonicalize(xml, Apex::Id("_x"), &Canonicalization::inclusive(), None).unwrap();
        assert_eq!(inclusive, r#"<a:X xmlns="urn:d" xmlns:a="urn:a" ID="_x"><Y>t</Y></a:X>"#);
    }

    #[test]
    fn unused_declarations_are_dropped() {
        let xml = r#"<R xmlns:u="urn:unused" ID="_r"><p:C xmlns:p="urn:p" xmlns:q="urn:q"/></R>"#;
        let canonical = canonicalize(xml, Apex::Id("_r"), &Canonicalization::exclusive(), None).unwrap();
        assert_eq!(canonical, r#"<R ID="_r"><p:C xmlns:p="urn:p"></p:C></R>"#);
    }

    #[test]
    fn comments_follow_the_method() {
        let xml = "<R ID=\"_r\"><!-- note --> <C/></R>";
        let without = canonicalize(xml, Apex::Id("_r"), &Canonicalization::exclusive(), None).unwrap();
        assert_eq!(without, "<R ID=\"_r\"> <C></C></R>");

        let method = Canonicalization::from_uri(EXCLUSIVE_C14N_WITH_COMMENTS).unwrap();
        let with = canonicalize(xml, Apex::Id("_r"), &method, None).unwrap();
        assert_eq!(with, "<R ID=\"_r\"><!-- note --> <C></C></R>");
    }

    #[test]
    fn enveloped_signature_is_left_out() {
        let xml = "<R ID=\"_r\"><I>x</I><ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\"><ds:SignedInfo/></ds:Signature><C/></R>";
        let method = Canonicalization::exclusive();
        assert_eq!(
            canonicalize(xml, Apex::Id("_r"), &method, Some(0)).unwrap(),
            "<R ID=\"_r\"><I>x</I><C></C></R>"
        );
        assert_eq!(
            canonicalize(xml, Apex::SignedInfo(0), &method, None).unwrap(),
            "<ds:SignedInfo xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\"></ds:SignedInfo>"
        );
    }

    #[test]
    fn missing_apex_is_an_error() {
        let method = Canonicalization::exclusive();
        assert!(canonicalize("<R ID=\"_r\"/>", Apex::Id("_other"), &method, None).is_err());
        assert!(canonicalize("<R ID=\"_r\"/>", Apex::SignedInfo(0), &method, None).is_err());
    }

    #[test]
    fn algorithm_uris() {
        for uri in [
            EXCLUSIVE_C14N,
            EXCLUSIVE_C14N_WITH_COMMENTS,
            INCLUSIVE_C14N,
            INCLUSIVE_C14N_WITH_COMMENTS,
        ] {
            assert_eq!(Canonicalization::from_uri(uri).unwrap().uri(), uri);
        }
        assert!(Canonicalization::from_uri("http://www.w3.org/TR/1999/REC-xpath-19991116").is_none());
        assert_eq!(
            Canonicalization::exclusive()
                .with_inclusive_prefixes("xs #default")
                .inclusive_prefixes,
            vec!["xs".to_string(), String::new()]
        );
    }
}
