//! Builds [`ProtocolMessage`] trees from raw bytes.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{Element, ProtocolMessage, SignatureStatus};
use crate::error::{SamlError, SamlResult};
use crate::signature::XmlSignatureValidator;

/// Turns wire bytes into a navigable message.
///
/// Implementations must check signatures before handing a message out:
/// a malformed document fails with [`SamlError::XmlParse`], a bad or
/// missing-but-required signature with [`SamlError::SignatureInvalid`].
pub trait MessageParser: Send + Sync {
    /// Parses and signature-checks a message.
    ///
    /// # Errors
    ///
    /// Returns `XmlParse` for malformed XML and `SignatureInvalid` when a
    /// signature does not validate.
    fn parse(&self, raw: &[u8]) -> SamlResult<ProtocolMessage>;
}

/// Default [`MessageParser`] built on `quick-xml`.
#[derive(Default)]
pub struct XmlMessageParser {
    validator: Option<XmlSignatureValidator>,
    require_signature: bool,
}

impl XmlMessageParser {
    /// Creates a parser that validates embedded signatures against the given
    /// trusted certificates (DER).
    #[must_use]
    pub fn with_trusted_certificates(certificates: Vec<Vec<u8>>) -> Self {
        Self {
            validator: Some(XmlSignatureValidator::new(certificates)),
            require_signature: false,
        }
    }

    /// Uses a preconfigured validator.
    #[must_use]
    pub fn with_validator(mut self, validator: XmlSignatureValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Rejects messages that carry no embedded signature.
    #[must_use]
    pub fn require_signature(mut self, require: bool) -> Self {
        self.require_signature = require;
        self
    }
}

impl MessageParser for XmlMessageParser {
    fn parse(&self, raw: &[u8]) -> SamlResult<ProtocolMessage> {
        let xml = std::str::from_utf8(raw)
            .map_err(|e| SamlError::XmlParse(format!("message is not UTF-8: {e}")))?;
        let root = parse_element(xml)?;

        let signed = !root.recursive_children("Signature").is_empty();
        let status = match (&self.validator, signed) {
            (_, false) if self.require_signature => {
                return Err(SamlError::SignatureInvalid(format!(
                    "{} is not signed",
                    root.local_name()
                )));
            }
            (_, false) => SignatureStatus::Unsigned,
            (Some(validator), true) => {
                let checked = validator.validate_tree(xml, &root)?;
                tracing::debug!(signatures = checked, root = %root.local_name(), "embedded signatures valid");
                SignatureStatus::Verified
            }
            (None, true) if self.require_signature => {
                return Err(SamlError::SignatureInvalid(
                    "no trusted certificate configured".to_string(),
                ));
            }
            (None, true) => SignatureStatus::Unchecked,
        };

        Ok(ProtocolMessage::new(root, xml.to_string(), status))
    }
}

/// Parses an XML document into its element tree.
///
/// DTDs are refused outright; SAML messages never carry one.
///
/// # Errors
///
/// Returns `XmlParse` if the document is malformed, has no root element or
/// more than one.
pub fn parse_element(xml: &str) -> SamlResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let element = open_element(e, &mut scopes)?;
                stack.push(element);
            }
            Ok(Event::Empty(ref e)) => {
                let element = open_element(e, &mut scopes)?;
                scopes.pop();
                attach(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                scopes.pop();
                attach(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map_err(|e| SamlError::XmlParse(e.to_string()))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(SamlError::XmlParse(
                            "text outside the document element".to_string(),
                        ));
                    }
                }
            }
            Ok(Event::CData(ref c)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(c));
                }
            }
            Ok(Event::DocType(_)) => {
                return Err(SamlError::XmlParse("DOCTYPE is not allowed".to_string()));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SamlError::XmlParse(format!(
                    "at position {}: {e}",
                    reader.error_position()
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(SamlError::XmlParse(format!(
            "unclosed element <{}>",
            stack.last().map(Element::qualified_name).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| SamlError::XmlParse("document has no root element".to_string()))
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> SamlResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(SamlError::XmlParse(
            "document has more than one root element".to_string(),
        ));
    }
    *root = Some(element);
    Ok(())
}

fn open_element(e: &BytesStart<'_>, scopes: &mut Vec<Vec<(String, String)>>) -> SamlResult<Element> {
    let name = e.name();
    let qname = utf8(name.as_ref())?;
    let (prefix, local_name) = match qname.split_once(':') {
        Some((p, l)) => (Some(p.to_string()), l.to_string()),
        None => (None, qname.to_string()),
    };

    let mut scope = Vec::new();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| SamlError::XmlParse(err.to_string()))?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| SamlError::XmlParse(err.to_string()))?
            .into_owned();

        if key == "xmlns" {
            scope.push((String::new(), value));
        } else if let Some(declared) = key.strip_prefix("xmlns:") {
            scope.push((declared.to_string(), value));
        } else {
            attributes.push((key, value));
        }
    }
    scopes.push(scope);

    let lookup = prefix.as_deref().unwrap_or("");
    let namespace = scopes
        .iter()
        .rev()
        .flat_map(|s| s.iter())
        .find(|(p, _)| p == lookup)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty());

    Ok(Element {
        local_name,
        prefix,
        namespace,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::XmlParse(e.to_string()))
}
