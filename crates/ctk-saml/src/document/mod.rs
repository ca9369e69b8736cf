//! Navigable, immutable SAML document tree.
//!
//! A [`ProtocolMessage`] is what the verification engine inspects. It can
//! only be obtained from a [`MessageParser`], so a message in hand has always
//! been through signature checking first.
//!
//! Navigation never fails: a missing element or attribute is an empty
//! sequence or `None`.

mod parser;

pub use parser::{parse_element, MessageParser, XmlMessageParser};

use std::fmt;

/// How the parser dealt with signatures on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Every embedded signature validated against a trusted certificate.
    Verified,
    /// The message carried a detached (query string) signature that the
    /// binding layer validated.
    VerifiedDetached,
    /// No signature present and none was required.
    Unsigned,
    /// Signatures present but no trusted certificate configured to check them.
    Unchecked,
}

/// A parsed SAML protocol message (Response, LogoutRequest, LogoutResponse,
/// AuthnRequest or a bare Assertion).
#[derive(Debug, Clone)]
pub struct ProtocolMessage {
    root: Element,
    raw_xml: String,
    signature_status: SignatureStatus,
}

impl ProtocolMessage {
    pub(crate) fn new(root: Element, raw_xml: String, signature_status: SignatureStatus) -> Self {
        Self {
            root,
            raw_xml,
            signature_status,
        }
    }

    /// Returns the document element.
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Returns the XML the message was parsed from.
    #[must_use]
    pub fn raw_xml(&self) -> &str {
        &self.raw_xml
    }

    /// Returns the signature handling outcome.
    #[must_use]
    pub const fn signature_status(&self) -> SignatureStatus {
        self.signature_status
    }

    /// Marks the message as covered by a detached signature.
    #[must_use]
    pub fn with_detached_signature(mut self) -> Self {
        self.signature_status = SignatureStatus::VerifiedDetached;
        self
    }

    /// Local name of the document element, e.g. `Response`.
    #[must_use]
    pub fn kind(&self) -> &str {
        self.root.local_name()
    }

    /// Path of the document element.
    #[must_use]
    pub fn root_path(&self) -> NodePath {
        NodePath::root(self.root.local_name())
    }

    /// All descendants of the root named `local_name`, with their paths.
    #[must_use]
    pub fn locate(&self, local_name: &str) -> Vec<(NodePath, &Element)> {
        self.root
            .recursive_children_located(local_name, &self.root_path())
    }
}

/// An XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub(crate) local_name: String,
    pub(crate) prefix: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) children: Vec<Element>,
    pub(crate) text: String,
}

impl Element {
    /// Local name without prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Namespace prefix as written in the document.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Resolved namespace URI, if the prefix was declared.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Qualified name as written, e.g. `saml:Assertion`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// Looks up an attribute by name.
    ///
    /// Unprefixed names match unprefixed attributes; a prefixed name such as
    /// `xsi:type` matches exactly.
    #[must_use]
    pub fn optional_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the attribute is present (even if empty).
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.optional_attribute(name).is_some()
    }

    /// Attributes in document order, namespace declarations excluded.
    #[must_use]
    pub fn attribute_list(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Concatenated, trimmed text content of this element.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All direct children in document order.
    #[must_use]
    pub fn all_children(&self) -> &[Element] {
        &self.children
    }

    /// Direct children with the given local name.
    #[must_use]
    pub fn children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|c| c.local_name == local_name)
            .collect()
    }

    /// First direct child with the given local name.
    #[must_use]
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name == local_name)
    }

    /// All descendants with the given local name, depth-first in document
    /// order. The element itself is not included.
    #[must_use]
    pub fn recursive_children(&self, local_name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(local_name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, local_name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.local_name == local_name {
                found.push(child);
            }
            child.collect_descendants(local_name, found);
        }
    }

    /// Like [`Element::recursive_children`], pairing each match with its
    /// path below `at`.
    #[must_use]
    pub fn recursive_children_located(
        &self,
        local_name: &str,
        at: &NodePath,
    ) -> Vec<(NodePath, &Element)> {
        let mut found = Vec::new();
        self.collect_located(local_name, at, &mut found);
        found
    }

    fn collect_located<'a>(
        &'a self,
        local_name: &str,
        at: &NodePath,
        found: &mut Vec<(NodePath, &'a Element)>,
    ) {
        let mut seen: Vec<(&str, usize)> = Vec::new();
        for child in &self.children {
            let index = match seen.iter_mut().find(|(n, _)| *n == child.local_name) {
                Some((_, count)) => {
                    *count += 1;
                    *count - 1
                }
                None => {
                    seen.push((child.local_name.as_str(), 1));
                    0
                }
            };
            let path = at.child(&child.local_name, index);
            if child.local_name == local_name {
                found.push((path.clone(), child));
            }
            child.collect_located(local_name, &path, found);
        }
    }

    /// Finds this element or a descendant whose `ID` attribute equals `id`.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if self.optional_attribute("ID") == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }
}

/// Breadcrumb to an element, e.g. `Response/Assertion[0]/Subject[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    root: String,
    segments: Vec<(String, usize)>,
}

impl NodePath {
    /// Path of a document element.
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self {
            root: name.to_string(),
            segments: Vec::new(),
        }
    }

    /// Path of the `index`-th child named `name` below this path.
    #[must_use]
    pub fn child(&self, name: &str, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push((name.to_string(), index));
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    /// Number of segments below the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Local name of the last element on the path.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.segments
            .last()
            .map_or(self.root.as_str(), |(n, _)| n.as_str())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for (name, index) in &self.segments {
            write!(f, "/{name}[{index}]")?;
        }
        Ok(())
    }
}
