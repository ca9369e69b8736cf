//! Tree navigation used by every verifier.
//!
//! Thin free-function wrappers over [`Element`] so verifiers read the same
//! way whichever node they start from. Absence is always an empty sequence.

use ctk_saml::{Element, NodePath};

/// Direct children named `local_name`, in document order.
#[must_use]
pub fn children<'a>(node: &'a Element, local_name: &str) -> Vec<&'a Element> {
    node.children(local_name)
}

/// All descendants named `local_name`, depth-first in document order.
#[must_use]
pub fn recursive_children<'a>(node: &'a Element, local_name: &str) -> Vec<&'a Element> {
    node.recursive_children(local_name)
}

/// Like [`recursive_children`] with the path of each match below `at`.
#[must_use]
pub fn located<'a>(node: &'a Element, local_name: &str, at: &NodePath) -> Vec<(NodePath, &'a Element)> {
    node.recursive_children_located(local_name, at)
}

/// Direct children named `local_name` with their paths below `at`.
#[must_use]
pub fn located_children<'a>(
    node: &'a Element,
    local_name: &str,
    at: &NodePath,
) -> Vec<(NodePath, &'a Element)> {
    node.children(local_name)
        .into_iter()
        .enumerate()
        .map(|(i, child)| (at.child(local_name, i), child))
        .collect()
}

/// Attributes as `(name, value)` pairs in document order.
#[must_use]
pub fn attribute_list(node: &Element) -> &[(String, String)] {
    node.attribute_list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_saml::document::parse_element;

    const XML: &str = r#"<Response><Assertion ID="a1"><Subject><NameID>alice</NameID></Subject></Assertion><Assertion ID="a2"><Subject/></Assertion><Extra/></Response>"#;

    #[test]
    fn absence_is_empty() {
        let root = parse_element(XML).unwrap();
        assert!(children(&root, "Nothing").is_empty());
        assert!(recursive_children(&root, "Nothing").is_empty());
        assert!(attribute_list(&root).is_empty());
    }

    #[test]
    fn located_children_are_indexed_per_name() {
        let root = parse_element(XML).unwrap();
        let found = located_children(&root, "Assertion", &NodePath::root("Response"));
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].0.to_string(), "Response/Assertion[1]");
        assert_eq!(found[1].1.optional_attribute("ID"), Some("a2"));
    }

    #[test]
    fn recursive_search_is_document_order() {
        let root = parse_element(XML).unwrap();
        let subjects = located(&root, "Subject", &NodePath::root("Response"));
        let paths: Vec<String> = subjects.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            paths,
            ["Response/Assertion[0]/Subject[0]", "Response/Assertion[1]/Subject[0]"]
        );
    }
}
