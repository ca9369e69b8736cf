//! NameID and NameIDPolicy.

use serde::{Deserialize, Serialize};

use super::{escape, optional_attr};
use crate::constants::NameIdFormat;

/// A `saml:NameID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameId {
    /// The identifier value.
    pub value: String,
    /// Format URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// SP name qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a NameID without a format.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            sp_name_qualifier: None,
        }
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Renders the element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            "<saml:NameID{}{}>{}</saml:NameID>",
            optional_attr("Format", self.format.as_deref()),
            optional_attr("SPNameQualifier", self.sp_name_qualifier.as_deref()),
            escape(&self.value)
        )
    }
}

/// A `samlp:NameIDPolicy` (Core §3.4.1.1).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NameIdPolicy {
    /// Requested format.
    #[serde(default)]
    pub format: Option<NameIdFormat>,
    /// Whether the IdP may create a new identifier.
    #[serde(default)]
    pub allow_create: bool,
    /// Requested SP name qualifier.
    #[serde(default)]
    pub sp_name_qualifier: Option<String>,
}

impl NameIdPolicy {
    /// Policy requesting a specific format.
    #[must_use]
    pub fn with_format(format: NameIdFormat) -> Self {
        Self {
            format: Some(format),
            ..Self::default()
        }
    }

    /// Renders the element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            r#"<samlp:NameIDPolicy{}{} AllowCreate="{}"/>"#,
            optional_attr("Format", self.format.map(|f| f.uri())),
            optional_attr("SPNameQualifier", self.sp_name_qualifier.as_deref()),
            self.allow_create
        )
    }
}
