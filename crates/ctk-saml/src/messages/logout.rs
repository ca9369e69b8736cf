//! Single Logout messages (Core §3.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{escape, format_instant, generate_id, optional_attr, NameId, Status};
use crate::constants::{SAMLP_NS, SAML_NS};

/// A `samlp:LogoutRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Request ID.
    pub id: String,
    /// Issue instant.
    pub issue_instant: DateTime<Utc>,
    /// Requester entity ID.
    pub issuer: String,
    /// Endpoint the request is sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Principal to log out.
    pub name_id: NameId,
    /// Session indexes to terminate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_indexes: Vec<String>,
    /// Logout reason URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Expiry of the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl LogoutRequest {
    /// User-initiated logout.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Creates a request with a fresh ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>, name_id: NameId) -> Self {
        Self {
            id: generate_id(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            name_id,
            session_indexes: Vec::new(),
            reason: None,
            not_on_or_after: None,
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds a session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Renders the request.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let not_on_or_after = self.not_on_or_after.map(format_instant);
        let session_indexes: String = self
            .session_indexes
            .iter()
            .map(|s| format!("<samlp:SessionIndex>{}</samlp:SessionIndex>", escape(s)))
            .collect();

        format!(
            concat!(
                r#"<samlp:LogoutRequest xmlns:samlp="{samlp}" xmlns:saml="{saml}""#,
                r#" ID="{id}" Version="2.0" IssueInstant="{instant}"{destination}{reason}{expiry}>"#,
                "<saml:Issuer>{issuer}</saml:Issuer>",
                "{name_id}{session_indexes}",
                "</samlp:LogoutRequest>"
            ),
            samlp = SAMLP_NS,
            saml = SAML_NS,
            id = escape(&self.id),
            instant = format_instant(self.issue_instant),
            destination = optional_attr("Destination", self.destination.as_deref()),
            reason = optional_attr("Reason", self.reason.as_deref()),
            expiry = optional_attr("NotOnOrAfter", not_on_or_after.as_deref()),
            issuer = escape(&self.issuer),
            name_id = self.name_id.to_xml(),
            session_indexes = session_indexes,
        )
    }
}

/// A `samlp:LogoutResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Response ID.
    pub id: String,
    /// Issue instant.
    pub issue_instant: DateTime<Utc>,
    /// Responder entity ID.
    pub issuer: String,
    /// ID of the request being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,
    /// Endpoint the response is sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Outcome.
    pub status: Status,
}

impl LogoutResponse {
    /// A response with the given status.
    #[must_use]
    pub fn new(issuer: impl Into<String>, status: Status) -> Self {
        Self {
            id: generate_id(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            in_response_to: None,
            destination: None,
            status,
        }
    }

    /// A `Success` response.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self::new(issuer, Status::success())
    }

    /// Links the response to its request.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Renders the response.
    #[must_use]
    pub fn to_xml(&self) -> String {
        format!(
            concat!(
                r#"<samlp:LogoutResponse xmlns:samlp="{samlp}" xmlns:saml="{saml}""#,
                r#" ID="{id}" Version="2.0" IssueInstant="{instant}"{destination}{in_response_to}>"#,
                "<saml:Issuer>{issuer}</saml:Issuer>",
                "{status}",
                "</samlp:LogoutResponse>"
            ),
            samlp = SAMLP_NS,
            saml = SAML_NS,
            id = escape(&self.id),
            instant = format_instant(self.issue_instant),
            destination = optional_attr("Destination", self.destination.as_deref()),
            in_response_to = optional_attr("InResponseTo", self.in_response_to.as_deref()),
            issuer = escape(&self.issuer),
            status = self.status.to_xml(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{status_codes, NameIdFormat};
    use crate::document::{MessageParser, XmlMessageParser};

    #[test]
    fn logout_request_renders_session_indexes() {
        let request = LogoutRequest::new(
            "https://sp.example.org",
            NameId::new("alice").with_format(NameIdFormat::Persistent),
        )
        .with_destination("https://idp.example.org/slo")
        .with_session_index("s1")
        .with_session_index("s2")
        .with_reason(LogoutRequest::REASON_USER);

        let msg = XmlMessageParser::default()
            .parse(request.to_xml().as_bytes())
            .unwrap();
        let root = msg.root();
        assert_eq!(root.local_name(), "LogoutRequest");
        assert_eq!(root.children("SessionIndex").len(), 2);
        assert_eq!(root.child("NameID").unwrap().text(), "alice");
        assert_eq!(
            root.optional_attribute("Destination"),
            Some("https://idp.example.org/slo")
        );
        assert!(root.optional_attribute("IssueInstant").unwrap().ends_with('Z'));
    }

    #[test]
    fn logout_response_links_request() {
        let response = LogoutResponse::success("https://sp.example.org").in_response_to("_req1");
        let msg = XmlMessageParser::default()
            .parse(response.to_xml().as_bytes())
            .unwrap();
        let root = msg.root();
        assert_eq!(root.optional_attribute("InResponseTo"), Some("_req1"));
        assert_eq!(
            root.recursive_children("StatusCode")[0].optional_attribute("Value"),
            Some(status_codes::SUCCESS)
        );
    }
}
