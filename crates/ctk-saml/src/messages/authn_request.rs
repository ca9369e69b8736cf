//! `samlp:AuthnRequest` (Core §3.4.1).

use chrono::{DateTime, Utc};

use super::{escape, format_instant, generate_id, optional_attr, NameIdPolicy};
use crate::constants::{SamlBinding, SAMLP_NS, SAML_NS};

/// An authentication request sent by a synthetic Service Provider.
#[derive(Debug, Clone)]
pub struct AuthnRequest {
    /// Request ID.
    pub id: String,
    /// Issue instant.
    pub issue_instant: DateTime<Utc>,
    /// SP entity ID.
    pub issuer: String,
    /// IdP SSO endpoint.
    pub destination: Option<String>,
    /// Requested ACS URL.
    pub assertion_consumer_service_url: Option<String>,
    /// Requested ACS index, resolved against SP metadata.
    pub assertion_consumer_service_index: Option<u16>,
    /// Binding for the response.
    pub protocol_binding: Option<SamlBinding>,
    /// Requested NameID policy.
    pub name_id_policy: Option<NameIdPolicy>,
    /// Force re-authentication.
    pub force_authn: bool,
    /// Passive request.
    pub is_passive: bool,
}

impl AuthnRequest {
    /// Creates a request from `issuer` with a fresh ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            assertion_consumer_service_url: None,
            assertion_consumer_service_index: None,
            protocol_binding: None,
            name_id_policy: None,
            force_authn: false,
            is_passive: false,
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Asks for the response at an explicit ACS URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>, binding: SamlBinding) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self.protocol_binding = Some(binding);
        self
    }

    /// Asks for the response at the ACS with this metadata index. Mutually
    /// exclusive with an explicit URL (Core §3.4.1).
    #[must_use]
    pub fn with_acs_index(mut self, index: u16) -> Self {
        self.assertion_consumer_service_index = Some(index);
        self.assertion_consumer_service_url = None;
        self.protocol_binding = None;
        self
    }

    /// Sets the NameID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Renders the request.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let index = self
            .assertion_consumer_service_index
            .map(|i| i.to_string());
        let mut flags = String::new();
        if self.force_authn {
            flags.push_str(r#" ForceAuthn="true""#);
        }
        if self.is_passive {
            flags.push_str(r#" IsPassive="true""#);
        }

        format!(
            concat!(
                r#"<samlp:AuthnRequest xmlns:samlp="{samlp}" xmlns:saml="{saml}""#,
                r#" ID="{id}" Version="2.0" IssueInstant="{instant}"{destination}{acs_url}{acs_index}{binding}{flags}>"#,
                "<saml:Issuer>{issuer}</saml:Issuer>",
                "{policy}",
                "</samlp:AuthnRequest>"
            ),
            samlp = SAMLP_NS,
            saml = SAML_NS,
            id = escape(&self.id),
            instant = format_instant(self.issue_instant),
            destination = optional_attr("Destination", self.destination.as_deref()),
            acs_url = optional_attr(
                "AssertionConsumerServiceURL",
                self.assertion_consumer_service_url.as_deref()
            ),
            acs_index = optional_attr("AssertionConsumerServiceIndex", index.as_deref()),
            binding = optional_attr("ProtocolBinding", self.protocol_binding.map(|b| b.uri())),
            flags = flags,
            issuer = escape(&self.issuer),
            policy = self
                .name_id_policy
                .as_ref()
                .map(NameIdPolicy::to_xml)
                .unwrap_or_default(),
        )
    }
}
