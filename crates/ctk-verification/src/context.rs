//! Per-scenario verification context.
//!
//! Verifiers only ever borrow a [`VerificationContext`]. The orchestration
//! layer owns it and is the only code that changes it, between protocol
//! steps (for example when the active Service Provider switches).

use chrono::{DateTime, Duration, Utc};
use ctk_saml::messages::{AuthnRequest, LogoutRequest, NameIdPolicy};
use ctk_saml::metadata::EntityInformation;
use ctk_saml::SamlBinding;
use serde::{Deserialize, Serialize};

/// Rule toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePolicy {
    /// Check the returned NameID against the requested NameIDPolicy
    /// (Core §3.4.1.1) and require `EncryptedID` when the encrypted format
    /// was requested. Off by default: many IdPs ignore the requested format.
    pub enforce_name_id_policy: bool,
    /// Require a `Destination` on signed Redirect/POST messages
    /// (Bindings §3.4.5.2, §3.5.5.2).
    pub require_signed_destination: bool,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            enforce_name_id_policy: false,
            require_signed_destination: true,
        }
    }
}

/// Which request provoked the message under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `AuthnRequest`.
    Authn,
    /// `LogoutRequest`.
    Logout,
}

/// The fields of the original request that responses are checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalRequest {
    /// Request kind.
    pub kind: RequestKind,
    /// Request `ID`.
    pub id: String,
    /// Requester entity ID.
    pub issuer: String,
    /// Explicit `AssertionConsumerServiceURL`.
    pub acs_url: Option<String>,
    /// `AssertionConsumerServiceIndex`.
    pub acs_index: Option<u16>,
    /// `ProtocolBinding`.
    pub protocol_binding: Option<SamlBinding>,
    /// Requested NameID policy.
    pub name_id_policy: Option<NameIdPolicy>,
}

impl From<&AuthnRequest> for OriginalRequest {
    fn from(request: &AuthnRequest) -> Self {
        Self {
            kind: RequestKind::Authn,
            id: request.id.clone(),
            issuer: request.issuer.clone(),
            acs_url: request.assertion_consumer_service_url.clone(),
            acs_index: request.assertion_consumer_service_index,
            protocol_binding: request.protocol_binding,
            name_id_policy: request.name_id_policy.clone(),
        }
    }
}

impl From<&LogoutRequest> for OriginalRequest {
    fn from(request: &LogoutRequest) -> Self {
        Self {
            kind: RequestKind::Logout,
            id: request.id.clone(),
            issuer: request.issuer.clone(),
            acs_url: None,
            acs_index: None,
            protocol_binding: None,
            name_id_policy: None,
        }
    }
}

/// Everything a verifier needs to know beyond the message itself.
#[derive(Debug, Clone)]
pub struct VerificationContext {
    request: Option<OriginalRequest>,
    expected_issuer: Option<String>,
    expected_audience: String,
    service_provider: Option<EntityInformation>,
    expected_relay_state: Option<String>,
    binding: Option<SamlBinding>,
    is_request: bool,
    evaluated_at: DateTime<Utc>,
    clock_skew: Duration,
    policy: RulePolicy,
}

impl VerificationContext {
    /// Default clock skew tolerance.
    pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 60;

    /// Creates a context for a scenario run by the SP `audience`.
    ///
    /// The evaluation instant is fixed at creation so that verifying the same
    /// message twice gives the same result.
    #[must_use]
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            request: None,
            expected_issuer: None,
            expected_audience: audience.into(),
            service_provider: None,
            expected_relay_state: None,
            binding: None,
            is_request: false,
            evaluated_at: Utc::now(),
            clock_skew: Duration::seconds(Self::DEFAULT_CLOCK_SKEW_SECS),
            policy: RulePolicy::default(),
        }
    }

    /// Sets the request the message under test answers.
    #[must_use]
    pub fn with_request(mut self, request: impl Into<OriginalRequest>) -> Self {
        self.request = Some(request.into());
        self
    }

    /// Sets the entity ID the message must be issued by.
    #[must_use]
    pub fn with_expected_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.expected_issuer = Some(issuer.into());
        self
    }

    /// Sets the active SP's metadata.
    #[must_use]
    pub fn with_service_provider(mut self, entity: EntityInformation) -> Self {
        self.service_provider = Some(entity);
        self
    }

    /// Sets the RelayState that must come back.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.expected_relay_state = Some(relay_state.into());
        self
    }

    /// Sets the binding the message arrives on.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.binding = Some(binding);
        self
    }

    /// Marks the message under test as a request rather than a response.
    #[must_use]
    pub fn expecting_request(mut self, is_request: bool) -> Self {
        self.is_request = is_request;
        self
    }

    /// Fixes the evaluation instant.
    #[must_use]
    pub fn at_instant(mut self, instant: DateTime<Utc>) -> Self {
        self.evaluated_at = instant;
        self
    }

    /// Sets the clock skew tolerance.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Sets the rule toggles.
    #[must_use]
    pub fn with_policy(mut self, policy: RulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Switches the active Service Provider between protocol steps.
    pub fn switch_service_provider(
        &mut self,
        audience: impl Into<String>,
        entity: Option<EntityInformation>,
    ) {
        self.expected_audience = audience.into();
        self.service_provider = entity;
    }

    /// Replaces the request subsequent messages must answer.
    pub fn set_request(&mut self, request: Option<OriginalRequest>) {
        self.request = request;
    }

    /// Replaces the expected RelayState.
    pub fn set_relay_state(&mut self, relay_state: Option<String>) {
        self.expected_relay_state = relay_state;
    }

    /// Sets the binding and direction of the next message.
    pub fn set_incoming(&mut self, binding: SamlBinding, is_request: bool) {
        self.binding = Some(binding);
        self.is_request = is_request;
    }

    /// Restarts the evaluation clock.
    pub fn refresh_instant(&mut self) {
        self.evaluated_at = Utc::now();
    }

    /// The original request, if any.
    #[must_use]
    pub const fn request(&self) -> Option<&OriginalRequest> {
        self.request.as_ref()
    }

    /// Expected issuer of the message under test.
    #[must_use]
    pub fn expected_issuer(&self) -> Option<&str> {
        self.expected_issuer.as_deref()
    }

    /// Entity ID assertions must be restricted to.
    #[must_use]
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    /// Active SP's metadata.
    #[must_use]
    pub const fn service_provider(&self) -> Option<&EntityInformation> {
        self.service_provider.as_ref()
    }

    /// RelayState the message must carry.
    #[must_use]
    pub fn expected_relay_state(&self) -> Option<&str> {
        self.expected_relay_state.as_deref()
    }

    /// Returns true if a RelayState was supplied with the request.
    #[must_use]
    pub const fn relay_state_given(&self) -> bool {
        self.expected_relay_state.is_some()
    }

    /// Binding the message arrived on.
    #[must_use]
    pub const fn binding(&self) -> Option<SamlBinding> {
        self.binding
    }

    /// Returns true if the message under test is a request.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        self.is_request
    }

    /// Requested NameID policy, if the original request carried one.
    #[must_use]
    pub fn expected_name_id_policy(&self) -> Option<&NameIdPolicy> {
        self.request.as_ref()?.name_id_policy.as_ref()
    }

    /// Instant time windows are evaluated at.
    #[must_use]
    pub const fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }

    /// Clock skew tolerance.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Rule toggles.
    #[must_use]
    pub const fn policy(&self) -> &RulePolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_saml::NameIdFormat;

    #[test]
    fn authn_request_fields_are_captured() {
        let request = AuthnRequest::new("https://sp.example.org")
            .with_acs_index(3)
            .with_name_id_policy(NameIdPolicy::with_format(NameIdFormat::Persistent));
        let ctx = VerificationContext::new("https://sp.example.org").with_request(&request);

        let original = ctx.request().unwrap();
        assert_eq!(original.kind, RequestKind::Authn);
        assert_eq!(original.id, request.id);
        assert_eq!(original.acs_index, Some(3));
        assert_eq!(
            ctx.expected_name_id_policy().unwrap().format,
            Some(NameIdFormat::Persistent)
        );
    }

    #[test]
    fn switching_service_provider_changes_audience_only() {
        let mut ctx = VerificationContext::new("https://sp1.example.org")
            .with_expected_issuer("https://idp.example.org")
            .with_relay_state("state");
        ctx.switch_service_provider("https://sp2.example.org", None);

        assert_eq!(ctx.expected_audience(), "https://sp2.example.org");
        assert_eq!(ctx.expected_issuer(), Some("https://idp.example.org"));
        assert!(ctx.relay_state_given());
    }

    #[test]
    fn default_policy() {
        let policy = RulePolicy::default();
        assert!(!policy.enforce_name_id_policy);
        assert!(policy.require_signed_destination);
    }
}
