//! Common test utilities and fixtures.
//!
//! [`FakeIdp`] is an in-process identity provider reached through the
//! runner's [`Transport`] seam. It implements just enough of Web Browser SSO
//! and Single Logout to drive every scenario, and can be told to misbehave
//! in specific ways through [`Quirks`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use ctk_core::{UserConfig, VerificationConfig};
use ctk_crypto::{generate_rsa_key, RsaAlgorithm, RsaKeyMaterial};
use ctk_runner::{
    Environment, HttpExchange, IdentityProvider, OutboundRequest, Participants, ScenarioRunner,
    ServiceProvider, Transport, TransportError, TransportFactory,
};
use ctk_saml::bindings::{DecodedMessage, HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use ctk_saml::messages::{format_instant, generate_id, LogoutRequest, LogoutResponse, NameId, Status};
use ctk_saml::signature::{RedirectSigner, SigningKey, VerificationKey, XmlSigner};
use ctk_saml::{MessageParser, NameIdFormat, SamlBinding, XmlMessageParser, CM_BEARER, SAMLP_NS, SAML_NS};

pub const IDP: &str = "https://idp.test/realms/ctk";
pub const IDP_BASE: &str = "https://idp.test";
pub const SP1: &str = "https://sp1.test/metadata";
pub const SP2: &str = "https://sp2.test/metadata";
pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "wonderland";

const SUBJECT: &str = "alice@idp.test";

/// Ways the identity provider can break the rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quirks {
    /// Restrict assertions to an audience other than the requesting SP.
    pub wrong_audience: bool,
    /// Deliver the SSO response somewhere other than the requested ACS.
    pub wrong_acs: bool,
    /// Send every message unsigned.
    pub unsigned: bool,
    /// Omit the RelayState from the final logout response.
    pub drop_relay_state: bool,
    /// Answer `Success` even when a participant failed to log out.
    pub ignore_partial_logout: bool,
    /// Answer the initiator directly instead of logging out the other
    /// participants.
    pub skip_propagation: bool,
}

/// A service provider as the IdP knows it.
#[derive(Debug, Clone)]
struct Registration {
    entity_id: &'static str,
    acs_url: String,
    slo_url: String,
}

impl Registration {
    fn new(entity_id: &'static str, host: &str) -> Self {
        Self {
            entity_id,
            acs_url: format!("https://{host}/saml/acs"),
            slo_url: format!("https://{host}/saml/slo"),
        }
    }
}

#[derive(Debug)]
struct Setup {
    key: SigningKey,
    quirks: Quirks,
    registrations: Vec<Registration>,
}

impl Setup {
    fn registration(&self, entity_id: &str) -> anyhow::Result<&Registration> {
        self.registrations
            .iter()
            .find(|r| r.entity_id == entity_id)
            .ok_or_else(|| anyhow::anyhow!("unknown service provider {entity_id}"))
    }
}

#[derive(Debug)]
struct PendingLogin {
    request_id: String,
    sp: String,
    acs_url: String,
}

#[derive(Debug)]
struct PendingLogout {
    initiator: String,
    request_id: String,
    relay_state: Option<String>,
    remaining: Vec<String>,
    awaiting: Option<String>,
    partial: bool,
}

#[derive(Debug, Default)]
struct State {
    logins: HashMap<String, PendingLogin>,
    sessions: Vec<(String, String)>,
    logout: Option<PendingLogout>,
    counter: u32,
}

impl State {
    fn token(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}-{}", self.counter)
    }
}

/// One browser's view of the identity provider: its own login and logout
/// state, like a cookie jar.
#[derive(Debug)]
pub struct FakeIdp {
    setup: Arc<Setup>,
    state: Mutex<State>,
}

/// Hands every scenario a fresh [`FakeIdp`] session.
#[derive(Debug, Clone)]
pub struct FakeIdpFactory {
    setup: Arc<Setup>,
}

impl TransportFactory for FakeIdpFactory {
    fn create(&self) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(FakeIdp {
            setup: Arc::clone(&self.setup),
            state: Mutex::new(State::default()),
        }))
    }
}

#[async_trait]
impl Transport for FakeIdp {
    async fn send(&self, request: OutboundRequest) -> Result<HttpExchange, TransportError> {
        let url = url::Url::parse(request.url())
            .map_err(|e| TransportError::Client(format!("bad URL {}: {e}", request.url())))?;
        if url.host_str() != Some("idp.test") {
            return Err(TransportError::Connection {
                url: request.url().to_string(),
                message: "unknown host".to_string(),
            });
        }

        let mut state = self.state.lock().await;
        let result = match (request.method(), url.path()) {
            ("GET", "/sso/redirect") => HttpRedirectBinding::decode_url(request.url())
                .map_err(anyhow::Error::from)
                .and_then(|decoded| self.authn_request(&mut state, &decoded)),
            ("POST", "/sso/post") => post_message(&request)
                .and_then(|decoded| self.authn_request(&mut state, &decoded)),
            ("GET", "/login") => Ok(login_page(&url)),
            ("POST", "/login") => self.login(&mut state, &request),
            ("GET", "/slo/redirect") => HttpRedirectBinding::decode_url(request.url())
                .map_err(anyhow::Error::from)
                .and_then(|decoded| self.logout(&mut state, &decoded, SamlBinding::HttpRedirect)),
            ("POST", "/slo/post") => post_message(&request)
                .and_then(|decoded| self.logout(&mut state, &decoded, SamlBinding::HttpPost)),
            _ => Ok(page(404, "<p>Not found</p>".to_string())),
        };
        Ok(result
            .map(|mut exchange| {
                exchange.url = request.url().to_string();
                exchange
            })
            .unwrap_or_else(|e| {
                let mut exchange = page(400, format!("<p>{e}</p>"));
                exchange.url = request.url().to_string();
                exchange
            }))
    }
}

impl FakeIdp {
    fn authn_request(
        &self,
        state: &mut State,
        decoded: &DecodedMessage,
    ) -> anyhow::Result<HttpExchange> {
        let message = XmlMessageParser::default().parse(decoded.xml.as_bytes())?;
        let root = message.root();
        anyhow::ensure!(message.kind() == "AuthnRequest", "expected an AuthnRequest");

        let sp = root
            .child("Issuer")
            .map(|issuer| issuer.text().trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("AuthnRequest has no Issuer"))?;
        let registration = self.setup.registration(&sp)?;
        let acs_url = root
            .optional_attribute("AssertionConsumerServiceURL")
            .unwrap_or(&registration.acs_url)
            .to_string();
        let request_id = root
            .optional_attribute("ID")
            .ok_or_else(|| anyhow::anyhow!("AuthnRequest has no ID"))?
            .to_string();

        let auth_state = state.token("auth");
        state.logins.insert(
            auth_state.clone(),
            PendingLogin {
                request_id,
                sp,
                acs_url,
            },
        );
        Ok(HttpExchange {
            url: String::new(),
            status: 302,
            location: Some(format!("/login?AuthState={auth_state}")),
            body: String::new(),
        })
    }

    fn login(&self, state: &mut State, request: &OutboundRequest) -> anyhow::Result<HttpExchange> {
        if request.field("username") != Some(USERNAME) || request.field("password") != Some(PASSWORD)
        {
            return Ok(page(200, "<p>Invalid username or password.</p>".to_string()));
        }
        let auth_state = request
            .field("AuthState")
            .ok_or_else(|| anyhow::anyhow!("login without AuthState"))?;
        let pending = state
            .logins
            .remove(auth_state)
            .ok_or_else(|| anyhow::anyhow!("unknown AuthState {auth_state}"))?;

        let session_index = state.token("_session");
        state.sessions.push((pending.sp.clone(), session_index.clone()));

        let (xml, id) = self.response_xml(&pending, &session_index);
        let acs_url = if self.setup.quirks.wrong_acs {
            format!("{}/elsewhere", pending.acs_url)
        } else {
            pending.acs_url
        };
        self.deliver(
            SamlBinding::HttpPost,
            &xml,
            &id,
            &acs_url,
            None,
            SamlMessageType::Response,
        )
    }

    fn response_xml(&self, pending: &PendingLogin, session_index: &str) -> (String, String) {
        let now = Utc::now();
        let id = generate_id();
        let audience = if self.setup.quirks.wrong_audience {
            "https://someone-else.test"
        } else {
            pending.sp.as_str()
        };
        let xml = format!(
            concat!(
                r#"<samlp:Response xmlns:samlp="{samlp}" xmlns:saml="{saml}" ID="{id}" Version="2.0""#,
                r#" IssueInstant="{now}" Destination="{acs}" InResponseTo="{request_id}">"#,
                "<saml:Issuer>{idp}</saml:Issuer>",
                "{status}",
                r#"<saml:Assertion ID="{assertion_id}" Version="2.0" IssueInstant="{now}">"#,
                "<saml:Issuer>{idp}</saml:Issuer>",
                r#"<saml:Subject><saml:NameID Format="{format}">{subject}</saml:NameID>"#,
                r#"<saml:SubjectConfirmation Method="{bearer}">"#,
                r#"<saml:SubjectConfirmationData NotOnOrAfter="{later}" Recipient="{acs}" InResponseTo="{request_id}"/>"#,
                "</saml:SubjectConfirmation></saml:Subject>",
                r#"<saml:Conditions NotBefore="{earlier}" NotOnOrAfter="{later}">"#,
                "<saml:AudienceRestriction><saml:Audience>{audience}</saml:Audience></saml:AudienceRestriction>",
                "</saml:Conditions>",
                r#"<saml:AuthnStatement AuthnInstant="{now}" SessionIndex="{session_index}">"#,
                "<saml:AuthnContext><saml:AuthnContextClassRef>",
                "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport",
                "</saml:AuthnContextClassRef></saml:AuthnContext></saml:AuthnStatement>",
                "</saml:Assertion></samlp:Response>"
            ),
            samlp = SAMLP_NS,
            saml = SAML_NS,
            id = id,
            now = format_instant(now),
            earlier = format_instant(now - Duration::seconds(30)),
            later = format_instant(now + Duration::minutes(5)),
            acs = pending.acs_url,
            request_id = pending.request_id,
            idp = IDP,
            status = Status::success().to_xml(),
            assertion_id = generate_id(),
            format = NameIdFormat::Persistent.uri(),
            subject = SUBJECT,
            bearer = CM_BEARER,
            audience = audience,
            session_index = session_index,
        );
        (xml, id)
    }

    fn logout(
        &self,
        state: &mut State,
        decoded: &DecodedMessage,
        binding: SamlBinding,
    ) -> anyhow::Result<HttpExchange> {
        let message = XmlMessageParser::default().parse(decoded.xml.as_bytes())?;
        let root = message.root();
        match decoded.message_type {
            SamlMessageType::Request => {
                anyhow::ensure!(message.kind() == "LogoutRequest", "expected a LogoutRequest");
                let initiator = root
                    .child("Issuer")
                    .map(|issuer| issuer.text().trim().to_string())
                    .ok_or_else(|| anyhow::anyhow!("LogoutRequest has no Issuer"))?;
                let request_id = root
                    .optional_attribute("ID")
                    .ok_or_else(|| anyhow::anyhow!("LogoutRequest has no ID"))?
                    .to_string();
                let remaining = if self.setup.quirks.skip_propagation {
                    Vec::new()
                } else {
                    state
                        .sessions
                        .iter()
                        .map(|(sp, _)| sp.clone())
                        .filter(|sp| *sp != initiator)
                        .collect()
                };
                state.logout = Some(PendingLogout {
                    initiator,
                    request_id,
                    relay_state: decoded.relay_state.clone(),
                    remaining,
                    awaiting: None,
                    partial: false,
                });
            }
            SamlMessageType::Response => {
                anyhow::ensure!(message.kind() == "LogoutResponse", "expected a LogoutResponse");
                let success = root
                    .child("Status")
                    .and_then(|status| status.child("StatusCode"))
                    .and_then(|code| code.optional_attribute("Value"))
                    == Some(ctk_saml::status_codes::SUCCESS);
                let logout = state
                    .logout
                    .as_mut()
                    .ok_or_else(|| anyhow::anyhow!("no logout in progress"))?;
                let answered = logout
                    .awaiting
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("unsolicited LogoutResponse"))?;
                logout.partial |= !success;
                state.sessions.retain(|(sp, _)| *sp != answered || !success);
            }
        }
        self.continue_logout(state, binding)
    }

    /// Propagates the logout to the next participant, or answers the
    /// initiator once none is left.
    fn continue_logout(&self, state: &mut State, binding: SamlBinding) -> anyhow::Result<HttpExchange> {
        let relay = state.token("idp-logout");
        let logout = state
            .logout
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("no logout in progress"))?;

        if let Some(next) = logout.remaining.pop() {
            let registration = self.setup.registration(&next)?;
            let session_index = state
                .sessions
                .iter()
                .find(|(sp, _)| *sp == next)
                .map(|(_, index)| index.clone());
            let mut request = LogoutRequest::new(IDP, subject()).with_destination(&registration.slo_url);
            if let Some(index) = session_index {
                request = request.with_session_index(index);
            }
            logout.awaiting = Some(next);
            return self.deliver(
                binding,
                &request.to_xml(),
                &request.id,
                &registration.slo_url,
                Some(&relay),
                SamlMessageType::Request,
            );
        }

        let Some(logout) = state.logout.take() else {
            anyhow::bail!("no logout in progress");
        };
        let initiator = self.setup.registration(&logout.initiator)?;
        state.sessions.retain(|(sp, _)| *sp != logout.initiator);
        let status = if logout.partial && !self.setup.quirks.ignore_partial_logout {
            Status::partial_logout()
        } else {
            Status::success()
        };
        let response = LogoutResponse::new(IDP, status)
            .in_response_to(&logout.request_id)
            .with_destination(&initiator.slo_url);
        let relay_state = if self.setup.quirks.drop_relay_state {
            None
        } else {
            logout.relay_state.as_deref()
        };
        self.deliver(
            binding,
            &response.to_xml(),
            &response.id,
            &initiator.slo_url,
            relay_state,
            SamlMessageType::Response,
        )
    }

    fn deliver(
        &self,
        binding: SamlBinding,
        xml: &str,
        id: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> anyhow::Result<HttpExchange> {
        let unsigned = self.setup.quirks.unsigned;
        match binding {
            SamlBinding::HttpRedirect => {
                let location = if unsigned {
                    match message_type {
                        SamlMessageType::Request => {
                            HttpRedirectBinding::encode_request(xml, destination, relay_state)?
                        }
                        SamlMessageType::Response => {
                            HttpRedirectBinding::encode_response(xml, destination, relay_state)?
                        }
                    }
                } else {
                    HttpRedirectBinding::encode_signed(
                        xml,
                        destination,
                        relay_state,
                        message_type,
                        &RedirectSigner::new(self.setup.key.clone()),
                    )?
                };
                Ok(HttpExchange {
                    url: String::new(),
                    status: 302,
                    location: Some(location),
                    body: String::new(),
                })
            }
            _ => {
                let xml = if unsigned {
                    xml.to_string()
                } else {
                    XmlSigner::new(self.setup.key.clone()).sign(xml, id)?
                };
                let body = match message_type {
                    SamlMessageType::Request => {
                        HttpPostBinding::encode_request(&xml, destination, relay_state)
                    }
                    SamlMessageType::Response => {
                        HttpPostBinding::encode_response(&xml, destination, relay_state)
                    }
                };
                Ok(page(200, body))
            }
        }
    }
}

fn subject() -> NameId {
    NameId::new(SUBJECT).with_format(NameIdFormat::Persistent)
}

fn post_message(request: &OutboundRequest) -> anyhow::Result<DecodedMessage> {
    Ok(HttpPostBinding::decode(
        request.field("SAMLRequest"),
        request.field("SAMLResponse"),
        request.field("RelayState"),
    )?)
}

fn login_page(url: &url::Url) -> HttpExchange {
    let auth_state = url
        .query_pairs()
        .find(|(name, _)| name == "AuthState")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();
    page(
        200,
        format!(
            r#"<html><body><h1>Sign in</h1>
<form method="post" action="/login">
  <input type="hidden" name="AuthState" value="{auth_state}"/>
  <input type="text" name="username"/>
  <input type="password" name="password"/>
</form></body></html>"#
        ),
    )
}

fn page(status: u16, body: String) -> HttpExchange {
    HttpExchange {
        url: String::new(),
        status,
        location: None,
        body,
    }
}

fn idp_key() -> &'static RsaKeyMaterial {
    static KEY: OnceLock<RsaKeyMaterial> = OnceLock::new();
    KEY.get_or_init(|| generate_rsa_key().expect("key generation"))
}

fn sp_key() -> &'static RsaKeyMaterial {
    static KEY: OnceLock<RsaKeyMaterial> = OnceLock::new();
    KEY.get_or_init(|| generate_rsa_key().expect("key generation"))
}

fn service_provider(registration: &Registration) -> ServiceProvider {
    let key = SigningKey::new(sp_key().private_key_pkcs8.clone(), RsaAlgorithm::Rs256)
        .expect("signing key");
    ServiceProvider::new(
        registration.entity_id,
        registration.acs_url.clone(),
        registration.slo_url.clone(),
        key,
    )
}

/// Environment and transports for a run against a [`FakeIdp`].
pub struct TestEnv {
    pub runner: ScenarioRunner,
}

impl TestEnv {
    /// A conforming identity provider.
    pub fn new() -> Self {
        Self::with_quirks(Quirks::default())
    }

    /// An identity provider with the given misbehaviour.
    pub fn with_quirks(quirks: Quirks) -> Self {
        Self::build(quirks, PASSWORD)
    }

    /// A conforming identity provider, logged into with `password`.
    pub fn with_password(password: &str) -> Self {
        Self::build(Quirks::default(), password)
    }

    fn build(quirks: Quirks, password: &str) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ctk_runner=debug,ctk_verification=debug")
            .with_test_writer()
            .try_init();

        let registrations = vec![
            Registration::new(SP1, "sp1.test"),
            Registration::new(SP2, "sp2.test"),
        ];

        let mut idp = IdentityProvider::new(IDP)
            .with_verification_key(VerificationKey::from_der(&idp_key().public_key_der));
        for (binding, path) in [(SamlBinding::HttpRedirect, "redirect"), (SamlBinding::HttpPost, "post")] {
            idp = idp
                .with_sso_endpoint(binding, format!("{IDP_BASE}/sso/{path}"))
                .with_slo_endpoint(binding, format!("{IDP_BASE}/slo/{path}"));
        }
        let participants = Participants {
            idp,
            service_providers: registrations.iter().map(service_provider).collect(),
        };
        let user = UserConfig {
            username: USERNAME.to_string(),
            password: password.to_string(),
            ..UserConfig::default()
        };
        let environment = Environment::new(participants, user, &VerificationConfig::default());

        let setup = Setup {
            key: SigningKey::new(idp_key().private_key_pkcs8.clone(), RsaAlgorithm::Rs256)
                .expect("signing key"),
            quirks,
            registrations,
        };
        let factory = FakeIdpFactory {
            setup: Arc::new(setup),
        };
        Self {
            runner: ScenarioRunner::new(environment, factory),
        }
    }
}
