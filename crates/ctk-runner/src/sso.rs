//! Web Browser SSO: the login every scenario starts with.

use ctk_saml::bindings::{HttpPostBinding, SamlMessageType};
use ctk_saml::messages::{AuthnRequest, NameId};
use ctk_saml::{ProtocolMessage, SamlBinding};
use ctk_verification::{CoreAuthnRequestProtocolVerifier, ProtocolVerifier};

use ctk_core::UserConfig;

use crate::binding::{determine_binding, encode_outbound};
use crate::environment::Environment;
use crate::error::{ScenarioError, ScenarioResult};
use crate::participants::ServiceProvider;
use crate::session::{Direction, LoginSession, SessionState};
use crate::transport::{HttpExchange, OutboundRequest, Transport};

/// Redirects and login pages followed before the IdP must have answered
/// with a `Response`.
const MAX_LOGIN_STEPS: usize = 8;

/// Logs the test user in at `sp`.
///
/// Sends a signed `AuthnRequest` with `binding`, follows redirects and fills
/// in the login form until the IdP answers with a SAML message, then
/// verifies the `Response` and the Assertion Consumer Service it was
/// delivered to.
///
/// # Errors
///
/// Returns [`ScenarioError::Compliance`] when the response breaks a rule,
/// and the other [`ScenarioError`] variants when the flow cannot continue.
pub async fn login(
    env: &Environment,
    transport: &dyn Transport,
    sp: &ServiceProvider,
    binding: SamlBinding,
    session: &mut SessionState,
) -> ScenarioResult<LoginSession> {
    let sso_url = env.participants().idp.sso_url(binding)?;
    let mut request = AuthnRequest::new(sp.entity_id())
        .with_destination(sso_url)
        .with_acs_url(sp.acs_url(), SamlBinding::HttpPost);
    if let Some(policy) = sp.name_id_policy() {
        request = request.with_name_id_policy(policy.clone());
    }

    let outbound = encode_outbound(
        sp,
        binding,
        &request.to_xml(),
        &request.id,
        sso_url,
        None,
        SamlMessageType::Request,
    )?;
    tracing::info!(sp = sp.entity_id(), binding = binding.short_name(), "sending AuthnRequest");
    session.record(Direction::Sent, sp.entity_id(), binding, "AuthnRequest", Some(&request.id));

    let mut exchange = transport.send(outbound).await?;
    let mut steps = 0;
    while determine_binding(&exchange).is_none() {
        steps += 1;
        if steps > MAX_LOGIN_STEPS {
            return Err(ScenarioError::UnexpectedResponse(format!(
                "no SAML response after {MAX_LOGIN_STEPS} login steps"
            )));
        }
        exchange = transport.send(next_login_step(&exchange, env.user())?).await?;
    }

    let received = env.binding_verifier().decode_and_verify(&exchange)?;
    session.record(
        Direction::Received,
        sp.entity_id(),
        received.binding,
        received.message.kind(),
        received.id(),
    );

    let mut ctx = env.context_for(sp).with_request(&request);
    ctx.set_incoming(received.binding, false);

    let verifier = CoreAuthnRequestProtocolVerifier::new();
    verifier.verify(&received.message, &ctx)?;
    verifier.verify_assertion_consumer_service(Some(&received.target), &ctx)?;
    tracing::info!(sp = sp.entity_id(), "login verified");

    login_session(sp, &received.message)
}

/// Runs the SSO scenario: a verified login at the primary SP.
///
/// # Errors
///
/// See [`login`].
pub async fn single_sign_on(
    env: &Environment,
    transport: &dyn Transport,
    binding: SamlBinding,
    session: &mut SessionState,
) -> ScenarioResult<()> {
    let sp = env.participants().primary()?;
    let established = login(env, transport, sp, binding, session).await?;
    session.logged_in(vec![established])
}

/// Follows a redirect, or submits the page's form with the user's
/// credentials filled in.
fn next_login_step(exchange: &HttpExchange, user: &UserConfig) -> ScenarioResult<OutboundRequest> {
    if exchange.is_redirect() {
        let location = exchange.location.as_deref().unwrap_or_default();
        return Ok(OutboundRequest::Get {
            url: resolve(exchange, location)?,
        });
    }

    let form = HttpPostBinding::extract_form(&exchange.body).map_err(|_| {
        ScenarioError::UnexpectedResponse(format!(
            "HTTP {} from {} is neither a login page nor a SAML message",
            exchange.status, exchange.url
        ))
    })?;

    let credentials = [&user.username_field, &user.password_field];
    let mut fields: Vec<(String, String)> = form
        .fields
        .iter()
        .filter(|(name, _)| !credentials.contains(&name))
        .cloned()
        .collect();
    fields.push((user.username_field.clone(), user.username.clone()));
    fields.push((user.password_field.clone(), user.password.clone()));

    let action = resolve(exchange, &form.action)?;
    tracing::debug!(%action, "submitting login form");
    if form.method == "get" {
        let mut url = url::Url::parse(&action).map_err(|e| {
            ScenarioError::UnexpectedResponse(format!("bad login form action: {e}"))
        })?;
        url.query_pairs_mut().clear().extend_pairs(&fields);
        return Ok(OutboundRequest::Get { url: url.into() });
    }
    Ok(OutboundRequest::PostForm { url: action, fields })
}

fn resolve(exchange: &HttpExchange, reference: &str) -> ScenarioResult<String> {
    exchange
        .resolve(reference)
        .map_err(|e| ScenarioError::UnexpectedResponse(format!("bad URL {reference}: {e}")))
}

/// Reads the subject and session index the IdP established.
fn login_session(sp: &ServiceProvider, message: &ProtocolMessage) -> ScenarioResult<LoginSession> {
    let assertion = message.root().child("Assertion").ok_or_else(|| {
        ScenarioError::UnexpectedResponse("the Response carries no plaintext assertion".into())
    })?;
    let name_id = assertion
        .child("Subject")
        .and_then(|subject| subject.child("NameID"))
        .ok_or_else(|| ScenarioError::UnexpectedResponse("the assertion has no NameID".into()))?;

    let mut subject = NameId::new(name_id.text().trim());
    subject.format = name_id.optional_attribute("Format").map(String::from);
    subject.sp_name_qualifier = name_id.optional_attribute("SPNameQualifier").map(String::from);

    let session_index = assertion
        .children("AuthnStatement")
        .into_iter()
        .find_map(|statement| statement.optional_attribute("SessionIndex"))
        .map(String::from);

    Ok(LoginSession {
        service_provider: sp.entity_id().to_string(),
        name_id: subject,
        session_index,
    })
}
