//! Single Logout initiated by a service provider.
//!
//! The primary SP sends a `LogoutRequest` to the IdP. With a second session
//! participant the IdP must propagate the logout to it; the kit verifies
//! that request as the second SP, answers it (successfully, or with an
//! error status when the scenario asks for a partial logout), and finally
//! verifies the `LogoutResponse` the primary SP gets back.

use ctk_saml::bindings::SamlMessageType;
use ctk_saml::messages::{LogoutRequest, LogoutResponse, Status};
use ctk_saml::SamlBinding;
use ctk_verification::binding::verify_relay_state;
use ctk_verification::{
    CoreLogoutRequestProtocolVerifier, CoreLogoutResponseProtocolVerifier, OriginalRequest,
    ProtocolVerifier, VerificationFailure,
};
use serde::Serialize;

use crate::binding::{encode_outbound, ReceivedMessage};
use crate::environment::Environment;
use crate::error::{ScenarioError, ScenarioResult};
use crate::participants::ServiceProvider;
use crate::session::{Direction, SessionState};
use crate::sso::login;
use crate::transport::Transport;

/// RelayState sent by relay-state scenarios. Contains characters that must
/// be URL-encoded so an IdP that decodes and re-encodes it is caught.
pub const EXAMPLE_RELAY_STATE: &str = "ctk relay/state?step=1&x=a+b";

/// Variations of the logout scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogoutOptions {
    /// Log in at two SPs so the IdP has to propagate the logout.
    pub multiple_sp: bool,
    /// Send [`EXAMPLE_RELAY_STATE`] with the initial request.
    pub relay_state: bool,
    /// Have the second SP answer with an error; a partial logout is then
    /// expected. Implies `multiple_sp`.
    pub failing_sp: bool,
}

impl LogoutOptions {
    const fn participants(self) -> usize {
        if self.multiple_sp || self.failing_sp {
            2
        } else {
            1
        }
    }
}

/// Runs one SP-initiated logout with `binding`.
///
/// # Errors
///
/// Returns [`ScenarioError::Compliance`] for rule violations in any message
/// the IdP sends, and the other [`ScenarioError`] variants when the flow
/// cannot continue.
pub async fn single_logout(
    env: &Environment,
    transport: &dyn Transport,
    binding: SamlBinding,
    options: LogoutOptions,
    session: &mut SessionState,
) -> ScenarioResult<()> {
    let participants = env.participants();
    let initiator = participants.primary()?;
    let others: Vec<&ServiceProvider> = if options.participants() > 1 {
        vec![participants.secondary()?]
    } else {
        Vec::new()
    };

    let mut logins = vec![login(env, transport, initiator, binding, session).await?];
    for sp in &others {
        logins.push(login(env, transport, sp, binding, session).await?);
    }
    session.logged_in(logins)?;

    let slo_url = participants.idp.slo_url(binding)?;
    let request = logout_request(initiator, session, slo_url)?;
    let relay_state = options.relay_state.then_some(EXAMPLE_RELAY_STATE);
    session.set_relay_state(relay_state);

    let outbound = encode_outbound(
        initiator,
        binding,
        &request.to_xml(),
        &request.id,
        slo_url,
        relay_state,
        SamlMessageType::Request,
    )?;
    tracing::info!(sp = initiator.entity_id(), binding = binding.short_name(), "sending LogoutRequest");
    session.record(Direction::Sent, initiator.entity_id(), binding, "LogoutRequest", Some(&request.id));
    let mut exchange = transport.send(outbound).await?;
    session.request_sent(initiator.entity_id())?;

    let mut ctx = env.context_for(initiator).with_request(&request);
    ctx.set_relay_state(relay_state.map(String::from));

    for sp in others {
        let propagated = env.binding_verifier().decode_and_verify(&exchange)?;
        expect_delivery(&propagated, sp)?;
        session.record(
            Direction::Received,
            sp.entity_id(),
            propagated.binding,
            propagated.message.kind(),
            propagated.id(),
        );
        session.propagated(sp.entity_id())?;

        ctx.switch_service_provider(sp.entity_id(), sp.metadata().cloned());
        ctx.set_request(None);
        ctx.set_relay_state(None);
        ctx.set_incoming(propagated.binding, true);
        ctx.refresh_instant();
        CoreLogoutRequestProtocolVerifier::new().verify(&propagated.message, &ctx)?;

        let request_id = propagated.id().ok_or_else(|| {
            ScenarioError::UnexpectedResponse("the propagated LogoutRequest has no ID".into())
        })?;
        let status = if options.failing_sp {
            Status::responder_error("the service provider could not end the session")
        } else {
            Status::success()
        };
        let answer = LogoutResponse::new(sp.entity_id(), status)
            .in_response_to(request_id)
            .with_destination(slo_url);
        let outbound = encode_outbound(
            sp,
            binding,
            &answer.to_xml(),
            &answer.id,
            slo_url,
            propagated.relay_state.as_deref(),
            SamlMessageType::Response,
        )?;
        tracing::info!(
            sp = sp.entity_id(),
            success = answer.status.is_success(),
            "answering propagated LogoutRequest"
        );
        session.record(Direction::Sent, sp.entity_id(), binding, "LogoutResponse", Some(&answer.id));
        exchange = transport.send(outbound).await?;
        session.answered(sp.entity_id())?;

        ctx.switch_service_provider(initiator.entity_id(), initiator.metadata().cloned());
        ctx.set_request(Some(OriginalRequest::from(&request)));
        ctx.set_relay_state(relay_state.map(String::from));
    }

    let received = env.binding_verifier().decode_and_verify(&exchange)?;
    expect_delivery(&received, initiator)?;
    session.record(
        Direction::Received,
        initiator.entity_id(),
        received.binding,
        received.message.kind(),
        received.id(),
    );
    session.response_received(initiator.entity_id())?;

    ctx.set_incoming(received.binding, false);
    ctx.refresh_instant();
    let mut violations: Vec<_> = verify_relay_state(&ctx, received.relay_state.as_deref())
        .err()
        .into_iter()
        .collect();
    let verifier = CoreLogoutResponseProtocolVerifier::new(options.failing_sp);
    if let Err(failure) = verifier.verify(&received.message, &ctx) {
        violations.extend_from_slice(failure.violations());
    }
    VerificationFailure::check(violations)?;

    session.complete()
}

fn logout_request(
    sp: &ServiceProvider,
    session: &SessionState,
    destination: &str,
) -> ScenarioResult<LogoutRequest> {
    let established = session.login_for(sp.entity_id()).ok_or_else(|| {
        ScenarioError::Configuration(format!("{} holds no session", sp.entity_id()))
    })?;
    let request = LogoutRequest::new(sp.entity_id(), established.name_id.clone())
        .with_destination(destination)
        .with_reason(LogoutRequest::REASON_USER);
    Ok(match &established.session_index {
        Some(index) => request.with_session_index(index),
        None => request,
    })
}

/// Checks that the IdP addressed the message to `sp`'s logout endpoint.
fn expect_delivery(received: &ReceivedMessage, sp: &ServiceProvider) -> ScenarioResult<()> {
    if received.endpoint() == sp.slo_url() {
        Ok(())
    } else {
        Err(ScenarioError::Misrouted {
            expected: sp.slo_url().to_string(),
            actual: received.endpoint().to_string(),
        })
    }
}
