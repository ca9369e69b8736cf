//! Per-scenario session state.
//!
//! A logout run moves through
//! `LoggedIn → RequestSent → (Propagated → Answered)* → ResponseReceived → Complete`,
//! where each `Propagated`/`Answered` pair is one further session
//! participant the identity provider had to log out.

use std::fmt;

use chrono::{DateTime, Utc};
use ctk_saml::messages::NameId;
use ctk_saml::SamlBinding;
use serde::Serialize;

use crate::error::{ScenarioError, ScenarioResult};

/// Where a logout run stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "participant", rename_all = "snake_case")]
pub enum LogoutPhase {
    /// Every participant holds a session.
    LoggedIn,
    /// The initiating SP sent its `LogoutRequest`.
    RequestSent(String),
    /// The IdP propagated a `LogoutRequest` to this SP.
    Propagated(String),
    /// This SP answered the propagated request.
    Answered(String),
    /// The initiating SP received the final `LogoutResponse`.
    ResponseReceived(String),
    /// The final response was verified.
    Complete,
}

impl fmt::Display for LogoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedIn => write!(f, "logged in"),
            Self::RequestSent(sp) => write!(f, "logout request sent by {sp}"),
            Self::Propagated(sp) => write!(f, "logout propagated to {sp}"),
            Self::Answered(sp) => write!(f, "logout answered by {sp}"),
            Self::ResponseReceived(sp) => write!(f, "logout response received by {sp}"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Direction of a logged exchange, seen from the service providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent to the IdP.
    Sent,
    /// Received from the IdP.
    Received,
}

/// One message of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeRecord {
    /// Sent or received.
    pub direction: Direction,
    /// The service provider that sent or received it.
    pub participant: String,
    /// Binding short name.
    pub binding: String,
    /// Document element, e.g. `LogoutRequest`.
    pub message: String,
    /// Message `ID`.
    pub message_id: Option<String>,
    /// When it was logged.
    pub at: DateTime<Utc>,
}

/// A principal's session at one service provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    /// SP entity ID.
    pub service_provider: String,
    /// Subject the IdP asserted.
    pub name_id: NameId,
    /// `SessionIndex` from the authentication statement.
    pub session_index: Option<String>,
}

/// Session state for one scenario.
#[derive(Debug, Default)]
pub struct SessionState {
    phase: Option<LogoutPhase>,
    active_sp: Option<String>,
    relay_state: Option<String>,
    logins: Vec<LoginSession>,
    log: Vec<ExchangeRecord>,
}

impl SessionState {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logout phase; `None` before login completes.
    #[must_use]
    pub const fn phase(&self) -> Option<&LogoutPhase> {
        self.phase.as_ref()
    }

    /// The SP whose expectations currently apply.
    #[must_use]
    pub fn active_service_provider(&self) -> Option<&str> {
        self.active_sp.as_deref()
    }

    /// Relay state the initiating SP supplied.
    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref()
    }

    /// Records the relay state the initiating SP supplies.
    pub fn set_relay_state(&mut self, relay_state: Option<&str>) {
        self.relay_state = relay_state.map(String::from);
    }

    /// Login established at `sp`.
    #[must_use]
    pub fn login_for(&self, sp: &str) -> Option<&LoginSession> {
        self.logins.iter().find(|l| l.service_provider == sp)
    }

    /// Every message exchanged so far.
    #[must_use]
    pub fn log(&self) -> &[ExchangeRecord] {
        &self.log
    }

    /// Appends to the message log.
    pub fn record(
        &mut self,
        direction: Direction,
        participant: &str,
        binding: SamlBinding,
        message: &str,
        message_id: Option<&str>,
    ) {
        tracing::debug!(?direction, participant, message, "exchange");
        self.log.push(ExchangeRecord {
            direction,
            participant: participant.to_string(),
            binding: binding.short_name().to_string(),
            message: message.to_string(),
            message_id: message_id.map(String::from),
            at: Utc::now(),
        });
    }

    /// Enters `LoggedIn` with one session per participant; the first one is
    /// the initiating SP.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidTransition`] if already logged in or
    /// `logins` is empty.
    pub fn logged_in(&mut self, logins: Vec<LoginSession>) -> ScenarioResult<()> {
        let Some(first) = logins.first() else {
            return Err(self.refuse("log in without any session"));
        };
        if self.phase.is_some() {
            return Err(self.refuse("log in"));
        }
        self.active_sp = Some(first.service_provider.clone());
        self.logins = logins;
        self.enter(LogoutPhase::LoggedIn);
        Ok(())
    }

    /// `LoggedIn → RequestSent(sp)`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidTransition`] from any other phase.
    pub fn request_sent(&mut self, sp: &str) -> ScenarioResult<()> {
        match self.phase {
            Some(LogoutPhase::LoggedIn) => {
                self.enter(LogoutPhase::RequestSent(sp.to_string()));
                Ok(())
            }
            _ => Err(self.refuse("send a logout request")),
        }
    }

    /// `RequestSent | Answered → Propagated(sp)`; `sp` becomes active.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidTransition`] from any other phase, or
    /// if `sp` holds no session.
    pub fn propagated(&mut self, sp: &str) -> ScenarioResult<()> {
        let allowed = matches!(
            self.phase,
            Some(LogoutPhase::RequestSent(_) | LogoutPhase::Answered(_))
        );
        if !allowed || self.login_for(sp).is_none() {
            return Err(self.refuse("receive a propagated logout request"));
        }
        self.active_sp = Some(sp.to_string());
        self.enter(LogoutPhase::Propagated(sp.to_string()));
        Ok(())
    }

    /// `Propagated(sp) → Answered(sp)`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidTransition`] unless the last
    /// propagation went to `sp`.
    pub fn answered(&mut self, sp: &str) -> ScenarioResult<()> {
        match &self.phase {
            Some(LogoutPhase::Propagated(target)) if target == sp => {
                self.enter(LogoutPhase::Answered(sp.to_string()));
                Ok(())
            }
            _ => Err(self.refuse("answer a logout request")),
        }
    }

    /// `RequestSent | Answered → ResponseReceived(sp)`; `sp` becomes
    /// active again.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidTransition`] from any other phase.
    pub fn response_received(&mut self, sp: &str) -> ScenarioResult<()> {
        match self.phase {
            Some(LogoutPhase::RequestSent(_) | LogoutPhase::Answered(_)) => {
                self.active_sp = Some(sp.to_string());
                self.enter(LogoutPhase::ResponseReceived(sp.to_string()));
                Ok(())
            }
            _ => Err(self.refuse("receive the logout response")),
        }
    }

    /// `ResponseReceived → Complete`; all sessions end.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::InvalidTransition`] from any other phase.
    pub fn complete(&mut self) -> ScenarioResult<()> {
        match self.phase {
            Some(LogoutPhase::ResponseReceived(_)) => {
                self.logins.clear();
                self.enter(LogoutPhase::Complete);
                Ok(())
            }
            _ => Err(self.refuse("complete the logout")),
        }
    }

    fn enter(&mut self, next: LogoutPhase) {
        tracing::info!(phase = %next, "session transition");
        self.phase = Some(next);
    }

    fn refuse(&self, event: &'static str) -> ScenarioError {
        ScenarioError::InvalidTransition {
            phase: self
                .phase
                .as_ref()
                .map_or_else(|| "not logged in".to_string(), ToString::to_string),
            event,
        }
    }
}
