//! # ctk-runner
//!
//! Binding and session orchestration for conformance scenarios.
//!
//! The runner plays one or two service providers against the identity
//! provider under test: it encodes and signs requests for the chosen
//! binding, sends them through a [`Transport`], decodes and
//! signature-checks what comes back ([`BindingVerifier`]) and hands every
//! message to the matching protocol verifier of `ctk-verification`.
//!
//! - [`sso`] - login with an `AuthnRequest`, Response and ACS verification
//! - [`slo`] - SP-initiated logout across one or two session participants
//! - [`session`] - the per-scenario state machine and message log
//! - [`scenario`] - the catalogue and [`ScenarioRunner`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod binding;
pub mod environment;
pub mod error;
pub mod participants;
pub mod scenario;
pub mod session;
pub mod slo;
pub mod sso;
pub mod transport;

pub use binding::{determine_binding, BindingVerifier, ReceivedMessage};
pub use environment::Environment;
pub use error::{ScenarioError, ScenarioResult, TransportError};
pub use participants::{IdentityProvider, Participants, ServiceProvider};
pub use scenario::{
    catalogue, select, OutcomeStatus, Scenario, ScenarioKind, ScenarioOutcome, ScenarioRunner,
    Suite,
};
pub use session::{LogoutPhase, SessionState};
pub use slo::LogoutOptions;
pub use transport::{
    HttpExchange, OutboundRequest, ReqwestTransport, ReqwestTransportFactory, Transport,
    TransportFactory,
};
