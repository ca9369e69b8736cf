//! SAML compliance verification engine.
//!
//! Inspects parsed protocol messages against numbered clauses of the SAML
//! Core, Bindings and Profiles specifications and reports every broken rule
//! with the clause it breaks.
//!
//! # Architecture
//!
//! - [`citation`] - the clause registry
//! - [`violation`] - [`ComplianceViolation`] and [`VerificationFailure`]
//! - [`context`] - [`VerificationContext`], the per-scenario expectations
//! - [`navigation`] - tree helpers
//! - [`common`] - data-type checks (URI, string, dateTime, time windows,
//!   extension attributes)
//! - [`elements`] - one verifier per element family
//! - [`binding`] - RelayState and signed Destination rules
//! - [`protocol`] - whole-message verifiers built from a stage [`Pipeline`]
//!
//! # Example
//!
//! ```rust,ignore
//! use ctk_verification::{CoreLogoutResponseProtocolVerifier, ProtocolVerifier, VerificationContext};
//!
//! let ctx = VerificationContext::new("https://sp.example.org")
//!     .with_expected_issuer("https://idp.example.org")
//!     .with_request(&logout_request);
//! CoreLogoutResponseProtocolVerifier::new(false).verify(&message, &ctx)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod binding;
pub mod citation;
pub mod common;
pub mod context;
pub mod elements;
pub mod navigation;
pub mod protocol;
pub mod violation;

pub use citation::{SpecCitation, SpecDocument};
pub use context::{OriginalRequest, RequestKind, RulePolicy, VerificationContext};
pub use protocol::{
    CoreAuthnRequestProtocolVerifier, CoreLogoutRequestProtocolVerifier,
    CoreLogoutResponseProtocolVerifier, Pipeline, ProtocolVerifier, Stage,
};
pub use violation::{ComplianceViolation, VerificationFailure, ViolationKind};
