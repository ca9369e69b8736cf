//! # ctk-core
//!
//! Configuration and error handling shared by the conformance test kit
//! crates.
//!
//! The configuration describes the system under test (the identity
//! provider), the service providers the kit impersonates, the test user and
//! the rule toggles handed to the verification engine.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    BindingEndpoints, CtkConfig, IdpConfig, ServiceProviderConfig, TimeoutConfig, UserConfig, VerificationConfig,
};
pub use error::{Error, Result};
