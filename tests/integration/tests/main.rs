//! End-to-End Integration Tests
//!
//! These tests run the scenario catalogue through the runner against an
//! in-process identity provider, once conforming and once for each way it
//! can break the rules.

mod common;
mod slo;
mod sso;
