//! # ctk-cli
//!
//! The `ctk` command:
//! - `ctk run` runs conformance scenarios against the configured identity
//!   provider and reports every broken rule with its citation
//! - `ctk list` shows the scenario catalogue
//! - `ctk rules` prints the clause registry

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use error::{CliError, CliResult};
