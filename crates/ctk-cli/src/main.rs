//! # ctk
//!
//! SAML conformance test kit.

#![forbid(unsafe_code)]
#![deny(warnings)]

use clap::Parser;
use ctk_cli::{
    cli::{Cli, Command},
    commands::{run_list, run_rules, run_scenarios},
    output::error,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Command::Run(args) => run_scenarios(args, cli.config.as_deref(), cli.output).await,
        Command::List(args) => run_list(&args, cli.output),
        Command::Rules => run_rules(cli.output),
    };

    if let Err(e) = result {
        error(&e.to_string());
        std::process::exit(1);
    }
}
