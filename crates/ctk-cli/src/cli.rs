//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ctk_runner::Suite;
use ctk_saml::SamlBinding;

use crate::config::OutputFormat;

/// SAML conformance test kit.
#[derive(Debug, Parser)]
#[command(name = "ctk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ~/.ctk/ctk.toml).
    #[arg(short, long, global = true, env = "CTK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run scenarios against the configured identity provider.
    Run(RunArgs),
    /// List the available scenarios.
    List(SelectionArgs),
    /// Print every rule the kit checks, with its clause.
    Rules,
}

/// Which scenarios to consider.
#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
    /// Scenario suite.
    #[arg(short, long, value_enum, default_value = "all")]
    pub suite: SuiteArg,

    /// Only scenarios using this binding.
    #[arg(short, long, value_enum)]
    pub binding: Option<BindingArg>,
}

/// Arguments of `ctk run`.
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Suite and binding filter.
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Run scenarios concurrently.
    #[arg(short, long)]
    pub parallel: bool,

    /// Run only these scenarios (see `ctk list`).
    pub scenarios: Vec<String>,
}

/// Suite selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SuiteArg {
    /// Single Sign-On.
    Sso,
    /// Single Logout.
    Slo,
    /// Both.
    All,
}

impl From<SuiteArg> for Suite {
    fn from(arg: SuiteArg) -> Self {
        match arg {
            SuiteArg::Sso => Self::Sso,
            SuiteArg::Slo => Self::Slo,
            SuiteArg::All => Self::All,
        }
    }
}

/// Binding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BindingArg {
    /// HTTP-Redirect.
    Redirect,
    /// HTTP-POST.
    Post,
}

impl From<BindingArg> for SamlBinding {
    fn from(arg: BindingArg) -> Self {
        match arg {
            BindingArg::Redirect => Self::HttpRedirect,
            BindingArg::Post => Self::HttpPost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_filters_and_names() {
        let cli = Cli::try_parse_from([
            "ctk",
            "run",
            "--suite",
            "slo",
            "--binding",
            "post",
            "--parallel",
            "slo-post-single-sp",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.selection.suite, SuiteArg::Slo);
        assert_eq!(args.selection.binding, Some(BindingArg::Post));
        assert!(args.parallel);
        assert_eq!(args.scenarios, ["slo-post-single-sp"]);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["ctk", "rules", "--output", "json", "-v"]).unwrap();
        assert!(matches!(cli.command, Command::Rules));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn selectors_map_to_runner_types() {
        assert_eq!(Suite::from(SuiteArg::All), Suite::All);
        assert_eq!(SamlBinding::from(BindingArg::Redirect), SamlBinding::HttpRedirect);
    }
}
