//! Command implementations.

pub mod list;
pub mod rules;
pub mod run;

pub use list::run_list;
pub use rules::run_rules;
pub use run::run_scenarios;

use ctk_runner::{select, Scenario};
use ctk_saml::SamlBinding;

use crate::cli::SelectionArgs;

/// Scenarios matching the suite and binding filter.
fn selected(args: &SelectionArgs) -> Vec<Scenario> {
    select(args.suite.into(), args.binding.map(SamlBinding::from))
}
