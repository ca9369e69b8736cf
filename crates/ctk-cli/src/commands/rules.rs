//! `ctk rules`: the clauses verification cites.

use ctk_verification::citation::ALL;
use ctk_verification::SpecCitation;
use serde::Serialize;
use tabled::Tabled;

use crate::config::OutputFormat;
use crate::output::output;

/// Clause for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RuleRow {
    /// Citation identifier.
    #[tabled(rename = "Rule")]
    pub id: String,
    /// Source document.
    #[tabled(rename = "Document")]
    pub document: &'static str,
    /// Normative text.
    #[tabled(rename = "Text")]
    pub text: &'static str,
}

impl From<&SpecCitation> for RuleRow {
    fn from(citation: &SpecCitation) -> Self {
        Self {
            id: citation.id(),
            document: citation.document.short_name(),
            text: citation.text,
        }
    }
}

/// Prints every registered clause.
///
/// # Errors
///
/// Returns an error if JSON output fails.
pub fn run_rules(output_format: OutputFormat) -> crate::CliResult<()> {
    let rows: Vec<RuleRow> = ALL.iter().map(|c| RuleRow::from(*c)).collect();
    output(&rows, output_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_clause_has_a_row() {
        let rows: Vec<RuleRow> = ALL.iter().map(|c| RuleRow::from(*c)).collect();
        assert_eq!(rows.len(), ALL.len());
        assert!(rows.iter().any(|r| r.id == "SAMLCore.3.4.1.4_a"));
    }
}
