//! Output formatting utilities.

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use crate::config::OutputFormat;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Renders rows as a rounded table.
#[must_use]
pub fn table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).with(Style::rounded()).to_string()
}

/// Outputs data in the specified format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn output<T: Tabled + serde::Serialize>(
    data: &[T],
    format: OutputFormat,
) -> crate::CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                info("No results found.");
            } else {
                println!("{}", table(data));
            }
        }
        OutputFormat::Json => output_json(data)?,
    }
    Ok(())
}

/// Prints any serializable value as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn output_json<T: serde::Serialize + ?Sized>(value: &T) -> crate::CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled)]
    struct Row {
        name: &'static str,
        #[tabled(rename = "Result")]
        result: &'static str,
    }

    #[test]
    fn table_has_headers_and_rows() {
        let rendered = table(&[Row {
            name: "sso-post",
            result: "passed",
        }]);
        assert!(rendered.contains("Result"));
        assert!(rendered.contains("sso-post"));
        assert!(rendered.starts_with('╭'));
    }
}
