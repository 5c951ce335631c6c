//! Validate-SQL Command
//!
//! Offline tiered validation; needs neither a dataset nor a provider.
//!
//! Usage:
//!   quorumql validate-sql "SELECT * FROM orders" [--tier comprehensive]

use crate::cli::output::{Output, OutputFormat};
use crate::sql::{SqlValidationResult, ValidationTier, check_sql};
use crate::types::Result;

/// Prints the report and returns whether the statement passed
pub fn run(sql: &str, tier: ValidationTier, format: OutputFormat) -> Result<bool> {
    let result = check_sql(sql, tier);
    format.emit(&result, |r| print_text(r, tier))?;
    Ok(result.is_valid)
}

fn print_text(result: &SqlValidationResult, tier: ValidationTier) {
    if result.is_valid {
        Output::success(&format!("Valid at tier {}", tier));
    } else {
        Output::warning(&format!("Invalid at tier {}", tier));
    }
    Output::field("risk", result.risk);
    Output::bullets("Errors", &result.errors);
    Output::bullets("Warnings", &result.warnings);
    Output::bullets("Suggestions", &result.suggestions);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_validity() {
        assert!(run("SELECT id FROM orders LIMIT 5", ValidationTier::Basic, OutputFormat::Json).unwrap());
        assert!(!run("DROP TABLE orders", ValidationTier::Basic, OutputFormat::Json).unwrap());
    }
}
