//! SQL Command
//!
//! Runs the SQL tool chain directly: generate, validate, execute, derive
//! insights. With `--statement` the given SQL skips generation.
//!
//! Usage:
//!   quorumql sql "Top 5 regions by revenue" -d sales
//!   quorumql sql --statement "SELECT region, SUM(amount) FROM sales GROUP BY region"

use serde::Serialize;

use crate::cli::output::{Output, OutputFormat};
use crate::cli::util::{CommandContext, QueryOptions};
use crate::sql::{SqlExecutionResult, SqlValidationResult, ToolCall, ToolCallResult};
use crate::types::Result;

const PREVIEW_ROWS: usize = 10;

/// Result of a caller-supplied statement
#[derive(Debug, Serialize)]
struct StatementResult {
    sql: String,
    validation: SqlValidationResult,
    execution: SqlExecutionResult,
}

pub async fn run(
    ctx: &CommandContext,
    options: &QueryOptions,
    statement: bool,
    format: OutputFormat,
) -> Result<()> {
    let tier = ctx.tier(options);
    let stack = ctx.analysis_stack(options.db.as_deref())?;

    if statement {
        let (sql, validation, execution) =
            stack.tool_chain.run_statement(&options.text, tier).await?;
        let result = StatementResult {
            sql,
            validation,
            execution,
        };
        return format.emit(&result, |r| {
            print_sql(&r.sql, None);
            print_validation(&r.validation);
            print_execution(&r.execution);
        });
    }

    let query = ctx.query(options)?;
    let call = ToolCall::new(query.text, query.dataset_id)
        .with_tier(tier)
        .with_error_correction(ctx.config.sql.error_correction);
    let result = stack.tool_chain.execute_tool_call(&call).await?;
    format.emit(&result, print_tool_call)
}

fn print_tool_call(result: &ToolCallResult) {
    print_sql(&result.sql, result.original_sql.as_deref());
    print_validation(&result.validation);
    print_execution(&result.execution);
    Output::bullets("Insights", &result.insights);
    Output::bullets("Recommendations", &result.recommendations);
    Output::bullets("Follow-up questions", &result.follow_ups);
}

fn print_sql(sql: &str, original: Option<&str>) {
    Output::header("SQL");
    println!("{}", sql);
    if let Some(original) = original {
        Output::warning(&format!("Corrected from: {}", original));
    }
}

fn print_validation(validation: &SqlValidationResult) {
    Output::header("Validation");
    Output::field("valid", validation.is_valid);
    Output::field("risk", validation.risk);
    Output::bullets("Errors", &validation.errors);
    Output::bullets("Warnings", &validation.warnings);
    Output::bullets("Suggestions", &validation.suggestions);
}

fn print_execution(execution: &SqlExecutionResult) {
    Output::header("Execution");
    Output::field("success", execution.success);
    Output::field("rows", execution.row_count);
    Output::field("time", format!("{} ms", execution.execution_time_ms));
    Output::field("cache hit", execution.metadata.cache_hit);
    Output::field(
        "confidence",
        Output::confidence(execution.metadata.confidence),
    );
    if let Some(error) = &execution.error {
        Output::warning(error);
    }

    if !execution.rows.is_empty() {
        println!();
        for row in execution.rows.iter().take(PREVIEW_ROWS) {
            println!("  {}", row);
        }
        if execution.rows.len() > PREVIEW_ROWS {
            println!("  ... and {} more", execution.rows.len() - PREVIEW_ROWS);
        }
    }
}
