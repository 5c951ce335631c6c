//! Reflect Command
//!
//! Single-voice reflection pipeline: plan, analyze, validate, critique,
//! refine, synthesize.
//!
//! Usage:
//!   quorumql reflect "How did Q3 margins move?" -d sales [--max-iterations 2]

use crate::cli::output::{Output, OutputFormat};
use crate::cli::util::{CommandContext, QueryOptions};
use crate::reflection::ReflectionResult;
use crate::types::Result;

pub async fn run(ctx: &CommandContext, options: &QueryOptions, format: OutputFormat) -> Result<()> {
    let query = ctx.query(options)?;
    let stack = ctx.analysis_stack(options.db.as_deref())?;
    let pipeline = ctx.reflection_pipeline(&stack, ctx.tier(options));

    let result = pipeline.run(&query, "").await?;
    format.emit(&result, print_text)
}

fn print_text(result: &ReflectionResult) {
    Output::header("Answer");
    println!("{}", result.final_answer.trim());

    Output::header("Stages");
    for stage in &result.stage_trace {
        let label = if stage.iteration > 0 {
            format!("{} #{}", stage.stage, stage.iteration)
        } else {
            stage.stage.to_string()
        };
        println!(
            "  {:<16} {}{}",
            label,
            Output::confidence(stage.confidence),
            if stage.degraded { "  (fallback)" } else { "" }
        );
    }
    Output::field("confidence", Output::confidence(result.confidence));
    Output::field("elapsed", format!("{} ms", result.elapsed_ms));

    let provenance = &result.data_provenance;
    if let Some(sql) = &provenance.sql {
        Output::header("Data");
        Output::field("sql", sql);
        Output::field("rows", provenance.row_count);
        Output::field("cache hit", provenance.cache_hit);
        Output::field("validated", provenance.validation_passed);
    }

    Output::bullets("Follow-up questions", &result.follow_ups);
    Output::bullets("Limitations", &result.limitations);
}
