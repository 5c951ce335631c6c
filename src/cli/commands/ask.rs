//! Ask Command
//!
//! Multi-worker collaborative analysis of one question.
//!
//! Usage:
//!   quorumql ask "Which suppliers deliver late?" -d purchase_orders [--mode reflective]

use crate::cli::output::{Output, OutputFormat};
use crate::cli::util::{CommandContext, QueryOptions};
use crate::collab::CollaborativeResult;
use crate::config::GenerationMode;
use crate::types::Result;

pub async fn run(
    ctx: &CommandContext,
    options: &QueryOptions,
    mode: Option<GenerationMode>,
    format: OutputFormat,
) -> Result<()> {
    let query = ctx.query(options)?;
    let stack = ctx.analysis_stack(options.db.as_deref())?;
    let framework = ctx.collaborative_framework(&stack, ctx.tier(options), mode);

    let result = framework.analyze(&query).await?;
    format.emit(&result, print_text)
}

fn print_text(result: &CollaborativeResult) {
    let synthesis = &result.synthesis;

    Output::header("Answer");
    println!("{}", synthesis.narrative.trim());

    Output::header("Consensus");
    Output::field("confidence", Output::confidence(synthesis.confidence));
    Output::field("consensus", Output::confidence(synthesis.consensus_level));
    Output::field(
        "reached",
        if result.consensus_reached { "yes" } else { "no" },
    );
    Output::field("mode", result.mode);
    Output::field("elapsed", format!("{} ms", result.elapsed_ms));
    if result.degraded {
        Output::warning("Collaboration fell back to a single worker");
    }

    Output::header("Workers");
    for response in result.final_responses() {
        println!(
            "  {:<24} v{}  {}{}",
            response.worker_id.as_str(),
            response.version,
            Output::confidence(response.confidence),
            if response.degraded { "  (fallback)" } else { "" }
        );
    }
    if !result.reviews.is_empty() {
        println!("  {} peer reviews", result.reviews.len());
    }

    Output::bullets("Strengths", &synthesis.strengths);
    Output::bullets("Weaknesses", &synthesis.weaknesses);
    Output::bullets("Recommendations", &synthesis.recommendations);
    Output::bullets("Limitations", &synthesis.limitations);
}
