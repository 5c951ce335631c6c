//! Reflection Pipeline Prompts

use crate::ai::provider::{role_instruction, task_header};
use crate::schema::SchemaSnippet;
use crate::types::{Query, truncate_chars};

use super::types::AnalysisPlan;

pub const TASK_PLANNING: &str = "reflection_planning";
pub const TASK_ANALYSIS: &str = "reflection_analysis";
pub const TASK_VALIDATION: &str = "reflection_validation";
pub const TASK_CRITIQUE: &str = "reflection_critique";
pub const TASK_REFINEMENT: &str = "reflection_refinement";
pub const TASK_SYNTHESIS: &str = "reflection_synthesis";

const MAX_DATA_CHARS: usize = 4000;
const MAX_SNIPPET_CHARS: usize = 600;

fn context_section(context: &str) -> String {
    if context.trim().is_empty() {
        String::new()
    } else {
        format!("# Perspective\n\n{}\n\n", context.trim())
    }
}

fn question_section(query: &Query) -> String {
    format!(
        "# Question\n\n{}\n\nDataset: {} | Complexity: {}\n\n",
        query.text, query.dataset_id, query.complexity
    )
}

pub fn build_planning_prompt(query: &Query, context: &str) -> String {
    let mut prompt = task_header(TASK_PLANNING);
    prompt.push_str("\nYou plan a data analysis before any query runs.\n\n");
    prompt.push_str(&context_section(context));
    prompt.push_str(&question_section(query));
    prompt.push_str(
        "# Output\n\nReply with JSON only:\n\
         {\"complexity\": \"low|medium|high\", \"data_requirements\": [..], \
         \"analysis_steps\": [..], \"validation_checks\": [..], \
         \"confidence_threshold\": 0.0-1.0, \"estimated_time_secs\": n}\n",
    );
    prompt
}

pub fn build_analysis_prompt(
    query: &Query,
    context: &str,
    plan: &AnalysisPlan,
    snippets: &[SchemaSnippet],
    sql: &str,
    data: &str,
) -> String {
    let mut prompt = task_header(TASK_ANALYSIS);
    prompt.push_str("\nAnalyze the query result. Ground every claim in the rows shown.\n\n");
    prompt.push_str(&context_section(context));
    prompt.push_str(&question_section(query));

    prompt.push_str("# Plan\n\n");
    for step in &plan.analysis_steps {
        prompt.push_str(&format!("- {}\n", step));
    }
    prompt.push('\n');

    if !snippets.is_empty() {
        prompt.push_str("# Schema\n\n");
        for snippet in snippets {
            prompt.push_str(&truncate_chars(&snippet.content, MAX_SNIPPET_CHARS));
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str(&format!(
        "# Query\n\n```sql\n{}\n```\n\n# Data\n\n{}\n\n",
        sql,
        truncate_chars(data, MAX_DATA_CHARS)
    ));
    prompt.push_str("End with a line `Confidence: <0-1>`.\n");
    prompt
}

pub fn build_validation_prompt(query: &Query, analysis: &str, checks: &[String]) -> String {
    let mut prompt = task_header(TASK_VALIDATION);
    prompt.push_str("\nAudit the analysis below against its data.\n\n");
    prompt.push_str(&question_section(query));
    prompt.push_str(&format!("# Analysis\n\n{}\n\n", analysis));
    prompt.push_str("# Checks\n\n");
    for check in checks {
        prompt.push_str(&format!("- {}\n", check));
    }
    prompt.push_str(
        "\nReport one line per check, each marked PASS or FAIL. \
         Mark failures that invalidate the conclusion as HIGH severity.\n",
    );
    prompt
}

pub fn build_critique_prompt(query: &Query, answer: &str, iteration: usize) -> String {
    let mut prompt = task_header(TASK_CRITIQUE);
    prompt.push_str(&format!(
        "\nCritique the answer below (round {}). Look for unsupported claims, \
         missing caveats and arithmetic errors.\n\n",
        iteration
    ));
    prompt.push_str(&question_section(query));
    prompt.push_str(&format!("# Answer\n\n{}\n\n", answer));
    prompt.push_str(
        "# Output\n\n\
         ## Issues\n- ...\n\n## Suggestions\n- ...\n\n\
         Confidence: <0-1 that the answer is correct and complete>\n",
    );
    prompt
}

pub fn build_refinement_prompt(
    query: &Query,
    answer: &str,
    issues: &[String],
    suggestions: &[String],
) -> String {
    let mut prompt = task_header(TASK_REFINEMENT);
    prompt.push_str("\nRevise the answer to address the critique. Keep what was correct.\n\n");
    prompt.push_str(&question_section(query));
    prompt.push_str(&format!("# Answer\n\n{}\n\n# Critique\n\n", answer));
    for issue in issues {
        prompt.push_str(&format!("- Issue: {}\n", issue));
    }
    for suggestion in suggestions {
        prompt.push_str(&format!("- Suggestion: {}\n", suggestion));
    }
    prompt.push_str("\nReply with the revised answer, then `Confidence: <0-1>`.\n");
    prompt
}

pub fn build_synthesis_prompt(query: &Query, answer: &str, validation_errors: &[String]) -> String {
    let mut prompt = task_header(TASK_SYNTHESIS);
    prompt.push_str(&format!("\n{}\n\n", role_instruction(query.role)));
    prompt.push_str(&question_section(query));
    prompt.push_str(&format!("# Best answer\n\n{}\n\n", answer));
    if !validation_errors.is_empty() {
        prompt.push_str("# Failed checks\n\n");
        for error in validation_errors {
            prompt.push_str(&format!("- {}\n", error));
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "Write the final answer. Then add:\n\n\
         ## Follow-up questions\n- ...\n\n## Limitations\n- ...\n",
    );
    prompt
}
