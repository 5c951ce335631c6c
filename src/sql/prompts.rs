//! SQL Tool Chain Prompts
//!
//! Every prompt starts with a task header so generators (and test doubles)
//! can tell the calls apart.

use serde_json::Value;

use crate::ai::provider::task_header;
use crate::schema::SchemaSnippet;
use crate::types::truncate_chars;

pub const TASK_GENERATE: &str = "sql_generation";
pub const TASK_CORRECT: &str = "sql_correction";
pub const TASK_INSIGHTS: &str = "sql_insights";
pub const TASK_RECOMMENDATIONS: &str = "sql_recommendations";
pub const TASK_FOLLOW_UPS: &str = "sql_follow_ups";

/// Characters of sample rows shown to the generator
const MAX_SAMPLE_CHARS: usize = 4000;

fn schema_section(snippets: &[SchemaSnippet]) -> String {
    if snippets.is_empty() {
        return "# Schema\n\n(no schema context available)\n\n".to_string();
    }
    let mut section = String::from("# Schema\n\n");
    for snippet in snippets {
        section.push_str(&snippet.content);
        section.push_str("\n\n");
    }
    section
}

pub fn build_generation_prompt(
    question: &str,
    dataset_id: &str,
    snippets: &[SchemaSnippet],
    row_limit: usize,
) -> String {
    let mut prompt = task_header(TASK_GENERATE);
    prompt.push_str("\nYou write a single read-only SQLite query that answers a question.\n\n");
    prompt.push_str(&schema_section(snippets));
    prompt.push_str(&format!("# Dataset\n\n{}\n\n", dataset_id));
    prompt.push_str(&format!("# Question\n\n{}\n\n", question));
    prompt.push_str(&format!(
        "# Rules\n\n\
         - Exactly one SELECT statement (CTEs allowed)\n\
         - Never modify data\n\
         - Include LIMIT {} or lower\n\
         - Reply with the query in a ```sql fenced block\n",
        row_limit
    ));
    prompt
}

pub fn build_correction_prompt(
    question: &str,
    sql: &str,
    errors: &[String],
    snippets: &[SchemaSnippet],
) -> String {
    let mut prompt = task_header(TASK_CORRECT);
    prompt.push_str("\nThe query below failed validation. Rewrite it so every error is fixed.\n\n");
    prompt.push_str(&schema_section(snippets));
    prompt.push_str(&format!("# Question\n\n{}\n\n", question));
    prompt.push_str(&format!("# Query\n\n```sql\n{}\n```\n\n", sql));
    prompt.push_str("# Errors\n\n");
    for error in errors {
        prompt.push_str(&format!("- {}\n", error));
    }
    prompt.push_str("\nReply with the corrected read-only query in a ```sql fenced block.\n");
    prompt
}

fn result_section(sql: &str, rows: &[Value], row_count: usize, sample_rows: usize) -> String {
    let sample: Vec<&Value> = rows.iter().take(sample_rows).collect();
    let rendered = serde_json::to_string_pretty(&sample).unwrap_or_default();
    format!(
        "# Query\n\n```sql\n{}\n```\n\n# Result ({} rows, first {} shown)\n\n```json\n{}\n```\n\n",
        sql,
        row_count,
        sample.len(),
        truncate_chars(&rendered, MAX_SAMPLE_CHARS)
    )
}

pub fn build_derivation_prompt(
    task: &str,
    question: &str,
    sql: &str,
    rows: &[Value],
    row_count: usize,
    sample_rows: usize,
) -> String {
    let ask = match task {
        TASK_INSIGHTS => "List the key insights the result supports, one bullet each.",
        TASK_RECOMMENDATIONS => "List concrete recommendations based on the result, one bullet each.",
        _ => "List follow-up questions worth asking next, one bullet each.",
    };
    let mut prompt = task_header(task);
    prompt.push_str(&format!("\n# Question\n\n{}\n\n", question));
    prompt.push_str(&result_section(sql, rows, row_count, sample_rows));
    prompt.push_str(ask);
    prompt.push('\n');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::task_name;
    use serde_json::json;

    #[test]
    fn test_prompts_carry_task_header() {
        let p = build_generation_prompt("top suppliers", "orders", &[], 100);
        assert_eq!(task_name(&p), Some(TASK_GENERATE));
        assert!(p.contains("LIMIT 100"));
        assert!(p.contains("no schema context"));

        let p = build_correction_prompt("q", "SELECT", &["Unbalanced parentheses".into()], &[]);
        assert_eq!(task_name(&p), Some(TASK_CORRECT));
        assert!(p.contains("- Unbalanced parentheses"));
    }

    #[test]
    fn test_derivation_prompt_samples_rows() {
        let rows: Vec<Value> = (0..50).map(|i| json!({"n": i})).collect();
        let p = build_derivation_prompt(TASK_INSIGHTS, "q", "SELECT n", &rows, 50, 3);
        assert_eq!(task_name(&p), Some(TASK_INSIGHTS));
        assert!(p.contains("50 rows, first 3 shown"));
        assert!(!p.contains("\"n\": 10"));
    }
}
