//! Context-aware SQL generation and one-shot correction.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::prompts::{build_correction_prompt, build_generation_prompt};
use super::types::SqlValidationResult;
use crate::ai::provider::{GenerationParams, SharedGenerator};
use crate::schema::{SchemaSnippet, SharedSchemaContext};

static FENCED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```[a-z]*\s*\n?(.*?)```").expect("valid fenced block regex")
});

static STATEMENT_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:SELECT|DELETE|DROP|UPDATE|INSERT|ALTER|CREATE|TRUNCATE|WITH\s+(?:RECURSIVE\s+)?\w+\s*(?:\([^)]*\)\s*)?AS)\b",
    )
    .expect("valid statement start regex")
});

static STATEMENT_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";|\n[ \t]*\n").expect("valid statement end regex"));

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Pull the statement the model wrote out of generated text
///
/// A fenced block is taken whole from its first statement keyword, so every
/// statement in it reaches the safety pass. Without a fence, the first span
/// led by a statement keyword at the start of a line is taken up to a
/// semicolon, a blank line or the end. Destructive statements are extracted
/// like any other; rejecting them is the safety pass's job.
pub fn extract_sql(text: &str) -> Option<String> {
    for caps in FENCED_RE.captures_iter(text) {
        let body = &caps[1];
        if let Some(start) = STATEMENT_START_RE.find(body) {
            let stmt = trim_statement(&body[start.start()..]);
            if !stmt.is_empty() {
                return Some(stmt.to_string());
            }
        }
    }

    let start = STATEMENT_START_RE.find(text)?;
    let rest = &text[start.start()..];
    let end = STATEMENT_END_RE.find(rest).map_or(rest.len(), |m| m.start());
    let stmt = trim_statement(&rest[..end]);
    (!stmt.is_empty()).then(|| stmt.to_string())
}

fn trim_statement(s: &str) -> &str {
    s.trim().trim_end_matches(';').trim_end()
}

/// `SELECT * FROM <dataset> LIMIT n`, quoting the dataset when needed
pub fn fallback_sql(dataset_id: &str, row_limit: usize) -> String {
    let table = if IDENTIFIER_RE.is_match(dataset_id) {
        dataset_id.to_string()
    } else {
        format!("\"{}\"", dataset_id.replace('"', "\"\""))
    };
    format!("SELECT * FROM {} LIMIT {}", table, row_limit)
}

/// Statement produced for a question
#[derive(Debug, Clone)]
pub struct GeneratedSql {
    pub sql: String,
    /// Schema context the statement was written against
    pub context: Vec<SchemaSnippet>,
    /// True when extraction failed and the default query was used
    pub is_fallback: bool,
}

pub struct SqlGenerator {
    generator: SharedGenerator,
    schema: SharedSchemaContext,
    params: GenerationParams,
    row_limit: usize,
    context_snippets: usize,
}

impl SqlGenerator {
    pub fn new(
        generator: SharedGenerator,
        schema: SharedSchemaContext,
        params: GenerationParams,
        row_limit: usize,
        context_snippets: usize,
    ) -> Self {
        Self {
            generator,
            schema,
            // Deterministic SQL regardless of narrative temperature
            params: params.with_temperature(0.0),
            row_limit,
            context_snippets,
        }
    }

    async fn context(&self, question: &str) -> Vec<SchemaSnippet> {
        match self.schema.search(question, self.context_snippets).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("SqlGenerator: schema lookup failed, continuing without: {}", e);
                Vec::new()
            }
        }
    }

    /// Generate a statement; never fails, falling back to the default query
    pub async fn generate(&self, question: &str, dataset_id: &str) -> GeneratedSql {
        let context = self.context(question).await;
        let prompt = build_generation_prompt(question, dataset_id, &context, self.row_limit);

        let extracted = match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => extract_sql(&generation.text),
            Err(e) => {
                warn!("SqlGenerator: generation failed: {}", e);
                None
            }
        };

        match extracted {
            Some(sql) => {
                debug!("SqlGenerator: extracted {}", sql);
                GeneratedSql {
                    sql,
                    context,
                    is_fallback: false,
                }
            }
            None => {
                warn!("SqlGenerator: no statement extracted, using default query");
                GeneratedSql {
                    sql: fallback_sql(dataset_id, self.row_limit),
                    context,
                    is_fallback: true,
                }
            }
        }
    }

    /// One correction attempt given the exact validation errors
    pub async fn correct(
        &self,
        question: &str,
        sql: &str,
        validation: &SqlValidationResult,
        context: &[SchemaSnippet],
    ) -> Option<String> {
        let prompt = build_correction_prompt(question, sql, &validation.errors, context);
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => extract_sql(&generation.text),
            Err(e) => {
                warn!("SqlGenerator: correction failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StaticSchemaContext;
    use crate::testing::{FailingGenerator, ScriptedGenerator};
    use std::sync::Arc;

    #[test]
    fn test_extract_fenced() {
        let text = "Here you go:\n```sql\nSELECT name FROM suppliers LIMIT 5;\n```\nDone.";
        assert_eq!(
            extract_sql(text).as_deref(),
            Some("SELECT name FROM suppliers LIMIT 5")
        );
    }

    #[test]
    fn test_extract_bare_statement() {
        let text = "The query is below.\nSELECT a,\n b FROM t WHERE x > 1\n\nThis finds rows.";
        assert_eq!(
            extract_sql(text).as_deref(),
            Some("SELECT a,\n b FROM t WHERE x > 1")
        );
        assert_eq!(
            extract_sql("with x as (select 1) select * from x").as_deref(),
            Some("with x as (select 1) select * from x")
        );
    }

    #[test]
    fn test_extract_skips_prose_mentioning_keywords() {
        let text = "I'll select the top rows.\nSELECT id FROM orders LIMIT 3;\nThat's it.";
        assert_eq!(
            extract_sql(text).as_deref(),
            Some("SELECT id FROM orders LIMIT 3")
        );
    }

    #[test]
    fn test_extract_keeps_destructive_statements() {
        assert_eq!(
            extract_sql("```sql\nDELETE FROM orders WHERE amount > 1000000\n```").as_deref(),
            Some("DELETE FROM orders WHERE amount > 1000000")
        );
        assert_eq!(
            extract_sql("DROP TABLE orders;").as_deref(),
            Some("DROP TABLE orders")
        );
        // Every statement in a fence is kept
        assert_eq!(
            extract_sql("```sql\nSELECT 1;\nDELETE FROM orders;\n```").as_deref(),
            Some("SELECT 1;\nDELETE FROM orders")
        );
    }

    #[test]
    fn test_extract_nothing() {
        assert_eq!(extract_sql("I cannot answer that."), None);
        assert_eq!(extract_sql("```\nplain text\n```"), None);
        assert_eq!(extract_sql("You could select from orders."), None);
        assert_eq!(extract_sql("With that said, no query fits."), None);
    }

    #[test]
    fn test_fallback_quotes_odd_names() {
        assert_eq!(fallback_sql("orders", 100), "SELECT * FROM orders LIMIT 100");
        assert_eq!(
            fallback_sql("sales 2024", 10),
            "SELECT * FROM \"sales 2024\" LIMIT 10"
        );
    }

    fn generator(inner: SharedGenerator) -> SqlGenerator {
        SqlGenerator::new(
            inner,
            Arc::new(StaticSchemaContext::empty()),
            GenerationParams::default(),
            100,
            5,
        )
    }

    #[tokio::test]
    async fn test_generate_uses_reply() {
        let scripted = ScriptedGenerator::new()
            .on("sql_generation", "```sql\nSELECT id FROM orders LIMIT 3\n```");
        let out = generator(Arc::new(scripted)).generate("q", "orders").await;
        assert_eq!(out.sql, "SELECT id FROM orders LIMIT 3");
        assert!(!out.is_fallback);
    }

    #[tokio::test]
    async fn test_generate_passes_destructive_reply_through() {
        let scripted = ScriptedGenerator::new()
            .on("sql_generation", "```sql\nDELETE FROM orders WHERE amount > 1000000\n```");
        let out = generator(Arc::new(scripted)).generate("q", "orders").await;
        assert_eq!(out.sql, "DELETE FROM orders WHERE amount > 1000000");
        assert!(!out.is_fallback);
    }

    #[tokio::test]
    async fn test_generate_failure_falls_back() {
        let out = generator(Arc::new(FailingGenerator))
            .generate("q", "orders")
            .await;
        assert_eq!(out.sql, "SELECT * FROM orders LIMIT 100");
        assert!(out.is_fallback);
    }
}
