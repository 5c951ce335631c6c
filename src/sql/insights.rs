//! Insight, recommendation and follow-up derivation.
//!
//! Three independent best-effort generator calls run concurrently. Each has a
//! deterministic fallback, and the insight list is never empty.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::prompts::{
    TASK_FOLLOW_UPS, TASK_INSIGHTS, TASK_RECOMMENDATIONS, build_derivation_prompt,
};
use super::types::SqlExecutionResult;
use crate::ai::extract_bullets;
use crate::ai::provider::{GenerationParams, SharedGenerator};

/// Items kept per derived list
const MAX_ITEMS: usize = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Derivations {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub follow_ups: Vec<String>,
}

pub struct InsightDeriver {
    generator: SharedGenerator,
    params: GenerationParams,
    sample_rows: usize,
}

impl InsightDeriver {
    pub fn new(generator: SharedGenerator, params: GenerationParams, sample_rows: usize) -> Self {
        Self {
            generator,
            params,
            sample_rows,
        }
    }

    pub async fn derive(
        &self,
        question: &str,
        sql: &str,
        execution: &SqlExecutionResult,
    ) -> Derivations {
        let (insights, recommendations, follow_ups) = tokio::join!(
            self.ask(TASK_INSIGHTS, question, sql, execution),
            self.ask(TASK_RECOMMENDATIONS, question, sql, execution),
            self.ask(TASK_FOLLOW_UPS, question, sql, execution),
        );

        Derivations {
            insights: insights.unwrap_or_else(|| fallback_insights(execution)),
            recommendations: recommendations
                .unwrap_or_else(|| fallback_recommendations(execution)),
            follow_ups: follow_ups.unwrap_or_else(|| fallback_follow_ups(question, execution)),
        }
    }

    /// `None` when the call failed or yielded no items
    async fn ask(
        &self,
        task: &str,
        question: &str,
        sql: &str,
        execution: &SqlExecutionResult,
    ) -> Option<Vec<String>> {
        let prompt = build_derivation_prompt(
            task,
            question,
            sql,
            &execution.rows,
            execution.row_count,
            self.sample_rows,
        );
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let mut items = extract_bullets(&generation.text);
                items.truncate(MAX_ITEMS);
                (!items.is_empty()).then_some(items)
            }
            Err(e) => {
                warn!("InsightDeriver: {} failed, using fallback: {}", task, e);
                None
            }
        }
    }
}

pub fn fallback_insights(execution: &SqlExecutionResult) -> Vec<String> {
    if execution.success {
        vec![format!("Query returned {} rows", execution.row_count)]
    } else {
        vec![format!(
            "Query failed: {}",
            execution.error.as_deref().unwrap_or("unknown error")
        )]
    }
}

pub fn fallback_recommendations(execution: &SqlExecutionResult) -> Vec<String> {
    if !execution.success {
        vec!["Check the query against the dataset schema and retry".to_string()]
    } else if execution.row_count == 0 {
        vec!["Broaden the filters; no rows matched".to_string()]
    } else {
        vec!["Review the returned rows for outliers before acting".to_string()]
    }
}

pub fn fallback_follow_ups(question: &str, execution: &SqlExecutionResult) -> Vec<String> {
    if execution.success && execution.row_count > 0 {
        vec![format!("What drives the results for: {}?", question.trim())]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingGenerator, ScriptedGenerator};
    use serde_json::json;
    use std::sync::Arc;

    fn execution(rows: usize) -> SqlExecutionResult {
        SqlExecutionResult {
            success: true,
            rows: (0..rows).map(|i| json!({"i": i})).collect(),
            row_count: rows,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fallbacks_when_generator_fails() {
        let deriver = InsightDeriver::new(Arc::new(FailingGenerator), GenerationParams::default(), 5);
        let d = deriver.derive("spend by region", "SELECT 1", &execution(4)).await;
        assert_eq!(d.insights, vec!["Query returned 4 rows"]);
        assert_eq!(d.recommendations.len(), 1);
        assert_eq!(d.follow_ups, vec!["What drives the results for: spend by region?"]);
    }

    #[tokio::test]
    async fn test_parses_bullets_per_task() {
        let scripted = ScriptedGenerator::new()
            .on("sql_insights", "- EU leads spend\n- APAC grew 12%")
            .on("sql_recommendations", "1. Renegotiate EU contracts")
            .on("sql_follow_ups", "No bullets here");
        let deriver = InsightDeriver::new(Arc::new(scripted), GenerationParams::default(), 5);
        let d = deriver.derive("q", "SELECT 1", &execution(2)).await;
        assert_eq!(d.insights, vec!["EU leads spend", "APAC grew 12%"]);
        assert_eq!(d.recommendations, vec!["Renegotiate EU contracts"]);
        // Unparseable reply falls back
        assert_eq!(d.follow_ups.len(), 1);
    }

    #[test]
    fn test_failed_execution_insight_never_empty() {
        let failed = SqlExecutionResult {
            success: false,
            error: Some("timeout".into()),
            ..Default::default()
        };
        assert_eq!(fallback_insights(&failed), vec!["Query failed: timeout"]);
        assert!(fallback_follow_ups("q", &failed).is_empty());
    }
}
