//! Staged reflection pipeline.
//!
//! `Planning → MemoryContextFetch → Analysis → Validation →
//! (Critique → [Refinement])* → Synthesis`
//!
//! Every stage is fail-soft: a generator failure is replaced by a fixed
//! degraded result at lower confidence. Only an empty question aborts.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::prompts::{
    build_analysis_prompt, build_critique_prompt, build_planning_prompt, build_refinement_prompt,
    build_synthesis_prompt, build_validation_prompt,
};
use super::types::{
    AnalysisPlan, DataProvenance, ReflectionResult, Stage, StageResult, recency_weighted_mean,
};
use crate::ai::provider::{GenerationParams, SharedGenerator};
use crate::ai::{Check, extract_checks, extract_confidence, extract_json, extract_list};
use crate::config::ReflectionConfig;
use crate::schema::{SchemaSnippet, SharedSchemaContext};
use crate::sql::{SqlToolChain, ToolCall, ToolCallResult, ValidationTier};
use crate::types::{Query, QuorumError, Result};

/// Rows rendered into the analysis prompt and stage payload
const DATA_SAMPLE_ROWS: usize = 20;

/// Items kept in the follow-up list
const MAX_FOLLOW_UPS: usize = 5;

/// Validation confidence from audit checks
///
/// `passed / total - penalty * high_severity_failures`, floored. No checks
/// yields the neutral default.
pub fn validation_confidence(checks: &[Check], config: &ReflectionConfig) -> f32 {
    if checks.is_empty() {
        return config.validation_neutral;
    }
    let passed = checks.iter().filter(|c| c.passed).count() as f32;
    let high = checks.iter().filter(|c| !c.passed && c.high_severity).count() as f32;
    let score = passed / checks.len() as f32 - config.high_severity_penalty * high;
    score.clamp(config.validation_floor, 1.0)
}

/// Drop `Confidence: x` lines so they do not leak into answers
fn strip_confidence_lines(text: &str) -> String {
    text.lines()
        .filter(|line| {
            !line
                .trim()
                .trim_start_matches(['*', '#', '-', ' '])
                .to_lowercase()
                .starts_with("confidence")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Answer text before the trailing follow-up / limitation sections
fn answer_body(text: &str) -> String {
    let mut body = Vec::new();
    for line in text.lines() {
        let lower = line.trim().to_lowercase();
        let heading = lower.starts_with('#') || lower.ends_with(':');
        if heading && (lower.contains("follow-up") || lower.contains("limitation")) {
            break;
        }
        body.push(line);
    }
    strip_confidence_lines(&body.join("\n"))
}

#[derive(Debug, Clone)]
struct Candidate {
    narrative: String,
    confidence: f32,
}

pub struct ReflectionPipeline {
    generator: SharedGenerator,
    schema: SharedSchemaContext,
    tool_chain: Arc<SqlToolChain>,
    params: GenerationParams,
    config: ReflectionConfig,
    tier: ValidationTier,
    error_correction: bool,
}

impl ReflectionPipeline {
    pub fn new(
        generator: SharedGenerator,
        schema: SharedSchemaContext,
        tool_chain: Arc<SqlToolChain>,
        params: GenerationParams,
        config: ReflectionConfig,
    ) -> Self {
        Self {
            generator,
            schema,
            tool_chain,
            params,
            config,
            tier: ValidationTier::default(),
            error_correction: true,
        }
    }

    /// Validation tier and correction switch for the analysis tool call
    pub fn with_sql_options(mut self, tier: ValidationTier, error_correction: bool) -> Self {
        self.tier = tier;
        self.error_correction = error_correction;
        self
    }

    /// Run every stage for one question
    ///
    /// `context` is optional caller perspective (e.g. a worker persona)
    /// threaded into the planning and analysis prompts.
    #[instrument(skip(self, query, context), fields(dataset = %query.dataset_id))]
    pub async fn run(&self, query: &Query, context: &str) -> Result<ReflectionResult> {
        if query.text.trim().is_empty() {
            return Err(QuorumError::orchestration(
                Stage::Planning.as_str(),
                "query text is empty, nothing to plan",
            ));
        }

        let start = Instant::now();
        let mut trace: Vec<StageResult> = Vec::new();
        info!("Reflection: starting for {:?}", query.text);

        // Planning
        let (plan, planning) = self.plan(query, context).await;
        trace.push(planning);

        // Memory context
        let snippets = self.fetch_context(query).await;

        // Analysis
        let (analysis, tool_result) = self.analyze(query, context, &plan, &snippets).await;
        trace.push(analysis.clone());

        // Validation
        let validation = self.validate(query, &plan, &analysis.narrative).await;
        trace.push(validation.clone());

        // Critique loop
        let max_iterations = query.max_iterations.unwrap_or(self.config.max_iterations);
        let best = self
            .critique_loop(query, &analysis, max_iterations, &mut trace)
            .await;

        // Synthesis
        let confidence = recency_weighted_mean(
            &trace.iter().map(|s| s.confidence).collect::<Vec<_>>(),
        );
        let synthesis = self
            .synthesize(query, &best, &validation.errors, confidence)
            .await;
        trace.push(synthesis.clone());

        let follow_ups = self.follow_ups(&synthesis, tool_result.as_ref());
        let limitations = self.limitations(&synthesis, &trace, tool_result.as_ref());
        let data_provenance = provenance(tool_result.as_ref(), &snippets);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "Reflection: complete in {}ms ({} stages, confidence {:.2})",
            elapsed_ms,
            trace.len(),
            confidence
        );

        Ok(ReflectionResult {
            final_answer: synthesis.narrative,
            confidence,
            plan,
            stage_trace: trace,
            data_provenance,
            follow_ups,
            limitations,
            elapsed_ms,
        })
    }

    // =========================================================================
    // Stages
    // =========================================================================

    async fn plan(&self, query: &Query, context: &str) -> (AnalysisPlan, StageResult) {
        let prompt = build_planning_prompt(query, context);
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let plan = extract_json::<AnalysisPlan>(&generation.text).unwrap_or_else(|| {
                    debug!("Reflection: plan unparseable, using default plan");
                    AnalysisPlan::default()
                });
                let stage = StageResult::new(
                    Stage::Planning,
                    format!("{} analysis in {} steps", plan.complexity, plan.analysis_steps.len()),
                    self.config.planning_confidence,
                )
                .with_data(json!(plan));
                (plan, stage)
            }
            Err(e) => {
                warn!("Reflection: planning failed, using default plan: {}", e);
                let plan = AnalysisPlan::default();
                let stage = StageResult::degraded(
                    Stage::Planning,
                    "Default plan",
                    self.config.degraded_confidence,
                    e.to_string(),
                )
                .with_data(json!(plan));
                (plan, stage)
            }
        }
    }

    async fn fetch_context(&self, query: &Query) -> Vec<SchemaSnippet> {
        match self
            .schema
            .search(&query.text, self.config.context_snippets)
            .await
        {
            Ok(snippets) => {
                debug!("Reflection: {} context snippets", snippets.len());
                snippets
            }
            Err(e) => {
                warn!("Reflection: context fetch failed, continuing without: {}", e);
                Vec::new()
            }
        }
    }

    async fn analyze(
        &self,
        query: &Query,
        context: &str,
        plan: &AnalysisPlan,
        snippets: &[SchemaSnippet],
    ) -> (StageResult, Option<ToolCallResult>) {
        let call = ToolCall::new(&query.text, &query.dataset_id)
            .with_tier(self.tier)
            .with_error_correction(self.error_correction);

        let result = match self.tool_chain.execute_tool_call(&call).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Reflection: tool call rejected: {}", e);
                return (self.limited_data(e.to_string(), None), None);
            }
        };

        if !result.has_data() {
            let reason = result
                .execution
                .error
                .clone()
                .unwrap_or_else(|| "query returned 0 rows".to_string());
            let stage = self.limited_data(reason, Some(analysis_payload(&result)));
            return (stage, Some(result));
        }

        let sample: Vec<&Value> = result.execution.rows.iter().take(DATA_SAMPLE_ROWS).collect();
        let data = format!(
            "{} rows (first {} shown)\n{}\n\nInsights:\n{}",
            result.execution.row_count,
            sample.len(),
            serde_json::to_string_pretty(&sample).unwrap_or_default(),
            result
                .insights
                .iter()
                .map(|i| format!("- {}", i))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let prompt = build_analysis_prompt(query, context, plan, snippets, &result.sql, &data);

        let stage = match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let confidence =
                    extract_confidence(&generation.text, self.config.analysis_default_confidence);
                StageResult::new(
                    Stage::Analysis,
                    strip_confidence_lines(&generation.text),
                    confidence,
                )
            }
            Err(e) => {
                warn!("Reflection: narration failed, using insights: {}", e);
                StageResult::degraded(
                    Stage::Analysis,
                    result.insights.join("\n"),
                    self.config.degraded_confidence,
                    e.to_string(),
                )
            }
        };
        (stage.with_data(analysis_payload(&result)), Some(result))
    }

    fn limited_data(&self, reason: String, data: Option<Value>) -> StageResult {
        let confidence = (self.config.analysis_default_confidence * 0.5)
            .max(self.config.limited_data_floor);
        let mut stage = StageResult::new(
            Stage::Analysis,
            format!(
                "Limited data: {}. No figures could be verified, so any conclusion is provisional.",
                reason
            ),
            confidence,
        );
        stage.errors.push(reason);
        if let Some(data) = data {
            stage = stage.with_data(data);
        }
        stage
    }

    async fn validate(&self, query: &Query, plan: &AnalysisPlan, analysis: &str) -> StageResult {
        let prompt = build_validation_prompt(query, analysis, &plan.validation_checks);
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let checks = extract_checks(&generation.text);
                let confidence = validation_confidence(&checks, &self.config);
                let mut stage = StageResult::new(Stage::Validation, generation.text, confidence)
                    .with_data(json!(checks));
                stage.errors = checks
                    .iter()
                    .filter(|c| !c.passed)
                    .map(|c| c.description.clone())
                    .collect();
                debug!(
                    "Reflection: {} checks, {} failed, confidence {:.2}",
                    checks.len(),
                    stage.errors.len(),
                    confidence
                );
                stage
            }
            Err(e) => {
                warn!("Reflection: validation failed: {}", e);
                StageResult::degraded(
                    Stage::Validation,
                    "Validation unavailable",
                    self.config.degraded_confidence,
                    e.to_string(),
                )
            }
        }
    }

    /// Bounded critique/refine loop returning the best-seen candidate
    async fn critique_loop(
        &self,
        query: &Query,
        analysis: &StageResult,
        max_iterations: usize,
        trace: &mut Vec<StageResult>,
    ) -> Candidate {
        let mut current = Candidate {
            narrative: analysis.narrative.clone(),
            confidence: analysis.confidence,
        };
        let mut best = current.clone();

        for iteration in 1..=max_iterations {
            let critique = self.critique(query, &current, iteration).await;
            trace.push(critique.clone());

            if !critique.degraded && critique.confidence >= self.config.critique_threshold {
                info!(
                    "Reflection: critique {:.2} meets threshold at iteration {}",
                    critique.confidence, iteration
                );
                if critique.confidence >= best.confidence {
                    best = Candidate {
                        narrative: current.narrative.clone(),
                        confidence: critique.confidence,
                    };
                }
                break;
            }

            let refinement = self.refine(query, &current, &critique, iteration).await;
            trace.push(refinement.clone());
            if refinement.degraded {
                continue;
            }

            current = Candidate {
                narrative: refinement.narrative,
                confidence: refinement.confidence,
            };
            if current.confidence > best.confidence {
                best = current.clone();
            }
        }

        debug!("Reflection: best candidate confidence {:.2}", best.confidence);
        best
    }

    async fn critique(&self, query: &Query, current: &Candidate, iteration: usize) -> StageResult {
        let prompt = build_critique_prompt(query, &current.narrative, iteration);
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let confidence = extract_confidence(
                    &generation.text,
                    self.config.critique_default_confidence,
                );
                let mut stage = StageResult::new(Stage::Critique, &generation.text, confidence)
                    .at_iteration(iteration);
                stage.errors = extract_list(&generation.text, "issue");
                stage.suggestions = extract_list(&generation.text, "suggestion");
                stage
            }
            Err(e) => {
                warn!("Reflection: critique {} failed: {}", iteration, e);
                StageResult::degraded(
                    Stage::Critique,
                    "Critique unavailable",
                    self.config.degraded_confidence,
                    e.to_string(),
                )
                .at_iteration(iteration)
            }
        }
    }

    async fn refine(
        &self,
        query: &Query,
        current: &Candidate,
        critique: &StageResult,
        iteration: usize,
    ) -> StageResult {
        let prompt = build_refinement_prompt(
            query,
            &current.narrative,
            &critique.errors,
            &critique.suggestions,
        );
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let narrative = strip_confidence_lines(&generation.text);
                if narrative.is_empty() {
                    return StageResult::degraded(
                        Stage::Refinement,
                        current.narrative.clone(),
                        current.confidence,
                        "empty refinement".to_string(),
                    )
                    .at_iteration(iteration);
                }
                let extracted = extract_confidence(&generation.text, critique.confidence);
                let confidence =
                    (extracted + self.config.refinement_bonus).min(self.config.refinement_cap);
                StageResult::new(Stage::Refinement, narrative, confidence).at_iteration(iteration)
            }
            Err(e) => {
                warn!("Reflection: refinement {} failed, keeping prior: {}", iteration, e);
                StageResult::degraded(
                    Stage::Refinement,
                    current.narrative.clone(),
                    current.confidence,
                    e.to_string(),
                )
                .at_iteration(iteration)
            }
        }
    }

    async fn synthesize(
        &self,
        query: &Query,
        best: &Candidate,
        validation_errors: &[String],
        confidence: f32,
    ) -> StageResult {
        let prompt = build_synthesis_prompt(query, &best.narrative, validation_errors);
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let body = answer_body(&generation.text);
                let narrative = if body.is_empty() {
                    best.narrative.clone()
                } else {
                    body
                };
                StageResult::new(Stage::Synthesis, narrative, confidence)
                    .with_data(json!({ "raw": generation.text }))
            }
            Err(e) => {
                warn!("Reflection: synthesis failed, returning best candidate: {}", e);
                StageResult::degraded(
                    Stage::Synthesis,
                    best.narrative.clone(),
                    confidence,
                    e.to_string(),
                )
            }
        }
    }

    // =========================================================================
    // Result assembly
    // =========================================================================

    fn follow_ups(&self, synthesis: &StageResult, tool: Option<&ToolCallResult>) -> Vec<String> {
        let raw = synthesis
            .data
            .as_ref()
            .and_then(|d| d.get("raw"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let mut items = extract_list(raw, "follow-up");
        if let Some(tool) = tool {
            items.extend(tool.follow_ups.iter().cloned());
        }
        let mut seen = std::collections::HashSet::new();
        items.retain(|item| seen.insert(item.to_lowercase()));
        items.truncate(MAX_FOLLOW_UPS);
        items
    }

    fn limitations(
        &self,
        synthesis: &StageResult,
        trace: &[StageResult],
        tool: Option<&ToolCallResult>,
    ) -> Vec<String> {
        let raw = synthesis
            .data
            .as_ref()
            .and_then(|d| d.get("raw"))
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        let mut limitations = extract_list(raw, "limitation");

        match tool {
            Some(tool) if !tool.has_data() => limitations.push(format!(
                "Analysis ran without query results ({})",
                tool.execution.error.as_deref().unwrap_or("0 rows")
            )),
            Some(tool) if !tool.validation.is_valid => limitations
                .push("Executed SQL did not pass validation; figures may be off".to_string()),
            None => limitations.push("No data could be retrieved for this question".to_string()),
            _ => {}
        }

        for stage in trace.iter().filter(|s| s.degraded) {
            let label = if stage.iteration > 0 {
                format!("{} (iteration {})", stage.stage, stage.iteration)
            } else {
                stage.stage.to_string()
            };
            limitations.push(format!("{} stage used a fallback result", label));
        }
        limitations
    }
}

fn analysis_payload(result: &ToolCallResult) -> Value {
    let sample: Vec<&Value> = result.execution.rows.iter().take(DATA_SAMPLE_ROWS).collect();
    json!({
        "sql": result.sql,
        "row_count": result.execution.row_count,
        "sample": sample,
        "insights": result.insights,
        "recommendations": result.recommendations,
        "validation_passed": result.execution.metadata.validation_passed,
        "execution_confidence": result.execution.metadata.confidence,
    })
}

fn provenance(tool: Option<&ToolCallResult>, snippets: &[SchemaSnippet]) -> DataProvenance {
    let schema_sources = snippets.iter().map(|s| s.source.clone()).collect();
    match tool {
        Some(tool) => DataProvenance {
            sql: Some(tool.sql.clone()),
            source_id: Some(tool.execution.metadata.source_id.clone()),
            row_count: tool.execution.row_count,
            cache_hit: tool.execution.metadata.cache_hit,
            validation_passed: tool.execution.metadata.validation_passed,
            schema_sources,
        },
        None => DataProvenance {
            schema_sources,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqlConfig;
    use crate::schema::StaticSchemaContext;
    use crate::sql::SharedExecutor;
    use crate::testing::{FailingGenerator, ScriptedGenerator, StaticExecutor};

    fn rows() -> Vec<Value> {
        vec![
            json!({"supplier": "Acme", "spend": 1200.5}),
            json!({"supplier": "Globex", "spend": 800.0}),
        ]
    }

    fn pipeline(generator: SharedGenerator, executor: SharedExecutor) -> ReflectionPipeline {
        let schema: SharedSchemaContext = Arc::new(StaticSchemaContext::new(vec![
            SchemaSnippet::new("purchases", "TABLE purchases (supplier TEXT, spend REAL)"),
        ]));
        let chain = SqlToolChain::new(
            generator.clone(),
            schema.clone(),
            executor,
            GenerationParams::default(),
            SqlConfig::default(),
        );
        ReflectionPipeline::new(
            generator,
            schema,
            Arc::new(chain),
            GenerationParams::default(),
            ReflectionConfig::default(),
        )
    }

    fn scripted() -> ScriptedGenerator {
        ScriptedGenerator::new()
            .on(
                "reflection_planning",
                r#"{"complexity":"high","analysis_steps":["rank suppliers"],"validation_checks":["totals"]}"#,
            )
            .on(
                "sql_generation",
                "```sql\nSELECT supplier, spend FROM purchases ORDER BY spend DESC\n```",
            )
            .on("reflection_analysis", "Acme leads spend at 1200.5.\nConfidence: 0.8")
            .on("reflection_validation", "- totals match: PASS\n- ranking correct: PASS")
            .on("reflection_critique", "## Issues\n- none\n\nConfidence: 0.9")
            .on(
                "reflection_synthesis",
                "Acme is the top supplier.\n\n## Follow-up questions\n- Why is Acme ahead?\n\n## Limitations\n- Single period only",
            )
    }

    #[test]
    fn test_validation_confidence() {
        let config = ReflectionConfig::default();
        assert_eq!(validation_confidence(&[], &config), 0.7);

        let checks = extract_checks("- totals: PASS\n- trend: FAIL (high severity)");
        assert!((validation_confidence(&checks, &config) - 0.4).abs() < 1e-6);

        let checks = extract_checks("- a: FAIL critical\n- b: FAIL critical");
        assert_eq!(validation_confidence(&checks, &config), 0.3);
    }

    #[test]
    fn test_answer_body_cuts_sections() {
        let text = "Answer line.\nConfidence: 0.9\n\n## Follow-up questions\n- next?";
        assert_eq!(answer_body(text), "Answer line.");
    }

    #[tokio::test]
    async fn test_early_exit_on_confident_critique() {
        let executor = Arc::new(StaticExecutor::new(rows()));
        let result = pipeline(Arc::new(scripted()), executor)
            .run(&Query::new("Who are the top suppliers?", "purchases"), "")
            .await
            .unwrap();

        let stages: Vec<Stage> = result.stage_trace.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Planning,
                Stage::Analysis,
                Stage::Validation,
                Stage::Critique,
                Stage::Synthesis
            ]
        );
        assert_eq!(result.plan.complexity, "high");
        assert_eq!(result.final_answer, "Acme is the top supplier.");
        assert_eq!(result.follow_ups[0], "Why is Acme ahead?");
        assert!(result.limitations.contains(&"Single period only".to_string()));
        assert_eq!(result.data_provenance.row_count, 2);
        assert_eq!(result.data_provenance.schema_sources, vec!["purchases"]);
        // (0.9*1 + 0.8*2 + 1.0*3 + 0.9*4) / 10
        assert!((result.confidence - 0.91).abs() < 1e-4);
        assert!(result.analysis_data().is_some());
    }

    #[tokio::test]
    async fn test_best_seen_candidate_is_kept() {
        let generator = scripted()
            .on("reflection_critique", "## Issues\n- weak\n\nConfidence: 0.5")
            .on("reflection_refinement", "Rewritten answer.\nConfidence: 0.5")
            .fail_on("reflection_synthesis");
        let executor = Arc::new(StaticExecutor::new(rows()));
        let result = pipeline(Arc::new(generator), executor)
            .run(&Query::new("Who are the top suppliers?", "purchases"), "")
            .await
            .unwrap();

        assert_eq!(result.stages(Stage::Critique).count(), 3);
        assert_eq!(result.stages(Stage::Refinement).count(), 3);
        for r in result.stages(Stage::Refinement) {
            assert!((r.confidence - 0.55).abs() < 1e-6);
        }
        // Analysis at 0.8 beats every 0.55 refinement
        assert_eq!(result.final_answer, "Acme leads spend at 1200.5.");
        assert!(result
            .limitations
            .iter()
            .any(|l| l.starts_with("synthesis stage")));
    }

    #[tokio::test]
    async fn test_max_iterations_override() {
        let generator = scripted().on("reflection_critique", "Confidence: 0.2");
        let executor = Arc::new(StaticExecutor::new(rows()));
        let query = Query::new("Who are the top suppliers?", "purchases")
            .with_max_iterations(Some(1));
        let result = pipeline(Arc::new(generator), executor)
            .run(&query, "")
            .await
            .unwrap();
        assert_eq!(result.stages(Stage::Critique).count(), 1);
    }

    #[tokio::test]
    async fn test_limited_data_confidence() {
        let executor = Arc::new(StaticExecutor::new(vec![]));
        let result = pipeline(Arc::new(scripted()), executor)
            .run(&Query::new("Who are the top suppliers?", "purchases"), "")
            .await
            .unwrap();
        let analysis = result.stages(Stage::Analysis).next().unwrap();
        assert!(analysis.narrative.starts_with("Limited data"));
        assert!((analysis.confidence - 0.375).abs() < 1e-6);
        assert!(result
            .limitations
            .iter()
            .any(|l| l.starts_with("Analysis ran without query results")));
    }

    #[tokio::test]
    async fn test_generator_outage_degrades_every_stage() {
        let executor = Arc::new(StaticExecutor::new(rows()));
        let result = pipeline(Arc::new(FailingGenerator), executor)
            .run(&Query::new("Who are the top suppliers?", "purchases"), "")
            .await
            .unwrap();

        assert_eq!(result.plan, AnalysisPlan::default());
        assert!(result.stage_trace.iter().all(|s| s.degraded));
        assert!((0.0..=1.0).contains(&result.confidence));
        // Fallback SQL still ran against the dataset
        assert_eq!(result.data_provenance.row_count, 2);
        assert!(!result.final_answer.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_is_orchestration_failure() {
        let executor = Arc::new(StaticExecutor::new(rows()));
        let err = pipeline(Arc::new(scripted()), executor)
            .run(&Query::new("   ", "purchases"), "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::types::FailureKind::Orchestration);
    }
}
