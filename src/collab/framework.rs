//! Collaborative framework.
//!
//! `select → generate (parallel) → barrier → review (parallel) →
//! self-critique → synthesize`
//!
//! Per-worker and per-review failures become fixed fallbacks. Anything that
//! still breaks the collaboration drops to a single-worker answer flagged as
//! degraded.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::prompts::{
    build_review_prompt, build_self_critique_prompt, build_synthesis_prompt, build_worker_prompt,
};
use super::registry::{WorkerProfile, WorkerRegistry, WorkerRole, generalist_analyst, ids};
use super::selection::select_workers;
use super::types::{
    CollaborativeResult, PeerReview, SynthesisResult, WorkerResponse, latest_versions,
};
use crate::ai::provider::{GenerationParams, SharedGenerator};
use crate::ai::{
    extract_confidence, extract_fraction, extract_list, extract_number, extract_preamble,
    extract_verdict,
};
use crate::config::{CollaborationConfig, GenerationMode};
use crate::reflection::ReflectionPipeline;
use crate::sql::{SqlToolChain, ToolCall, ToolCallResult, ValidationTier};
use crate::types::{Query, QuorumError, Result, Verdict, truncate_chars};

/// Rows shown to a worker
const DATA_SAMPLE_ROWS: usize = 20;

// =============================================================================
// Scoring
// =============================================================================

/// `(avg(agreement) + approval_rate) / 2`, or `neutral` without reviews
pub fn consensus_level(reviews: &[PeerReview], neutral: f32) -> f32 {
    if reviews.is_empty() {
        return neutral;
    }
    let n = reviews.len() as f32;
    let agreement = reviews.iter().map(|r| r.agreement).sum::<f32>() / n;
    let approvals = reviews
        .iter()
        .filter(|r| r.verdict == Verdict::Approve)
        .count() as f32
        / n;
    ((agreement + approvals) / 2.0).clamp(0.0, 1.0)
}

/// `clamp(original × avg(agreement) + avg(delta), min, max)`
pub fn self_critique_confidence(original: f32, reviews: &[&PeerReview], min: f32, max: f32) -> f32 {
    if reviews.is_empty() {
        return original.clamp(min, max);
    }
    let n = reviews.len() as f32;
    let agreement = reviews.iter().map(|r| r.agreement).sum::<f32>() / n;
    let delta = reviews.iter().map(|r| r.confidence_delta).sum::<f32>() / n;
    (original * agreement + delta).clamp(min, max)
}

fn dedupe(items: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .take(limit)
        .collect()
}

fn payload_strings(response: &WorkerResponse, key: &str) -> Vec<String> {
    response
        .analysis
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn analysis_payload(result: &ToolCallResult) -> Value {
    let sample: Vec<&Value> = result.execution.rows.iter().take(DATA_SAMPLE_ROWS).collect();
    json!({
        "sql": result.sql,
        "row_count": result.execution.row_count,
        "sample": sample,
        "insights": result.insights,
        "recommendations": result.recommendations,
        "follow_ups": result.follow_ups,
        "execution_confidence": result.execution.metadata.confidence,
        "cache_hit": result.execution.metadata.cache_hit,
    })
}

fn render_data(result: &ToolCallResult) -> String {
    if !result.execution.success {
        return format!(
            "The query failed: {}",
            result.execution.error.as_deref().unwrap_or("unknown error")
        );
    }
    let sample: Vec<&Value> = result.execution.rows.iter().take(DATA_SAMPLE_ROWS).collect();
    format!(
        "```sql\n{}\n```\n\n{} rows (first {} shown)\n```json\n{}\n```\n\nInsights:\n{}",
        result.sql,
        result.execution.row_count,
        sample.len(),
        serde_json::to_string_pretty(&sample).unwrap_or_default(),
        result
            .insights
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

// =============================================================================
// Framework
// =============================================================================

pub struct CollaborativeFramework {
    registry: Arc<WorkerRegistry>,
    generator: SharedGenerator,
    tool_chain: Arc<SqlToolChain>,
    reflection: Option<Arc<ReflectionPipeline>>,
    params: GenerationParams,
    config: CollaborationConfig,
    tier: ValidationTier,
    error_correction: bool,
}

impl CollaborativeFramework {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        generator: SharedGenerator,
        tool_chain: Arc<SqlToolChain>,
        params: GenerationParams,
        config: CollaborationConfig,
    ) -> Self {
        Self {
            registry,
            generator,
            tool_chain,
            reflection: None,
            params,
            config,
            tier: ValidationTier::default(),
            error_correction: true,
        }
    }

    /// Pipeline used by primary workers in reflective mode
    pub fn with_reflection(mut self, pipeline: Arc<ReflectionPipeline>) -> Self {
        self.reflection = Some(pipeline);
        self
    }

    pub fn with_sql_options(mut self, tier: ValidationTier, error_correction: bool) -> Self {
        self.tier = tier;
        self.error_correction = error_correction;
        self
    }

    fn mode(&self) -> GenerationMode {
        match (self.config.generation_mode, &self.reflection) {
            (GenerationMode::Reflective, None) => {
                warn!("Collab: reflective mode without a pipeline, using direct");
                GenerationMode::Direct
            }
            (mode, _) => mode,
        }
    }

    /// Answer a question collaboratively
    ///
    /// Only an empty question is an error; every other failure ends in the
    /// degraded single-worker result.
    #[instrument(skip(self, query), fields(dataset = %query.dataset_id, role = %query.role))]
    pub async fn analyze(&self, query: &Query) -> Result<CollaborativeResult> {
        if query.text.trim().is_empty() {
            return Err(QuorumError::orchestration("selection", "query text is empty"));
        }

        let start = Instant::now();
        match self.collaborate(query, start).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("Collab: collaboration failed, falling back to one worker: {}", e);
                Ok(self.fallback(query, &e, start).await)
            }
        }
    }

    async fn collaborate(&self, query: &Query, start: Instant) -> Result<CollaborativeResult> {
        let mode = self.mode();
        let workers = select_workers(query, &self.registry);
        info!(
            "Collab: {} workers selected ({} mode)",
            workers.len(),
            mode
        );

        let authors: Vec<Arc<WorkerProfile>> = workers
            .iter()
            .filter(|w| w.role.generates())
            .cloned()
            .collect();
        let reviewers: Vec<Arc<WorkerProfile>> = workers
            .iter()
            .filter(|w| w.role.reviews())
            .cloned()
            .collect();

        // Generation; completes fully before any review starts
        let mut responses = self.generate_all(query, &authors, mode).await;
        if responses.iter().all(|r| r.degraded) {
            return Err(QuorumError::orchestration(
                "generation",
                "every worker fell back to its default response",
            ));
        }
        responses.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let reviews = self.review_all(query, &reviewers, &responses).await?;
        let revisions = self.self_critique(query, &responses, &reviews).await;
        info!(
            "Collab: {} responses, {} reviews, {} revisions",
            responses.len(),
            reviews.len(),
            revisions.len()
        );
        responses.extend(revisions);

        let synthesis = self.synthesize(query, &responses, &reviews).await;
        let consensus_reached = synthesis.consensus_level >= query.consensus_threshold;
        info!(
            "Collab: consensus {:.2} (threshold {:.2}, reached={}), confidence {:.2}",
            synthesis.consensus_level,
            query.consensus_threshold,
            consensus_reached,
            synthesis.confidence
        );

        Ok(CollaborativeResult {
            query: query.clone(),
            mode,
            workers: workers.iter().map(|w| w.id.clone()).collect(),
            responses,
            reviews,
            synthesis,
            consensus_reached,
            degraded: false,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    // =========================================================================
    // Generation
    // =========================================================================

    async fn generate_all(
        &self,
        query: &Query,
        authors: &[Arc<WorkerProfile>],
        mode: GenerationMode,
    ) -> Vec<WorkerResponse> {
        futures::stream::iter(authors.iter().cloned())
            .map(|profile| async move { self.generate_one(query, &profile, mode).await })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    /// Never fails; a failed worker yields its fixed fallback response
    async fn generate_one(
        &self,
        query: &Query,
        profile: &WorkerProfile,
        mode: GenerationMode,
    ) -> WorkerResponse {
        let outcome = match (&self.reflection, mode, profile.role) {
            (Some(pipeline), GenerationMode::Reflective, WorkerRole::Primary) => {
                self.reflective_response(pipeline, query, profile).await
            }
            _ => self.direct_response(query, profile).await,
        };
        match outcome {
            Ok(response) => {
                debug!(
                    "Collab: {} answered (confidence {:.2})",
                    profile.id, response.confidence
                );
                response
            }
            Err(e) => {
                warn!("Collab: {} failed, using fallback response: {}", profile.id, e);
                let mut response = WorkerResponse::new(
                    profile.id.clone(),
                    format!("{} could not complete the analysis.", profile.name),
                    self.config.fallback_response_confidence,
                );
                response.uncertainties = vec![format!("Generation failed: {}", e)];
                response.degraded = true;
                response
            }
        }
    }

    async fn direct_response(&self, query: &Query, profile: &WorkerProfile) -> Result<WorkerResponse> {
        let call = ToolCall::new(&query.text, &query.dataset_id)
            .with_tier(self.tier)
            .with_error_correction(self.error_correction);

        let mut uncertainties = Vec::new();
        let (data, analysis) = match self.tool_chain.execute_tool_call(&call).await {
            Ok(result) => {
                if !result.has_data() {
                    uncertainties.push(format!(
                        "Query returned no usable rows ({})",
                        result.execution.error.as_deref().unwrap_or("0 rows")
                    ));
                }
                (render_data(&result), analysis_payload(&result))
            }
            Err(e) => {
                uncertainties.push(format!("SQL tool call rejected: {}", e));
                (
                    format!("No data available: {}", e),
                    json!({ "error": e.to_string() }),
                )
            }
        };

        let prompt = build_worker_prompt(profile, query, &data);
        let generation = self.generator.generate(&prompt, &self.params).await?;
        let text = &generation.text;

        let mut response = WorkerResponse::new(
            profile.id.clone(),
            extract_preamble(text),
            extract_confidence(text, self.config.worker_default_confidence),
        );
        response.analysis = analysis;
        response.reasoning_steps = extract_list(text, "reasoning");
        response.evidence = extract_list(text, "evidence");
        uncertainties.extend(extract_list(text, "uncertaint"));
        response.uncertainties = uncertainties;
        if response.content.is_empty() {
            response.content = text.trim().to_string();
        }
        Ok(response)
    }

    async fn reflective_response(
        &self,
        pipeline: &ReflectionPipeline,
        query: &Query,
        profile: &WorkerProfile,
    ) -> Result<WorkerResponse> {
        let result = pipeline.run(query, &profile.persona()).await?;

        let mut response =
            WorkerResponse::new(profile.id.clone(), &result.final_answer, result.confidence);
        response.reasoning_steps = result
            .stage_trace
            .iter()
            .map(|s| {
                format!(
                    "{} ({:.2}): {}",
                    s.stage,
                    s.confidence,
                    truncate_chars(s.narrative.lines().next().unwrap_or_default(), 120)
                )
            })
            .collect();
        let data = result.analysis_data().cloned().unwrap_or(Value::Null);
        response.evidence = data
            .get("insights")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        response.analysis = json!({
            "provenance": result.data_provenance,
            "data": data,
            "recommendations": data.get("recommendations").cloned().unwrap_or(Value::Null),
            "follow_ups": result.follow_ups,
        });
        response.uncertainties = result.limitations;
        Ok(response)
    }

    // =========================================================================
    // Review
    // =========================================================================

    /// One review per (reviewer, response) pair the reviewer did not author
    async fn review_all(
        &self,
        query: &Query,
        reviewers: &[Arc<WorkerProfile>],
        responses: &[WorkerResponse],
    ) -> Result<Vec<PeerReview>> {
        let pairs: Vec<(Arc<WorkerProfile>, &WorkerResponse)> = reviewers
            .iter()
            .flat_map(|reviewer| {
                responses
                    .iter()
                    .filter(move |response| response.worker_id != reviewer.id)
                    .map(move |response| (Arc::clone(reviewer), response))
            })
            .collect();

        let outcomes: Vec<Result<PeerReview>> = futures::stream::iter(pairs)
            .map(|(reviewer, response)| async move {
                self.review_one(query, &reviewer, response).await
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut reviews = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        reviews.sort_by(|a, b| {
            (a.reviewer_id.as_str(), a.target_worker_id.as_str())
                .cmp(&(b.reviewer_id.as_str(), b.target_worker_id.as_str()))
        });
        Ok(reviews)
    }

    async fn review_one(
        &self,
        query: &Query,
        reviewer: &WorkerProfile,
        response: &WorkerResponse,
    ) -> Result<PeerReview> {
        let prompt = build_review_prompt(reviewer, query, response);
        match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let text = &generation.text;
                let limit = self.config.max_confidence_delta;
                let delta = extract_number(text, "delta")
                    .map(|d| (d as f32).clamp(-limit, limit))
                    .unwrap_or(0.0);
                let mut review = PeerReview::new(
                    reviewer.id.clone(),
                    response,
                    extract_fraction(text, "agreement", self.config.fallback_agreement),
                    delta,
                    extract_verdict(text),
                )?;
                review.critiques = extract_list(text, "critique");
                review.suggestions = extract_list(text, "suggestion");
                Ok(review)
            }
            Err(e) => {
                warn!(
                    "Collab: review of {} by {} failed, using default: {}",
                    response.worker_id, reviewer.id, e
                );
                let mut review = PeerReview::new(
                    reviewer.id.clone(),
                    response,
                    self.config.fallback_agreement,
                    0.0,
                    Verdict::Revise,
                )?;
                review.degraded = true;
                Ok(review)
            }
        }
    }

    // =========================================================================
    // Self-critique
    // =========================================================================

    /// New versions for responses with at least one `revise` verdict
    async fn self_critique(
        &self,
        query: &Query,
        responses: &[WorkerResponse],
        reviews: &[PeerReview],
    ) -> Vec<WorkerResponse> {
        let targets: Vec<(&WorkerResponse, Vec<&PeerReview>)> = responses
            .iter()
            .filter_map(|response| {
                let own: Vec<&PeerReview> = reviews
                    .iter()
                    .filter(|r| r.target_response_id == response.id)
                    .collect();
                own.iter()
                    .any(|r| r.verdict == Verdict::Revise)
                    .then_some((response, own))
            })
            .collect();

        futures::stream::iter(targets)
            .map(|(response, own)| async move { self.revise(query, response, &own).await })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn revise(
        &self,
        query: &Query,
        response: &WorkerResponse,
        reviews: &[&PeerReview],
    ) -> WorkerResponse {
        let confidence = self_critique_confidence(
            response.confidence,
            reviews,
            self.config.self_critique_min,
            self.config.self_critique_max,
        );

        let persona = self
            .registry
            .get(response.worker_id.as_str())
            .map(|p| p.persona())
            .unwrap_or_else(|| format!("You are {}.", response.worker_id));
        let prompt = build_self_critique_prompt(&persona, query, response, reviews);

        let content = match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let revised = extract_preamble(&generation.text);
                if revised.is_empty() {
                    response.content.clone()
                } else {
                    revised
                }
            }
            Err(e) => {
                warn!("Collab: revision of {} failed, keeping content: {}", response.worker_id, e);
                response.content.clone()
            }
        };

        debug!(
            "Collab: {} revised {:.2} -> {:.2}",
            response.worker_id, response.confidence, confidence
        );
        response.revise(content, confidence)
    }

    // =========================================================================
    // Synthesis
    // =========================================================================

    async fn synthesize(
        &self,
        query: &Query,
        responses: &[WorkerResponse],
        reviews: &[PeerReview],
    ) -> SynthesisResult {
        let limit = self.config.max_list_items;
        let mut finals = latest_versions(responses);
        finals.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let consensus = consensus_level(reviews, self.config.neutral_consensus);
        let avg_confidence = if finals.is_empty() {
            0.0
        } else {
            finals.iter().map(|r| r.confidence).sum::<f32>() / finals.len() as f32
        };
        let confidence = ((avg_confidence + consensus) / 2.0).clamp(0.0, 1.0);

        let critiques = dedupe(reviews.iter().flat_map(|r| r.critiques.clone()), limit);

        let mut notes = Vec::new();
        for response in finals.iter().filter(|r| r.degraded) {
            notes.push(format!("{} contributed only a fallback response", response.worker_id));
        }
        let defaulted = reviews.iter().filter(|r| r.degraded).count();
        if defaulted > 0 {
            notes.push(format!("{} peer reviews used default scores", defaulted));
        }

        let prompt = build_synthesis_prompt(query, &finals, &critiques);
        let (narrative, text) = match self.generator.generate(&prompt, &self.params).await {
            Ok(generation) => {
                let body = extract_preamble(&generation.text);
                (body, generation.text)
            }
            Err(e) => {
                warn!("Collab: synthesis failed, using top response: {}", e);
                notes.push(format!("Synthesis unavailable: {}", e));
                (String::new(), String::new())
            }
        };
        let narrative = if narrative.is_empty() {
            finals
                .first()
                .map(|r| r.content.clone())
                .unwrap_or_default()
        } else {
            narrative
        };

        let mut strengths = extract_list(&text, "strength");
        if strengths.is_empty() {
            strengths = finals.iter().flat_map(|r| r.evidence.clone()).collect();
        }

        let weaknesses = extract_list(&text, "weakness")
            .into_iter()
            .chain(critiques);

        let mut recommendations = extract_list(&text, "recommendation");
        if recommendations.is_empty() {
            recommendations = finals
                .iter()
                .flat_map(|r| payload_strings(r, "recommendations"))
                .collect();
        }

        let limitations = notes
            .into_iter()
            .chain(extract_list(&text, "limitation"))
            .chain(finals.iter().flat_map(|r| r.uncertainties.clone()));

        SynthesisResult {
            narrative,
            consensus_level: consensus,
            confidence,
            strengths: dedupe(strengths, limit),
            weaknesses: dedupe(weaknesses, limit),
            recommendations: dedupe(recommendations, limit),
            limitations: dedupe(limitations, limit.max(1) * 2),
        }
    }

    // =========================================================================
    // Fallback
    // =========================================================================

    async fn fallback(&self, query: &Query, error: &QuorumError, start: Instant) -> CollaborativeResult {
        let profile = self
            .registry
            .get(ids::GENERALIST)
            .unwrap_or_else(|| Arc::new(generalist_analyst()));
        let response = self
            .generate_one(query, &profile, GenerationMode::Direct)
            .await;

        let limit = self.config.max_list_items;
        let consensus = self.config.fallback_consensus;
        let confidence = ((response.confidence + consensus) / 2.0).clamp(0.0, 1.0);
        let limitations = std::iter::once(format!(
            "Collaboration failed ({}); answered by a single worker without peer review",
            error
        ))
        .chain(response.uncertainties.clone());

        let synthesis = SynthesisResult {
            narrative: response.content.clone(),
            consensus_level: consensus,
            confidence,
            strengths: dedupe(response.evidence.clone(), limit),
            weaknesses: Vec::new(),
            recommendations: dedupe(payload_strings(&response, "recommendations"), limit),
            limitations: dedupe(limitations, limit.max(1) * 2),
        };

        CollaborativeResult {
            query: query.clone(),
            mode: GenerationMode::Direct,
            workers: vec![profile.id.clone()],
            responses: vec![response],
            reviews: Vec::new(),
            consensus_reached: consensus >= query.consensus_threshold,
            synthesis,
            degraded: true,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}
