//! SQL Tool Chain
//!
//! `generate → safety → validate → [correct once] → execute → derive`
//!
//! - The safety pass is a hard error: destructive statements never reach the
//!   executor, and neither does an unsafe correction.
//! - Validation failure triggers at most one correction. If the statement is
//!   still invalid it runs anyway with `validation_passed = false`.
//! - Execution is one attempt under a hard timeout. Failures become a result
//!   with `success = false`, never an error.

use std::time::Instant;

use tracing::{info, instrument, warn};

use super::executor::SharedExecutor;
use super::generator::SqlGenerator;
use super::insights::InsightDeriver;
use super::safety::enforce_safety;
use super::types::{
    ExecutionMetadata, QueryRows, SqlExecutionResult, SqlValidationResult, ToolCall,
    ToolCallResult, ValidationTier,
};
use super::validator::SqlValidator;
use crate::ai::provider::{GenerationParams, SharedGenerator};
use crate::ai::with_timeout;
use crate::cache::{ContentCache, SharedCache};
use crate::config::{SqlConfidenceConfig, SqlConfig};
use crate::constants::reflection::CONTEXT_SNIPPETS;
use crate::schema::SharedSchemaContext;
use crate::types::Result;

const VALIDATION_NAMESPACE: &str = "sql_validation";
const RESULT_NAMESPACE: &str = "sql_result";

/// Execution confidence from the four quality signals, capped at 1.0
pub fn execution_confidence(
    policy: &SqlConfidenceConfig,
    validation_passed: bool,
    execution_time_ms: u64,
    row_count: usize,
    warning_count: usize,
) -> f32 {
    let mut score = policy.base;
    if validation_passed {
        score += policy.validation_bonus;
    }
    if execution_time_ms < policy.fast_threshold_ms {
        score += policy.fast_bonus;
    }
    if row_count > 0 {
        score += policy.non_empty_bonus;
    }
    if warning_count == 0 {
        score += policy.no_warnings_bonus;
    }
    score.clamp(0.0, 1.0)
}

pub struct SqlToolChain {
    generator: SqlGenerator,
    validator: SqlValidator,
    executor: SharedExecutor,
    deriver: InsightDeriver,
    result_cache: Option<ContentCache<QueryRows>>,
    config: SqlConfig,
}

impl SqlToolChain {
    pub fn new(
        generator: SharedGenerator,
        schema: SharedSchemaContext,
        executor: SharedExecutor,
        params: GenerationParams,
        config: SqlConfig,
    ) -> Self {
        Self {
            generator: SqlGenerator::new(
                generator.clone(),
                schema,
                params.clone(),
                config.row_limit,
                CONTEXT_SNIPPETS,
            ),
            validator: SqlValidator::new(),
            executor,
            deriver: InsightDeriver::new(generator, params, config.insight_sample_rows),
            result_cache: None,
            config,
        }
    }

    /// Memoize validation and execution results in `cache`
    pub fn with_cache(mut self, cache: SharedCache) -> Self {
        self.validator = SqlValidator::new().with_cache(ContentCache::new(
            cache.clone(),
            VALIDATION_NAMESPACE,
            self.config.validation_cache_ttl(),
        ));
        self.result_cache = Some(ContentCache::new(
            cache,
            RESULT_NAMESPACE,
            self.config.result_cache_ttl(),
        ));
        self
    }

    pub fn source_id(&self) -> &str {
        self.executor.source_id()
    }

    /// Run the full pipeline for one natural-language question
    ///
    /// Errors only when the safety pass rejects the generated statement.
    #[instrument(skip(self, call), fields(dataset = %call.dataset_id, tier = %call.tier))]
    pub async fn execute_tool_call(&self, call: &ToolCall) -> Result<ToolCallResult> {
        info!("SqlToolChain: starting tool call");

        let generated = self.generator.generate(&call.query, &call.dataset_id).await;
        let safe_sql = enforce_safety(&generated.sql, self.config.row_limit)?;

        let mut validation = self.validator.validate(&safe_sql, call.tier).await;
        let mut sql = safe_sql.clone();
        let mut original_sql = None;

        if !validation.is_valid && call.error_correction {
            if let Some(corrected) = self
                .generator
                .correct(&call.query, &safe_sql, &validation, &generated.context)
                .await
            {
                match enforce_safety(&corrected, self.config.row_limit) {
                    Ok(corrected) => {
                        let revalidated = self.validator.validate(&corrected, call.tier).await;
                        info!(
                            "SqlToolChain: correction {}",
                            if revalidated.is_valid { "passed" } else { "still invalid" }
                        );
                        original_sql = Some(std::mem::replace(&mut sql, corrected.clone()));
                        validation = SqlValidationResult {
                            corrected_sql: Some(corrected),
                            ..revalidated
                        };
                    }
                    Err(e) => warn!("SqlToolChain: discarded unsafe correction: {}", e),
                }
            } else {
                warn!("SqlToolChain: no correction produced");
            }
        }

        if !validation.is_valid {
            warn!(
                "SqlToolChain: executing best-effort SQL despite {} validation errors",
                validation.errors.len()
            );
        }

        let execution = self
            .execute_sql(&sql, validation.is_valid, validation.warnings.len())
            .await;
        let derived = self.deriver.derive(&call.query, &sql, &execution).await;

        info!(
            "SqlToolChain: complete (success={}, rows={}, cache_hit={})",
            execution.success, execution.row_count, execution.metadata.cache_hit
        );

        Ok(ToolCallResult {
            sql,
            original_sql,
            validation,
            execution,
            insights: derived.insights,
            recommendations: derived.recommendations,
            follow_ups: derived.follow_ups,
        })
    }

    /// Safety pass, validation and execution of a caller-supplied statement
    pub async fn run_statement(
        &self,
        sql: &str,
        tier: ValidationTier,
    ) -> Result<(String, SqlValidationResult, SqlExecutionResult)> {
        let safe_sql = enforce_safety(sql, self.config.row_limit)?;
        let validation = self.validator.validate(&safe_sql, tier).await;
        let execution = self
            .execute_sql(&safe_sql, validation.is_valid, validation.warnings.len())
            .await;
        Ok((safe_sql, validation, execution))
    }

    /// Exactly one attempt: result cache, else the executor under the hard timeout
    pub async fn execute_sql(
        &self,
        sql: &str,
        validation_passed: bool,
        warning_count: usize,
    ) -> SqlExecutionResult {
        let source_id = self.executor.source_id().to_string();
        let key = [source_id.as_str(), sql];
        let policy = &self.config.confidence;

        if let Some(cache) = &self.result_cache
            && let Some(hit) = cache.get(&key).await
        {
            info!("SqlToolChain: result cache hit ({} rows)", hit.row_count);
            return SqlExecutionResult {
                success: true,
                execution_time_ms: 0,
                row_count: hit.row_count,
                error: None,
                metadata: ExecutionMetadata {
                    source_id,
                    cache_hit: true,
                    validation_passed,
                    confidence: execution_confidence(
                        policy,
                        validation_passed,
                        0,
                        hit.row_count,
                        warning_count,
                    ),
                },
                rows: hit.rows,
            };
        }

        let timeout = self.config.execution_timeout();
        let start = Instant::now();
        let outcome = with_timeout(
            timeout,
            self.executor.execute(sql, timeout),
            "sql execution",
        )
        .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(rows) => {
                if let Some(cache) = &self.result_cache
                    && elapsed_ms < self.config.cacheable_runtime_ms
                {
                    cache.put(&key, &rows).await;
                }
                SqlExecutionResult {
                    success: true,
                    execution_time_ms: elapsed_ms,
                    row_count: rows.row_count,
                    error: None,
                    metadata: ExecutionMetadata {
                        source_id,
                        cache_hit: false,
                        validation_passed,
                        confidence: execution_confidence(
                            policy,
                            validation_passed,
                            elapsed_ms,
                            rows.row_count,
                            warning_count,
                        ),
                    },
                    rows: rows.rows,
                }
            }
            Err(e) => {
                warn!("SqlToolChain: execution failed after {}ms: {}", elapsed_ms, e);
                SqlExecutionResult {
                    success: false,
                    rows: Vec::new(),
                    execution_time_ms: elapsed_ms,
                    row_count: 0,
                    error: Some(e.to_string()),
                    metadata: ExecutionMetadata {
                        source_id,
                        cache_hit: false,
                        validation_passed,
                        confidence: 0.0,
                    },
                }
            }
        }
    }
}
