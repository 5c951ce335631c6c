//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (`$XDG_CONFIG_HOME/quorumql/`) and project (`.quorumql/`)
//! level configuration. Every confidence policy is a calibration default taken
//! from [`crate::constants`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::provider::{ChainConfig, GenerationParams, ProviderConfig};
use crate::constants::{
    cache as cache_constants, chain as chain_constants, collaboration as collab_constants,
    generation as gen_constants, reflection as reflection_constants, sql as sql_constants,
};
use crate::sql::ValidationTier;
use crate::types::{QuorumError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Text generation settings
    pub llm: LlmConfig,

    /// SQL tool chain settings
    pub sql: SqlConfig,

    /// Reflection pipeline settings
    pub reflection: ReflectionConfig,

    /// Collaborative framework settings
    pub collaboration: CollaborationConfig,

    /// Cache backend settings
    pub cache: CacheConfig,

    /// Analytical dataset settings
    pub dataset: DatasetConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            sql: SqlConfig::default(),
            reflection: ReflectionConfig::default(),
            collaboration: CollaborationConfig::default(),
            cache: CacheConfig::default(),
            dataset: DatasetConfig::default(),
        }
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(QuorumError::Config(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )));
    }
    Ok(())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `QuorumError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(QuorumError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }
        check_unit("llm.top_p", self.llm.top_p)?;

        if self.llm.providers.is_empty() {
            return Err(QuorumError::Config(
                "At least one LLM provider must be configured".to_string(),
            ));
        }
        if self.llm.providers.iter().any(|p| p.timeout_secs == 0) {
            return Err(QuorumError::Config(
                "Provider timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.sql.execution_timeout_ms == 0 {
            return Err(QuorumError::Config(
                "sql.execution_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.sql.row_limit == 0 {
            return Err(QuorumError::Config(
                "sql.row_limit must be greater than 0".to_string(),
            ));
        }
        check_unit("sql.confidence.base", self.sql.confidence.base)?;

        let r = &self.reflection;
        if r.max_iterations == 0 {
            return Err(QuorumError::Config(
                "reflection.max_iterations must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("reflection.critique_threshold", r.critique_threshold),
            ("reflection.planning_confidence", r.planning_confidence),
            ("reflection.limited_data_floor", r.limited_data_floor),
            ("reflection.validation_floor", r.validation_floor),
            ("reflection.validation_neutral", r.validation_neutral),
            ("reflection.refinement_cap", r.refinement_cap),
            ("reflection.degraded_confidence", r.degraded_confidence),
        ] {
            check_unit(name, value)?;
        }

        let c = &self.collaboration;
        if c.max_concurrency == 0 {
            return Err(QuorumError::Config(
                "collaboration.max_concurrency must be greater than 0".to_string(),
            ));
        }
        for (name, value) in [
            ("collaboration.consensus_threshold", c.consensus_threshold),
            ("collaboration.fallback_consensus", c.fallback_consensus),
            ("collaboration.neutral_consensus", c.neutral_consensus),
            ("collaboration.fallback_agreement", c.fallback_agreement),
        ] {
            check_unit(name, value)?;
        }
        if c.self_critique_min > c.self_critique_max {
            return Err(QuorumError::Config(format!(
                "collaboration.self_critique_min ({}) exceeds self_critique_max ({})",
                c.self_critique_min, c.self_critique_max
            )));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Providers in fallback order
    pub providers: Vec<ProviderConfig>,

    /// Sampling temperature (0.0 = deterministic)
    pub temperature: f32,

    pub top_p: f32,

    pub max_tokens: usize,

    /// Advisory reasoning budget forwarded to providers
    pub thinking_budget: Option<u32>,

    /// Retries per provider before falling back to the next one
    pub max_retries: usize,

    /// Memoize generated text in the cache
    pub cache_text: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig::default()],
            temperature: gen_constants::DEFAULT_TEMPERATURE,
            top_p: gen_constants::DEFAULT_TOP_P,
            max_tokens: gen_constants::DEFAULT_MAX_TOKENS,
            thinking_budget: Some(gen_constants::DEFAULT_THINKING_BUDGET),
            max_retries: chain_constants::DEFAULT_MAX_RETRIES,
            cache_text: true,
        }
    }
}

impl LlmConfig {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            thinking_budget: self.thinking_budget,
        }
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            max_total_attempts: (self.max_retries * self.providers.len().max(1))
                .clamp(1, chain_constants::MAX_TOTAL_ATTEMPTS),
            ..ChainConfig::default()
        }
    }
}

// =============================================================================
// SQL Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Hard execution timeout
    pub execution_timeout_ms: u64,

    /// Only runs faster than this are cached
    pub cacheable_runtime_ms: u64,

    pub result_cache_ttl_secs: u64,

    pub validation_cache_ttl_secs: u64,

    /// LIMIT appended when a statement has none
    pub row_limit: usize,

    /// Rows shown to the generator when deriving insights
    pub insight_sample_rows: usize,

    /// Validation tier used when a call does not name one
    pub default_tier: ValidationTier,

    /// Attempt one AI-assisted correction of invalid SQL
    pub error_correction: bool,

    pub confidence: SqlConfidenceConfig,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            execution_timeout_ms: sql_constants::EXECUTION_TIMEOUT_MS,
            cacheable_runtime_ms: sql_constants::CACHEABLE_RUNTIME_MS,
            result_cache_ttl_secs: sql_constants::RESULT_CACHE_TTL_SECS,
            validation_cache_ttl_secs: sql_constants::VALIDATION_CACHE_TTL_SECS,
            row_limit: sql_constants::DEFAULT_ROW_LIMIT,
            insight_sample_rows: sql_constants::INSIGHT_SAMPLE_ROWS,
            default_tier: ValidationTier::Strict,
            error_correction: true,
            confidence: SqlConfidenceConfig::default(),
        }
    }
}

impl SqlConfig {
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_millis(self.execution_timeout_ms)
    }

    pub fn result_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.result_cache_ttl_secs)
    }

    pub fn validation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.validation_cache_ttl_secs)
    }
}

/// Execution confidence scoring: `base` plus one bonus per satisfied signal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfidenceConfig {
    pub base: f32,
    pub validation_bonus: f32,
    pub fast_bonus: f32,
    pub fast_threshold_ms: u64,
    pub non_empty_bonus: f32,
    pub no_warnings_bonus: f32,
}

impl Default for SqlConfidenceConfig {
    fn default() -> Self {
        use sql_constants::confidence as c;
        Self {
            base: c::BASE,
            validation_bonus: c::VALIDATION_BONUS,
            fast_bonus: c::FAST_BONUS,
            fast_threshold_ms: c::FAST_THRESHOLD_MS,
            non_empty_bonus: c::NON_EMPTY_BONUS,
            no_warnings_bonus: c::NO_WARNINGS_BONUS,
        }
    }
}

// =============================================================================
// Reflection Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    /// Critique/refine rounds, unless the query overrides it
    pub max_iterations: usize,
    pub critique_threshold: f32,
    pub planning_confidence: f32,
    pub analysis_default_confidence: f32,
    pub limited_data_floor: f32,
    pub validation_floor: f32,
    pub validation_neutral: f32,
    pub high_severity_penalty: f32,
    pub critique_default_confidence: f32,
    pub refinement_bonus: f32,
    pub refinement_cap: f32,
    pub degraded_confidence: f32,
    pub context_snippets: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        use reflection_constants as r;
        Self {
            max_iterations: r::MAX_ITERATIONS,
            critique_threshold: r::CRITIQUE_THRESHOLD,
            planning_confidence: r::PLANNING_CONFIDENCE,
            analysis_default_confidence: r::ANALYSIS_DEFAULT_CONFIDENCE,
            limited_data_floor: r::LIMITED_DATA_FLOOR,
            validation_floor: r::VALIDATION_FLOOR,
            validation_neutral: r::VALIDATION_NEUTRAL,
            high_severity_penalty: r::HIGH_SEVERITY_PENALTY,
            critique_default_confidence: r::CRITIQUE_DEFAULT_CONFIDENCE,
            refinement_bonus: r::REFINEMENT_BONUS,
            refinement_cap: r::REFINEMENT_CAP,
            degraded_confidence: r::DEGRADED_CONFIDENCE,
            context_snippets: r::CONTEXT_SNIPPETS,
        }
    }
}

// =============================================================================
// Collaboration Configuration
// =============================================================================

/// How primary workers produce their answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// One SQL tool call, then narration
    #[default]
    Direct,
    /// Full reflection pipeline per worker
    Reflective,
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Reflective => write!(f, "reflective"),
        }
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "reflective" | "reflection" => Ok(Self::Reflective),
            _ => Err(format!(
                "Invalid generation mode: '{}'. Use: direct, reflective",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationConfig {
    /// Concurrent worker generations and reviews
    pub max_concurrency: usize,
    /// Used when a query does not set its own
    pub consensus_threshold: f32,
    pub generation_mode: GenerationMode,
    pub fallback_consensus: f32,
    pub neutral_consensus: f32,
    pub worker_default_confidence: f32,
    pub fallback_response_confidence: f32,
    pub fallback_agreement: f32,
    pub self_critique_min: f32,
    pub self_critique_max: f32,
    pub max_confidence_delta: f32,
    pub max_list_items: usize,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        use collab_constants as c;
        Self {
            max_concurrency: c::MAX_CONCURRENCY,
            consensus_threshold: c::DEFAULT_CONSENSUS_THRESHOLD,
            generation_mode: GenerationMode::Direct,
            fallback_consensus: c::FALLBACK_CONSENSUS,
            neutral_consensus: c::NEUTRAL_CONSENSUS,
            worker_default_confidence: c::WORKER_DEFAULT_CONFIDENCE,
            fallback_response_confidence: c::FALLBACK_RESPONSE_CONFIDENCE,
            fallback_agreement: c::FALLBACK_AGREEMENT,
            self_critique_min: c::SELF_CRITIQUE_MIN,
            self_critique_max: c::SELF_CRITIQUE_MAX,
            max_confidence_delta: c::MAX_CONFIDENCE_DELTA,
            max_list_items: c::MAX_LIST_ITEMS,
        }
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// SQLite cache file (defaults to the user cache directory)
    pub path: Option<PathBuf>,

    pub text_ttl_secs: u64,

    pub schema_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            path: None,
            text_ttl_secs: cache_constants::TEXT_TTL_SECS,
            schema_ttl_secs: cache_constants::SCHEMA_TTL_SECS,
        }
    }
}

impl CacheConfig {
    /// Configured path, else `<user cache dir>/quorumql/cache.db`,
    /// else `.quorumql/cache.db`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            super::ConfigLoader::global_cache_dir()
                .unwrap_or_else(super::ConfigLoader::project_dir)
                .join("cache.db")
        })
    }

    pub fn text_ttl(&self) -> Duration {
        Duration::from_secs(self.text_ttl_secs)
    }

    pub fn schema_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_ttl_secs)
    }
}

// =============================================================================
// Dataset Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// SQLite file holding the analytical data (opened read-only)
    pub path: Option<PathBuf>,

    /// Dataset (table) used when a command does not name one
    pub default_id: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.providers[0].provider, "ollama");
        assert_eq!(config.reflection.max_iterations, 3);
        assert_eq!(config.sql.execution_timeout_ms, 30_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generation_mode() {
        assert_eq!(GenerationMode::Direct.to_string(), "direct");
        assert_eq!(
            "Reflective".parse::<GenerationMode>().unwrap(),
            GenerationMode::Reflective
        );
        assert!("deep".parse::<GenerationMode>().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.collaboration.consensus_threshold = 1.5;
        assert!(matches!(config.validate(), Err(QuorumError::Config(_))));

        let mut config = Config::default();
        config.reflection.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.providers.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.collaboration.self_critique_min = 0.9;
        config.collaboration.self_critique_max = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chain_config_bounds_attempts() {
        let mut llm = LlmConfig::default();
        llm.max_retries = 100;
        assert_eq!(
            llm.chain_config().max_total_attempts,
            chain_constants::MAX_TOTAL_ATTEMPTS
        );
        llm.max_retries = 0;
        assert_eq!(llm.chain_config().max_total_attempts, 1);
    }

    #[test]
    fn test_cache_path_override() {
        let config = CacheConfig {
            path: Some(PathBuf::from("/tmp/q.db")),
            ..Default::default()
        };
        assert_eq!(config.resolved_path(), PathBuf::from("/tmp/q.db"));
        assert!(CacheConfig::default().resolved_path().ends_with("cache.db"));
    }

    #[test]
    fn test_toml_roundtrip_keeps_sections() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[reflection]"));
        assert!(toml_str.contains("[sql.confidence]"));
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.collaboration.generation_mode, GenerationMode::Direct);
    }
}
