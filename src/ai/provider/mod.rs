//! Text Generation Provider Abstraction
//!
//! Defines the `TextGenerator` trait every subsystem talks to. All providers
//! return a `Generation` carrying the answer text, the optional thinking
//! segment, token usage and timing.
//!
//! ## Modules
//!
//! - `chain`: Fallback provider chain with per-provider retries
//! - `cached`: Content-hash memoization of generated text

mod cached;
mod chain;
mod ollama;
mod openai;
mod prompt_utils;

pub use cached::CachedGenerator;
pub use chain::{ChainConfig, ChainStats, ChainedProvider, ProviderChain, ProviderChainBuilder};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use prompt_utils::{role_instruction, task_header, task_name};

// Re-export error types from centralized location
pub use crate::types::{ErrorCategory, ErrorClassifier, LlmError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::{generation as gen_constants, network as net_constants};
use crate::types::{QuorumError, Result};

// =============================================================================
// Generation Parameters
// =============================================================================

/// Sampling parameters for a single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: usize,
    /// Advisory reasoning budget in tokens. Providers may ignore it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: gen_constants::DEFAULT_TEMPERATURE,
            top_p: gen_constants::DEFAULT_TOP_P,
            max_tokens: gen_constants::DEFAULT_MAX_TOKENS,
            thinking_budget: None,
        }
    }
}

impl GenerationParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_thinking(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    /// Stable string form used in cache keys
    pub fn cache_fingerprint(&self) -> String {
        format!(
            "t={:.3};p={:.3};m={};b={}",
            self.temperature,
            self.top_p,
            self.max_tokens,
            self.thinking_budget.unwrap_or(0)
        )
    }
}

// =============================================================================
// Generation Result
// =============================================================================

/// Complete generation including answer, thinking segment and usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Generation {
    /// Answer text with any thinking segment removed
    pub text: String,
    /// Content found between thinking delimiters, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub timing: ResponseTiming,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl Generation {
    /// Build from raw provider output, splitting off the thinking segment
    pub fn from_raw(raw: &str) -> Self {
        let (text, thinking) = crate::ai::thinking::split_thinking(raw);
        Self {
            text,
            thinking,
            ..Default::default()
        }
    }

    pub fn with_metrics(
        mut self,
        usage: TokenUsage,
        timing: ResponseTiming,
        metadata: ResponseMetadata,
    ) -> Self {
        self.usage = usage;
        self.timing = timing;
        self.metadata = metadata;
        self
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    /// Create from OpenAI-style usage response
    pub fn from_openai(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            input_tokens: prompt_tokens,
            output_tokens: completion_tokens,
        }
    }

    /// Create from Ollama-style usage response
    pub fn from_ollama(prompt_eval_count: u32, eval_count: u32) -> Self {
        Self {
            input_tokens: prompt_eval_count,
            output_tokens: eval_count,
        }
    }
}

/// Response timing metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseTiming {
    /// Total response time in milliseconds (wall clock)
    pub total_ms: u64,
    /// Served from the text cache
    #[serde(default)]
    pub cached: bool,
}

impl ResponseTiming {
    pub fn from_duration(duration: std::time::Duration) -> Self {
        Self {
            total_ms: duration.as_millis() as u64,
            cached: false,
        }
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Model used
    pub model: String,
    /// Provider name
    pub provider: String,
    /// Provider-specific extras (finish reason, eval durations)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ResponseMetadata {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            extra: BTreeMap::new(),
        }
    }
}

/// Shared generator handle for concurrent access across workers and stages.
pub type SharedGenerator = Arc<dyn TextGenerator + Send + Sync>;

// =============================================================================
// Provider Configuration
// =============================================================================

/// Configuration for text generation providers
///
/// API keys are never serialized to output and are redacted in debug output.
/// Each provider converts the key to `SecretString` internally.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider type: "openai", "ollama"
    pub provider: String,
    /// Model name (provider-specific)
    #[serde(default)]
    pub model: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Never serialized to output
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    net_constants::DEFAULT_TIMEOUT_SECS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: None,
            timeout_secs: net_constants::DEFAULT_TIMEOUT_SECS,
            api_key: None,
            api_base: None,
        }
    }
}

// =============================================================================
// Text Generator Trait
// =============================================================================

/// Text generation service. The only way any subsystem reaches a model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt
    ///
    /// Thinking content delimited by `<thinking>...</thinking>` is split off
    /// into `Generation::thinking`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared generator from configuration
pub fn create_provider(config: &ProviderConfig) -> Result<SharedGenerator> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config.clone())?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config.clone())?)),
        _ => Err(QuorumError::Config(format!(
            "Unknown provider: {}. Supported: openai, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_from_raw_splits_thinking() {
        let g = Generation::from_raw("<thinking>check totals</thinking>Revenue rose 4%.");
        assert_eq!(g.text, "Revenue rose 4%.");
        assert_eq!(g.thinking.as_deref(), Some("check totals"));
    }

    #[test]
    fn test_params_fingerprint_differs() {
        let a = GenerationParams::default();
        let b = GenerationParams::default().with_temperature(0.7);
        let c = GenerationParams::default().with_thinking(512);
        assert_ne!(a.cache_fingerprint(), b.cache_fingerprint());
        assert_ne!(a.cache_fingerprint(), c.cache_fingerprint());
        assert_eq!(a.cache_fingerprint(), GenerationParams::default().cache_fingerprint());
    }

    #[test]
    fn test_provider_config_redacts_key() {
        let config = ProviderConfig {
            provider: "openai".into(),
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }

    #[test]
    fn test_create_provider_unknown() {
        let config = ProviderConfig {
            provider: "carrier-pigeon".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&config),
            Err(QuorumError::Config(_))
        ));
    }
}
