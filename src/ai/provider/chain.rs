//! Fallback Provider Chain
//!
//! Cascading provider attempts with retry and fallback routing.
//!
//! ## Strategy
//!
//! 1. Try providers in priority order
//! 2. Retryable failures (rate limit, network, transient) are retried on the
//!    same provider with exponential backoff (`backon`)
//! 3. Fallback-eligible failures (auth, token limit, unavailable) move on to
//!    the next provider
//! 4. Bad requests stop the chain: no other provider will do better
//! 5. A global attempt budget caps the total across providers

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::constants::chain as chain_constants;

use super::{Generation, GenerationParams, ProviderConfig, SharedGenerator, TextGenerator};
use crate::types::{ErrorCategory, ErrorClassifier, LlmError, QuorumError, Result};

/// Provider with metadata for chain routing
#[derive(Clone)]
pub struct ChainedProvider {
    pub provider: SharedGenerator,
    /// Priority (lower = try first)
    pub priority: u8,
    /// Attempts allowed on this provider before falling back
    pub max_retries: usize,
}

impl ChainedProvider {
    pub fn new(provider: SharedGenerator) -> Self {
        Self {
            provider,
            priority: 100,
            max_retries: chain_constants::DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Configuration for the provider chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Maximum total attempts across all providers
    pub max_total_attempts: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_factor: f32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_total_attempts: chain_constants::MAX_TOTAL_ATTEMPTS,
            base_delay: Duration::from_millis(chain_constants::BASE_DELAY_MS),
            max_delay: Duration::from_secs(chain_constants::MAX_DELAY_SECS),
            backoff_factor: chain_constants::BACKOFF_FACTOR,
        }
    }
}

/// Execution statistics for the chain
#[derive(Debug, Default)]
pub struct ChainStats {
    pub total_attempts: usize,
    pub successful_provider: Option<String>,
    /// Final classified failure of every provider that gave up
    pub failures: Vec<LlmError>,
    pub total_duration_ms: u64,
}

/// Fallback provider chain with per-provider retries
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<ChainedProvider>,
    config: ChainConfig,
}

impl ProviderChain {
    /// Create a new provider chain
    pub fn new(config: ChainConfig) -> Self {
        Self {
            providers: Vec::new(),
            config,
        }
    }

    /// Build chain from provider configs, in the order given
    pub fn from_configs(configs: &[ProviderConfig], chain_config: ChainConfig) -> Result<Self> {
        let mut chain = Self::new(chain_config);

        for (idx, config) in configs.iter().enumerate() {
            let provider = super::create_provider(config)?;
            chain
                .providers
                .push(ChainedProvider::new(provider).with_priority(idx as u8));
        }

        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn backoff_for(&self, attempts: usize) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.base_delay)
            .with_max_delay(self.config.max_delay)
            .with_factor(self.config.backoff_factor)
            .with_max_times(attempts.saturating_sub(1))
    }

    /// Execute with retries and fallback across providers
    #[instrument(skip(self, prompt, params), fields(providers = self.providers.len()))]
    pub async fn execute(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<(Generation, ChainStats)> {
        let mut stats = ChainStats::default();
        let start_time = Instant::now();

        if self.providers.is_empty() {
            return Err(QuorumError::Config(
                "No providers configured in chain".to_string(),
            ));
        }

        let mut last_error: Option<QuorumError> = None;

        for (idx, entry) in self.providers.iter().enumerate() {
            let budget_left = self
                .config
                .max_total_attempts
                .saturating_sub(stats.total_attempts);
            if budget_left == 0 {
                debug!("Chain: attempt budget exhausted");
                break;
            }

            if idx > 0 {
                tokio::time::sleep(random_jitter(self.config.base_delay)).await;
            }

            let provider_name = entry.provider.name().to_string();
            let allowed = entry.max_retries.min(budget_left);
            let attempts = AtomicUsize::new(0);

            let result = {
                let attempts = &attempts;
                let provider = &entry.provider;
                let name = provider_name.as_str();

                (move || async move {
                    let n = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(provider = %name, attempt = n, "Chain attempt");
                    provider.generate(prompt, params).await
                })
                .retry(self.backoff_for(allowed))
                .sleep(tokio::time::sleep)
                .when(move |err: &QuorumError| {
                    ErrorClassifier::classify_error(err, name).is_retryable()
                })
                .notify(move |err: &QuorumError, delay: Duration| {
                    warn!(
                        provider = %name,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Provider failed, retrying after backoff"
                    );
                })
                .await
            };

            stats.total_attempts += attempts.load(Ordering::Relaxed);

            match result {
                Ok(generation) => {
                    stats.successful_provider = Some(provider_name);
                    stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

                    info!(
                        provider = %stats.successful_provider.as_deref().unwrap_or("unknown"),
                        attempts = stats.total_attempts,
                        "Chain succeeded"
                    );

                    return Ok((generation, stats));
                }
                Err(err) => {
                    let classified = ErrorClassifier::classify_error(&err, &provider_name);
                    warn!(
                        provider = %provider_name,
                        category = %classified.category,
                        error = %err,
                        "Provider gave up"
                    );
                    stats.failures.push(classified.clone());

                    if classified.category == ErrorCategory::BadRequest {
                        warn!("Chain: bad request, stopping");
                        return Err(err);
                    }

                    if classified.should_fallback() {
                        info!(provider = %provider_name, "Chain: falling back to next provider");
                    }
                    last_error = Some(err);
                }
            }
        }

        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;

        Err(last_error.unwrap_or_else(|| QuorumError::generation("All providers in chain failed")))
    }
}

#[async_trait]
impl TextGenerator for ProviderChain {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation> {
        let (generation, _stats) = self.execute(prompt, params).await?;
        Ok(generation)
    }

    fn name(&self) -> &str {
        "provider-chain"
    }

    fn model(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.provider.model())
            .unwrap_or("unknown")
    }

    async fn health_check(&self) -> Result<bool> {
        for entry in &self.providers {
            if entry.provider.health_check().await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Random pause before switching providers so parallel workers don't stampede
fn random_jitter(base_delay: Duration) -> Duration {
    let max_jitter_ms = (base_delay.as_millis() as u64) / 4;
    if max_jitter_ms == 0 {
        return Duration::ZERO;
    }
    let jitter_ms = rand::rng().random_range(0..max_jitter_ms);
    Duration::from_millis(jitter_ms)
}

/// Builder for creating provider chains
pub struct ProviderChainBuilder {
    providers: Vec<ChainedProvider>,
    config: ChainConfig,
}

impl ProviderChainBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            config: ChainConfig::default(),
        }
    }

    /// Add a provider with automatic settings
    pub fn add_provider(self, provider: impl TextGenerator + 'static) -> Self {
        self.add_shared(Arc::new(provider))
    }

    /// Add a shared provider with automatic settings
    pub fn add_shared(mut self, provider: SharedGenerator) -> Self {
        let chained = ChainedProvider::new(provider).with_priority(self.providers.len() as u8);
        self.providers.push(chained);
        self
    }

    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the chain, ordered by priority
    pub fn build(mut self) -> ProviderChain {
        self.providers.sort_by_key(|p| p.priority);
        ProviderChain {
            providers: self.providers,
            config: self.config,
        }
    }
}

impl Default for ProviderChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
