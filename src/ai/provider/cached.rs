//! Text cache around any generator.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{Generation, GenerationParams, SharedGenerator, TextGenerator};
use crate::cache::{ContentCache, SharedCache};
use crate::types::Result;

const NAMESPACE: &str = "text";

/// Memoizes generations by `(prompt, sampling params, model)`
///
/// Failed generations are never cached. Hits are marked with
/// `timing.cached = true`.
pub struct CachedGenerator {
    inner: SharedGenerator,
    cache: ContentCache<Generation>,
}

impl CachedGenerator {
    pub fn new(inner: SharedGenerator, cache: SharedCache, ttl: Duration) -> Self {
        Self {
            inner,
            cache: ContentCache::new(cache, NAMESPACE, ttl),
        }
    }
}

#[async_trait]
impl TextGenerator for CachedGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation> {
        let fingerprint = params.cache_fingerprint();
        let parts = [prompt, fingerprint.as_str(), self.inner.model()];

        if let Some(mut hit) = self.cache.get(&parts).await {
            debug!("CachedGenerator: hit for {}", self.inner.name());
            hit.timing.cached = true;
            return Ok(hit);
        }

        let generation = self.inner.generate(prompt, params).await?;
        self.cache.put(&parts, &generation).await;
        Ok(generation)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::types::QuorumError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<Generation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(QuorumError::generation("down"));
            }
            Ok(Generation::from_raw(&format!(
                "<thinking>scratch</thinking>echo {}",
                prompt
            )))
        }
        fn name(&self) -> &str {
            "counting"
        }
        fn model(&self) -> &str {
            "m1"
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn generator(fail: bool) -> (Arc<CountingGenerator>, CachedGenerator) {
        let inner = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            fail,
        });
        let cached = CachedGenerator::new(
            inner.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );
        (inner, cached)
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let (inner, cached) = generator(false);
        let params = GenerationParams::default();

        let first = cached.generate("hello", &params).await.unwrap();
        let second = cached.generate("hello", &params).await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert!(!first.timing.cached);
        assert!(second.timing.cached);
        assert_eq!(second.text, "echo hello");
        assert_eq!(second.thinking.as_deref(), Some("scratch"));
    }

    #[tokio::test]
    async fn test_params_are_part_of_key() {
        let (inner, cached) = generator(false);
        cached.generate("hello", &GenerationParams::default()).await.unwrap();
        cached
            .generate("hello", &GenerationParams::default().with_temperature(0.9))
            .await
            .unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let (inner, cached) = generator(true);
        let params = GenerationParams::default();
        assert!(cached.generate("x", &params).await.is_err());
        assert!(cached.generate("x", &params).await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
