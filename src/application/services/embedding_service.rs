use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::application::ports::{Embedder, EmbeddingError, EmbeddingProvider, ProviderError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): exponential, capped,
    /// plus up to 25% random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base_ms = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_backoff.as_millis() as f64) as u64;

        let jitter_ms = if self.jitter && capped_ms > 0 {
            rand::thread_rng().gen_range(0..=capped_ms / 4)
        } else {
            0
        };

        Duration::from_millis(capped_ms + jitter_ms)
    }
}

/// Resilient embedding front-end over a single vendor provider.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
    retry_policy: RetryPolicy,
    batch_size: usize,
    strict_dimensions: bool,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
            retry_policy: RetryPolicy::default(),
            batch_size: 10,
            strict_dimensions: false,
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_strict_dimensions(mut self, strict: bool) -> Self {
        self.strict_dimensions = strict;
        self
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut attempt = 0;

        loop {
            match self.provider.embed(text).await {
                Ok(vector) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "Embedding succeeded after retry");
                    }
                    return Ok(vector);
                }
                Err(e) if e.is_retryable() && attempt < self.retry_policy.max_retries => {
                    attempt += 1;
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = self.retry_policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Embedding request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), EmbeddingError> {
        if vector.len() == self.dimension {
            return Ok(());
        }

        warn!(
            expected = self.dimension,
            actual = vector.len(),
            model = self.provider.model_name(),
            "Embedding dimension differs from configuration"
        );

        if self.strict_dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = self.embed_with_retry(text).await?;
        self.check_dimension(&vector)?;
        Ok(vector)
    }

    /// Groups of `batch_size` run concurrently; groups run one after another.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() || texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut vectors = Vec::with_capacity(texts.len());

        for (group_index, group) in texts.chunks(self.batch_size).enumerate() {
            debug!(group = group_index, size = group.len(), "Embedding batch group");

            let results = join_all(group.iter().map(|text| self.embed(text))).await;
            for result in results {
                vectors.push(result?);
            }
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
