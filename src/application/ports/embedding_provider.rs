use async_trait::async_trait;

use super::ProviderError;

/// Vendor endpoint that turns one input text into one vector.
///
/// Implementations make a single HTTP call; retries and batching live in
/// the embedding service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, ProviderError>;

    fn model_name(&self) -> &str;
}
