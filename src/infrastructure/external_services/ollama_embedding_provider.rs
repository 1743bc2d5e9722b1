use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::openai_embedding_provider::error_from_response;
use crate::application::ports::{EmbeddingProvider, ProviderError};
use crate::infrastructure::config::EmbeddingConfig;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Local Ollama instance via `POST {endpoint}/api/embed`. No API key.
pub struct OllamaEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, input: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&EmbedRequest {
                model: &self.model,
                input,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.without_url().to_string()))?;

        parsed
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("Ollama returned no embeddings".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
