use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::openai_embedding_provider::error_from_response;
use crate::application::ports::{
    ChatCompletion, ChatMessage, ChatModel, ProviderError, TokenStream,
};
use crate::infrastructure::config::ChatModelConfig;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

/// One `data:` field of a server-sent event stream.
#[derive(Debug, Clone, PartialEq)]
enum SseData {
    Payload(String),
    Done,
}

/// Splits raw response bytes into SSE `data:` lines. Partial lines are
/// held until the rest arrives, so chunk boundaries may fall anywhere.
#[derive(Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                events.push(SseData::Done);
            } else if !data.is_empty() {
                events.push(SseData::Payload(data.to_string()));
            }
        }
        events
    }
}

fn delta_content(payload: &str) -> Result<Option<String>, ProviderError> {
    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| ProviderError::ParseError(format!("Invalid stream chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

/// Token deltas from a chat-completions SSE body, ending at `[DONE]` or
/// when the body closes.
fn token_stream<S, B, E>(body: S) -> impl Stream<Item = Result<String, ProviderError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ProviderError>,
{
    async_stream::try_stream! {
        let mut lines = SseLineBuffer::default();
        futures::pin_mut!(body);

        'body: while let Some(chunk) = body.next().await {
            let chunk: B = chunk.map_err(Into::<ProviderError>::into)?;
            for data in lines.push(chunk.as_ref()) {
                match data {
                    SseData::Done => break 'body,
                    SseData::Payload(payload) => {
                        if let Some(content) = delta_content(&payload)? {
                            yield content;
                        }
                    }
                }
            }
        }
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI-compatible `POST {endpoint}/chat/completions`.
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiChatModel {
    pub fn new(config: &ChatModelConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::ConfigurationError("CHAT_API_KEY not set".to_string())
        })?;

        // A read timeout bounds each gap between body chunks rather than the
        // whole response, so long token streams survive; the orchestrator's
        // deadline bounds the request end to end.
        let read_timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(read_timeout))
            .read_timeout(read_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                stream,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, ProviderError> {
        let response = self.send(messages, false).await?;

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.without_url().to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ParseError("No choices returned".to_string()))?;

        debug!(finish_reason = ?choice.finish_reason, "Chat completion received");

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn stream_generate(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, ProviderError> {
        let response = self.send(messages, true).await?;
        Ok(Box::pin(token_stream(response.bytes_stream())))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
