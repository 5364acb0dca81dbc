/// LLM Client: the single point of entry for all Claude API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Callers depend on the `TextGenerator` trait so the pipeline can be driven
/// by scripted generators in tests.
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod prompts;
pub mod stream;

use stream::{SseDecoder, StreamUpdate};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Default model; overridable via `LLM_MODEL`.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Chunk receiver closed before the stream finished")]
    ReceiverClosed,
}

/// One streamed completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Summary returned once the stream has ended. `text` is the concatenation of
/// every chunk that was forwarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// The external text-generation service.
///
/// Implementations push each chunk into `chunks` in arrival order and resolve
/// once the stream is over. They may fail before or during streaming.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        chunks: mpsc::Sender<String>,
    ) -> Result<Completion, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all services.
/// Wraps the Anthropic Messages API in streaming mode with retry logic.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        // No overall request timeout: a long stream is legitimate. The turn
        // pipeline bounds the total wait instead.
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client, api_key })
    }

    /// Opens the stream. Retries on connection errors, 429 and 5xx with
    /// exponential backoff. Nothing has been forwarded yet at this point, so
    /// a retry can never duplicate published text.
    async fn open_stream(&self, request: &CompletionRequest) -> Result<reqwest::Response, LlmError> {
        let request_body = AnthropicRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM stream attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        chunks: mpsc::Sender<String>,
    ) -> Result<Completion, LlmError> {
        let response = self.open_stream(&request).await?;

        let mut decoder = SseDecoder::new();
        let mut completion = Completion::default();
        let mut body = response.bytes_stream();

        while let Some(next) = body.next().await {
            let bytes = next.map_err(|e| LlmError::StreamInterrupted(e.to_string()))?;
            for update in decoder.push(&bytes) {
                if apply_update(update, &mut completion, &chunks).await? {
                    return Ok(finished(completion));
                }
            }
        }
        for update in decoder.finish() {
            if apply_update(update, &mut completion, &chunks).await? {
                return Ok(finished(completion));
            }
        }

        // Body ended without `message_stop`.
        Err(LlmError::StreamInterrupted(
            "connection closed before message_stop".to_string(),
        ))
    }
}

/// Applies one decoded update. Returns `true` once the stream is complete.
async fn apply_update(
    update: StreamUpdate,
    completion: &mut Completion,
    chunks: &mpsc::Sender<String>,
) -> Result<bool, LlmError> {
    match update {
        StreamUpdate::Text(text) => {
            completion.text.push_str(&text);
            chunks
                .send(text)
                .await
                .map_err(|_| LlmError::ReceiverClosed)?;
        }
        StreamUpdate::InputTokens(n) => completion.usage.input_tokens = n,
        StreamUpdate::OutputTokens(n) => completion.usage.output_tokens = n,
        StreamUpdate::StopReason(reason) => completion.stop_reason = Some(reason),
        StreamUpdate::Error(message) => return Err(LlmError::StreamInterrupted(message)),
        StreamUpdate::Done => return Ok(true),
    }
    Ok(false)
}

fn finished(completion: Completion) -> Completion {
    debug!(
        "LLM stream finished: input_tokens={}, output_tokens={}, stop_reason={:?}",
        completion.usage.input_tokens, completion.usage.output_tokens, completion.stop_reason
    );
    completion
}
