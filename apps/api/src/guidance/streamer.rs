//! Response Streamer: drives one generation call and publishes the growing
//! assistant message.
//!
//! The assistant message is created (empty) before the call starts. Each chunk
//! is appended in arrival order and the full message is republished, so
//! observers only ever see content grow. Cancellation is checked before every
//! chunk is applied: once the token fires, remaining chunks are discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::llm_client::{Completion, CompletionRequest, LlmError, TextGenerator};
use crate::models::message::{Message, MessageStatus};

const CHUNK_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub system: String,
    pub model: String,
    pub max_tokens: u32,
    /// Upper bound on the whole stream, first byte to last.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFailure {
    Generation(String),
    TimedOut(Duration),
}

impl std::fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFailure::Generation(msg) => write!(f, "{msg}"),
            StreamFailure::TimedOut(limit) => {
                write!(f, "generation timed out after {}s", limit.as_secs())
            }
        }
    }
}

/// Every event carries a full snapshot of the assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Empty pending message, published before the call starts.
    Started(Message),
    /// Content after one more chunk.
    Delta(Message),
    Completed(Message),
    /// The partial message is kept as-is, not rolled back.
    Failed {
        message: Message,
        failure: StreamFailure,
    },
    Cancelled(Message),
}

#[cfg(test)]
impl StreamEvent {
    pub fn message(&self) -> &Message {
        match self {
            StreamEvent::Started(m)
            | StreamEvent::Delta(m)
            | StreamEvent::Completed(m)
            | StreamEvent::Cancelled(m)
            | StreamEvent::Failed { message: m, .. } => m,
        }
    }
}

/// Consumer side of one running stream. Cancel it through the token passed to `start`.
pub struct StreamHandle {
    message_id: Uuid,
    events: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// Next event in publication order; `None` after the terminal event.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }
}

#[derive(Clone)]
pub struct ResponseStreamer {
    generator: Arc<dyn TextGenerator>,
    settings: StreamSettings,
}

impl ResponseStreamer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: StreamSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    /// Spawns the stream. Dropping the handle cancels it.
    pub fn start(&self, prompt: String, cancel: CancellationToken) -> StreamHandle {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let message = Message::assistant_pending();
        let message_id = message.id;
        let request = CompletionRequest {
            prompt,
            system: self.settings.system.clone(),
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
        };

        tokio::spawn(drive_stream(
            Arc::clone(&self.generator),
            request,
            self.settings.timeout,
            message,
            cancel,
            events_tx,
        ));

        StreamHandle {
            message_id,
            events: events_rx,
        }
    }
}

async fn drive_stream(
    generator: Arc<dyn TextGenerator>,
    request: CompletionRequest,
    timeout: Duration,
    mut message: Message,
    cancel: CancellationToken,
    events: mpsc::Sender<StreamEvent>,
) {
    if events.send(StreamEvent::Started(message.clone())).await.is_err() {
        return;
    }

    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    let completion = generator.stream_completion(request, chunk_tx);
    tokio::pin!(completion);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut outcome: Option<Result<Completion, LlmError>> = None;
    let mut chunks_closed = false;

    let terminal = loop {
        if chunks_closed {
            if let Some(result) = outcome.take() {
                break match result {
                    Ok(_) => {
                        message.seal(MessageStatus::Complete);
                        StreamEvent::Completed(message)
                    }
                    Err(e) => {
                        warn!("Generation stream {} failed: {e}", message.id);
                        message.seal(MessageStatus::Failed);
                        StreamEvent::Failed {
                            message,
                            failure: StreamFailure::Generation(e.to_string()),
                        }
                    }
                };
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Generation stream {} cancelled", message.id);
                message.seal(MessageStatus::Cancelled);
                break StreamEvent::Cancelled(message);
            }
            _ = &mut deadline => {
                warn!("Generation stream {} timed out after {:?}", message.id, timeout);
                message.seal(MessageStatus::Failed);
                break StreamEvent::Failed {
                    message,
                    failure: StreamFailure::TimedOut(timeout),
                };
            }
            chunk = chunk_rx.recv(), if !chunks_closed => match chunk {
                Some(chunk) => {
                    if cancel.is_cancelled() {
                        continue;
                    }
                    if message.append(&chunk).is_err() {
                        continue;
                    }
                    // A stalled reader must not hold off cancellation or the deadline.
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = &mut deadline => {}
                        sent = events.send(StreamEvent::Delta(message.clone())) => {
                            if sent.is_err() {
                                // Nobody is listening any more.
                                cancel.cancel();
                            }
                        }
                    }
                }
                None => chunks_closed = true,
            },
            result = &mut completion, if outcome.is_none() => {
                outcome = Some(result);
            }
        }
    };

    let _ = events.send(terminal).await;
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use std::sync::Mutex;

    use super::*;

    /// Replays fixed chunks, optionally failing after them or stalling forever.
    pub struct ScriptedGenerator {
        pub chunks: Vec<String>,
        pub fail_with: Option<String>,
        pub stall: bool,
        pub delay: Duration,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedGenerator {
        pub fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                fail_with: None,
                stall: false,
                delay: Duration::ZERO,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(chunks: &[&str], error: &str) -> Self {
            Self {
                fail_with: Some(error.to_string()),
                ..Self::new(chunks)
            }
        }

        pub fn stalling(chunks: &[&str]) -> Self {
            Self {
                stall: true,
                ..Self::new(chunks)
            }
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|r| r.prompt.clone())
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn stream_completion(
            &self,
            request: CompletionRequest,
            chunks: mpsc::Sender<String>,
        ) -> Result<Completion, LlmError> {
            self.requests.lock().unwrap().push(request);
            let mut text = String::new();
            for chunk in &self.chunks {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                text.push_str(chunk);
                chunks
                    .send(chunk.clone())
                    .await
                    .map_err(|_| LlmError::ReceiverClosed)?;
            }
            if self.stall {
                std::future::pending::<()>().await;
            }
            if let Some(error) = &self.fail_with {
                return Err(LlmError::StreamInterrupted(error.clone()));
            }
            Ok(Completion {
                text,
                ..Completion::default()
            })
        }
    }

    pub fn settings(timeout: Duration) -> StreamSettings {
        StreamSettings {
            system: "system".into(),
            model: "test-model".into(),
            max_tokens: 256,
            timeout,
        }
    }
}
