use std::sync::Arc;

use crate::config::Config;
use crate::extraction::DocumentExtractor;
use crate::guidance::streamer::{ResponseStreamer, StreamSettings};
use crate::guidance::turn::TurnServices;
use crate::llm_client::prompts::COUNSELOR_SYSTEM;
use crate::llm_client::TextGenerator;
use crate::notify::Notifier;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    /// Extractor, notifier and streamer used by every conversation turn.
    pub turn: TurnServices,
}

impl AppState {
    pub fn new(
        config: Config,
        generator: Arc<dyn TextGenerator>,
        extractor: Arc<dyn DocumentExtractor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = StreamSettings {
            system: COUNSELOR_SYSTEM.to_string(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
            timeout: config.generation_timeout,
        };
        let turn = TurnServices {
            extractor,
            notifier,
            streamer: ResponseStreamer::new(generator, settings),
            attachment_timeout: config.attachment_timeout,
            observer_timeout: config.generation_timeout,
        };
        Self {
            config,
            sessions: SessionStore::new(),
            turn,
        }
    }
}
