//! Application state shared by every handler.
//!
//! This module owns:
//!   - the resolved configuration
//!   - the store (profiles, conversations, messages, class settings, analytics)
//!   - the optional chat model (absent when no API key is configured)

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::openai::{ChatModel, OpenAI};
use crate::store::{MemoryStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub llm: Option<Arc<dyn ChatModel>>,
}

impl AppState {
    /// Build state from config: in-memory store plus OpenAI when a key is present.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: AppConfig) -> Self {
        let llm: Option<Arc<dyn ChatModel>> = match OpenAI::from_config(&config.llm) {
            Some(oa) => {
                info!(target: "socratic_tutor", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Some(Arc::new(oa))
            }
            None => {
                warn!(target: "socratic_tutor", "OpenAI disabled (no OPENAI_API_KEY). Chat turns will fail until a key is configured.");
                None
            }
        };
        Self::with_parts(config, Arc::new(MemoryStore::new()), llm)
    }

    pub fn with_parts(config: AppConfig, store: Arc<dyn Store>, llm: Option<Arc<dyn ChatModel>>) -> Self {
        Self { config, store, llm }
    }
}
