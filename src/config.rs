//! Application configuration, resolved once at startup.
//!
//! Sources, lowest to highest precedence:
//!   1. built-in defaults
//!   2. TOML file named by TUTOR_CONFIG_PATH (`[llm]`, `[tutor]`, top-level `port`)
//!   3. environment: PORT, OPENAI_API_KEY, OPENAI_BASE_URL, AI_MODEL
//!
//! Handlers and services receive `AppConfig` (or a piece of it) explicitly;
//! nothing else in the crate reads the process environment for settings.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub llm: LlmConfig,
  pub tutor: TutorConfig,
}

/// Chat-completion settings. The API key is never read from TOML.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  #[serde(skip)]
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
  pub chat_temperature: f32,
  pub chat_max_tokens: u32,
  pub chat_timeout_secs: u64,
  pub analysis_temperature: f32,
  pub analysis_max_tokens: u32,
  pub analysis_timeout_secs: u64,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: "https://api.openai.com/v1".into(),
      model: "gpt-4o-mini".into(),
      chat_temperature: 0.5,
      chat_max_tokens: 200,
      chat_timeout_secs: 15,
      analysis_temperature: 0.3,
      analysis_max_tokens: 1000,
      analysis_timeout_secs: 30,
    }
  }
}

impl LlmConfig {
  pub fn chat_timeout(&self) -> Duration { Duration::from_secs(self.chat_timeout_secs) }
  pub fn analysis_timeout(&self) -> Duration { Duration::from_secs(self.analysis_timeout_secs) }
}

/// Knobs for the conversation orchestrator and the request validators.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
  /// Messages forwarded to the model after the system prompt.
  pub history_window: usize,
  /// Trailing messages mined for phrases the model should not repeat.
  pub phrase_window: usize,
  pub max_message_chars: usize,
  /// Used when the model answers with empty content.
  pub fallback_reply: String,
  /// The only school id registration currently accepts.
  pub school_id: String,
}

impl Default for TutorConfig {
  fn default() -> Self {
    Self {
      history_window: 10,
      phrase_window: 6,
      max_message_chars: 1000,
      fallback_reply: "What is your current approach?".into(),
      school_id: "001".into(),
    }
  }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
  #[serde(default)] port: Option<u16>,
  #[serde(default)] llm: Option<LlmConfig>,
  #[serde(default)] tutor: Option<TutorConfig>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self { port: 3000, llm: LlmConfig::default(), tutor: TutorConfig::default() }
  }
}

impl AppConfig {
  /// Build the configuration from the process environment (and TUTOR_CONFIG_PATH if set).
  pub fn load() -> Self {
    let env = |key: &str| std::env::var(key).ok();
    let file = env("TUTOR_CONFIG_PATH").and_then(|path| match std::fs::read_to_string(&path) {
      Ok(s) => {
        info!(target: "socratic_tutor", %path, "Loaded tutor config (TOML)");
        Some(s)
      }
      Err(e) => {
        error!(target: "socratic_tutor", %path, error = %e, "Failed to read TOML config file; using defaults");
        None
      }
    });
    Self::from_sources(file.as_deref(), env)
  }

  /// Resolve defaults + optional TOML text + an environment lookup.
  /// A TOML document that fails to parse is logged and ignored.
  pub fn from_sources(toml_text: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Self {
    let mut cfg = Self::default();

    if let Some(text) = toml_text {
      match toml::from_str::<FileConfig>(text) {
        Ok(file) => {
          if let Some(port) = file.port { cfg.port = port; }
          if let Some(llm) = file.llm { cfg.llm = llm; }
          if let Some(tutor) = file.tutor { cfg.tutor = tutor; }
        }
        Err(e) => error!(target: "socratic_tutor", error = %e, "Failed to parse TOML config"),
      }
    }

    if let Some(port) = env("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
      cfg.port = port;
    }
    cfg.llm.api_key = env("OPENAI_API_KEY")
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty());
    if let Some(url) = env("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
      cfg.llm.base_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(model) = env("AI_MODEL").filter(|m| !m.trim().is_empty()) {
      cfg.llm.model = model.trim().to_string();
    }
    cfg
  }
}
