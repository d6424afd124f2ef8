//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and request either plain text or a JSON object.
//! Calls are instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key or message bodies.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::LlmConfig;
use crate::domain::MessageRole;
use crate::error::LlmError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: MessageRole,
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self { Self { role: MessageRole::System, content: content.into() } }
  pub fn user(content: impl Into<String>) -> Self { Self { role: MessageRole::User, content: content.into() } }
}

/// Per-call sampling and transport settings.
#[derive(Clone, Copy, Debug)]
pub struct ChatOptions {
  pub temperature: f32,
  pub max_tokens: Option<u32>,
  pub timeout: Duration,
  /// Ask for `response_format: json_object`.
  pub json: bool,
}

impl ChatOptions {
  pub fn tutoring(cfg: &LlmConfig) -> Self {
    Self { temperature: cfg.chat_temperature, max_tokens: Some(cfg.chat_max_tokens), timeout: cfg.chat_timeout(), json: false }
  }

  pub fn analysis(cfg: &LlmConfig) -> Self {
    Self {
      temperature: cfg.analysis_temperature,
      max_tokens: Some(cfg.analysis_max_tokens),
      timeout: cfg.analysis_timeout(),
      json: true,
    }
  }
}

/// Anything that can turn a message list into one assistant reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
  fn model_name(&self) -> &str;

  /// Returns the trimmed content of the first choice (empty if the model sent none).
  async fn complete(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String, LlmError>;
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if the config carries an API key; otherwise return None.
  pub fn from_config(cfg: &LlmConfig) -> Option<Self> {
    let api_key = cfg.api_key.clone()?;
    let client = reqwest::Client::builder()
      .timeout(cfg.analysis_timeout().max(cfg.chat_timeout()))
      .build()
      .map_err(|e| error!(target: "llm", error = %e, "Failed to build HTTP client"))
      .ok()?;

    Some(Self { client, api_key, base_url: cfg.base_url.clone(), model: cfg.model.clone() })
  }
}

#[async_trait]
impl ChatModel for OpenAI {
  fn model_name(&self) -> &str { &self.model }

  #[instrument(level = "info", target = "llm", skip(self, messages, opts), fields(model = %self.model, messages = messages.len(), json = opts.json))]
  async fn complete(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: &self.model,
      messages,
      temperature: opts.temperature,
      response_format: opts.json.then(|| ResponseFormat { r#type: "json_object" }),
      max_tokens: opts.max_tokens,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .timeout(opts.timeout)
      .header(USER_AGENT, "socratic-tutor/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await
      .map_err(|e| LlmError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let detail = extract_openai_error(&body).unwrap_or_else(|| format!("HTTP {status}: {body}"));
      let err = LlmError::from_status(status.as_u16(), &self.model, detail);
      error!(target: "llm", %status, elapsed = ?start.elapsed(), error = %err, "Chat completion failed");
      return Err(err);
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "llm", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, elapsed = ?start.elapsed(), "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default().trim().to_string();

    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: &'a [ChatMessage],
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: &'static str }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_body_shape() {
    let messages = vec![ChatMessage::system("rules"), ChatMessage::user("hi")];
    let req = ChatCompletionRequest {
      model: "gpt-4o-mini",
      messages: &messages,
      temperature: 0.5,
      response_format: None,
      max_tokens: Some(200),
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["model"], "gpt-4o-mini");
    assert_eq!(v["messages"][0]["role"], "system");
    assert_eq!(v["messages"][1]["content"], "hi");
    assert_eq!(v["max_tokens"], 200);
    assert!(v.get("response_format").is_none());

    let json_req = ChatCompletionRequest { response_format: Some(ResponseFormat { r#type: "json_object" }), ..req };
    assert_eq!(serde_json::to_value(&json_req).unwrap()["response_format"]["type"], "json_object");
  }

  #[test]
  fn extracts_error_message() {
    assert_eq!(
      extract_openai_error(r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#).as_deref(),
      Some("Incorrect API key provided")
    );
    assert_eq!(extract_openai_error("<html>bad gateway</html>"), None);
  }

  #[test]
  fn no_key_no_client() {
    assert!(OpenAI::from_config(&LlmConfig::default()).is_none());
    let cfg = LlmConfig { api_key: Some("sk-abc".into()), ..LlmConfig::default() };
    let client = OpenAI::from_config(&cfg).unwrap();
    assert_eq!(client.model_name(), "gpt-4o-mini");
  }
}
