//! Error taxonomy and its HTTP rendering.
//!
//! - `LlmError`: upstream chat-completion failures, already normalized into
//!   messages a student or teacher can act on.
//! - `StoreError`: persistence failures.
//! - `AppError`: what handlers return; maps onto status codes.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
  #[error("Missing OPENAI_API_KEY in server environment")]
  MissingApiKey,
  #[error("OpenAI authentication failed (401). Check OPENAI_API_KEY.")]
  Authentication,
  #[error("OpenAI rate limit hit (429). Please wait and try again.")]
  RateLimited,
  #[error("OpenAI model not found: {model}. Set AI_MODEL or update your access.")]
  ModelNotFound { model: String },
  #[error("OpenAI error: {0}")]
  Upstream(String),
  #[error("OpenAI error: {0}")]
  Transport(String),
  #[error("OpenAI returned an unusable response: {0}")]
  InvalidResponse(String),
}

impl LlmError {
  /// Classify a non-success HTTP status from the chat-completion endpoint.
  pub fn from_status(status: u16, model: &str, detail: String) -> Self {
    match status {
      401 => LlmError::Authentication,
      429 => LlmError::RateLimited,
      404 => LlmError::ModelNotFound { model: model.to_string() },
      _ => LlmError::Upstream(detail),
    }
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("record not found")]
  NotFound,
  #[error("{0}")]
  Conflict(String),
  #[error("storage backend error: {0}")]
  Backend(String),
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Unauthorized")]
  Unauthorized,
  #[error("Forbidden")]
  Forbidden,
  #[error("Not found")]
  NotFound,
  #[error("{message}")]
  BadRequest { message: String, issues: Vec<String> },
  #[error("{0}")]
  Conflict(String),
  #[error(transparent)]
  Llm(#[from] LlmError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

impl AppError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    AppError::BadRequest { message: message.into(), issues: Vec::new() }
  }

  /// "Invalid body" with one entry per failed field rule.
  pub fn invalid_body(issues: Vec<String>) -> Self {
    AppError::BadRequest { message: "Invalid body".into(), issues }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::Unauthorized => StatusCode::UNAUTHORIZED,
      AppError::Forbidden => StatusCode::FORBIDDEN,
      AppError::NotFound | AppError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
      AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
      AppError::Conflict(_) | AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
      AppError::Llm(LlmError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
      AppError::Llm(_) => StatusCode::BAD_GATEWAY,
      AppError::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "socratic_tutor", %status, error = %self, "Request failed");
    }
    let body = match &self {
      AppError::BadRequest { message, issues } if !issues.is_empty() => json!({ "error": message, "issues": issues }),
      _ => json!({ "error": self.to_string() }),
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn upstream_statuses_are_normalized() {
    assert_eq!(LlmError::from_status(401, "m", "x".into()), LlmError::Authentication);
    assert_eq!(LlmError::from_status(429, "m", "x".into()), LlmError::RateLimited);
    assert_eq!(
      LlmError::from_status(404, "gpt-x", "x".into()).to_string(),
      "OpenAI model not found: gpt-x. Set AI_MODEL or update your access."
    );
    assert_eq!(LlmError::from_status(500, "m", "boom".into()).to_string(), "OpenAI error: boom");
  }

  #[test]
  fn status_mapping() {
    assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Store(StoreError::NotFound).status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Llm(LlmError::Authentication).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(AppError::Llm(LlmError::RateLimited).status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(AppError::Llm(LlmError::MissingApiKey).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(AppError::invalid_body(vec!["a".into()]).status(), StatusCode::BAD_REQUEST);
  }
}
