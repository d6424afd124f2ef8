//! Conversation orchestration: one student turn in, one tutor reply out.
//!
//! A turn runs strictly in sequence: validate → load conversation → persist
//! the student message → read history → resolve class restrictions →
//! compute hint level and prompt → call the model → persist the reply.
//! A failed model call ends the turn before anything assistant-side is written.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AiRestrictions, AnalyticsEvent, ConversationStatus, Message, MessageRole};
use crate::error::{AppError, LlmError, StoreError};
use crate::guidance::{build_socratic_prompt, compute_hint_level, extract_recent_phrases, HintContext, PromptContext};
use crate::openai::{ChatMessage, ChatOptions};
use crate::sanitizer::{sanitize_for_ai, validate_message_content};
use crate::state::AppState;

pub const AI_RESPONSE_EVENT: &str = "ai_response";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
  pub reply: String,
  pub hint_level: u8,
}

#[instrument(level = "info", target = "tutor", skip(state, message), fields(%user_id, %conversation_id, message_len = message.len()))]
pub async fn chat_turn(state: &AppState, user_id: &str, conversation_id: &str, message: &str) -> Result<TurnOutcome, AppError> {
  let cfg = &state.config.tutor;
  validate_message_content(message, cfg.max_message_chars).map_err(|r| AppError::bad_request(r.reason()))?;

  let conversation = state
    .store
    .conversation(conversation_id)
    .await?
    .filter(|c| c.user_id == user_id && c.status != ConversationStatus::Deleted)
    .ok_or(AppError::NotFound)?;

  let llm = state.llm.clone().ok_or(LlmError::MissingApiKey)?;

  let prior = state.store.message_count(conversation_id).await?;
  state.store.insert_message(new_message(conversation_id, MessageRole::User, message, None)).await?;

  let history = state.store.recent_messages(conversation_id, cfg.history_window).await?;
  let restrictions = restrictions_or_default(class_restrictions(state, &conversation.user_id).await);

  let phrase_window = &history[history.len().saturating_sub(cfg.phrase_window)..];
  let contents: Vec<String> = phrase_window
    .iter()
    .map(|m| if m.role == MessageRole::User { sanitize_for_ai(&m.content) } else { m.content.clone() })
    .collect();
  let avoid_phrases = extract_recent_phrases(&contents);

  let attempts = if history.is_empty() { prior + 1 } else { history.len() };
  let hint_level = compute_hint_level(&HintContext {
    attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
    subject: conversation.subject.as_deref(),
    ..HintContext::default()
  });

  let system = build_socratic_prompt(&PromptContext {
    subject: conversation.subject.as_deref(),
    problem_statement: conversation.problem_statement.as_deref(),
    hint_level,
    restrictions: restrictions.as_ref(),
    avoid_phrases: &avoid_phrases,
  });
  let messages = assemble_messages(system, &history);
  debug!(target: "tutor", attempts, hint_level, history = history.len(), avoid = avoid_phrases.len(), restricted = restrictions.is_some(), "Prompt assembled");

  let text = llm.complete(&messages, ChatOptions::tutoring(&state.config.llm)).await?;
  let reply = if text.is_empty() { cfg.fallback_reply.clone() } else { text };

  state
    .store
    .insert_message(new_message(conversation_id, MessageRole::Assistant, &reply, Some(hint_level)))
    .await?;

  let event = AnalyticsEvent {
    user_id: user_id.to_string(),
    event_type: AI_RESPONSE_EVENT.into(),
    event_data: json!({ "conversation_id": conversation_id, "hint_level": hint_level }),
    created_at: Utc::now(),
  };
  if let Err(e) = state.store.record_event(event).await {
    warn!(target: "tutor", error = %e, "Failed to record analytics event");
  }

  info!(target: "tutor", hint_level, reply_len = reply.len(), "Tutor reply persisted");
  Ok(TurnOutcome { reply, hint_level })
}

/// Restrictions configured for the class of `user_id`, if any.
pub async fn class_restrictions(state: &AppState, user_id: &str) -> Result<Option<AiRestrictions>, StoreError> {
  let Some(profile) = state.store.profile(user_id).await? else {
    return Ok(None);
  };
  match profile.class() {
    Some(code) => state.store.class_settings(code).await,
    None => Ok(None),
  }
}

/// Fail-open: a lookup error means "no restrictions" so the student still gets a reply.
pub fn restrictions_or_default(lookup: Result<Option<AiRestrictions>, StoreError>) -> Option<AiRestrictions> {
  match lookup {
    Ok(r) => r.filter(|r| !r.is_empty()),
    Err(e) => {
      warn!(target: "tutor", error = %e, "Restriction lookup failed; continuing without restrictions");
      None
    }
  }
}

/// System prompt followed by the history, with every student turn scrubbed.
pub fn assemble_messages(system: String, history: &[Message]) -> Vec<ChatMessage> {
  let mut out = Vec::with_capacity(history.len() + 1);
  out.push(ChatMessage::system(system));
  out.extend(history.iter().map(|m| ChatMessage {
    role: m.role,
    content: if m.role == MessageRole::User { sanitize_for_ai(&m.content) } else { m.content.clone() },
  }));
  out
}

fn new_message(conversation_id: &str, role: MessageRole, content: &str, hint_level: Option<u8>) -> Message {
  Message {
    id: Uuid::new_v4().to_string(),
    conversation_id: conversation_id.to_string(),
    role,
    content: content.to_string(),
    hint_level,
    created_at: Utc::now(),
  }
}
