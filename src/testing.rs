//! Shared fixtures for unit and router tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::config::AppConfig;
use crate::domain::{AiRestrictions, ClassSettings, Conversation, ConversationStatus, Profile, Role};
use crate::error::LlmError;
use crate::openai::{ChatMessage, ChatModel, ChatOptions};
use crate::state::AppState;
use crate::store::{MemoryStore, Store};

pub const DEFAULT_REPLY: &str = "Which step comes next?";

/// Replays queued results and records every message list it was sent.
#[derive(Default)]
pub struct ScriptedModel {
  replies: Mutex<VecDeque<Result<String, LlmError>>>,
  calls: Mutex<Vec<Vec<ChatMessage>>>,
  options: Mutex<Vec<ChatOptions>>,
}

impl ScriptedModel {
  pub fn new() -> Self { Self::default() }

  pub fn push(&self, reply: Result<String, LlmError>) {
    self.replies.lock().unwrap().push_back(reply);
  }

  pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
    self.calls.lock().unwrap().clone()
  }

  pub fn options(&self) -> Vec<ChatOptions> {
    self.options.lock().unwrap().clone()
  }
}

#[async_trait]
impl ChatModel for ScriptedModel {
  fn model_name(&self) -> &str { "scripted" }

  async fn complete(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String, LlmError> {
    self.calls.lock().unwrap().push(messages.to_vec());
    self.options.lock().unwrap().push(opts);
    self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))
  }
}

pub fn test_state(model: Option<Arc<ScriptedModel>>) -> (AppState, Arc<MemoryStore>) {
  let store = Arc::new(MemoryStore::new());
  let llm = model.map(|m| m as Arc<dyn ChatModel>);
  (AppState::with_parts(AppConfig::default(), store.clone(), llm), store)
}

pub fn student(id: &str, class_code: &str) -> Profile {
  Profile {
    id: id.into(),
    username: format!("student_{id}"),
    full_name: Some(format!("Student {id}")),
    school_id: Some("001".into()),
    grade_level: Some("8".into()),
    role: Role::Student,
    class_code: Some(class_code.into()),
    created_at: Utc::now(),
  }
}

pub fn admin(id: &str, class_code: Option<&str>) -> Profile {
  Profile {
    id: id.into(),
    username: format!("teacher_{id}"),
    full_name: Some(format!("Teacher {id}")),
    school_id: Some("001".into()),
    grade_level: None,
    role: Role::Admin,
    class_code: class_code.map(str::to_string),
    created_at: Utc::now(),
  }
}

pub fn conversation(id: &str, user_id: &str, subject: Option<&str>, problem: Option<&str>) -> Conversation {
  Conversation {
    id: id.into(),
    user_id: user_id.into(),
    title: None,
    subject: subject.map(str::to_string),
    problem_statement: problem.map(str::to_string),
    status: ConversationStatus::Active,
    started_at: Utc::now(),
    ended_at: None,
  }
}

pub async fn seed_settings(store: &dyn Store, class_code: &str, settings: AiRestrictions) {
  store
    .upsert_class_settings(ClassSettings {
      class_code: class_code.into(),
      admin_id: "seed".into(),
      settings,
      updated_at: Utc::now(),
    })
    .await
    .unwrap();
}
