//! Persistence seam.
//!
//! `Store` is what handlers and the tutor talk to. `MemoryStore` keeps
//! everything in process behind `RwLock`s; a database-backed store only has
//! to implement the same trait.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{
  AiRestrictions, AnalyticsEvent, ClassSettings, Conversation, ConversationStatus, Message, MessageRole, Profile, Role,
};
use crate::error::StoreError;

/// Narrows `messages_in`; unset fields match everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessageFilter {
  pub role: Option<MessageRole>,
  pub since: Option<DateTime<Utc>>,
  pub until: Option<DateTime<Utc>>,
}

impl MessageFilter {
  fn matches(&self, m: &Message) -> bool {
    self.role.map_or(true, |r| m.role == r)
      && self.since.map_or(true, |s| m.created_at >= s)
      && self.until.map_or(true, |u| m.created_at <= u)
  }
}

#[async_trait]
pub trait Store: Send + Sync {
  async fn insert_profile(&self, profile: Profile) -> Result<(), StoreError>;
  async fn profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;
  /// Student profiles whose class code equals `class_code`.
  async fn class_students(&self, class_code: &str) -> Result<Vec<Profile>, StoreError>;

  async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError>;
  async fn conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError>;
  /// Every conversation (any status) owned by one of `user_ids`, newest first.
  async fn conversations_for_users(&self, user_ids: &[String]) -> Result<Vec<Conversation>, StoreError>;
  /// Sets the status; stamps `ended_at` the first time it becomes `Ended`.
  async fn set_conversation_status(&self, id: &str, status: ConversationStatus) -> Result<Conversation, StoreError>;

  async fn insert_message(&self, message: Message) -> Result<(), StoreError>;
  async fn message_count(&self, conversation_id: &str) -> Result<usize, StoreError>;
  /// All messages of one conversation, oldest first.
  async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError>;
  /// The newest `limit` messages of one conversation, oldest first.
  async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, StoreError>;
  /// Messages across several conversations, ordered by creation time.
  async fn messages_in(&self, conversation_ids: &[String], filter: MessageFilter) -> Result<Vec<Message>, StoreError>;

  async fn class_settings(&self, class_code: &str) -> Result<Option<AiRestrictions>, StoreError>;
  /// Last write wins.
  async fn upsert_class_settings(&self, settings: ClassSettings) -> Result<(), StoreError>;

  async fn record_event(&self, event: AnalyticsEvent) -> Result<(), StoreError>;
  async fn events_for_user(&self, user_id: &str) -> Result<Vec<AnalyticsEvent>, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
  profiles: RwLock<HashMap<String, Profile>>,
  conversations: RwLock<HashMap<String, Conversation>>,
  messages: RwLock<HashMap<String, Vec<Message>>>,
  settings: RwLock<HashMap<String, ClassSettings>>,
  events: RwLock<Vec<AnalyticsEvent>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Store for MemoryStore {
  #[instrument(level = "debug", target = "store", skip(self, profile), fields(id = %profile.id))]
  async fn insert_profile(&self, profile: Profile) -> Result<(), StoreError> {
    let mut profiles = self.profiles.write().await;
    if profiles.contains_key(&profile.id) {
      return Err(StoreError::Conflict("Profile already exists".into()));
    }
    if profiles.values().any(|p| p.username.eq_ignore_ascii_case(&profile.username)) {
      return Err(StoreError::Conflict("Username already taken".into()));
    }
    profiles.insert(profile.id.clone(), profile);
    Ok(())
  }

  async fn profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
    Ok(self.profiles.read().await.get(id).cloned())
  }

  async fn class_students(&self, class_code: &str) -> Result<Vec<Profile>, StoreError> {
    let profiles = self.profiles.read().await;
    let mut out: Vec<Profile> = profiles
      .values()
      .filter(|p| p.role == Role::Student && p.class() == Some(class_code))
      .cloned()
      .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(out)
  }

  #[instrument(level = "debug", target = "store", skip(self, conversation), fields(id = %conversation.id))]
  async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
    let mut conversations = self.conversations.write().await;
    if conversations.contains_key(&conversation.id) {
      return Err(StoreError::Conflict("Conversation already exists".into()));
    }
    self.messages.write().await.entry(conversation.id.clone()).or_default();
    conversations.insert(conversation.id.clone(), conversation);
    Ok(())
  }

  async fn conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
    Ok(self.conversations.read().await.get(id).cloned())
  }

  async fn conversations_for_users(&self, user_ids: &[String]) -> Result<Vec<Conversation>, StoreError> {
    let conversations = self.conversations.read().await;
    let mut out: Vec<Conversation> = conversations
      .values()
      .filter(|c| user_ids.iter().any(|u| *u == c.user_id))
      .cloned()
      .collect();
    out.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
    Ok(out)
  }

  #[instrument(level = "debug", target = "store", skip(self))]
  async fn set_conversation_status(&self, id: &str, status: ConversationStatus) -> Result<Conversation, StoreError> {
    let mut conversations = self.conversations.write().await;
    let conv = conversations.get_mut(id).ok_or(StoreError::NotFound)?;
    if status == ConversationStatus::Ended && conv.ended_at.is_none() {
      conv.ended_at = Some(Utc::now());
    }
    conv.status = status;
    debug!(target: "store", %id, ?status, "Conversation status updated");
    Ok(conv.clone())
  }

  async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
    let known = self.conversations.read().await.contains_key(&message.conversation_id);
    if !known {
      return Err(StoreError::NotFound);
    }
    self.messages.write().await.entry(message.conversation_id.clone()).or_default().push(message);
    Ok(())
  }

  async fn message_count(&self, conversation_id: &str) -> Result<usize, StoreError> {
    Ok(self.messages.read().await.get(conversation_id).map_or(0, Vec::len))
  }

  async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
    Ok(self.messages.read().await.get(conversation_id).cloned().unwrap_or_default())
  }

  async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
    let messages = self.messages.read().await;
    let all = messages.get(conversation_id).map(Vec::as_slice).unwrap_or_default();
    Ok(all[all.len().saturating_sub(limit)..].to_vec())
  }

  async fn messages_in(&self, conversation_ids: &[String], filter: MessageFilter) -> Result<Vec<Message>, StoreError> {
    let messages = self.messages.read().await;
    let mut out: Vec<Message> = conversation_ids
      .iter()
      .filter_map(|id| messages.get(id))
      .flatten()
      .filter(|m| filter.matches(m))
      .cloned()
      .collect();
    out.sort_by_key(|m| m.created_at);
    Ok(out)
  }

  async fn class_settings(&self, class_code: &str) -> Result<Option<AiRestrictions>, StoreError> {
    Ok(self.settings.read().await.get(class_code).map(|s| s.settings))
  }

  #[instrument(level = "debug", target = "store", skip(self, settings), fields(class_code = %settings.class_code))]
  async fn upsert_class_settings(&self, settings: ClassSettings) -> Result<(), StoreError> {
    self.settings.write().await.insert(settings.class_code.clone(), settings);
    Ok(())
  }

  async fn record_event(&self, event: AnalyticsEvent) -> Result<(), StoreError> {
    self.events.write().await.push(event);
    Ok(())
  }

  async fn events_for_user(&self, user_id: &str) -> Result<Vec<AnalyticsEvent>, StoreError> {
    Ok(self.events.read().await.iter().filter(|e| e.user_id == user_id).cloned().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn conversation(id: &str, user: &str, started_at: DateTime<Utc>) -> Conversation {
    Conversation {
      id: id.into(),
      user_id: user.into(),
      title: None,
      subject: None,
      problem_statement: None,
      status: ConversationStatus::Active,
      started_at,
      ended_at: None,
    }
  }

  fn message(conv: &str, n: usize, role: MessageRole, at: DateTime<Utc>) -> Message {
    Message {
      id: format!("{conv}-{n}"),
      conversation_id: conv.into(),
      role,
      content: format!("message {n}"),
      hint_level: None,
      created_at: at,
    }
  }

  #[tokio::test]
  async fn recent_messages_are_the_chronological_tail() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_conversation(conversation("c1", "u1", now)).await.unwrap();
    for n in 0..15 {
      store.insert_message(message("c1", n, MessageRole::User, now + Duration::seconds(n as i64))).await.unwrap();
    }

    let recent = store.recent_messages("c1", 10).await.unwrap();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent.first().unwrap().content, "message 5");
    assert_eq!(recent.last().unwrap().content, "message 14");
    assert_eq!(store.message_count("c1").await.unwrap(), 15);
    assert!(store.recent_messages("missing", 10).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn messages_need_a_conversation() {
    let store = MemoryStore::new();
    let err = store.insert_message(message("nope", 0, MessageRole::User, Utc::now())).await.unwrap_err();
    assert_eq!(err, StoreError::NotFound);
  }

  #[tokio::test]
  async fn filters_messages_by_role_and_window() {
    let store = MemoryStore::new();
    let now = Utc::now();
    store.create_conversation(conversation("c1", "u1", now)).await.unwrap();
    store.create_conversation(conversation("c2", "u2", now)).await.unwrap();
    store.insert_message(message("c1", 0, MessageRole::User, now - Duration::days(10))).await.unwrap();
    store.insert_message(message("c1", 1, MessageRole::User, now - Duration::days(1))).await.unwrap();
    store.insert_message(message("c2", 2, MessageRole::Assistant, now - Duration::hours(2))).await.unwrap();
    store.insert_message(message("c2", 3, MessageRole::User, now - Duration::hours(1))).await.unwrap();

    let filter = MessageFilter { role: Some(MessageRole::User), since: Some(now - Duration::days(7)), until: Some(now) };
    let found = store.messages_in(&["c1".into(), "c2".into()], filter).await.unwrap();
    let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["c1-1", "c2-3"]);
  }

  #[tokio::test]
  async fn ended_at_is_stamped_once() {
    let store = MemoryStore::new();
    store.create_conversation(conversation("c1", "u1", Utc::now())).await.unwrap();
    let ended = store.set_conversation_status("c1", ConversationStatus::Ended).await.unwrap();
    let stamp = ended.ended_at.unwrap();
    let deleted = store.set_conversation_status("c1", ConversationStatus::Deleted).await.unwrap();
    assert_eq!(deleted.status, ConversationStatus::Deleted);
    assert_eq!(deleted.ended_at, Some(stamp));
    assert_eq!(
      store.set_conversation_status("zzz", ConversationStatus::Ended).await.unwrap_err(),
      StoreError::NotFound
    );
  }

  #[tokio::test]
  async fn settings_are_last_write_wins() {
    let store = MemoryStore::new();
    let first = AiRestrictions { avoid_direct_answers: Some(true), ..Default::default() };
    let second = AiRestrictions { avoid_direct_answers: Some(false), show_workings: Some(true), ..Default::default() };
    for settings in [first, second] {
      store
        .upsert_class_settings(ClassSettings { class_code: "CLS-1".into(), admin_id: "a".into(), settings, updated_at: Utc::now() })
        .await
        .unwrap();
    }
    assert_eq!(store.class_settings("CLS-1").await.unwrap(), Some(second));
    assert_eq!(store.class_settings("CLS-2").await.unwrap(), None);
  }
}
