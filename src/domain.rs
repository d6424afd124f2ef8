//! Domain models: profiles, conversations, messages, class restrictions, analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Student,
  Admin,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Profile {
  pub id: String,
  pub username: String,
  #[serde(default)] pub full_name: Option<String>,
  #[serde(default)] pub school_id: Option<String>,
  #[serde(default)] pub grade_level: Option<String>,
  pub role: Role,
  #[serde(default)] pub class_code: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Profile {
  pub fn is_admin(&self) -> bool { self.role == Role::Admin }

  /// Class code with blank values treated as absent.
  pub fn class(&self) -> Option<&str> {
    self.class_code.as_deref().map(str::trim).filter(|c| !c.is_empty())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
  Active,
  Ended,
  Deleted,
}

impl ConversationStatus {
  /// Status only moves forward: active → ended → deleted (ended may be skipped).
  /// Re-applying the current status is accepted as a no-op.
  pub fn can_transition_to(self, next: ConversationStatus) -> bool {
    self.rank() <= next.rank()
  }

  fn rank(self) -> u8 {
    match self {
      ConversationStatus::Active => 0,
      ConversationStatus::Ended => 1,
      ConversationStatus::Deleted => 2,
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "active" => Some(ConversationStatus::Active),
      "ended" => Some(ConversationStatus::Ended),
      "deleted" => Some(ConversationStatus::Deleted),
      _ => None,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
  pub id: String,
  pub user_id: String,
  #[serde(default)] pub title: Option<String>,
  #[serde(default)] pub subject: Option<String>,
  #[serde(default)] pub problem_statement: Option<String>,
  pub status: ConversationStatus,
  pub started_at: DateTime<Utc>,
  #[serde(default)] pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
  User,
  Assistant,
  System,
}

impl MessageRole {
  pub fn as_str(self) -> &'static str {
    match self {
      MessageRole::User => "user",
      MessageRole::Assistant => "assistant",
      MessageRole::System => "system",
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
  pub id: String,
  pub conversation_id: String,
  pub role: MessageRole,
  pub content: String,
  /// Only set on assistant replies: the level the reply was generated at.
  #[serde(default)] pub hint_level: Option<u8>,
  pub created_at: DateTime<Utc>,
}

/// Teacher-configured behavior toggles for one class.
///
/// Each toggle is tri-state: `None` leaves the general prompt rules alone,
/// `Some(true)` / `Some(false)` each add their own directive.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AiRestrictions {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explain_definitions: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model_physics_engineering: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub show_workings: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avoid_direct_answers: Option<bool>,
}

impl AiRestrictions {
  pub fn is_empty(&self) -> bool {
    self.explain_definitions.is_none()
      && self.model_physics_engineering.is_none()
      && self.show_workings.is_none()
      && self.avoid_direct_answers.is_none()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassSettings {
  pub class_code: String,
  pub admin_id: String,
  pub settings: AiRestrictions,
  pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyticsEvent {
  pub user_id: String,
  pub event_type: String,
  pub event_data: Value,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_moves_forward_only() {
    use ConversationStatus::*;
    assert!(Active.can_transition_to(Ended));
    assert!(Active.can_transition_to(Deleted));
    assert!(Ended.can_transition_to(Deleted));
    assert!(Ended.can_transition_to(Ended));
    assert!(!Ended.can_transition_to(Active));
    assert!(!Deleted.can_transition_to(Active));
    assert!(!Deleted.can_transition_to(Ended));
  }

  #[test]
  fn restrictions_keep_undefined_apart_from_false() {
    let r: AiRestrictions = serde_json::from_str(r#"{"avoidDirectAnswers": false}"#).unwrap();
    assert_eq!(r.avoid_direct_answers, Some(false));
    assert_eq!(r.explain_definitions, None);
    assert!(!r.is_empty());
    assert!(AiRestrictions::default().is_empty());
    assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"avoidDirectAnswers":false}"#);
  }

  #[test]
  fn blank_class_code_counts_as_missing() {
    let p = Profile {
      id: "u".into(),
      username: "kid".into(),
      full_name: None,
      school_id: None,
      grade_level: None,
      role: Role::Student,
      class_code: Some("  ".into()),
      created_at: Utc::now(),
    };
    assert_eq!(p.class(), None);
  }
}
