//! Public protocol structs for the HTTP API (serde ready).
//! Field names follow the frontend's camelCase; each request body knows how
//! to validate itself and reports every failed rule at once.

use serde::{Deserialize, Serialize};

use crate::domain::{AiRestrictions, Conversation, Message};
use crate::error::AppError;
use crate::insights::{DailyInsight, UsagePoint};

pub const MAX_SUBJECT_CHARS: usize = 100;
pub const MAX_PROBLEM_CHARS: usize = 1000;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 24;
pub const MAX_PAGE_SIZE: usize = 50;
pub const DEFAULT_PAGE_SIZE: usize = 20;

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn finish(issues: Vec<String>) -> Result<(), AppError> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid_body(issues))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub provider: &'static str,
    pub has_key: bool,
    pub masked: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct OkOut {
    pub ok: bool,
}

// ---------- registration ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIn {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub school_id: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub class_code: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

impl RegisterIn {
    pub fn validate(&self, school_id: &str) -> Result<(), AppError> {
        let mut issues = Vec::new();
        let username = self.username.trim();
        let well_formed = username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !well_formed || !(MIN_USERNAME_CHARS..=MAX_USERNAME_CHARS).contains(&char_len(username)) {
            issues.push(format!(
                "username: {MIN_USERNAME_CHARS}-{MAX_USERNAME_CHARS} letters, digits or underscores"
            ));
        }
        if self.school_id.as_deref().map(str::trim) != Some(school_id) {
            issues.push("schoolId: unknown school".to_string());
        }
        let has_class = self.class_code.as_deref().is_some_and(|c| !c.trim().is_empty());
        if !self.admin && !has_class {
            issues.push("classCode: required for students".to_string());
        }
        finish(issues)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOut {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_code: Option<String>,
}

// ---------- conversations ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationIn {
    #[serde(default)]
    pub subject: Option<String>,
    pub problem_statement: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl CreateConversationIn {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut issues = Vec::new();
        if self.subject.as_deref().is_some_and(|s| char_len(s) > MAX_SUBJECT_CHARS) {
            issues.push(format!("subject: at most {MAX_SUBJECT_CHARS} characters"));
        }
        let problem = char_len(self.problem_statement.trim());
        if problem == 0 || problem > MAX_PROBLEM_CHARS {
            issues.push(format!("problemStatement: must be 1-{MAX_PROBLEM_CHARS} characters"));
        }
        if self.title.as_deref().is_some_and(|t| char_len(t) > MAX_TITLE_CHARS) {
            issues.push(format!("title: at most {MAX_TITLE_CHARS} characters"));
        }
        finish(issues)
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedOut {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub status: Option<String>,
    /// RFC 3339 lower bound on `started_at`.
    pub since: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOut {
    pub items: Vec<Conversation>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct PatchConversationIn {
    #[serde(default)]
    pub status: Option<String>,
}

// ---------- chat ----------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatIn {
    pub conversation_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOut {
    pub reply: String,
    pub hint_level: u8,
}

// ---------- admin ----------

#[derive(Debug, Serialize)]
pub struct SettingsOut {
    pub settings: Option<AiRestrictions>,
}

/// All four switches are required when saving class settings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestrictionsIn {
    pub explain_definitions: bool,
    pub model_physics_engineering: bool,
    pub show_workings: bool,
    pub avoid_direct_answers: bool,
}

impl From<RestrictionsIn> for AiRestrictions {
    fn from(r: RestrictionsIn) -> Self {
        AiRestrictions {
            explain_definitions: Some(r.explain_definitions),
            model_physics_engineering: Some(r.model_physics_engineering),
            show_workings: Some(r.show_workings),
            avoid_direct_answers: Some(r.avoid_direct_answers),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DaysQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UsageOut {
    pub data: Vec<UsagePoint>,
}

#[derive(Debug, Serialize)]
pub struct InsightsOut {
    pub insights: Vec<DailyInsight>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_conversation_reports_every_issue() {
        let body: CreateConversationIn =
            serde_json::from_value(json!({ "subject": "x".repeat(101), "problemStatement": "   " })).unwrap();
        match body.validate() {
            Err(AppError::BadRequest { issues, .. }) => assert_eq!(issues.len(), 2),
            other => panic!("expected bad request, got {other:?}"),
        }

        let ok: CreateConversationIn =
            serde_json::from_value(json!({ "subject": "Algebra", "problemStatement": "Solve 2x + 3 = 11" })).unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn students_need_a_class_code() {
        let student: RegisterIn =
            serde_json::from_value(json!({ "username": "ana", "schoolId": "001" })).unwrap();
        assert!(student.validate("001").is_err());

        let admin: RegisterIn =
            serde_json::from_value(json!({ "username": "ms_lee", "schoolId": "001", "admin": true })).unwrap();
        assert!(admin.validate("001").is_ok());
        assert!(admin.validate("002").is_err());
    }

    #[test]
    fn restrictions_require_all_switches() {
        let partial = serde_json::from_value::<RestrictionsIn>(json!({ "explainDefinitions": true }));
        assert!(partial.is_err());

        let full: RestrictionsIn = serde_json::from_value(json!({
            "explainDefinitions": false,
            "modelPhysicsEngineering": true,
            "showWorkings": true,
            "avoidDirectAnswers": true
        }))
        .unwrap();
        let r: AiRestrictions = full.into();
        assert_eq!(r.explain_definitions, Some(false));
        assert_eq!(r.avoid_direct_answers, Some(true));
    }

    #[test]
    fn detail_flattens_conversation() {
        let detail = ConversationDetail {
            conversation: crate::testing::conversation("c1", "s1", Some("Math"), None),
            messages: Vec::new(),
        };
        let v = serde_json::to_value(&detail).unwrap();
        assert_eq!(v["id"], "c1");
        assert_eq!(v["messages"], json!([]));
    }
}
