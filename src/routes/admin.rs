//! Teacher-only endpoints: class AI restrictions and class analytics.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use tracing::{info, instrument};

use crate::domain::{AiRestrictions, ClassSettings, Conversation, Message, MessageRole, Profile};
use crate::error::AppError;
use crate::insights::{clamp_days, daily_insights, usage_series, usage_window, QuestionRecord};
use crate::openai::ChatOptions;
use crate::protocol::*;
use crate::routes::http::json_body;
use crate::routes::identity::{require_admin, CallerId};
use crate::state::AppState;
use crate::store::MessageFilter;

#[instrument(level = "info", skip(state), fields(user_id = %caller.0))]
pub async fn http_get_restrictions(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
) -> Result<Json<SettingsOut>, AppError> {
    let admin = require_admin(&state, &caller).await?;
    let settings = match admin.class() {
        Some(class) => state.store.class_settings(class).await?,
        None => None,
    };
    Ok(Json(SettingsOut { settings }))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %caller.0))]
pub async fn http_post_restrictions(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    body: Result<Json<RestrictionsIn>, JsonRejection>,
) -> Result<Json<SettingsOut>, AppError> {
    let admin = require_admin(&state, &caller).await?;
    let body = json_body(body)?;
    let class = admin.class().ok_or_else(|| AppError::bad_request("Admin has no class code"))?;

    let settings: AiRestrictions = body.into();
    state
        .store
        .upsert_class_settings(ClassSettings {
            class_code: class.to_string(),
            admin_id: admin.id.clone(),
            settings,
            updated_at: Utc::now(),
        })
        .await?;
    info!(target: "socratic_tutor", %class, ?settings, "Class restrictions saved");
    Ok(Json(SettingsOut { settings: Some(settings) }))
}

/// Conversations and user messages of the admin's class since `since`.
async fn class_questions(
    state: &AppState,
    admin: &Profile,
    filter: MessageFilter,
) -> Result<(Vec<Conversation>, Vec<Message>), AppError> {
    let Some(class) = admin.class() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let students: Vec<String> = state.store.class_students(class).await?.into_iter().map(|p| p.id).collect();
    let conversations = state.store.conversations_for_users(&students).await?;
    let ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
    let messages = state.store.messages_in(&ids, filter).await?;
    Ok((conversations, messages))
}

#[instrument(level = "info", skip(state, q), fields(user_id = %caller.0))]
pub async fn http_get_usage_stats(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Query(q): Query<DaysQuery>,
) -> Result<Json<UsageOut>, AppError> {
    let admin = require_admin(&state, &caller).await?;
    let days = clamp_days(q.days);
    let now = Utc::now();
    let (start, end) = usage_window(days, now);

    let filter = MessageFilter { role: Some(MessageRole::User), since: Some(start), until: Some(end) };
    let (_, messages) = class_questions(&state, &admin, filter).await?;
    let stamps: Vec<_> = messages.iter().map(|m| m.created_at).collect();
    Ok(Json(UsageOut { data: usage_series(&stamps, days, now) }))
}

#[instrument(level = "info", skip(state, q), fields(user_id = %caller.0))]
pub async fn http_get_daily_insights(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Query(q): Query<DaysQuery>,
) -> Result<Json<InsightsOut>, AppError> {
    let admin = require_admin(&state, &caller).await?;
    let days = clamp_days(q.days);
    let since = Utc::now() - Duration::days(days);

    let filter = MessageFilter { role: Some(MessageRole::User), since: Some(since), until: None };
    let (conversations, messages) = class_questions(&state, &admin, filter).await?;
    let owners: HashMap<&str, &str> = conversations.iter().map(|c| (c.id.as_str(), c.user_id.as_str())).collect();

    let records: Vec<QuestionRecord> = messages
        .into_iter()
        .filter_map(|m| {
            let student_id = owners.get(m.conversation_id.as_str())?.to_string();
            Some(QuestionRecord { student_id, content: m.content, created_at: m.created_at })
        })
        .collect();

    let insights = daily_insights(state.llm.as_deref(), ChatOptions::analysis(&state.config.llm), &records).await;
    Ok(Json(InsightsOut { insights }))
}
