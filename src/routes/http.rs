//! HTTP endpoint handlers for health, registration, chat, and student stats.
//! These are thin wrappers that forward to the tutor and store.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::{MessageRole, Profile, Role};
use crate::error::AppError;
use crate::insights::{clamp_days, student_stats, usage_series, usage_window, StudentStats};
use crate::protocol::*;
use crate::routes::identity::CallerId;
use crate::state::AppState;
use crate::store::MessageFilter;
use crate::tutor::chat_turn;
use crate::util::{generate_class_code, mask_secret};

/// Unwrap a JSON body, reporting a malformed one as 400 "Invalid body".
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(v)| v).map_err(|e| AppError::invalid_body(vec![e.body_text()]))
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
    let llm = &state.config.llm;
    Json(HealthOut {
        ok: true,
        provider: "openai",
        has_key: llm.api_key.is_some(),
        masked: llm.api_key.as_deref().map(mask_secret).unwrap_or_default(),
        model: llm.model.clone(),
    })
}

#[instrument(level = "info", skip(state, body), fields(user_id = %caller.0))]
pub async fn http_post_register(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    body: Result<Json<RegisterIn>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterOut>), AppError> {
    let body = json_body(body)?;
    body.validate(&state.config.tutor.school_id)?;

    let (role, class_code) = if body.admin {
        (Role::Admin, Some(generate_class_code()))
    } else {
        (Role::Student, non_blank(body.class_code).map(|c| c.to_uppercase()))
    };

    let profile = Profile {
        id: caller.0.clone(),
        username: body.username.trim().to_string(),
        full_name: non_blank(body.full_name),
        school_id: non_blank(body.school_id),
        grade_level: non_blank(body.grade_level),
        role,
        class_code: class_code.clone(),
        created_at: Utc::now(),
    };
    state.store.insert_profile(profile).await?;
    info!(target: "socratic_tutor", user_id = %caller.0, ?role, "Profile registered");

    let class_code = if body.admin { class_code } else { None };
    Ok((StatusCode::CREATED, Json(RegisterOut { ok: true, class_code })))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %caller.0))]
pub async fn http_post_chat(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    body: Result<Json<ChatIn>, JsonRejection>,
) -> Result<Json<ChatOut>, AppError> {
    let body = json_body(body)?;
    let turn = chat_turn(&state, &caller.0, &body.conversation_id, &body.message).await?;
    Ok(Json(ChatOut { reply: turn.reply, hint_level: turn.hint_level }))
}

#[instrument(level = "info", skip(state), fields(user_id = %caller.0))]
pub async fn http_get_student_stats(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
) -> Result<Json<StudentStats>, AppError> {
    let conversations = state.store.conversations_for_users(std::slice::from_ref(&caller.0)).await?;
    let ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
    let filter = MessageFilter { role: Some(MessageRole::User), ..MessageFilter::default() };
    let user_messages = state.store.messages_in(&ids, filter).await?.len();
    Ok(Json(student_stats(&conversations, user_messages)))
}

/// The caller's own message counts, bucketed like the class usage chart.
#[instrument(level = "info", skip(state, q), fields(user_id = %caller.0))]
pub async fn http_get_student_usage(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Query(q): Query<DaysQuery>,
) -> Result<Json<UsageOut>, AppError> {
    let days = clamp_days(q.days);
    let now = Utc::now();
    let (start, end) = usage_window(days, now);

    let conversations = state.store.conversations_for_users(std::slice::from_ref(&caller.0)).await?;
    let ids: Vec<String> = conversations.into_iter().map(|c| c.id).collect();
    let filter = MessageFilter { role: Some(MessageRole::User), since: Some(start), until: Some(end) };
    let stamps: Vec<_> = state.store.messages_in(&ids, filter).await?.iter().map(|m| m.created_at).collect();
    Ok(Json(UsageOut { data: usage_series(&stamps, days, now) }))
}
