//! Conversation CRUD. Students only ever see their own conversations; an
//! admin can read (never modify) conversations of students in their class.
//! Anything a caller may not see is reported as 404, never 403.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{Conversation, ConversationStatus, Profile};
use crate::error::AppError;
use crate::protocol::*;
use crate::routes::http::json_body;
use crate::routes::identity::{caller_profile, CallerId};
use crate::state::AppState;

#[instrument(level = "info", skip(state, body), fields(user_id = %caller.0))]
pub async fn http_create_conversation(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    body: Result<Json<CreateConversationIn>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedOut>), AppError> {
    let body = json_body(body)?;
    body.validate()?;

    if state.store.profile(&caller.0).await?.is_none() {
        return Err(AppError::Conflict("Profile not found. Complete registration first.".into()));
    }

    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let conversation = Conversation {
        id: Uuid::new_v4().to_string(),
        user_id: caller.0.clone(),
        title: trimmed(body.title),
        subject: trimmed(body.subject),
        problem_statement: Some(body.problem_statement.trim().to_string()),
        status: ConversationStatus::Active,
        started_at: Utc::now(),
        ended_at: None,
    };
    let id = conversation.id.clone();
    state.store.create_conversation(conversation).await?;
    info!(target: "socratic_tutor", %id, "Conversation created");
    Ok((StatusCode::CREATED, Json(CreatedOut { id })))
}

/// Ids whose conversations the caller may list.
async fn visible_users(state: &AppState, profile: &Profile, requested: Option<&str>) -> Result<Vec<String>, AppError> {
    if !profile.is_admin() {
        return Ok(vec![profile.id.clone()]);
    }
    let Some(class) = profile.class() else {
        return Ok(Vec::new());
    };
    let mut ids: Vec<String> = state.store.class_students(class).await?.into_iter().map(|p| p.id).collect();
    if let Some(user) = requested {
        ids.retain(|id| id == user);
    }
    Ok(ids)
}

#[instrument(level = "info", skip(state, q), fields(user_id = %caller.0))]
pub async fn http_list_conversations(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Query(q): Query<ListQuery>,
) -> Result<Json<ListOut>, AppError> {
    let profile = caller_profile(&state, &caller).await?;

    let status = match q.status.as_deref() {
        Some(s) => Some(ConversationStatus::parse(s).ok_or_else(|| AppError::bad_request("Invalid status"))?),
        None => None,
    };
    let since = match q.since.as_deref() {
        Some(s) => Some(
            DateTime::parse_from_rfc3339(s)
                .map_err(|_| AppError::bad_request("Invalid since"))?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    let page = q.page.unwrap_or(1).max(1);
    let page_size = q.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let users = visible_users(&state, &profile, q.user_id.as_deref()).await?;
    let matching: Vec<Conversation> = state
        .store
        .conversations_for_users(&users)
        .await?
        .into_iter()
        .filter(|c| c.status != ConversationStatus::Deleted)
        .filter(|c| status.map_or(true, |s| c.status == s))
        .filter(|c| since.map_or(true, |t| c.started_at >= t))
        .collect();

    let total = matching.len();
    let items = matching.into_iter().skip((page - 1).saturating_mul(page_size)).take(page_size).collect();
    Ok(Json(ListOut { items, page, page_size, total }))
}

/// Conversation if `caller` owns it or administers the owner's class.
async fn readable(state: &AppState, caller: &CallerId, id: &str) -> Result<Conversation, AppError> {
    let conversation = state
        .store
        .conversation(id)
        .await?
        .filter(|c| c.status != ConversationStatus::Deleted)
        .ok_or(AppError::NotFound)?;
    if conversation.user_id == caller.0 {
        return Ok(conversation);
    }

    let viewer = state.store.profile(&caller.0).await?;
    let owner = state.store.profile(&conversation.user_id).await?;
    match (viewer, owner) {
        (Some(v), Some(o)) if v.is_admin() && v.class().is_some() && v.class() == o.class() => Ok(conversation),
        _ => Err(AppError::NotFound),
    }
}

async fn owned(state: &AppState, caller: &CallerId, id: &str) -> Result<Conversation, AppError> {
    state
        .store
        .conversation(id)
        .await?
        .filter(|c| c.user_id == caller.0 && c.status != ConversationStatus::Deleted)
        .ok_or(AppError::NotFound)
}

#[instrument(level = "info", skip(state), fields(user_id = %caller.0))]
pub async fn http_get_conversation(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>, AppError> {
    let conversation = readable(&state, &caller, &id).await?;
    let messages = state.store.messages(&id).await?;
    Ok(Json(ConversationDetail { conversation, messages }))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %caller.0))]
pub async fn http_patch_conversation(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Path(id): Path<String>,
    body: Result<Json<PatchConversationIn>, JsonRejection>,
) -> Result<Json<Conversation>, AppError> {
    let body = json_body(body)?;
    let current = owned(&state, &caller, &id).await?;

    let Some(raw) = body.status else {
        return Ok(Json(current));
    };
    let next = ConversationStatus::parse(&raw).ok_or_else(|| AppError::bad_request("Invalid status"))?;
    if !current.status.can_transition_to(next) {
        return Err(AppError::bad_request("Invalid status transition"));
    }
    let updated = state.store.set_conversation_status(&id, next).await?;
    info!(target: "socratic_tutor", %id, status = ?updated.status, "Conversation updated");
    Ok(Json(updated))
}

#[instrument(level = "info", skip(state), fields(user_id = %caller.0))]
pub async fn http_delete_conversation(
    State(state): State<Arc<AppState>>,
    caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<OkOut>, AppError> {
    owned(&state, &caller, &id).await?;
    state.store.set_conversation_status(&id, ConversationStatus::Deleted).await?;
    info!(target: "socratic_tutor", %id, "Conversation deleted");
    Ok(Json(OkOut { ok: true }))
}
