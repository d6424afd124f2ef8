//! Caller identity. Authentication happens in front of this service; the
//! authenticated user id arrives in the `X-User-Id` header.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::domain::Profile;
use crate::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user id. Rejects with 401 when the header is missing or blank.
#[derive(Clone, Debug)]
pub struct CallerId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CallerId(id.to_string()))
            .ok_or(AppError::Unauthorized)
    }
}

/// Stored profile of the caller; unknown ids are treated as unauthenticated.
pub async fn caller_profile(state: &AppState, caller: &CallerId) -> Result<Profile, AppError> {
    state.store.profile(&caller.0).await?.ok_or(AppError::Unauthorized)
}

pub async fn require_admin(state: &AppState, caller: &CallerId) -> Result<Profile, AppError> {
    let profile = caller_profile(state, caller).await?;
    if profile.is_admin() {
        Ok(profile)
    } else {
        Err(AppError::Forbidden)
    }
}
