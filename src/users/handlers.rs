use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{ProfileRequest, ProfileResponse},
    repo_types::User,
};
use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    extract::{parse_user_id, ApiJson},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/getuser/user/:id", get(get_user))
        .route("/user/profile/update", post(update_profile))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = parse_user_id(&id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    Ok(Json(user))
}

/// Partial update: only the fields present in the body change.
#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let user_id = payload.user_id.unwrap_or(auth.0);
    auth.ensure_self(user_id)?;

    let update = payload.into_update()?;
    let user = state
        .users
        .update_profile(user_id, update)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(ProfileResponse {
        message: "Profile updated successfully".into(),
        user,
    }))
}
