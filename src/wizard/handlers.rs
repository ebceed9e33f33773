use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    state::AppState,
    users::dto::{ProfileRequest, ProfileResponse},
};

pub fn wizard_routes() -> Router<AppState> {
    Router::new().route("/wizard/complete-profile", post(complete_profile))
}

/// Onboarding: every profile field must be supplied in one go.
#[instrument(skip(state, payload))]
pub async fn complete_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<ProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    if !payload.is_complete() {
        warn!(caller = %auth.0, "wizard submitted with missing fields");
        return Err(ApiError::bad_request("All fields are required"));
    }
    let user_id = payload.user_id.unwrap_or(auth.0);
    auth.ensure_self(user_id)?;

    let update = payload.into_update()?;
    let user = state
        .users
        .update_profile(user_id, update)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    info!(user_id = %user.id, "profile completed");
    Ok(Json(ProfileResponse {
        message: "Profile completed".into(),
        user,
    }))
}
