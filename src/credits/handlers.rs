use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        CreditHistoryResponse, CreditsResponse, DeductCreditsRequest, DeductCreditsResponse,
        Pagination, SpinResultRequest, SpinResultResponse,
    },
    repo_types::{CreditChange, CreditOutcome, DEFAULT_DEDUCTION, SPIN_REWARDS},
};
use crate::{
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    extract::{check_text_len, parse_user_id, ApiJson, ApiQuery},
    state::AppState,
};

pub fn wheel_routes() -> Router<AppState> {
    Router::new()
        .route("/wheel/spin-result", post(spin_result))
        .route("/wheel/deduct-credits", post(deduct_credits))
}

pub fn credit_routes() -> Router<AppState> {
    Router::new()
        .route("/credits/points/:id", get(get_points))
        .route("/credits/transactions/:id", get(list_transactions))
}

#[instrument(skip(state, payload))]
pub async fn spin_result(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<SpinResultRequest>,
) -> ApiResult<Json<SpinResultResponse>> {
    let reward = payload
        .reward
        .filter(|r| SPIN_REWARDS.contains(r))
        .ok_or_else(|| {
            warn!(reward = ?payload.reward, "invalid spin reward");
            ApiError::bad_request("Invalid reward value")
        })?;
    let user_id = payload.user_id.unwrap_or(auth.0);
    auth.ensure_self(user_id)?;

    match state
        .users
        .apply_credit_change(user_id, CreditChange::spin_reward(reward))
        .await?
    {
        CreditOutcome::Applied { balance, .. } => {
            info!(%user_id, reward, balance, "spin reward credited");
            Ok(Json(SpinResultResponse {
                message: format!("Credited {reward} successfully!"),
                reward,
                total_credits: balance,
            }))
        }
        CreditOutcome::UserNotFound => Err(ApiError::user_not_found()),
        // adding a positive reward cannot underflow
        CreditOutcome::Insufficient { .. } => Err(ApiError::Internal(anyhow::anyhow!(
            "spin reward reported insufficient balance"
        ))),
    }
}

#[instrument(skip(state, payload))]
pub async fn deduct_credits(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<DeductCreditsRequest>,
) -> ApiResult<Json<DeductCreditsResponse>> {
    let amount = payload.amount.unwrap_or(DEFAULT_DEDUCTION);
    if amount <= 0 {
        return Err(ApiError::bad_request("Amount must be a positive number"));
    }
    let user_id = payload.user_id.unwrap_or(auth.0);
    auth.ensure_self(user_id)?;

    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "Mock interview session".to_string());
    check_text_len("Description", &description)?;

    match state
        .users
        .apply_credit_change(user_id, CreditChange::deduction(amount, description))
        .await?
    {
        CreditOutcome::Applied { balance, .. } => {
            info!(%user_id, amount, balance, "credits deducted");
            Ok(Json(DeductCreditsResponse {
                message: format!("Deducted {amount} credits"),
                deducted: amount,
                total_credits: balance,
            }))
        }
        CreditOutcome::UserNotFound => Err(ApiError::user_not_found()),
        CreditOutcome::Insufficient { balance } => {
            warn!(%user_id, amount, balance, "insufficient credits");
            Err(ApiError::bad_request("Insufficient credits"))
        }
    }
}

#[instrument(skip(state))]
pub async fn get_points(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CreditsResponse>> {
    let id = parse_user_id(&id)?;
    let credits = state
        .users
        .credits(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    Ok(Json(CreditsResponse { credits }))
}

#[instrument(skip(state))]
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ApiQuery(page): ApiQuery<Pagination>,
) -> ApiResult<Json<CreditHistoryResponse>> {
    let id = parse_user_id(&id)?;
    auth.ensure_self(id)?;

    let credits = state
        .users
        .credits(id)
        .await?
        .ok_or_else(ApiError::user_not_found)?;
    let (limit, offset) = page.clamped();
    let transactions = state.users.credit_transactions(id, limit, offset).await?;
    Ok(Json(CreditHistoryResponse {
        credits,
        transactions,
    }))
}
