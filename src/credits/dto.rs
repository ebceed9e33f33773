use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::CreditTransaction;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResultRequest {
    pub user_id: Option<Uuid>,
    pub reward: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResultResponse {
    pub message: String,
    pub reward: i64,
    pub total_credits: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductCreditsRequest {
    pub user_id: Option<Uuid>,
    pub amount: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductCreditsResponse {
    pub message: String,
    pub deducted: i64,
    pub total_credits: i64,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub credits: i64,
}

#[derive(Debug, Serialize)]
pub struct CreditHistoryResponse {
    pub credits: i64,
    pub transactions: Vec<CreditTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, 100), self.offset.max(0))
    }
}
