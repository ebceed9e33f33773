use axum::extract::{FromRequest, FromRequestParts};
use uuid::Uuid;

use crate::error::ApiError;

/// `axum::Json` whose rejections render as 400 `{"message": ...}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with the same rejection shape as [`ApiJson`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Upper bound for free-text fields stored on users and ledger rows.
pub const MAX_TEXT_LEN: usize = 200;

/// Rejects `value` when it is longer than [`MAX_TEXT_LEN`] characters.
pub fn check_text_len(field: &str, value: &str) -> Result<(), ApiError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::bad_request(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(())
}

/// Parses a user id taken from a path segment.
pub fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("Invalid user id"))
}
