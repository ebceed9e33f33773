use crate::state::AppState;
use axum::Router;

mod dto;
pub mod google;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod rate_limit;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
