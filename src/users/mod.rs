pub mod dto;
pub mod handlers;
pub mod memory;
pub mod repo_types;
pub mod store;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
