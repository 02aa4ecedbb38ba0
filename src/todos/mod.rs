mod dto;
mod handlers;
pub mod query;
pub mod repo;
pub mod repo_types;
mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::todo_routes()
}
