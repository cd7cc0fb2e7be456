pub mod handlers;
pub mod model;
pub mod repo;
pub mod serialization;
pub mod services;
pub mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::user_routes()
}
