use crate::state::AppState;
use axum::Router;

pub mod clicks;
pub mod handlers;
pub mod importer;
pub mod repo;
pub mod resolver;

pub fn router() -> Router<AppState> {
    handlers::public_router()
}

pub fn admin_router() -> Router<AppState> {
    handlers::admin_router()
}
