use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod repo;

pub use handlers::is_filtered_name;

pub fn router() -> Router<AppState> {
    handlers::router()
}
