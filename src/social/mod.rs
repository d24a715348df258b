use crate::state::AppState;
use axum::Router;

pub mod comments;
pub mod favorites;
pub mod ratings;
pub mod tips;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(comments::router())
        .merge(favorites::router())
        .merge(ratings::router())
        .merge(tips::router())
}
