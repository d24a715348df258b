use axum::{http::HeaderValue, routing::get, Json, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Assembles the full HTTP surface. Admin routes nest under /admin and are
/// role-checked in their handlers on top of the session requirement.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .merge(crate::auth::router())
        .merge(crate::recipes::router())
        .merge(crate::calc::router())
        .merge(crate::pantry::router())
        .merge(crate::shopping_list::router())
        .merge(crate::machines::router())
        .merge(crate::social::router())
        .merge(crate::ingredients::router())
        .merge(crate::affiliate::router())
        .merge(crate::ads::public_router())
        .merge(crate::upload::router())
        .nest("/admin", crate::admin::router())
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Empty origin list means permissive (local dev); otherwise only the
/// configured origins are allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    // axum panics at startup on overlapping routes; building the full
    // router catches that without a server.
    #[tokio::test]
    async fn full_router_assembles() {
        let _ = build_router(AppState::fake());
    }

    #[test]
    fn configured_origins_build_a_restrictive_layer() {
        let _ = cors_layer(&["https://app.slushbook.dk".to_string()]);
        let _ = cors_layer(&[]);
    }
}
