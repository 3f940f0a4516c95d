use axum::Router;
use tower_http::compression::CompressionLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/leaderboard",
            axum::routing::get(routes::api::get_leaderboard),
        )
        .route(
            "/api/participants/{id}/stats",
            axum::routing::get(routes::api::get_participant_stats),
        )
        .route("/api/refresh", axum::routing::post(routes::api::refresh))
        .route("/api/health", axum::routing::get(routes::api::health))
        .route("/api/metrics", axum::routing::get(routes::api::metrics))
        .layer(CompressionLayer::new())
        .with_state(state)
}
