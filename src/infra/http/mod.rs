//! HTTP surface: JSON routes over the fetch and export services.

mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use error::{ApiError, ApiErrorBody};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use state::AppState;

use axum::http::StatusCode;
use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use middleware::{log_responses, set_request_context};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/classes", get(handlers::list_catalog))
        .route("/api/bis/{class}/{spec}", get(handlers::get_all_phases))
        .route("/api/bis/{class}/{spec}/{phase}", get(handlers::get_phase))
        .route("/api/export", post(handlers::export))
        .route("/api/cache", delete(handlers::clear_cache))
        .route("/api/cache/keys", get(handlers::list_cache_keys))
        .route("/api/health", get(handlers::health))
        .fallback(not_found)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn not_found() -> ApiError {
    ApiError::new(
        "infra::http::router",
        StatusCode::NOT_FOUND,
        "Not found",
        "no route matched",
    )
}
