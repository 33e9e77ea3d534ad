//! Administrative cache surface.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use super::middleware::{log_responses, rate_limit, set_request_context};

mod cache;
mod health;
mod state;

pub use state::AdminState;

/// `/health` is exempt from rate limiting; every `/cache` route is limited.
pub fn build_admin_router(state: AdminState) -> Router {
    let limiter = state.rate_limiter.clone();

    let cache_routes = Router::new()
        .route(
            "/cache",
            get(cache::cache_stats)
                .delete(cache::clear_cache)
                .post(cache::warm_cache),
        )
        .route("/cache/sweep", post(cache::sweep_cache))
        .layer(middleware::from_fn_with_state(limiter, rate_limit));

    Router::new()
        .route("/health", get(health::admin_health))
        .merge(cache_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
