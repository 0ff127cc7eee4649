//! Router configuration for the ticket API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::auth;
use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/create-ticket", post(handlers::create_ticket))
        .route("/get-token", get(handlers::get_token))
        // Push channel: subscribers receive completed ticket ids
        .route("/notify", get(handlers::notify_ws))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .merge(protected)
        .route("/healthz", get(handlers::healthz))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
