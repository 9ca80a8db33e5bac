//! MindFlow customers API.
//!
//! Exposes the Customers context over HTTP. The binary in `main.rs` wires a
//! PostgreSQL-backed `AppState` into [`app`].

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use state::AppState;

/// Builds the full application router.
pub fn app(app_state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with the frontend origin once it is configurable.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/customers", routes::customers::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
