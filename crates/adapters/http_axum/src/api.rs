//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod configuration;
pub mod events;
#[allow(clippy::missing_errors_doc)]
pub mod services;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/configuration", get(configuration::get))
        .route(
            "/services/{adapter}/{device}/{service}",
            get(services::get).put(services::put),
        )
        .route("/events", get(events::stream))
}
