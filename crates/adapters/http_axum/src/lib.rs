//! # homeport-adapter-http-axum
//!
//! HTTP module built on [axum](https://docs.rs/axum).
//!
//! ## Routes
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /health` | Liveness probe |
//! | `GET /api/configuration` | JSON snapshot of the live entity tree |
//! | `GET`, `PUT /api/services/{adapter}/{device}/{service}` | Issues a hub request and maps the response onto HTTP |
//! | `GET /api/events` | SSE stream of value changes and device arrivals and departures |
//!
//! ## Dependency rule
//! Depends on `homeport-app` for the module trait and the hub handle, and on
//! `homeport-domain` for the types mapped onto HTTP. Handlers only reach the
//! hub through its handle.

pub mod api;
pub mod error;
mod module;
pub mod router;
pub mod state;

pub use module::{MODULE_ID, RestModule};
