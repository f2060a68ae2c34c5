//! # homeport-domain
//!
//! Core model of the homeport hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, attribute maps
//! - Define the entity hierarchy **Adapter → Device → Service → Parameter**
//!   as owned, standalone values ([`model`])
//! - Hold the live hierarchy in an arena-backed [`store::Store`] and enforce
//!   its structural invariants (sibling uniqueness, attach/detach lifecycle)
//! - Define **Identity References** ([`reference`]) that address entities by
//!   path without pointing into the store
//! - Define **Values**, **Methods**, **Statuses** and the
//!   **Request/Response** transaction types
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and no runtime.
//! Threading, queues and dispatch live in `homeport-app`.

pub mod attribute;
pub mod error;
pub mod id;
pub mod method;
pub mod model;
pub mod reference;
pub mod request;
pub mod status;
pub mod store;
pub mod value;

mod arena;
