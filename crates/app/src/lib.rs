//! # homeport-app
//!
//! Controller runtime: everything that turns the pure model of
//! `homeport-domain` into a running hub.
//!
//! ## Responsibilities
//! - **Task Marshal** ([`marshal`]): thread-safe queues plus a wake signal
//!   that serialize all work onto the controller thread
//! - **Controller** ([`hub::Hub`]): owns the entity store and the listener
//!   registry, drains the marshal and dispatches each item
//! - **Cross-thread handle** ([`handle::HubHandle`]): the only way other
//!   threads talk to the controller
//! - **Listener Registry** ([`listener`]) and notification fan-out
//! - **Request/Response Engine** ([`engine`])
//! - **Module lifecycle** ([`module::Module`], [`daemon::Daemon`])
//!
//! ## Dependency rule
//! Depends on `homeport-domain` only (plus `tokio` for the wake signal and
//! the reactor). Never imports adapter crates. Adapters depend on *this*
//! crate, not the reverse.

pub mod daemon;
pub mod engine;
pub mod handle;
pub mod hub;
pub mod listener;
pub mod marshal;
pub mod module;
