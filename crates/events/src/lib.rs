//! Cowrite event bus.
//!
//! This crate provides the EventBroadcaster seam between the collaboration
//! services and the connection hub:
//!
//! - [`CollabEvent`] — the canonical typed event envelope.
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//!
//! Services publish; the API server's fan-out task subscribes and delivers
//! through the connection hub.

pub mod bus;

pub use bus::{CollabEvent, EventBus};
