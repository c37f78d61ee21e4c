//! WebSocket infrastructure for real-time communication.
//!
//! Provides the connection hub, heartbeat monitoring, and the HTTP upgrade
//! handler with the inbound message dispatch loop.

mod handler;
mod heartbeat;
pub mod hub;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use hub::ConnectionHub;
