//! Collaboration services.
//!
//! Each service owns a database pool handle plus the event bus and pairs a
//! repository write with the matching typed event publish. The connection
//! hub's fan-out task (see [`crate::fanout`]) turns those events into
//! WebSocket frames.

pub mod comments;
pub mod coordinator;
pub mod locks;
pub mod presence;
pub mod sessions;

pub use comments::CommentService;
pub use coordinator::{ApplyChangeInput, ApplyOutcome, ChangeCoordinator};
pub use locks::LockRegistry;
pub use presence::PresenceTracker;
pub use sessions::SessionManager;

/// Serialize a model into an event payload.
fn payload<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
