//! Cowrite domain layer.
//!
//! This crate holds everything the persistence layer, the API server, and
//! future tooling need to share: identifier and timestamp aliases, the
//! domain error taxonomy, collaboration constants and validation, the
//! WebSocket message protocol, and the pure conflict resolver. It has no
//! internal dependencies.

pub mod change;
pub mod collaboration;
pub mod conflict;
pub mod error;
pub mod fieldpath;
pub mod protocol;
pub mod types;
