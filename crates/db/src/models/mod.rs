//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - `FromRow` + `Serialize` entity structs matching the database rows
//! - `Deserialize` DTOs for the write paths
//!
//! Status-like columns are stored as TEXT and validated against the
//! vocabularies in `cowrite_core::collaboration`.

pub mod change;
pub mod comment;
pub mod lock;
pub mod presence;
pub mod session;
