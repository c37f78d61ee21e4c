//! HTTP request handlers.

pub mod collaboration;
pub mod comments;
pub mod sessions;
