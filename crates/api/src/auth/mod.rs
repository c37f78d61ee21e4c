//! Authentication boundary.
//!
//! Token *issuance* belongs to the external auth service; this module only
//! validates access tokens so every connection reaches the engine with an
//! already-validated user id.

pub mod jwt;
