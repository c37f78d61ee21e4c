/// All collaboration identifiers are opaque 128-bit tokens (UUID v4).
pub type Id = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
