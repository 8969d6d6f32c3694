//! Error types for avigeo.

/// Errors raised while building route data or parsing GPS fixes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid zone geometry: {0}")]
    InvalidZone(String),

    #[error("unsupported play mode: {0}")]
    UnsupportedMode(u8),

    #[error("duplicate frame id: {0}")]
    DuplicateFrameId(i32),

    #[error("child frame id collides with a main frame id: {0}")]
    ChildIdCollision(i32),

    #[error("malformed GPS fix line: {0:?}")]
    MalformedFix(String),
}

/// Specialized Result type for avigeo.
pub type Result<T> = std::result::Result<T, Error>;
