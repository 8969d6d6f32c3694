//! Error types for aviplayer.

/// Errors raised by the playback controller and audio drivers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("audio driver error: {0}")]
    Driver(String),

    #[error("worker thread error: {0}")]
    Thread(#[from] std::io::Error),
}

/// Specialized Result type for aviplayer.
pub type Result<T> = std::result::Result<T, Error>;
