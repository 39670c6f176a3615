//! Error types for the solace interaction core.

/// Top-level error type for the tap-to-talk pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SolaceError {
    /// Capture device or recognition error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech playback error.
    #[error("playback error: {0}")]
    Playback(String),

    /// Reply endpoint failure. Never escapes the reply client, which
    /// substitutes the configured fallback text instead.
    #[error("reply error: {0}")]
    Reply(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SolaceError>;
