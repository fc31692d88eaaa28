//! Error types for the recognition module

/// WebSocket connection timeout in seconds
pub(super) const WS_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur while running a transcription session
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("Speech recognition unavailable: {0}")]
    Unsupported(String),

    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(
        "Connection timeout - the transcription service did not respond within {WS_CONNECT_TIMEOUT_SECS} seconds"
    )]
    ConnectionTimeout,
}
