//! Error types for the transcription module

use crate::audio::AudioCaptureError;

/// WebSocket connection timeout in seconds
pub(super) const WS_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when starting a recognition session
#[derive(Debug, thiserror::Error)]
pub(crate) enum TranscriptionError {
    /// The host has no way to capture speech; listening never starts.
    #[error("Speech capture is unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Audio capture error: {0}")]
    Capture(#[from] AudioCaptureError),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error(
        "Connection timeout - the recognizer did not respond within {WS_CONNECT_TIMEOUT_SECS} seconds"
    )]
    ConnectionTimeout,
}
