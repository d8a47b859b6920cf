use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoiceError {
    /// The user declined microphone access or no capture device exists.
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    /// Handshake or mid-session transport failure.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("audio codec error: {0}")]
    Codec(String),

    /// The session was stopped before it finished starting.
    #[error("session start cancelled")]
    Cancelled,
}
