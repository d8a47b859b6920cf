//! Voice assistant status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a voice assistant session.
///
/// `Idle → Connecting → Listening ⇄ Speaking → Idle`; stop or error returns
/// to `Idle` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStatus {
    /// No connection, microphone not captured.
    #[default]
    Idle,
    /// Handshake with the speech service in progress.
    Connecting,
    /// Microphone audio is being streamed.
    Listening,
    /// Synthesized speech is playing back.
    Speaking,
}

impl VoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
        }
    }

    /// Whether a session exists in this state.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for VoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
