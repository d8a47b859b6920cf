use genbridge_types::VoiceStatus;
use serde::Serialize;

/// Notifications published by a [`VoiceSessionManager`](crate::VoiceSessionManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    /// Emitted on every lifecycle transition.
    StatusChanged { active: bool, status: VoiceStatus },
    /// Recognized user speech, forwarded as it streams.
    LiveTranscription { text: String },
    /// Full assistant transcript after appending the latest fragment.
    AssistantTranscript { text: String },
    /// The model asked for a task to be created.
    TaskCreationRequested { description: String },
}

impl VoiceEvent {
    pub fn status(status: VoiceStatus) -> Self {
        VoiceEvent::StatusChanged {
            active: status.is_active(),
            status,
        }
    }
}
