//! Voice assistant for the GenBridge platform.
//!
//! Bridges a microphone and a speaker to a hosted real-time speech model:
//! captured audio is packed as 16-bit PCM and streamed out, synthesized
//! speech comes back in discrete segments that are scheduled back to back on
//! a running clock, and transcripts plus `create_task` tool calls are
//! published to the owner as typed [`VoiceEvent`]s.
//!
//! The device side is abstracted behind [`Microphone`] and [`AudioOutput`]
//! so the session can be driven by a local sound card or, as in the server,
//! by a remote browser over a WebSocket.
//!
//! ```rust,ignore
//! let manager = VoiceSessionManager::new(config, Arc::new(mic.clone()), output);
//! let mut events = manager.subscribe();
//! manager.start_session().await?;
//! while let Ok(event) = events.recv().await {
//!     if let VoiceEvent::TaskCreationRequested { description } = event {
//!         // hand off to the task pipeline
//!     }
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod event;
pub mod pcm;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod transcript;
mod transport;

pub use capture::{
    CaptureDevice, CaptureFormat, ChannelMicrophone, FrameAssembler, FrameQueue, Microphone,
};
pub use config::LiveConfig;
pub use error::VoiceError;
pub use event::VoiceEvent;
pub use playback::{AudioOutput, PlaybackScheduler, ScheduledSegment};
pub use session::VoiceSessionManager;
