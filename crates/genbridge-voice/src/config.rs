use serde::{Deserialize, Serialize};
use std::fmt;

fn default_url() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-native-audio-preview-12-2025".to_string()
}

fn default_voice_name() -> String {
    "Kore".to_string()
}

fn default_system_instruction() -> String {
    "You are GenBridge Assistant. Listen carefully to elder residents and help them scribe help requests.".to_string()
}

fn default_input_sample_rate() -> u32 {
    16_000
}

fn default_output_sample_rate() -> u32 {
    24_000
}

fn default_frame_size() -> usize {
    4096
}

fn default_capture_queue_frames() -> usize {
    8
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Settings for the live speech connection and local audio handling.
#[derive(Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// WebSocket endpoint of the bidirectional streaming API.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    /// Microphone sample rate in Hz. Default: 16000.
    #[serde(default = "default_input_sample_rate")]
    pub input_sample_rate: u32,
    /// Sample rate assumed for response audio without a rate tag. Default: 24000.
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
    /// Samples per uploaded capture frame. Default: 4096.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    /// Capture frames buffered before the oldest is dropped. Default: 8.
    #[serde(default = "default_capture_queue_frames")]
    pub capture_queue_frames: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_url(),
            model: default_model(),
            voice_name: default_voice_name(),
            system_instruction: default_system_instruction(),
            input_sample_rate: default_input_sample_rate(),
            output_sample_rate: default_output_sample_rate(),
            frame_size: default_frame_size(),
            capture_queue_frames: default_capture_queue_frames(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConfig")
            .field("api_key", &"[REDACTED]")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("voice_name", &self.voice_name)
            .field("input_sample_rate", &self.input_sample_rate)
            .field("output_sample_rate", &self.output_sample_rate)
            .field("frame_size", &self.frame_size)
            .field("capture_queue_frames", &self.capture_queue_frames)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl LiveConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Model resource name as the API expects it (`models/...`).
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }
}
