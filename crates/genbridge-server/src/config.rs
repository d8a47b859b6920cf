//! Server configuration loading from file and environment variables.

use genbridge_gateway::GatewayConfig;
use genbridge_voice::LiveConfig;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Hosted model endpoints and credential.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Voice session audio settings.
    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub tasks: TasksConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding a built web client, served at `/` when present.
    #[serde(default)]
    pub client_dir: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "genbridge_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Clone, Deserialize)]
pub struct GeminiConfig {
    /// Shared credential for the REST and live endpoints. Normally supplied
    /// through `GENBRIDGE_API_KEY` rather than the file.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_live_url")]
    pub live_url: String,

    #[serde(default = "default_classify_model")]
    pub classify_model: String,

    #[serde(default = "default_location_model")]
    pub location_model: String,

    #[serde(default = "default_classify_model")]
    pub summary_model: String,

    #[serde(default = "default_live_model")]
    pub live_model: String,

    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("live_url", &self.live_url)
            .field("classify_model", &self.classify_model)
            .field("location_model", &self.location_model)
            .field("summary_model", &self.summary_model)
            .field("live_model", &self.live_model)
            .field("voice_name", &self.voice_name)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default = "default_input_sample_rate")]
    pub input_sample_rate: u32,

    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,

    /// Samples per uploaded capture frame.
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,

    /// Capture frames buffered before the oldest is dropped.
    #[serde(default = "default_capture_queue_frames")]
    pub capture_queue_frames: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Overrides the assistant's built-in instruction when set.
    #[serde(default)]
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TasksConfig {
    /// Load the demo users and tasks at startup.
    #[serde(default = "default_true")]
    pub seed_demo_data: bool,

    /// Requester recorded when a non-elder creates a task.
    #[serde(default = "default_requester_id")]
    pub default_requester_id: String,

    /// Location recorded when no map link is found.
    #[serde(default = "default_fallback_location")]
    pub fallback_location: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    GatewayConfig::default().base_url
}

fn default_live_url() -> String {
    LiveConfig::default().url
}

fn default_classify_model() -> String {
    GatewayConfig::default().classify_model
}

fn default_location_model() -> String {
    GatewayConfig::default().location_model
}

fn default_live_model() -> String {
    LiveConfig::default().model
}

fn default_voice_name() -> String {
    LiveConfig::default().voice_name
}

fn default_request_timeout_secs() -> u64 {
    GatewayConfig::default().request_timeout_secs
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

fn default_true() -> bool {
    true
}

fn default_requester_id() -> String {
    genbridge_tasks::seed::DEMO_ELDER_ID.to_string()
}

fn default_fallback_location() -> String {
    "Your Neighborhood".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            live_url: default_live_url(),
            classify_model: default_classify_model(),
            location_model: default_location_model(),
            summary_model: default_classify_model(),
            live_model: default_live_model(),
            voice_name: default_voice_name(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: default_input_sample_rate(),
            output_sample_rate: default_output_sample_rate(),
            frame_size: default_frame_size(),
            capture_queue_frames: default_capture_queue_frames(),
            connect_timeout_secs: default_connect_timeout_secs(),
            system_instruction: None,
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            seed_demo_data: true,
            default_requester_id: default_requester_id(),
            fallback_location: default_fallback_location(),
        }
    }
}

impl Config {
    /// Settings for the REST gateway client.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            api_key: self.gemini.api_key.clone(),
            base_url: self.gemini.base_url.clone(),
            classify_model: self.gemini.classify_model.clone(),
            location_model: self.gemini.location_model.clone(),
            summary_model: self.gemini.summary_model.clone(),
            request_timeout_secs: self.gemini.request_timeout_secs,
        }
    }

    /// Template for every voice session the server opens.
    pub fn live_config(&self) -> LiveConfig {
        let mut live = LiveConfig::new(&self.gemini.live_url, &self.gemini.api_key);
        live.model = self.gemini.live_model.clone();
        live.voice_name = self.gemini.voice_name.clone();
        live.input_sample_rate = self.voice.input_sample_rate;
        live.output_sample_rate = self.voice.output_sample_rate;
        live.frame_size = self.voice.frame_size;
        live.capture_queue_frames = self.voice.capture_queue_frames;
        live.connect_timeout_secs = self.voice.connect_timeout_secs;
        if let Some(instruction) = &self.voice.system_instruction {
            live.system_instruction = instruction.clone();
        }
        live
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `GENBRIDGE_HOST` overrides `server.host`
/// - `GENBRIDGE_PORT` overrides `server.port`
/// - `GENBRIDGE_CLIENT_DIR` overrides `server.client_dir`
/// - `GENBRIDGE_LOG_LEVEL` overrides `logging.level`
/// - `GENBRIDGE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `GENBRIDGE_API_KEY`, or failing that `API_KEY`, overrides `gemini.api_key`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Some(host) = env("GENBRIDGE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("GENBRIDGE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(dir) = env("GENBRIDGE_CLIENT_DIR") {
        config.server.client_dir = Some(dir);
    }
    if let Some(level) = env("GENBRIDGE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("GENBRIDGE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(key) = env("GENBRIDGE_API_KEY")
        .or_else(|| env("API_KEY"))
        .filter(|k| !k.trim().is_empty())
    {
        config.gemini.api_key = key;
    }

    Ok(config)
}
