use serde::{Deserialize, Serialize};
use std::fmt;

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_classify_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_location_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// REST root, up to and including the API version segment.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_classify_model")]
    pub classify_model: String,
    #[serde(default = "default_location_model")]
    pub location_model: String,
    #[serde(default = "default_classify_model")]
    pub summary_model: String,
    /// Whole-request timeout applied by the HTTP client. Default: 30.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            classify_model: default_classify_model(),
            location_model: default_location_model(),
            summary_model: default_classify_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("classify_model", &self.classify_model)
            .field("location_model", &self.location_model)
            .field("summary_model", &self.summary_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
