use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway is not configured: missing API key")]
    NotConfigured,

    #[error("gateway unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}
