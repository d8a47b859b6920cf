use crate::config::LiveConfig;
use crate::error::VoiceError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type LiveSink = SplitSink<LiveSocket, Message>;
pub(crate) type LiveStream = SplitStream<LiveSocket>;

/// Opens the live WebSocket, authenticated with the configured key.
pub(crate) async fn connect(config: &LiveConfig) -> Result<(LiveSink, LiveStream), VoiceError> {
    if config.api_key.is_empty() {
        return Err(VoiceError::ConnectionFailure(
            "no API key configured for the live speech service".to_string(),
        ));
    }
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| VoiceError::ConnectionFailure(format!("invalid live url: {}", e)))?;
    let key = HeaderValue::from_str(&config.api_key)
        .map_err(|_| VoiceError::ConnectionFailure("API key is not a valid header".to_string()))?;
    request.headers_mut().insert("x-goog-api-key", key);

    let timeout = Duration::from_secs(config.connect_timeout_secs.max(1));
    let (socket, response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| VoiceError::ConnectionFailure("live connection timed out".to_string()))?
        .map_err(|e| VoiceError::ConnectionFailure(e.to_string()))?;
    tracing::debug!(status = %response.status(), "live socket open");
    Ok(socket.split())
}

/// What a received WebSocket message means to the session.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    Json(String),
    Closed(Option<String>),
    Ignore,
}

pub(crate) fn classify(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Json(text.to_string()),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Frame::Json(text),
            Err(_) => {
                tracing::warn!(len = bytes.len(), "non-UTF-8 binary frame from live service");
                Frame::Ignore
            }
        },
        Message::Close(frame) => Frame::Closed(frame.map(|f| f.reason.to_string())),
        _ => Frame::Ignore,
    }
}
