//! WebSocket voice control surface.
//!
//! Each connection gets its own [`VoiceSessionManager`]. The browser streams
//! microphone samples in and plays the audio segments sent back; voice
//! events are forwarded as JSON and `create_task` requests run through the
//! task pipeline on the connected user's behalf.

use crate::api_tasks::coordinates;
use crate::{controller, AppState};
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::future::{BoxFuture, OptionFuture};
use futures_util::{SinkExt, StreamExt};
use genbridge_gateway::Coordinates;
use genbridge_types::{Task, User, VoiceStatus};
use genbridge_voice::{
    pcm, AudioOutput, ChannelMicrophone, ScheduledSegment, VoiceError, VoiceEvent,
    VoiceSessionManager,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

/// Outbound messages buffered per connection before new ones are dropped.
const OUTBOUND_BUFFER: usize = 256;

/// Query parameters for `GET /ws/voice`.
#[derive(Debug, Deserialize)]
pub struct VoiceConnectParams {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Messages accepted from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceClientMessage {
    ToggleVoice,
    StartVoice,
    StopVoice,
    /// Whether the client has a usable capture device.
    Microphone { available: bool },
    /// Raw microphone samples in [-1, 1] at the input sample rate.
    AudioFrame { samples: Vec<f32> },
}

/// Messages sent to the client.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum VoiceServerMessage {
    #[serde(rename = "voice_status")]
    VoiceStatus {
        #[serde(rename = "isActive")]
        is_active: bool,
        status: VoiceStatus,
    },
    #[serde(rename = "live_transcription")]
    LiveTranscription { text: String },
    #[serde(rename = "assistant_transcript")]
    AssistantTranscript { text: String },
    #[serde(rename = "task_creation_requested")]
    TaskCreationRequested { description: String },
    #[serde(rename = "task_created")]
    TaskCreated { task: Task },
    /// The request could not be turned into a task.
    #[serde(rename = "task_rejected")]
    TaskRejected { description: String },
    /// Synthesized speech to play at `startAt` seconds on the session clock.
    #[serde(rename = "audio_segment")]
    AudioSegment {
        id: u64,
        #[serde(rename = "startAt")]
        start_at: f64,
        duration: f64,
        #[serde(rename = "sampleRate")]
        sample_rate: u32,
        data: String,
    },
    /// Stop everything queued or playing.
    #[serde(rename = "audio_halt")]
    AudioHalt,
    #[serde(rename = "error")]
    Error { message: String },
}

impl From<VoiceEvent> for VoiceServerMessage {
    fn from(event: VoiceEvent) -> Self {
        match event {
            VoiceEvent::StatusChanged { active, status } => VoiceServerMessage::VoiceStatus {
                is_active: active,
                status,
            },
            VoiceEvent::LiveTranscription { text } => VoiceServerMessage::LiveTranscription { text },
            VoiceEvent::AssistantTranscript { text } => {
                VoiceServerMessage::AssistantTranscript { text }
            }
            VoiceEvent::TaskCreationRequested { description } => {
                VoiceServerMessage::TaskCreationRequested { description }
            }
        }
    }
}

fn send_json(tx: &mpsc::Sender<String>, message: &VoiceServerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if let Err(e) = tx.try_send(json) {
                tracing::warn!("failed to queue voice message for client: {}", e);
            }
        }
        Err(e) => {
            tracing::error!("failed to serialize voice message: {}", e);
        }
    }
}

/// Plays response audio by forwarding it to the browser.
struct SocketOutput {
    tx: mpsc::Sender<String>,
}

impl AudioOutput for SocketOutput {
    fn play(&self, segment: &ScheduledSegment, samples: &[f32], sample_rate: u32) {
        send_json(
            &self.tx,
            &VoiceServerMessage::AudioSegment {
                id: segment.id,
                start_at: segment.start,
                duration: segment.duration(),
                sample_rate,
                data: pcm::encode_frame(samples),
            },
        );
    }

    fn halt(&self) {
        send_json(&self.tx, &VoiceServerMessage::AudioHalt);
    }
}

/// Handler for `GET /ws/voice?userId=`.
pub async fn voice_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<VoiceConnectParams>,
) -> impl IntoResponse {
    let Some(user) = state.users.get(&params.user_id).cloned() else {
        tracing::warn!(user_id = %params.user_id, "voice connect for unknown user");
        return StatusCode::NOT_FOUND.into_response();
    };
    let near = coordinates(params.latitude, params.longitude);
    tracing::info!(user_id = %user.id, "voice client connected");
    ws.on_upgrade(move |socket| handle_socket(socket, state, user, near))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: User, near: Option<Coordinates>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let microphone = ChannelMicrophone::new(false);
    let manager = Arc::new(VoiceSessionManager::new(
        (*state.live).clone(),
        Arc::new(microphone.clone()),
        Arc::new(SocketOutput { tx: tx.clone() }),
    ));
    let pump_task = tokio::spawn(pump_events(
        manager.subscribe(),
        tx.clone(),
        state.clone(),
        user.clone(),
        near,
    ));

    // Polled ahead of inbound messages so a stop that follows a start
    // always sees the session connecting.
    let mut starting: Option<BoxFuture<'static, Result<(), VoiceError>>> = None;

    loop {
        tokio::select! {
            biased;

            Some(result) = OptionFuture::from(starting.as_mut()), if starting.is_some() => {
                starting = None;
                report_start(&tx, result);
            }
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(AxumMessage::Text(text))) => text,
                    Some(Ok(AxumMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let message = match serde_json::from_str::<VoiceClientMessage>(text.as_str()) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::debug!(user_id = %user.id, "bad voice message: {}", e);
                        send_json(&tx, &VoiceServerMessage::Error {
                            message: "unrecognized message".to_string(),
                        });
                        continue;
                    }
                };
                match message {
                    VoiceClientMessage::AudioFrame { samples } => {
                        microphone.push_samples(&samples);
                    }
                    VoiceClientMessage::Microphone { available } => {
                        microphone.set_available(available);
                    }
                    VoiceClientMessage::StartVoice => {
                        if starting.is_none() {
                            starting = Some(start(&manager));
                        }
                    }
                    VoiceClientMessage::StopVoice => manager.stop_session().await,
                    VoiceClientMessage::ToggleVoice => {
                        if starting.is_some() || manager.is_active() {
                            manager.stop_session().await;
                        } else {
                            starting = Some(start(&manager));
                        }
                    }
                }
            }
        }
    }

    drop(starting);
    manager.stop_session().await;
    pump_task.abort();
    send_task.abort();
    tracing::info!(user_id = %user.id, "voice client disconnected");
}

fn start(manager: &Arc<VoiceSessionManager>) -> BoxFuture<'static, Result<(), VoiceError>> {
    let manager = manager.clone();
    Box::pin(async move { manager.start_session().await })
}

fn report_start(tx: &mpsc::Sender<String>, result: Result<(), VoiceError>) {
    match result {
        Ok(()) | Err(VoiceError::Cancelled) => {}
        Err(e) => send_json(tx, &VoiceServerMessage::Error { message: e.to_string() }),
    }
}

/// Forwards voice events to the client and runs requested task creations.
///
/// Creations still pending when the session goes idle are abandoned.
async fn pump_events(
    mut events: broadcast::Receiver<VoiceEvent>,
    tx: mpsc::Sender<String>,
    state: Arc<AppState>,
    user: User,
    near: Option<Coordinates>,
) {
    let mut creations: JoinSet<(String, Option<Task>)> = JoinSet::new();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    match &event {
                        VoiceEvent::StatusChanged { status: VoiceStatus::Idle, .. } => {
                            if !creations.is_empty() {
                                tracing::debug!(pending = creations.len(), "abandoning voice task creations");
                                creations.abort_all();
                            }
                        }
                        VoiceEvent::TaskCreationRequested { description } => {
                            let description = description.clone();
                            let state = state.clone();
                            let user = user.clone();
                            creations.spawn(async move {
                                let task = match controller::create_task(&state, &user, &description, near).await {
                                    Ok(task) => task,
                                    Err(e) => {
                                        tracing::warn!(error = %e, "voice task creation failed");
                                        None
                                    }
                                };
                                (description, task)
                            });
                        }
                        _ => {}
                    }
                    send_json(&tx, &VoiceServerMessage::from(event));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "voice event consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(done) = creations.join_next(), if !creations.is_empty() => match done {
                Ok((_, Some(task))) => send_json(&tx, &VoiceServerMessage::TaskCreated { task }),
                Ok((description, None)) => {
                    send_json(&tx, &VoiceServerMessage::TaskRejected { description })
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => tracing::warn!("voice task creation panicked: {}", e),
            },
        }
    }
}
