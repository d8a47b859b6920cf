//! Voice session lifecycle.
//!
//! A [`VoiceSessionManager`] owns at most one live session. Starting one
//! acquires the microphone, opens the live socket and sends the setup
//! message; from then on a single actor task owns all per-session state and
//! multiplexes capture frames, inbound socket messages, playback-finished
//! timers and the stop signal. Stopping or losing the connection tears the
//! whole state down and returns to [`VoiceStatus::Idle`].

use crate::capture::{CaptureDevice, CaptureFormat, FrameQueue, Microphone};
use crate::config::LiveConfig;
use crate::error::VoiceError;
use crate::event::VoiceEvent;
use crate::pcm;
use crate::playback::{AudioOutput, PlaybackScheduler};
use crate::protocol::{self, ClientMessage, Inbound, CREATE_TASK_FUNCTION};
use crate::transcript::TranscriptBuffer;
use crate::transport::{self, Frame, LiveSink, LiveStream};
use futures_util::{SinkExt, StreamExt};
use genbridge_types::VoiceStatus;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

const EVENT_CAPACITY: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

enum Slot {
    Idle,
    Connecting {
        generation: u64,
        stop: watch::Sender<bool>,
        /// Parked here so a stop during the handshake can release it.
        capture: Option<Box<dyn CaptureDevice>>,
    },
    Running {
        generation: u64,
        stop: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
}

impl Slot {
    fn generation(&self) -> Option<u64> {
        match self {
            Slot::Idle => None,
            Slot::Connecting { generation, .. } | Slot::Running { generation, .. } => {
                Some(*generation)
            }
        }
    }
}

struct Shared {
    slot: Mutex<Slot>,
    status: Mutex<VoiceStatus>,
    events: broadcast::Sender<VoiceEvent>,
    generation: AtomicU64,
}

// Lock order: slot, then status.
impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn status(&self) -> VoiceStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: VoiceStatus) {
        let mut current = self.status.lock().unwrap_or_else(|e| e.into_inner());
        self.replace_status(&mut current, status);
    }

    fn replace_status(&self, current: &mut VoiceStatus, status: VoiceStatus) {
        if *current == status {
            return;
        }
        let previous = std::mem::replace(current, status);
        tracing::debug!(from = %previous, to = %status, "voice status");
        let _ = self.events.send(VoiceEvent::status(status));
    }

    /// Status change made by the actor of `generation`.
    ///
    /// Ignored once the slot belongs to another session or to none, and,
    /// when `from` is given, unless the current status is `from`.
    fn actor_status(&self, generation: u64, from: Option<VoiceStatus>, to: VoiceStatus) -> bool {
        let slot = self.lock_slot();
        if slot.generation() != Some(generation) {
            tracing::trace!(generation, to = %to, "stale voice status change ignored");
            return false;
        }
        let mut current = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if from.is_some_and(|from| *current != from) {
            return false;
        }
        self.replace_status(&mut current, to);
        true
    }

    fn emit(&self, event: VoiceEvent) {
        let _ = self.events.send(event);
    }

    /// Gives up a start attempt that has not reached the running state.
    fn abandon(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot.generation() != Some(generation) {
            return;
        }
        if let Slot::Connecting {
            capture: Some(mut capture),
            ..
        } = std::mem::replace(&mut *slot, Slot::Idle)
        {
            capture.release();
        }
        self.set_status(VoiceStatus::Idle);
    }

    /// Clears the slot if it still belongs to `generation`.
    fn finish(&self, generation: u64) {
        let mut slot = self.lock_slot();
        if slot.generation() == Some(generation) {
            *slot = Slot::Idle;
            self.set_status(VoiceStatus::Idle);
        }
    }

    fn settle_idle(&self) {
        let slot = self.lock_slot();
        if matches!(*slot, Slot::Idle) {
            self.set_status(VoiceStatus::Idle);
        }
    }
}

/// Owns the voice assistant session for one user.
pub struct VoiceSessionManager {
    config: Arc<LiveConfig>,
    microphone: Arc<dyn Microphone>,
    output: Arc<dyn AudioOutput>,
    shared: Arc<Shared>,
}

impl VoiceSessionManager {
    pub fn new(
        config: LiveConfig,
        microphone: Arc<dyn Microphone>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config: Arc::new(config),
            microphone,
            output,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Idle),
                status: Mutex::new(VoiceStatus::Idle),
                events,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> VoiceStatus {
        self.shared.status()
    }

    /// Whether a session exists, including one still connecting.
    pub fn is_active(&self) -> bool {
        !matches!(*self.shared.lock_slot(), Slot::Idle)
    }

    /// Starts a session. A no-op if one is already starting or running.
    ///
    /// # Errors
    ///
    /// - [`VoiceError::PermissionDenied`] if the microphone cannot be acquired.
    /// - [`VoiceError::ConnectionFailure`] if the live socket cannot be opened.
    /// - [`VoiceError::Cancelled`] if [`stop_session`](Self::stop_session)
    ///   ran before the handshake finished.
    ///
    /// Every failure leaves the manager idle with the microphone released.
    pub async fn start_session(&self) -> Result<(), VoiceError> {
        let (generation, mut stop_rx) = {
            let mut slot = self.shared.lock_slot();
            if !matches!(*slot, Slot::Idle) {
                tracing::debug!("voice session already active");
                return Ok(());
            }
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let (stop, stop_rx) = watch::channel(false);
            *slot = Slot::Connecting {
                generation,
                stop,
                capture: None,
            };
            self.shared.set_status(VoiceStatus::Connecting);
            (generation, stop_rx)
        };
        tracing::info!(generation, "starting voice session");

        let format = CaptureFormat {
            sample_rate: self.config.input_sample_rate,
            frame_size: self.config.frame_size,
        };
        let acquired = tokio::select! {
            result = self.microphone.acquire(format) => result,
            _ = stop_rx.changed() => return Err(VoiceError::Cancelled),
        };
        let capture = match acquired {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(error = %e, "microphone unavailable");
                self.shared.abandon(generation);
                return Err(e);
            }
        };

        {
            let mut slot = self.shared.lock_slot();
            match &mut *slot {
                Slot::Connecting {
                    generation: current,
                    capture: parked,
                    ..
                } if *current == generation => *parked = Some(capture),
                _ => {
                    let mut capture = capture;
                    capture.release();
                    return Err(VoiceError::Cancelled);
                }
            }
        }

        let connected = tokio::select! {
            result = transport::connect(&self.config) => result,
            _ = stop_rx.changed() => return Err(VoiceError::Cancelled),
        };
        let (mut sink, stream) = match connected {
            Ok(halves) => halves,
            Err(e) => {
                tracing::warn!(error = %e, "live connection failed");
                self.shared.abandon(generation);
                return Err(e);
            }
        };
        if let Err(e) = send(&mut sink, &protocol::setup(&self.config)).await {
            tracing::warn!(error = %e, "failed to send session setup");
            self.shared.abandon(generation);
            return Err(e);
        }

        let mut slot = self.shared.lock_slot();
        let (stop, mut capture) = match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Connecting {
                generation: current,
                stop,
                capture: Some(capture),
            } if current == generation => (stop, capture),
            other => {
                *slot = other;
                tracing::debug!(generation, "voice session stopped during handshake");
                return Err(VoiceError::Cancelled);
            }
        };

        let queue = FrameQueue::new(self.config.capture_queue_frames);
        if let Err(e) = capture.start(queue.clone()) {
            capture.release();
            self.shared.set_status(VoiceStatus::Idle);
            return Err(e);
        }
        self.shared.set_status(VoiceStatus::Listening);

        let actor = SessionActor {
            generation,
            config: self.config.clone(),
            shared: self.shared.clone(),
            output: self.output.clone(),
            capture,
            queue,
            sink,
            stream,
            scheduler: PlaybackScheduler::new(),
            transcript: TranscriptBuffer::new(),
            timers: JoinSet::new(),
            clock_origin: Instant::now(),
        };
        let handle = tokio::spawn(actor.run(stop_rx));
        *slot = Slot::Running {
            generation,
            stop,
            handle,
        };
        tracing::info!(generation, "voice session listening");
        Ok(())
    }

    /// Stops the current session and waits for its teardown. A no-op when
    /// idle.
    pub async fn stop_session(&self) {
        let previous = std::mem::replace(&mut *self.shared.lock_slot(), Slot::Idle);
        match previous {
            Slot::Idle => return,
            Slot::Connecting {
                generation,
                stop,
                capture,
            } => {
                tracing::info!(generation, "cancelling voice session handshake");
                let _ = stop.send(true);
                if let Some(mut capture) = capture {
                    capture.release();
                }
            }
            Slot::Running {
                generation,
                stop,
                handle,
            } => {
                tracing::info!(generation, "stopping voice session");
                let _ = stop.send(true);
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "voice session task ended abnormally");
                }
            }
        }
        self.shared.settle_idle();
    }

    /// Stops an active session or starts a new one.
    pub async fn toggle(&self) -> Result<(), VoiceError> {
        if self.is_active() {
            self.stop_session().await;
            Ok(())
        } else {
            self.start_session().await
        }
    }
}

impl Drop for VoiceSessionManager {
    fn drop(&mut self) {
        match std::mem::replace(&mut *self.shared.lock_slot(), Slot::Idle) {
            Slot::Idle => {}
            Slot::Connecting { stop, capture, .. } => {
                let _ = stop.send(true);
                if let Some(mut capture) = capture {
                    capture.release();
                }
            }
            Slot::Running { stop, .. } => {
                let _ = stop.send(true);
            }
        }
    }
}

async fn send(sink: &mut LiveSink, message: &ClientMessage) -> Result<(), VoiceError> {
    let json = message.to_json()?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| VoiceError::ConnectionFailure(e.to_string()))
}

/// Per-session state, owned by the session task.
struct SessionActor {
    generation: u64,
    config: Arc<LiveConfig>,
    shared: Arc<Shared>,
    output: Arc<dyn AudioOutput>,
    capture: Box<dyn CaptureDevice>,
    queue: FrameQueue,
    sink: LiveSink,
    stream: LiveStream,
    scheduler: PlaybackScheduler,
    transcript: TranscriptBuffer,
    /// One sleeper per playing segment, yielding the segment id when its
    /// scheduled end passes.
    timers: JoinSet<u64>,
    clock_origin: Instant,
}

impl SessionActor {
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let reason = loop {
            tokio::select! {
                _ = stop.changed() => break "stopped",
                frame = self.queue.pop() => match frame {
                    Some(samples) => {
                        let chunk = protocol::audio_chunk(&samples, self.config.input_sample_rate);
                        if let Err(e) = send(&mut self.sink, &chunk).await {
                            tracing::warn!(error = %e, "failed to forward audio");
                            break "send failed";
                        }
                    }
                    None => break "capture closed",
                },
                message = self.stream.next() => match message {
                    Some(Ok(message)) => match transport::classify(message) {
                        Frame::Json(text) => {
                            if let Err(e) = self.handle_message(&text).await {
                                tracing::warn!(error = %e, "live session failed");
                                break "send failed";
                            }
                        }
                        Frame::Closed(close_reason) => {
                            tracing::info!(reason = ?close_reason, "live service closed the session");
                            break "closed by server";
                        }
                        Frame::Ignore => {}
                    },
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "live connection error");
                        break "connection error";
                    }
                    None => break "connection ended",
                },
                Some(finished) = self.timers.join_next(), if !self.timers.is_empty() => {
                    if let Ok(id) = finished {
                        self.segment_finished(id);
                    }
                }
            }
        };
        self.teardown(reason).await;
    }

    /// Handles one server frame. An error means the session cannot continue.
    async fn handle_message(&mut self, text: &str) -> Result<(), VoiceError> {
        let events = match protocol::parse_server_message(text) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unparseable server message");
                return Ok(());
            }
        };
        for event in events {
            match event {
                Inbound::SetupComplete => tracing::debug!("live setup complete"),
                Inbound::InputTranscript(text) => {
                    self.shared.emit(VoiceEvent::LiveTranscription { text });
                }
                Inbound::OutputTranscript(fragment) => {
                    let text = self.transcript.append(&fragment).to_string();
                    self.shared.emit(VoiceEvent::AssistantTranscript { text });
                }
                Inbound::Interrupted => self.interrupt(),
                Inbound::Audio(blob) => self.play(&blob.mime_type, &blob.data),
                Inbound::ToolCall { id, name, args } => {
                    self.handle_tool_call(&id, &name, &args).await?;
                }
                Inbound::TurnComplete => tracing::trace!("model turn complete"),
            }
        }
        Ok(())
    }

    async fn handle_tool_call(&mut self, id: &str, name: &str, args: &Value) -> Result<(), VoiceError> {
        let result = if name != CREATE_TASK_FUNCTION {
            tracing::warn!(function = name, "model called an unknown function");
            Err("unknown function")
        } else if let Some(description) = protocol::task_description(args) {
            tracing::info!(function = name, "task creation requested by voice");
            self.shared
                .emit(VoiceEvent::TaskCreationRequested { description });
            Ok("Task creation requested.")
        } else {
            tracing::warn!(function = name, "function call without a description");
            Err("description is required")
        };
        send(&mut self.sink, &protocol::tool_response(id, name, result)).await
    }

    fn play(&mut self, mime_type: &str, data: &str) {
        let samples = match pcm::decode_segment(data) {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable audio segment");
                return;
            }
        };
        let rate = pcm::sample_rate_from_mime(mime_type).unwrap_or(self.config.output_sample_rate);
        let now = self.clock_origin.elapsed().as_secs_f64();
        let segment = self
            .scheduler
            .schedule(now, pcm::duration_secs(samples.len(), rate));
        self.output.play(&segment, &samples, rate);

        let deadline = self.clock_origin + Duration::from_secs_f64(segment.end);
        let id = segment.id;
        self.timers.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            id
        });
        self.shared
            .actor_status(self.generation, None, VoiceStatus::Speaking);
    }

    fn segment_finished(&mut self, id: u64) {
        if self.scheduler.finish(id) {
            self.shared.actor_status(
                self.generation,
                Some(VoiceStatus::Speaking),
                VoiceStatus::Listening,
            );
        }
    }

    fn interrupt(&mut self) {
        tracing::debug!(in_flight = self.scheduler.in_flight(), "playback interrupted");
        self.output.halt();
        self.timers = JoinSet::new();
        self.scheduler.clear();
        self.shared.actor_status(
            self.generation,
            Some(VoiceStatus::Speaking),
            VoiceStatus::Listening,
        );
    }

    async fn teardown(mut self, reason: &str) {
        tracing::info!(generation = self.generation, reason, "voice session ending");
        self.output.halt();
        self.timers.abort_all();
        self.scheduler.clear();
        self.queue.close();
        self.capture.release();
        if self.queue.dropped() > 0 {
            tracing::debug!(dropped = self.queue.dropped(), "capture frames dropped this session");
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, self.sink.close())
            .await
            .is_err()
        {
            tracing::debug!("live socket close timed out");
        }
        self.shared.finish(self.generation);
    }
}
