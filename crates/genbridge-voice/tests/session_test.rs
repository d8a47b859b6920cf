use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use genbridge_types::VoiceStatus;
use genbridge_voice::{
    pcm, AudioOutput, ChannelMicrophone, LiveConfig, ScheduledSegment, VoiceError, VoiceEvent,
    VoiceSessionManager,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

const WAIT: Duration = Duration::from_secs(5);

struct MockState {
    from_client: mpsc::UnboundedSender<Value>,
    to_client: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
}

/// A stand-in for the live speech endpoint: records every JSON message the
/// client sends and forwards whatever the test pushes.
struct MockLive {
    url: String,
    from_client: mpsc::UnboundedReceiver<Value>,
    to_client: mpsc::UnboundedSender<Message>,
}

impl MockLive {
    async fn spawn() -> Self {
        let (from_tx, from_rx) = mpsc::unbounded_channel();
        let (to_tx, to_rx) = mpsc::unbounded_channel();
        let state = Arc::new(MockState {
            from_client: from_tx,
            to_client: Mutex::new(Some(to_rx)),
        });
        let app = Router::new()
            .route("/live", get(live_handler))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            url: format!("ws://{}/live", addr),
            from_client: from_rx,
            to_client: to_tx,
        }
    }

    fn send(&self, value: Value) {
        self.to_client
            .send(Message::Text(value.to_string().into()))
            .unwrap();
    }

    fn close(&self) {
        self.to_client.send(Message::Close(None)).unwrap();
    }

    async fn next(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for client message")
            .expect("mock server gone")
    }

    /// Skips streamed audio chunks.
    async fn next_non_audio(&mut self) -> Value {
        loop {
            let value = self.next().await;
            if value.get("realtimeInput").is_none() {
                return value;
            }
        }
    }
}

async fn live_handler(ws: WebSocketUpgrade, State(state): State<Arc<MockState>>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: Arc<MockState>) {
    let outgoing = state.to_client.lock().unwrap().take();
    let Some(mut outgoing) = outgoing else {
        return;
    };
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str()).unwrap();
                    let _ = state.from_client.send(value);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            out = outgoing.recv() => match out {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if socket.send(message).await.is_err() || closing {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

#[derive(Default)]
struct RecordingOutput {
    played: Mutex<Vec<(ScheduledSegment, usize, u32)>>,
    halts: AtomicUsize,
}

impl RecordingOutput {
    fn played(&self) -> Vec<(ScheduledSegment, usize, u32)> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioOutput for RecordingOutput {
    fn play(&self, segment: &ScheduledSegment, samples: &[f32], sample_rate: u32) {
        self.played
            .lock()
            .unwrap()
            .push((*segment, samples.len(), sample_rate));
    }

    fn halt(&self) {
        self.halts.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    manager: Arc<VoiceSessionManager>,
    mic: ChannelMicrophone,
    output: Arc<RecordingOutput>,
    events: broadcast::Receiver<VoiceEvent>,
}

fn harness(url: &str) -> Harness {
    let mut config = LiveConfig::new(url, "test-key");
    config.frame_size = 160;
    let mic = ChannelMicrophone::new(true);
    let output = Arc::new(RecordingOutput::default());
    let manager = Arc::new(VoiceSessionManager::new(
        config,
        Arc::new(mic.clone()),
        output.clone(),
    ));
    let events = manager.subscribe();
    Harness {
        manager,
        mic,
        output,
        events,
    }
}

async fn wait_for(
    events: &mut broadcast::Receiver<VoiceEvent>,
    mut wanted: impl FnMut(&VoiceEvent) -> bool,
) -> VoiceEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for voice event")
}

async fn wait_status(events: &mut broadcast::Receiver<VoiceEvent>, status: VoiceStatus) {
    wait_for(events, |e| *e == VoiceEvent::status(status)).await;
}

fn audio_content(segments: &[usize]) -> Value {
    let parts: Vec<Value> = segments
        .iter()
        .map(|&samples| {
            json!({"inlineData": {
                "mimeType": "audio/pcm;rate=24000",
                "data": pcm::encode_frame(&vec![0.1; samples]),
            }})
        })
        .collect();
    json!({"serverContent": {"modelTurn": {"parts": parts}}})
}

#[tokio::test]
async fn start_sends_setup_then_streams_capture_frames() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);

    h.manager.start_session().await.unwrap();
    assert_eq!(h.manager.status(), VoiceStatus::Listening);
    assert!(h.mic.is_held());
    assert_eq!(
        h.events.recv().await.unwrap(),
        VoiceEvent::status(VoiceStatus::Connecting)
    );
    assert_eq!(
        h.events.recv().await.unwrap(),
        VoiceEvent::status(VoiceStatus::Listening)
    );

    let setup = live.next().await;
    assert_eq!(
        setup["setup"]["model"],
        "models/gemini-2.5-flash-native-audio-preview-12-2025"
    );
    assert_eq!(
        setup["setup"]["tools"][0]["functionDeclarations"][0]["name"],
        "create_task"
    );

    // 200 samples: one full frame, 40 held back.
    assert_eq!(h.mic.push_samples(&[0.5; 200]), 1);
    let chunk = live.next().await;
    assert_eq!(chunk["realtimeInput"]["audio"]["mimeType"], "audio/pcm;rate=16000");
    let data = chunk["realtimeInput"]["audio"]["data"].as_str().unwrap();
    assert_eq!(pcm::decode_segment(data).unwrap().len(), 160);

    h.manager.stop_session().await;
    assert_eq!(h.manager.status(), VoiceStatus::Idle);
    assert!(!h.mic.is_held());
    assert_eq!(
        h.events.recv().await.unwrap(),
        VoiceEvent::status(VoiceStatus::Idle)
    );
}

#[tokio::test]
async fn second_start_is_a_no_op() {
    let live = MockLive::spawn().await;
    let mut h = harness(&live.url);

    h.manager.start_session().await.unwrap();
    wait_status(&mut h.events, VoiceStatus::Listening).await;
    h.manager.start_session().await.unwrap();
    assert_eq!(h.manager.status(), VoiceStatus::Listening);
    assert!(h.events.try_recv().is_err());
    h.manager.stop_session().await;
}

#[tokio::test]
async fn create_task_call_is_published_and_acknowledged() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    live.send(json!({"toolCall": {"functionCalls": [{
        "id": "call-7",
        "name": "create_task",
        "args": {"description": "I need help with my garden"}
    }]}}));

    let event = wait_for(&mut h.events, |e| {
        matches!(e, VoiceEvent::TaskCreationRequested { .. })
    })
    .await;
    assert_eq!(
        event,
        VoiceEvent::TaskCreationRequested {
            description: "I need help with my garden".to_string()
        }
    );

    let ack = live.next_non_audio().await;
    let response = &ack["toolResponse"]["functionResponses"][0];
    assert_eq!(response["id"], "call-7");
    assert_eq!(response["name"], "create_task");
    assert!(response["response"]["result"].is_string());

    h.manager.stop_session().await;
}

#[tokio::test]
async fn unknown_function_gets_error_response() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    live.send(json!({"toolCall": {"functionCalls": [{
        "id": "call-1", "name": "delete_everything", "args": {}
    }]}}));

    let ack = live.next_non_audio().await;
    assert_eq!(ack["toolResponse"]["functionResponses"][0]["response"]["error"], "unknown function");
    while let Ok(event) = h.events.try_recv() {
        assert!(!matches!(event, VoiceEvent::TaskCreationRequested { .. }));
    }
    assert_eq!(h.manager.status(), VoiceStatus::Listening);

    h.manager.stop_session().await;
}

#[tokio::test]
async fn transcripts_are_forwarded() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    live.send(json!({"serverContent": {"inputTranscription": {"text": "my sink"}}}));
    let event = wait_for(&mut h.events, |e| matches!(e, VoiceEvent::LiveTranscription { .. })).await;
    assert_eq!(
        event,
        VoiceEvent::LiveTranscription {
            text: "my sink".to_string()
        }
    );

    live.send(json!({"serverContent": {"outputTranscription": {"text": "I can help."}}}));
    live.send(json!({"serverContent": {"outputTranscription": {"text": "Anything else?"}}}));
    wait_for(&mut h.events, |e| matches!(e, VoiceEvent::AssistantTranscript { .. })).await;
    let event = wait_for(&mut h.events, |e| matches!(e, VoiceEvent::AssistantTranscript { .. })).await;
    assert_eq!(
        event,
        VoiceEvent::AssistantTranscript {
            text: "I can help. Anything else?".to_string()
        }
    );

    h.manager.stop_session().await;
}

#[tokio::test]
async fn segments_play_back_to_back_then_return_to_listening() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    // Two 0.2 s segments at 24 kHz.
    live.send(audio_content(&[4800, 4800]));
    wait_status(&mut h.events, VoiceStatus::Speaking).await;
    wait_status(&mut h.events, VoiceStatus::Listening).await;

    let played = h.output.played();
    assert_eq!(played.len(), 2);
    let (first, len, rate) = played[0];
    assert_eq!((len, rate), (4800, 24_000));
    assert!((first.duration() - 0.2).abs() < 1e-9);
    let (second, _, _) = played[1];
    assert!((second.start - first.end).abs() < 1e-9);

    h.manager.stop_session().await;
}

#[tokio::test]
async fn interruption_halts_playback() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    live.send(audio_content(&[24_000 * 5]));
    wait_status(&mut h.events, VoiceStatus::Speaking).await;
    live.send(json!({"serverContent": {"interrupted": true}}));
    wait_status(&mut h.events, VoiceStatus::Listening).await;
    assert_eq!(h.output.halts.load(Ordering::SeqCst), 1);

    h.manager.stop_session().await;
}

#[tokio::test]
async fn server_close_forces_idle() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    live.close();
    wait_status(&mut h.events, VoiceStatus::Idle).await;
    assert!(!h.manager.is_active());
    assert!(!h.mic.is_held());

    // A fresh session can start afterwards.
    let mut live = MockLive::spawn().await;
    let h2 = harness(&live.url);
    h2.manager.start_session().await.unwrap();
    assert!(live.next().await.get("setup").is_some());
    h2.manager.stop_session().await;
}

#[tokio::test]
async fn stop_while_speaking_halts_and_releases() {
    let mut live = MockLive::spawn().await;
    let mut h = harness(&live.url);
    h.manager.start_session().await.unwrap();
    live.next().await;

    live.send(audio_content(&[24_000 * 5]));
    wait_status(&mut h.events, VoiceStatus::Speaking).await;
    h.manager.stop_session().await;

    assert_eq!(h.manager.status(), VoiceStatus::Idle);
    assert!(!h.mic.is_held());
    assert!(h.output.halts.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn unreachable_service_is_connection_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut h = harness(&format!("ws://{}/live", addr));
    let result = h.manager.start_session().await;
    assert!(matches!(result, Err(VoiceError::ConnectionFailure(_))));
    assert_eq!(h.manager.status(), VoiceStatus::Idle);
    assert!(!h.mic.is_held());
    wait_status(&mut h.events, VoiceStatus::Idle).await;
}

#[tokio::test]
async fn denied_microphone_never_dials() {
    let mut live = MockLive::spawn().await;
    let h = harness(&live.url);
    h.mic.set_available(false);

    let result = h.manager.start_session().await;
    assert!(matches!(result, Err(VoiceError::PermissionDenied(_))));
    assert!(!h.manager.is_active());
    assert!(
        tokio::time::timeout(Duration::from_millis(200), live.from_client.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn stop_during_handshake_cancels_start() {
    // Accepts TCP but never answers the upgrade.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let held = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });

    let mut h = harness(&format!("ws://{}/live", addr));
    let manager = h.manager.clone();
    let start = tokio::spawn(async move { manager.start_session().await });

    wait_status(&mut h.events, VoiceStatus::Connecting).await;
    h.manager.stop_session().await;

    let result = tokio::time::timeout(WAIT, start).await.unwrap().unwrap();
    assert_eq!(result, Err(VoiceError::Cancelled));
    assert_eq!(h.manager.status(), VoiceStatus::Idle);
    assert!(!h.mic.is_held());
    held.abort();
}

#[tokio::test]
async fn toggle_starts_and_stops() {
    let mut live = MockLive::spawn().await;
    let h = harness(&live.url);

    h.manager.toggle().await.unwrap();
    assert!(h.manager.is_active());
    live.next().await;
    h.manager.toggle().await.unwrap();
    assert!(!h.manager.is_active());
    assert_eq!(h.manager.status(), VoiceStatus::Idle);
}
