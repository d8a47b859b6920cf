//! Wire models for the bidirectional live speech protocol.
//!
//! Client messages are serialized from typed structs; server messages are
//! flattened into an ordered list of [`Inbound`] events so the session can
//! handle them one at a time.

use crate::config::LiveConfig;
use crate::error::VoiceError;
use crate::pcm;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name of the single function the model may call.
pub const CREATE_TASK_FUNCTION: &str = "create_task";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, VoiceError> {
        serde_json::to_string(self)
            .map_err(|e| VoiceError::Protocol(format!("failed to encode client message: {}", e)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Tool>,
    pub input_audio_transcription: Value,
    pub output_audio_transcription: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: Value,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// The opening message of every session.
pub fn setup(config: &LiveConfig) -> ClientMessage {
    ClientMessage::Setup(Setup {
        model: config.model_resource(),
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: json!({
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": config.voice_name }
                }
            }),
        },
        system_instruction: Content {
            parts: vec![TextPart {
                text: config.system_instruction.clone(),
            }],
        },
        tools: vec![Tool {
            function_declarations: vec![json!({
                "name": CREATE_TASK_FUNCTION,
                "description": "Creates a new help request based on the user's spoken description.",
                "parameters": {
                    "type": "OBJECT",
                    "properties": {
                        "description": {
                            "type": "STRING",
                            "description": "Detailed description of the help needed"
                        }
                    },
                    "required": ["description"]
                }
            })],
        }],
        input_audio_transcription: json!({}),
        output_audio_transcription: json!({}),
    })
}

/// One captured frame as a realtime audio chunk.
pub fn audio_chunk(samples: &[f32], sample_rate: u32) -> ClientMessage {
    ClientMessage::RealtimeInput(RealtimeInput {
        audio: Blob {
            mime_type: pcm::mime_type(sample_rate),
            data: pcm::encode_frame(samples),
        },
    })
}

/// Acknowledges a function call. `result` is reported back to the model as
/// the call's output.
pub fn tool_response(id: &str, name: &str, result: Result<&str, &str>) -> ClientMessage {
    let response = match result {
        Ok(output) => json!({ "result": output }),
        Err(error) => json!({ "error": error }),
    };
    ClientMessage::ToolResponse(ToolResponse {
        function_responses: vec![FunctionResponse {
            id: id.to_string(),
            name: name.to_string(),
            response,
        }],
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<Value>,
    server_content: Option<ServerContent>,
    tool_call: Option<ToolCall>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
    input_transcription: Option<Transcription>,
    output_transcription: Option<Transcription>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    interrupted: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<Blob>,
}

#[derive(Debug, Default, Deserialize)]
struct Transcription {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCall {
    #[serde(default)]
    function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: String,
    name: String,
    #[serde(default)]
    args: Value,
}

/// A single thing the server told us, in handling order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    SetupComplete,
    InputTranscript(String),
    OutputTranscript(String),
    Interrupted,
    Audio(Blob),
    ToolCall { id: String, name: String, args: Value },
    TurnComplete,
}

/// Parses one server frame.
///
/// Transcripts come first so they are published before the audio they
/// describe starts playing; an interruption precedes any audio in the same
/// frame.
pub fn parse_server_message(text: &str) -> Result<Vec<Inbound>, VoiceError> {
    let message: ServerMessage = serde_json::from_str(text)
        .map_err(|e| VoiceError::Protocol(format!("malformed server message: {}", e)))?;

    let mut events = Vec::new();
    if message.setup_complete.is_some() {
        events.push(Inbound::SetupComplete);
    }
    if let Some(content) = message.server_content {
        if let Some(t) = content.input_transcription.filter(|t| !t.text.is_empty()) {
            events.push(Inbound::InputTranscript(t.text));
        }
        if let Some(t) = content.output_transcription.filter(|t| !t.text.is_empty()) {
            events.push(Inbound::OutputTranscript(t.text));
        }
        if content.interrupted {
            events.push(Inbound::Interrupted);
        }
        if let Some(turn) = content.model_turn {
            events.extend(
                turn.parts
                    .into_iter()
                    .filter_map(|p| p.inline_data)
                    .filter(|blob| !blob.data.is_empty())
                    .map(Inbound::Audio),
            );
        }
        if content.turn_complete {
            events.push(Inbound::TurnComplete);
        }
    }
    if let Some(call) = message.tool_call {
        events.extend(call.function_calls.into_iter().map(|f| Inbound::ToolCall {
            id: f.id,
            name: f.name,
            args: f.args,
        }));
    }
    Ok(events)
}

/// Pulls the `description` argument out of a `create_task` call, as sent.
///
/// A blank description counts as missing.
pub fn task_description(args: &Value) -> Option<String> {
    args.get("description")
        .and_then(Value::as_str)
        .filter(|d| !d.trim().is_empty())
        .map(str::to_string)
}
