//! Realtime STT wire messages
//!
//! Message types for the realtime transcription WebSocket protocol:
//! the client streams base64 PCM16 audio into an input buffer, the
//! server answers with interim transcription deltas and completed
//! utterances.

use serde::{Deserialize, Serialize};

/// API version for the realtime endpoint
pub const REALTIME_API_VERSION: &str = "2024-10-01-preview";

/// Messages sent to the transcription service
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub(crate) enum ClientMessage {
    /// Session configuration sent after connecting
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    /// Append audio data to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
    /// Commit the input buffer, finalizing the in-flight utterance
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,
}

/// Session configuration for the realtime STT endpoint
#[derive(Debug, Serialize)]
pub(crate) struct SessionConfig {
    /// Modalities in use (text only for transcription)
    pub modalities: Vec<String>,
    /// Input audio format (pcm16)
    pub input_audio_format: String,
    pub input_audio_transcription: TranscriptionConfig,
}

#[derive(Debug, Serialize)]
pub(crate) struct TranscriptionConfig {
    /// Model/deployment name
    pub model: String,
    /// Language hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SessionConfig {
    pub fn new(model: &str, language: Option<&str>) -> Self {
        Self {
            modalities: vec!["text".to_string()],
            input_audio_format: "pcm16".to_string(),
            input_audio_transcription: TranscriptionConfig {
                model: model.to_string(),
                language: language.map(String::from),
            },
        }
    }
}

/// Messages received from the transcription service
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ServerMessage {
    #[serde(rename = "session.created")]
    SessionCreated,
    #[serde(rename = "session.updated")]
    SessionUpdated,
    /// Interim transcription delta for the in-flight utterance
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    TranscriptionDelta { delta: Option<String> },
    /// Completed transcription for one utterance
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted { transcript: Option<String> },
    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted,
    #[serde(rename = "error")]
    Error { error: Option<ServerError> },
    /// Catch-all for message types this client does not act on
    #[serde(other)]
    Other,
}

/// Error details reported by the service
#[derive(Debug, Deserialize)]
pub(crate) struct ServerError {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// How a server-side error affects the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ServerErrorKind {
    /// No speech in the committed audio; recoverable
    NoSpeech,
    /// Authentication/authorization failure; fatal
    PermissionDenied,
    /// Anything else; recoverable, reported
    Other,
}

impl ServerError {
    pub fn kind(&self) -> ServerErrorKind {
        let code = self.code.as_deref().unwrap_or("").to_lowercase();
        let message = self.message.as_deref().unwrap_or("").to_lowercase();

        if code.contains("no_speech") || message.contains("no speech") {
            ServerErrorKind::NoSpeech
        } else if code.contains("auth")
            || code.contains("permission")
            || message.contains("unauthorized")
            || message.contains("permission denied")
        {
            ServerErrorKind::PermissionDenied
        } else {
            ServerErrorKind::Other
        }
    }

    pub fn describe(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "unknown server error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_update_serialization() {
        let msg = ClientMessage::SessionUpdate {
            session: SessionConfig::new("gpt-4o-transcribe", Some("ja")),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("session.update"));
        assert!(json.contains("gpt-4o-transcribe"));
        assert!(json.contains("pcm16"));
        assert!(json.contains("\"language\":\"ja\""));
    }

    #[test]
    fn test_language_omitted_when_unset() {
        let msg = ClientMessage::SessionUpdate {
            session: SessionConfig::new("gpt-4o-transcribe", None),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("language"));
    }

    #[test]
    fn test_audio_append_serialization() {
        let msg = ClientMessage::InputAudioBufferAppend {
            audio: "base64data".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("input_audio_buffer.append"));
        assert!(json.contains("base64data"));
    }

    #[test]
    fn test_transcription_delta_deserialization() {
        let json = r#"{"type": "conversation.item.input_audio_transcription.delta", "delta": "hel"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::TranscriptionDelta { delta } => assert_eq!(delta.unwrap(), "hel"),
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_transcription_completed_deserialization() {
        let json = r#"{"type": "conversation.item.input_audio_transcription.completed", "transcript": "hello world"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::TranscriptionCompleted { transcript } => {
                assert_eq!(transcript.unwrap(), "hello world");
            }
            other => panic!("wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_message_type_is_other() {
        let json = r#"{"type": "response.created"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ServerMessage::Other));
    }

    #[test]
    fn test_server_error_classification() {
        let no_speech = ServerError {
            code: Some("no_speech_detected".to_string()),
            message: None,
        };
        assert_eq!(no_speech.kind(), ServerErrorKind::NoSpeech);

        let denied = ServerError {
            code: None,
            message: Some("Unauthorized: invalid api key".to_string()),
        };
        assert_eq!(denied.kind(), ServerErrorKind::PermissionDenied);

        let other = ServerError {
            code: Some("rate_limited".to_string()),
            message: None,
        };
        assert_eq!(other.kind(), ServerErrorKind::Other);
    }
}
