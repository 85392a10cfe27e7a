//! Gemini Live API message types for transcription
//!
//! Defines the subset of the BidiGenerateContent WebSocket protocol the
//! recognizer uses: session setup, realtime audio input, and the
//! transcription fragments streamed back.

use serde::{Deserialize, Serialize};

/// First message on every connection: session setup.
#[derive(Debug, Serialize)]
pub(crate) struct SetupMessage {
    pub setup: Setup,
}

/// Session configuration for the Live API
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Setup {
    /// Fully qualified model name (e.g. "models/gemini-2.0-flash-live-001")
    pub model: String,
    pub generation_config: GenerationConfig,
    /// Presence enables transcription of the audio input
    pub input_audio_transcription: TranscriptionConfig,
    pub speech_config: SpeechConfig,
}

/// Generation settings; we only ever want text back
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

/// Empty marker object; its presence switches transcription on
#[derive(Debug, Serialize)]
pub(crate) struct TranscriptionConfig {}

/// Spoken-language configuration
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpeechConfig {
    /// BCP-47 tag (e.g. "pt-BR")
    pub language_code: String,
}

impl SetupMessage {
    /// Create the setup message for a transcription session
    pub(crate) fn new(model: &str, language_tag: &str) -> Self {
        Self {
            setup: Setup {
                model: format!("models/{}", model),
                generation_config: GenerationConfig {
                    response_modalities: vec!["TEXT".to_string()],
                },
                input_audio_transcription: TranscriptionConfig {},
                speech_config: SpeechConfig {
                    language_code: language_tag.to_string(),
                },
            },
        }
    }
}

/// Streaming audio input message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

/// Realtime input payload
#[derive(Debug, Serialize)]
pub(crate) struct RealtimeInput {
    pub audio: AudioBlob,
}

/// Base64 PCM payload with its mime type
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AudioBlob {
    pub mime_type: String,
    pub data: String,
}

impl RealtimeInputMessage {
    /// Wrap one base64-encoded PCM16 chunk
    pub(crate) fn pcm_chunk(data: String, sample_rate: u32) -> Self {
        Self {
            realtime_input: RealtimeInput {
                audio: AudioBlob {
                    mime_type: format!("audio/pcm;rate={}", sample_rate),
                    data,
                },
            },
        }
    }
}

/// Messages streamed back by the Live API.
///
/// The protocol sends one-of these per frame; fields absent from a frame
/// stay `None`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ServerMessage {
    pub setup_complete: Option<SetupComplete>,
    pub server_content: Option<ServerContent>,
}

/// Acknowledgement of the setup message
#[derive(Debug, Default, Deserialize)]
pub(crate) struct SetupComplete {}

/// Content frame carrying transcription and turn state
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ServerContent {
    pub input_transcription: Option<Transcription>,
    pub turn_complete: Option<bool>,
}

/// One recognized fragment of the input audio
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Transcription {
    pub text: Option<String>,
}

impl ServerMessage {
    /// The transcription fragment carried by this frame, if any
    pub(crate) fn transcription_fragment(&self) -> Option<&str> {
        self.server_content
            .as_ref()?
            .input_transcription
            .as_ref()?
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
    }

    /// True once the server has acknowledged the session setup
    pub(crate) fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_message_serialization() {
        let msg = SetupMessage::new("gemini-2.0-flash-live-001", "pt-BR");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""model":"models/gemini-2.0-flash-live-001""#));
        assert!(json.contains(r#""responseModalities":["TEXT"]"#));
        assert!(json.contains(r#""inputAudioTranscription":{}"#));
        assert!(json.contains(r#""languageCode":"pt-BR""#));
    }

    #[test]
    fn test_audio_chunk_serialization() {
        let msg = RealtimeInputMessage::pcm_chunk("base64data".to_string(), 16000);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""realtimeInput""#));
        assert!(json.contains(r#""mimeType":"audio/pcm;rate=16000""#));
        assert!(json.contains("base64data"));
    }

    #[test]
    fn test_transcription_fragment_deserialization() {
        let json = r#"{"serverContent": {"inputTranscription": {"text": "bom dia"}}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.transcription_fragment(), Some("bom dia"));
        assert!(!msg.is_setup_complete());
    }

    #[test]
    fn test_setup_complete_deserialization() {
        let json = r#"{"setupComplete": {}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(msg.is_setup_complete());
        assert!(msg.transcription_fragment().is_none());
    }

    #[test]
    fn test_unknown_frames_are_tolerated() {
        // Frames we do not model (tool calls, usage metadata) must not
        // break parsing.
        let json = r#"{"usageMetadata": {"totalTokenCount": 12}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(msg.transcription_fragment().is_none());

        let json = r#"{"serverContent": {"turnComplete": true}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.server_content.unwrap().turn_complete, Some(true));
    }

    #[test]
    fn test_empty_fragment_is_ignored() {
        let json = r#"{"serverContent": {"inputTranscription": {"text": ""}}}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert!(msg.transcription_fragment().is_none());
    }
}
