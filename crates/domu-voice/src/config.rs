use serde::{Deserialize, Serialize};
use std::fmt;

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_transcription_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_encoding() -> String {
    "audio/webm".to_string()
}

fn default_whisper_binary() -> String {
    "whisper-cli".to_string()
}

fn default_whisper_model() -> String {
    "models/ggml-base.bin".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

fn default_elevenlabs_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_elevenlabs_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_tts_binary() -> String {
    "espeak-ng".to_string()
}

fn default_audio_dir() -> String {
    "audio".to_string()
}

fn default_public_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_audio_prefix() -> String {
    "ws_reply".to_string()
}

/// Connection settings for the Gemini `generateContent` API.
///
/// Shared by the remote transcriber and the remote text generator.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// HTTP request timeout in seconds. Default: 30.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gemini_base_url(),
            transcription_model: default_transcription_model(),
            generation_model: default_generation_model(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("transcription_model", &self.transcription_model)
            .field("generation_model", &self.generation_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which speech-to-text implementation is bound at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SttBackend {
    /// Gemini multimodal transcription over HTTP.
    #[default]
    Gemini,
    /// A local whisper.cpp-compatible binary.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default)]
    pub backend: SttBackend,
    /// Media type of the inbound audio blobs. Fixed per deployment.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_whisper_binary")]
    pub binary_path: String,
    #[serde(default = "default_whisper_model")]
    pub model_path: String,
    /// Spoken language of the callers.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            backend: SttBackend::default(),
            encoding: default_encoding(),
            binary_path: default_whisper_binary(),
            model_path: default_whisper_model(),
            language: default_language(),
        }
    }
}

/// Which text-to-speech implementation is bound at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackend {
    /// ElevenLabs text-to-speech over HTTP.
    #[default]
    #[serde(rename = "elevenlabs")]
    ElevenLabs,
    /// A local espeak-ng-compatible binary writing WAV to stdout.
    Command,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub backend: TtsBackend,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default = "default_elevenlabs_model")]
    pub model_id: String,
    #[serde(default = "default_elevenlabs_base_url")]
    pub base_url: String,
    #[serde(default = "default_tts_binary")]
    pub binary_path: String,
    /// Voice passed to the command backend (`-v`).
    #[serde(default = "default_language")]
    pub voice: String,
    /// HTTP request timeout in seconds. Default: 30.
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            backend: TtsBackend::default(),
            api_key: String::new(),
            voice_id: String::new(),
            model_id: default_elevenlabs_model(),
            base_url: default_elevenlabs_base_url(),
            binary_path: default_tts_binary(),
            voice: default_language(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl fmt::Debug for TtsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtsConfig")
            .field("backend", &self.backend)
            .field("api_key", &"[REDACTED]")
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .field("binary_path", &self.binary_path)
            .field("voice", &self.voice)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Where synthesized replies are written and how they are addressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStoreConfig {
    #[serde(default = "default_audio_dir")]
    pub dir: String,
    /// Base URL of the external file server that resolves `/audio/<file>`.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_audio_prefix")]
    pub prefix: String,
}

impl Default for AudioStoreConfig {
    fn default() -> Self {
        Self {
            dir: default_audio_dir(),
            public_url: default_public_url(),
            prefix: default_audio_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_secrets() {
        let gemini = GeminiConfig {
            api_key: "super-secret".to_string(),
            ..GeminiConfig::default()
        };
        let tts = TtsConfig {
            api_key: "also-secret".to_string(),
            ..TtsConfig::default()
        };

        let rendered = format!("{:?} {:?}", gemini, tts);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("also-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn backends_deserialize_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            stt: SttConfig,
            tts: TtsConfig,
        }

        let parsed: Wrapper = serde_json::from_str(
            r#"{"stt": {"backend": "command"}, "tts": {"backend": "elevenlabs", "voice_id": "v1"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.stt.backend, SttBackend::Command);
        assert_eq!(parsed.stt.encoding, "audio/webm");
        assert_eq!(parsed.tts.backend, TtsBackend::ElevenLabs);
        assert_eq!(parsed.tts.model_id, "eleven_multilingual_v2");
    }
}
