//! Speech infrastructure for the Domu voice agent.
//!
//! Provides the two audio-facing stages of a call turn: STT (speech-to-text)
//! transcription of the caller's blob and TTS (text-to-speech) rendering of
//! the agent's reply. Each stage is a trait with a remote implementation
//! (Gemini for transcription, ElevenLabs for synthesis) and a local
//! command-line implementation for offline deployments.
//!
//! Synthesized audio is written through an [`AudioStore`] that returns a
//! fetchable [`AudioHandle`]; serving the bytes is left to an external file
//! server.

pub mod config;
pub mod error;
pub mod gemini;
pub mod store;
pub mod stt;
pub mod tts;

pub use config::{AudioStoreConfig, GeminiConfig, SttBackend, SttConfig, TtsBackend, TtsConfig};
pub use error::VoiceError;
pub use gemini::{GeminiClient, GeminiPart};
pub use store::{generate_filename, AudioHandle, AudioStore, FsAudioStore};
pub use stt::{
    clean_transcript, extension_for, CommandTranscriber, GeminiTranscriber, Transcriber,
    MAX_STT_INPUT_BYTES,
};
pub use tts::{
    sanitize_text, CommandSynthesizer, ElevenLabsSynthesizer, SpeechRenderer, SpeechSynthesizer,
    SynthesizedAudio,
};
