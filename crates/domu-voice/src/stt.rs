use crate::error::VoiceError;
use crate::gemini::{GeminiClient, GeminiPart};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
pub const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Timeout for STT process execution.
const STT_TIMEOUT: Duration = Duration::from_secs(120);

const TRANSCRIPTION_PROMPT: &str = "Transcribe exactamente lo que dice la persona en español. \
     Responde solo con la transcripción, sin explicaciones. \
     Si no se escucha ninguna voz, responde con un texto vacío.";

/// Converts one audio turn into text.
///
/// An empty string means no speech was detected. That is a normal outcome and
/// must never be reported as an error.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8], encoding: &str) -> Result<String, VoiceError>;
}

fn check_input_size(audio: &[u8]) -> Result<(), VoiceError> {
    if audio.len() > MAX_STT_INPUT_BYTES {
        return Err(VoiceError::Stt(format!(
            "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
            audio.len(),
            MAX_STT_INPUT_BYTES
        )));
    }
    Ok(())
}

/// File suffix used when an audio blob of the given media type is staged to disk.
pub fn extension_for(encoding: &str) -> &'static str {
    let media_type = encoding
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match media_type.as_str() {
        "audio/webm" | "video/webm" => ".webm",
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/ogg" | "audio/opus" => ".ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => ".m4a",
        "audio/flac" => ".flac",
        _ => ".bin",
    }
}

/// Normalizes raw transcriber output.
///
/// Trims whitespace and wrapping quotes, and maps outputs that only describe
/// the absence of speech (such as `[silencio]` or `(inaudible)`) to an empty
/// string.
pub fn clean_transcript(raw: &str) -> String {
    let text = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '“' || c == '”')
        .trim();

    let bracketed = (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('(') && text.ends_with(')'));
    if bracketed {
        return String::new();
    }

    text.to_string()
}

/// Transcribes through Gemini's multimodal `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiTranscriber {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiTranscriber {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        let model = client.config().transcription_model.clone();
        Self { client, model }
    }
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(&self, audio: &[u8], encoding: &str) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Ok(String::new());
        }
        check_input_size(audio)?;

        let parts = vec![
            GeminiPart::InlineData {
                mime_type: encoding.to_string(),
                data: audio.to_vec(),
            },
            GeminiPart::Text(TRANSCRIPTION_PROMPT.to_string()),
        ];

        let raw = self
            .client
            .generate(&self.model, parts)
            .await
            .map_err(|e| VoiceError::Stt(format!("Gemini transcription failed: {}", e)))?;

        Ok(clean_transcript(&raw))
    }
}

/// Transcribes with a local whisper.cpp-compatible binary.
///
/// Each blob is staged to a temporary file, passed with `-f`, and removed when
/// the call returns, whatever the outcome.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    model_path: PathBuf,
    binary_path: PathBuf,
    language: String,
}

impl CommandTranscriber {
    pub fn new(
        model_path: impl Into<PathBuf>,
        binary_path: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            binary_path: binary_path.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &[u8], encoding: &str) -> Result<String, VoiceError> {
        if audio.is_empty() {
            return Ok(String::new());
        }
        check_input_size(audio)?;

        // Dropping the handle deletes the file on every return path below.
        let staged = tempfile::Builder::new()
            .prefix("domu-turn-")
            .suffix(extension_for(encoding))
            .tempfile()
            .map_err(|e| VoiceError::Stt(format!("Failed to stage audio: {}", e)))?;

        tokio::fs::write(staged.path(), audio)
            .await
            .map_err(|e| VoiceError::Stt(format!("Failed to write staged audio: {}", e)))?;

        tracing::debug!(
            path = %staged.path().display(),
            bytes = audio.len(),
            "staged audio for local transcription"
        );

        // whisper.cpp arguments:
        // -m <model>: GGML model, -l <lang>: spoken language,
        // -nt: no timestamps, -f <file>: input audio
        let mut command = Command::new(&self.binary_path);
        command
            .arg("-m")
            .arg(&self.model_path)
            .arg("-l")
            .arg(&self.language)
            .arg("-nt")
            .arg("-f")
            .arg(staged.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| VoiceError::Stt(format!("Failed to spawn STT binary: {}", e)))?;

        let output = tokio::time::timeout(STT_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Stt(format!(
                    "STT process timed out after {} seconds",
                    STT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Stt(format!("Failed to read stdout: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Stt(format!("STT binary failed: {}", stderr.trim())));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(clean_transcript(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_media_type() {
        assert_eq!(extension_for("audio/webm"), ".webm");
        assert_eq!(extension_for("audio/webm;codecs=opus"), ".webm");
        assert_eq!(extension_for("AUDIO/WAV"), ".wav");
        assert_eq!(extension_for("audio/mpeg"), ".mp3");
        assert_eq!(extension_for("application/octet-stream"), ".bin");
    }

    #[test]
    fn clean_transcript_trims_and_drops_silence_markers() {
        assert_eq!(clean_transcript("  \"no me interesa\"\n"), "no me interesa");
        assert_eq!(clean_transcript("[silencio]"), "");
        assert_eq!(clean_transcript("(inaudible)"), "");
        assert_eq!(clean_transcript("   "), "");
        assert_eq!(clean_transcript("sí (claro) me interesa"), "sí (claro) me interesa");
    }

    #[tokio::test]
    async fn oversized_audio_is_rejected() {
        let transcriber = CommandTranscriber::new("model.bin", "/nonexistent/whisper", "es");
        let audio = vec![0u8; MAX_STT_INPUT_BYTES + 1];
        let err = transcriber.transcribe(&audio, "audio/webm").await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum size"));
    }

    #[tokio::test]
    async fn empty_audio_short_circuits_without_spawning() {
        let transcriber = CommandTranscriber::new("model.bin", "/nonexistent/whisper", "es");
        let text = transcriber.transcribe(&[], "audio/webm").await.unwrap();
        assert_eq!(text, "");
    }
}
