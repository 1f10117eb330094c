use crate::config::TtsConfig;
use crate::error::VoiceError;
use crate::store::{AudioHandle, AudioStore};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for TTS process execution.
const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Encoded audio produced by a synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// File extension matching the container, without the dot.
    pub extension: &'static str,
}

/// Converts reply text into playable audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, VoiceError>;
}

/// Makes text safe to hand to a synthesizer: absent text becomes `""`.
pub fn sanitize_text(text: Option<&str>) -> String {
    text.map(str::trim).unwrap_or_default().to_string()
}

fn check_input_size(text: &str) -> Result<(), VoiceError> {
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::Tts(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct ElevenLabsRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

/// Synthesizes MP3 through the ElevenLabs text-to-speech API.
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    config: TtsConfig,
    http: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: TtsConfig) -> Result<Self, VoiceError> {
        if config.api_key.trim().is_empty() || config.voice_id.trim().is_empty() {
            return Err(VoiceError::Config(
                "ElevenLabs requires tts.api_key and tts.voice_id \
                 (or ELEVENLABS_API_KEY and ELEVENLABS_VOICE_ID)."
                    .to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VoiceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, VoiceError> {
        check_input_size(text)?;

        let url = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        );

        let response = self
            .http
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&ElevenLabsRequest {
                text,
                model_id: &self.config.model_id,
            })
            .send()
            .await
            .map_err(|e| VoiceError::Tts(format!("ElevenLabs request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "ElevenLabs returned {}: {}",
                status,
                body.chars().take(512).collect::<String>()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Tts(format!("Failed to read ElevenLabs audio: {}", e)))?;

        Ok(SynthesizedAudio {
            bytes: bytes.to_vec(),
            extension: "mp3",
        })
    }
}

/// Synthesizes with a local espeak-ng-compatible binary.
///
/// The binary is invoked as `<binary> -v <voice> --stdout --stdin`, fed the
/// text on stdin, and must write a WAV file to stdout. The header is kept so
/// the file plays as-is.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    binary_path: PathBuf,
    voice: String,
}

impl CommandSynthesizer {
    pub fn new(binary_path: impl Into<PathBuf>, voice: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            voice: voice.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, VoiceError> {
        check_input_size(text)?;

        let mut command = Command::new(&self.binary_path);
        command
            .arg("-v")
            .arg(&self.voice)
            .arg("--stdout")
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            VoiceError::Tts(format!(
                "Failed to spawn {:?}: {}",
                self.binary_path, e
            ))
        })?;

        // Text never reaches argv, so a reply starting with `-` is not read as a flag.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VoiceError::Tts("Failed to open stdin".to_string()))?;
        let text_owned = text.to_string();
        let write_task = tokio::spawn(async move { stdin.write_all(text_owned.as_bytes()).await });

        let output = tokio::time::timeout(TTS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                VoiceError::Tts(format!(
                    "TTS process timed out after {} seconds",
                    TTS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| VoiceError::Tts(format!("Failed to wait for TTS process: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::Tts(format!("TTS binary failed: {}", stderr.trim())));
        }

        match write_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(VoiceError::Tts(format!("Failed to write to TTS stdin: {}", e)));
            }
            Err(e) => {
                return Err(VoiceError::Tts(format!("TTS stdin writer panicked: {}", e)));
            }
        }

        if output.stdout.is_empty() {
            return Err(VoiceError::Tts("TTS binary produced no audio".to_string()));
        }

        Ok(SynthesizedAudio {
            bytes: output.stdout,
            extension: "wav",
        })
    }
}

/// Speech synthesis stage: text in, audio handle out.
#[derive(Clone)]
pub struct SpeechRenderer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn AudioStore>,
}

impl SpeechRenderer {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, store: Arc<dyn AudioStore>) -> Self {
        Self { synthesizer, store }
    }

    /// Synthesizes `text` and persists it under a fresh, unique name.
    pub async fn render(&self, text: &str) -> Result<AudioHandle, VoiceError> {
        let text = sanitize_text(Some(text));
        let audio = self.synthesizer.synthesize(&text).await?;
        self.store.persist(&audio).await
    }
}

impl std::fmt::Debug for SpeechRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechRenderer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_text_handles_absent_and_padded_text() {
        assert_eq!(sanitize_text(None), "");
        assert_eq!(sanitize_text(Some("  hola  ")), "hola");
        assert_eq!(sanitize_text(Some("")), "");
    }

    #[test]
    fn elevenlabs_requires_credentials() {
        let err = ElevenLabsSynthesizer::new(TtsConfig::default()).unwrap_err();
        assert!(matches!(err, VoiceError::Config(_)));
    }

    #[tokio::test]
    async fn oversized_text_is_rejected() {
        let synth = CommandSynthesizer::new("/nonexistent/espeak-ng", "es");
        let text = "a".repeat(MAX_TTS_INPUT_BYTES + 1);
        let err = synth.synthesize(&text).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum size"));
    }
}
