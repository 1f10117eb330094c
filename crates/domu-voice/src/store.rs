//! Persistence of synthesized replies.
//!
//! The voice pipeline never serves audio bytes itself. It writes each reply
//! under a unique filename and hands back a URL that an external file server
//! resolves. Cleanup of written files belongs to that server.

use crate::config::AudioStoreConfig;
use crate::error::VoiceError;
use crate::tts::SynthesizedAudio;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Opaque, fetchable reference to one synthesized reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AudioHandle(String);

impl AudioHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stores synthesized audio and returns an addressable handle.
#[async_trait]
pub trait AudioStore: Send + Sync {
    async fn persist(&self, audio: &SynthesizedAudio) -> Result<AudioHandle, VoiceError>;
}

/// Generates a collision-free filename: `<prefix>_<uuid-hex>.<extension>`.
pub fn generate_filename(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, Uuid::new_v4().simple(), extension)
}

/// Writes replies into a local directory served under `<public_url>/audio/`.
#[derive(Debug, Clone)]
pub struct FsAudioStore {
    dir: PathBuf,
    public_url: String,
    prefix: String,
}

impl FsAudioStore {
    pub fn new(config: &AudioStoreConfig) -> Self {
        Self {
            dir: PathBuf::from(&config.dir),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            prefix: config.prefix.clone(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL for a stored filename.
    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/audio/{}", self.public_url, filename)
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn persist(&self, audio: &SynthesizedAudio) -> Result<AudioHandle, VoiceError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            VoiceError::AudioStore(format!(
                "Failed to create audio directory {:?}: {}",
                self.dir, e
            ))
        })?;

        let filename = generate_filename(&self.prefix, audio.extension);
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, &audio.bytes)
            .await
            .map_err(|e| VoiceError::AudioStore(format!("Failed to write {:?}: {}", path, e)))?;

        tracing::debug!(file = %filename, bytes = audio.bytes.len(), "stored synthesized reply");

        Ok(AudioHandle::new(self.url_for(&filename)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn filenames_are_unique_and_well_formed() {
        let names: HashSet<String> = (0..500).map(|_| generate_filename("ws_reply", "mp3")).collect();
        assert_eq!(names.len(), 500);

        let name = names.iter().next().unwrap();
        assert!(name.starts_with("ws_reply_"));
        assert!(name.ends_with(".mp3"));
        // prefix + '_' + 32 hex chars + ".mp3"
        assert_eq!(name.len(), "ws_reply_".len() + 32 + ".mp3".len());
    }

    #[test]
    fn url_strips_trailing_slash_from_public_url() {
        let store = FsAudioStore::new(&AudioStoreConfig {
            dir: "audio".to_string(),
            public_url: "https://voice.example.com/".to_string(),
            prefix: "ws_reply".to_string(),
        });
        assert_eq!(
            store.url_for("ws_reply_abc.mp3"),
            "https://voice.example.com/audio/ws_reply_abc.mp3"
        );
    }
}
