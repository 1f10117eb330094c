//! Server configuration loading from file and environment variables.

use domu_agent::{LeadRecord, PipelineSettings, ReplyPolicy};
use domu_voice::{AudioStoreConfig, GeminiConfig, SttBackend, SttConfig, TtsBackend, TtsConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Gemini API settings, shared by transcription and generation.
    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub stt: SttConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    /// Where reply audio is written and how it is addressed.
    #[serde(default)]
    pub audio: AudioStoreConfig,

    /// Conversation policy and pipeline tunables.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Known leads, looked up by id on connect.
    #[serde(default)]
    pub leads: Vec<LeadRecord>,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "domu_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Which intent classifier is bound at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    #[default]
    Keyword,
    /// Ask the text-generation backend for a label.
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_company")]
    pub company: String,

    /// Number of recent turns included in the generation prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_max_sentences")]
    pub max_sentences: usize,

    /// Upper bound for each external stage call, in seconds.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    #[serde(default)]
    pub classifier: ClassifierBackend,

    #[serde(default = "default_offerings")]
    pub offerings: Vec<String>,

    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
}

impl AgentConfig {
    pub fn reply_policy(&self) -> ReplyPolicy {
        ReplyPolicy {
            company: self.company.clone(),
            max_sentences: self.max_sentences,
            offerings: self.offerings.clone(),
            locations: self.locations.clone(),
        }
    }

    pub fn pipeline_settings(&self, encoding: &str) -> PipelineSettings {
        PipelineSettings {
            encoding: encoding.to_string(),
            history_window: self.history_window,
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_company() -> String {
    ReplyPolicy::default().company
}

fn default_history_window() -> usize {
    4
}

fn default_max_sentences() -> usize {
    3
}

fn default_stage_timeout_secs() -> u64 {
    30
}

fn default_offerings() -> Vec<String> {
    ReplyPolicy::default().offerings
}

fn default_locations() -> Vec<String> {
    ReplyPolicy::default().locations
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            company: default_company(),
            history_window: default_history_window(),
            max_sentences: default_max_sentences(),
            stage_timeout_secs: default_stage_timeout_secs(),
            classifier: ClassifierBackend::default(),
            offerings: default_offerings(),
            locations: default_locations(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but cannot run.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Checks the settings the selected backends need.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        // Reply generation always goes through Gemini.
        if self.gemini.api_key.trim().is_empty() {
            return invalid("gemini.api_key (or GEMINI_API_KEY) is required");
        }
        if self.tts.backend == TtsBackend::ElevenLabs
            && (self.tts.api_key.trim().is_empty() || self.tts.voice_id.trim().is_empty())
        {
            return invalid(
                "tts.backend = \"elevenlabs\" requires tts.api_key and tts.voice_id \
                 (or ELEVENLABS_API_KEY and ELEVENLABS_VOICE_ID)",
            );
        }
        if self.stt.backend == SttBackend::Command && self.stt.model_path.trim().is_empty() {
            return invalid("stt.backend = \"command\" requires stt.model_path");
        }
        if self.agent.max_sentences == 0 {
            return invalid("agent.max_sentences must be at least 1");
        }
        if self.agent.stage_timeout_secs == 0 {
            return invalid("agent.stage_timeout_secs must be at least 1");
        }
        if self.agent.offerings.is_empty() || self.agent.locations.is_empty() {
            return invalid("agent.offerings and agent.locations must not be empty");
        }
        if let Some(lead) = self.leads.iter().find(|l| l.id.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "lead '{}' has an empty id",
                lead.profile.name
            )));
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Public audio base URL from the environment. `DOMU_PUBLIC_URL` wins over
/// the `BASE_PUBLIC_URL` alias.
fn public_url_override(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    lookup("DOMU_PUBLIC_URL").or_else(|| lookup("BASE_PUBLIC_URL"))
}

/// Environment variable overrides:
/// - `DOMU_HOST` overrides `server.host`
/// - `DOMU_PORT` overrides `server.port`
/// - `DOMU_PUBLIC_URL` (or its alias `BASE_PUBLIC_URL`) overrides `audio.public_url`
/// - `DOMU_AUDIO_DIR` overrides `audio.dir`
/// - `DOMU_LOG_LEVEL` overrides `logging.level`
/// - `DOMU_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `GEMINI_API_KEY` overrides `gemini.api_key`
/// - `ELEVENLABS_API_KEY` overrides `tts.api_key`
/// - `ELEVENLABS_VOICE_ID` overrides `tts.voice_id`
///
/// The result is not validated; call [`Config::validate`] before wiring
/// providers.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("DOMU_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("DOMU_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = public_url_override(|key| std::env::var(key).ok()) {
        config.audio.public_url = url;
    }
    if let Ok(dir) = std::env::var("DOMU_AUDIO_DIR") {
        config.audio.dir = dir;
    }
    if let Ok(level) = std::env::var("DOMU_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("DOMU_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        config.gemini.api_key = key;
    }
    if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
        config.tts.api_key = key;
    }
    if let Ok(voice) = std::env::var("ELEVENLABS_VOICE_ID") {
        config.tts.voice_id = voice;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn runnable() -> Config {
        let mut config = Config::default();
        config.gemini.api_key = "gm-key".to_string();
        config.tts.api_key = "el-key".to_string();
        config.tts.voice_id = "voice-1".to_string();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.agent.history_window, 4);
        assert_eq!(config.agent.max_sentences, 3);
        assert_eq!(config.agent.stage_timeout_secs, 30);
        assert_eq!(config.agent.classifier, ClassifierBackend::Keyword);
        assert_eq!(config.agent.reply_policy(), ReplyPolicy::default());
        assert!(config.leads.is_empty());
    }

    #[test]
    fn parses_sections_and_leads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
port = 9100

[stt]
backend = "command"
model_path = "/models/ggml-small.bin"

[tts]
backend = "command"
binary_path = "/usr/bin/espeak-ng"

[agent]
history_window = 6
stage_timeout_secs = 10
classifier = "remote"
locations = ["Sala Domu Sur"]

[[leads]]
id = "lead-7"
name = "Luisa Ortiz"
vehicle_name = "Domu SUV Z"
vehicle_model = "SUV 2023"
price = 120000000
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.stt.backend, SttBackend::Command);
        assert_eq!(config.tts.backend, TtsBackend::Command);
        assert_eq!(config.agent.classifier, ClassifierBackend::Remote);
        assert_eq!(config.agent.locations, vec!["Sala Domu Sur".to_string()]);
        assert_eq!(config.agent.offerings, ReplyPolicy::default().offerings);

        let settings = config.agent.pipeline_settings(&config.stt.encoding);
        assert_eq!(settings.history_window, 6);
        assert_eq!(settings.stage_timeout, Duration::from_secs(10));

        assert_eq!(config.leads.len(), 1);
        assert_eq!(config.leads[0].id, "lead-7");
        assert_eq!(config.leads[0].profile.name, "Luisa Ortiz");
    }

    #[test]
    fn public_url_accepts_base_public_url_alias() {
        let env = |pairs: &'static [(&'static str, &'static str)]| {
            move |key: &str| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            }
        };

        assert_eq!(
            public_url_override(env(&[("BASE_PUBLIC_URL", "https://cdn.domu.co")])),
            Some("https://cdn.domu.co".to_string())
        );
        assert_eq!(
            public_url_override(env(&[
                ("BASE_PUBLIC_URL", "https://old.domu.co"),
                ("DOMU_PUBLIC_URL", "https://new.domu.co"),
            ])),
            Some("https://new.domu.co".to_string())
        );
        assert_eq!(public_url_override(env(&[])), None);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.agent.history_window, 4);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_requires_provider_secrets() {
        assert!(runnable().validate().is_ok());

        let mut config = runnable();
        config.gemini.api_key.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = runnable();
        config.tts.voice_id.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = runnable();
        config.tts.voice_id.clear();
        config.tts.backend = TtsBackend::Command;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_unusable_agent_settings() {
        let mut config = runnable();
        config.agent.max_sentences = 0;
        assert!(config.validate().is_err());

        let mut config = runnable();
        config.agent.stage_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = runnable();
        config.agent.offerings.clear();
        assert!(config.validate().is_err());
    }
}
