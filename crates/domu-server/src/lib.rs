//! Domu voice agent server library logic.

pub mod api_voice;
pub mod config;

use axum::{routing::get, Extension, Json, Router};
use config::{ClassifierBackend, Config, ConfigError};
use domu_agent::{
    ConversationStore, GeminiGenerator, IntentClassifier, KeywordClassifier, LeadDirectory,
    RemoteClassifier, ReplyGenerator, StaticLeadDirectory, TextGenerator, TurnPipeline,
};
use domu_voice::{
    AudioStore, CommandSynthesizer, CommandTranscriber, ElevenLabsSynthesizer, FsAudioStore,
    GeminiClient, GeminiTranscriber, SpeechRenderer, SpeechSynthesizer, SttBackend, Transcriber,
    TtsBackend, VoiceError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Turn pipeline with its bound providers and the history store.
    pub pipeline: Arc<TurnPipeline>,
    /// Lead lookup used to bind a connection to a caller.
    pub leads: Arc<dyn LeadDirectory>,
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize provider: {0}")]
    Provider(#[from] VoiceError),
}

/// Binds one implementation per capability from the configuration.
///
/// # Errors
///
/// Returns `StartupError` if the configuration is invalid or a provider
/// client cannot be built.
pub fn build_state(config: &Config) -> Result<AppState, StartupError> {
    config.validate()?;

    let gemini = Arc::new(GeminiClient::new(config.gemini.clone())?);

    let transcriber: Arc<dyn Transcriber> = match config.stt.backend {
        SttBackend::Gemini => Arc::new(GeminiTranscriber::new(gemini.clone())),
        SttBackend::Command => Arc::new(CommandTranscriber::new(
            &config.stt.model_path,
            &config.stt.binary_path,
            &config.stt.language,
        )),
    };

    let generator: Arc<dyn TextGenerator> = Arc::new(GeminiGenerator::new(gemini));

    let classifier: Arc<dyn IntentClassifier> = match config.agent.classifier {
        ClassifierBackend::Keyword => Arc::new(KeywordClassifier::new()),
        ClassifierBackend::Remote => Arc::new(RemoteClassifier::new(generator.clone())),
    };

    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.tts.backend {
        TtsBackend::ElevenLabs => Arc::new(ElevenLabsSynthesizer::new(config.tts.clone())?),
        TtsBackend::Command => Arc::new(CommandSynthesizer::new(
            &config.tts.binary_path,
            &config.tts.voice,
        )),
    };
    let store: Arc<dyn AudioStore> = Arc::new(FsAudioStore::new(&config.audio));

    let pipeline = TurnPipeline::new(
        transcriber,
        classifier,
        ReplyGenerator::new(generator, config.agent.reply_policy()),
        SpeechRenderer::new(synthesizer, store),
        ConversationStore::new(),
        config.agent.pipeline_settings(&config.stt.encoding),
    );

    tracing::info!(
        stt = ?config.stt.backend,
        tts = ?config.tts.backend,
        classifier = ?config.agent.classifier,
        leads = config.leads.len(),
        "providers bound"
    );

    Ok(AppState {
        pipeline: Arc::new(pipeline),
        leads: Arc::new(StaticLeadDirectory::new(config.leads.clone())),
    })
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/voice", get(api_voice::voice_ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
