//! Conversational core of the Domu voice sales agent.
//!
//! A call is a [`Session`] bound to one caller. Each audio blob the caller
//! sends becomes one turn, run by the [`TurnPipeline`] through five stages in
//! strict sequence:
//!
//! | Stage | Contract | Default implementation |
//! |-------|----------|------------------------|
//! | transcription | [`Transcriber`](domu_voice::Transcriber) | Gemini |
//! | classification | [`IntentClassifier`] | [`KeywordClassifier`] |
//! | history read | [`ConversationStore::window`] | in-memory |
//! | generation | [`ReplyGenerator`] over a [`TextGenerator`] | Gemini |
//! | synthesis | [`SpeechRenderer`](domu_voice::SpeechRenderer) | ElevenLabs |
//!
//! A failing stage fails only its turn; the session stays usable.

pub mod classifier;
pub mod error;
pub mod extract;
pub mod generator;
pub mod history;
pub mod leads;
pub mod normalize;
pub mod pipeline;
pub mod reply;
pub mod session;

pub use classifier::{IntentClassifier, KeywordClassifier, RemoteClassifier};
pub use error::{AgentError, StageError, TurnError, TurnStage};
pub use extract::intent_from_output;
pub use generator::{GeminiGenerator, TextGenerator};
pub use history::{ConversationStore, ConversationTurn};
pub use leads::{
    resolve_caller, LeadDirectory, LeadRecord, ResolvedCaller, StaticLeadDirectory,
    DEMO_KEY_PREFIX,
};
pub use normalize::normalize_text;
pub use pipeline::{PipelineSettings, TurnOutcome, TurnPipeline};
pub use reply::{limit_sentences, requests_address, ReplyGenerator, ReplyPolicy};
pub use session::{Session, SessionError, SessionState};
