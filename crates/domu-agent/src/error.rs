//! Error types for the conversational core.

use crate::session::SessionError;
use domu_voice::VoiceError;
use std::fmt;
use thiserror::Error;

/// Errors raised by the agent's own collaborators (generation, classification,
/// lead lookup).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("intent classification failed: {0}")]
    Classification(String),

    #[error("lead lookup failed: {0}")]
    Lead(String),
}

/// The pipeline stage a turn failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Transcription,
    Classification,
    Generation,
    Synthesis,
}

impl TurnStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Classification => "classification",
            Self::Generation => "generation",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Failure of a single turn. Never terminates the session on its own.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: TurnStage,
        #[source]
        source: StageError,
    },

    #[error("{stage} stage timed out after {millis} ms")]
    Timeout { stage: TurnStage, millis: u128 },

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TurnError {
    /// The stage that failed, if the failure came from a stage.
    pub fn stage(&self) -> Option<TurnStage> {
        match self {
            Self::Stage { stage, .. } | Self::Timeout { stage, .. } => Some(*stage),
            Self::Session(_) => None,
        }
    }
}
