//! The per-turn conversational pipeline.
//!
//! One call to [`TurnPipeline::run_turn`] drives a session through
//! `PROCESSING` and into `RESPONDING`:
//!
//! 1. transcribe the audio blob
//! 2. classify the transcript (skipped when it is empty)
//! 3. read the history window
//! 4. generate the reply
//! 5. synthesize the reply
//! 6. append the exchange to history
//!
//! Every external stage runs under the configured timeout. Any failure
//! returns a [`TurnError`] with nothing appended to history. Dropping the
//! returned future (transport disconnect) likewise leaves history untouched,
//! because the append is the last step.

use crate::classifier::IntentClassifier;
use crate::error::{StageError, TurnError, TurnStage};
use crate::history::ConversationStore;
use crate::reply::ReplyGenerator;
use crate::session::Session;
use domu_types::Intent;
use domu_voice::{AudioHandle, SpeechRenderer, Transcriber};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Media type of inbound blobs, passed to the transcriber.
    pub encoding: String,
    /// How many recent turns the reply generator sees.
    pub history_window: usize,
    /// Upper bound for each external stage call.
    pub stage_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            encoding: "audio/webm".to_string(),
            history_window: 4,
            stage_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub user_text: String,
    pub intent: Intent,
    pub reply_text: String,
    pub audio_handle: AudioHandle,
}

/// Runs stages in strict sequence for one session turn at a time.
#[derive(Clone)]
pub struct TurnPipeline {
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn IntentClassifier>,
    replies: ReplyGenerator,
    speech: SpeechRenderer,
    history: ConversationStore,
    settings: PipelineSettings,
}

impl TurnPipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        classifier: Arc<dyn IntentClassifier>,
        replies: ReplyGenerator,
        speech: SpeechRenderer,
        history: ConversationStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transcriber,
            classifier,
            replies,
            speech,
            history,
            settings,
        }
    }

    pub fn history(&self) -> &ConversationStore {
        &self.history
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    async fn bounded<T, E, F>(&self, stage: TurnStage, fut: F) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StageError>,
    {
        let started = Instant::now();
        let result = tokio::time::timeout(self.settings.stage_timeout, fut)
            .await
            .map_err(|_| TurnError::Timeout {
                stage,
                millis: self.settings.stage_timeout.as_millis(),
            })?
            .map_err(|e| TurnError::Stage {
                stage,
                source: e.into(),
            });
        tracing::debug!(
            stage = stage.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "stage finished"
        );
        result
    }

    /// Processes one audio blob for `session`.
    ///
    /// The session must be in `RECEIVING`. On success it is left in
    /// `RESPONDING`; on a stage failure it is left in `PROCESSING`. Either way
    /// the caller emits the result and then calls [`Session::finish_turn`].
    pub async fn run_turn(
        &self,
        session: &mut Session,
        audio: Vec<u8>,
    ) -> Result<TurnOutcome, TurnError> {
        session.begin_processing()?;
        let started = Instant::now();
        let audio_bytes = audio.len();

        let user_text = self
            .bounded(
                TurnStage::Transcription,
                self.transcriber.transcribe(&audio, &self.settings.encoding),
            )
            .await?;
        drop(audio);

        let intent = if user_text.is_empty() {
            Intent::Neutral
        } else {
            self.bounded(TurnStage::Classification, self.classifier.classify(&user_text))
                .await?
        };

        let window = self
            .history
            .window(session.history_key(), self.settings.history_window);

        let reply_text = self
            .bounded(
                TurnStage::Generation,
                self.replies
                    .generate_reply(session.lead(), &user_text, intent, &window),
            )
            .await?;

        let audio_handle = self
            .bounded(TurnStage::Synthesis, self.speech.render(&reply_text))
            .await?;

        let history_len = self
            .history
            .append_turn(session.history_key(), &user_text, &reply_text);
        session.begin_responding()?;

        tracing::info!(
            session_id = %session.id(),
            history_key = session.history_key(),
            audio_bytes,
            intent = %intent,
            history_len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn completed"
        );

        Ok(TurnOutcome {
            user_text,
            intent,
            reply_text,
            audio_handle,
        })
    }
}

impl std::fmt::Debug for TurnPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnPipeline")
            .field("replies", &self.replies)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
