//! Voice WebSocket API handler.
//!
//! One connection is one call. The client sends one binary frame per
//! utterance; the server answers each with exactly one JSON text frame, either
//! a `reply` or an `error`. Turns within a connection run one at a time.
//! Blobs that arrive during a turn are queued up to [`MAX_QUEUED_BLOBS`];
//! beyond that each extra blob is answered with an `error` frame at once.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        ConnectInfo, Extension, Query, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use domu_agent::{resolve_caller, ResolvedCaller, Session, TurnError, TurnOutcome};
use domu_types::Intent;
use domu_voice::MAX_STT_INPUT_BYTES;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

/// Message sent to the caller when a turn fails.
pub const TURN_ERROR_MESSAGE: &str = "Error procesando el audio en el servidor";

/// Blobs held while a turn is in flight.
pub const MAX_QUEUED_BLOBS: usize = 4;

/// Largest accepted WebSocket message; matches the transcription input limit.
pub const MAX_AUDIO_MESSAGE_BYTES: usize = MAX_STT_INPUT_BYTES;

/// Query parameters for the voice connection.
#[derive(Debug, Default, Deserialize)]
pub struct VoiceConnectParams {
    #[serde(rename = "leadId")]
    pub lead_id: Option<String>,
}

/// Outgoing WebSocket message types.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    #[serde(rename_all = "camelCase")]
    Reply {
        user_text: String,
        intent: Intent,
        reply_text: String,
        audio_url: String,
    },
    Error {
        message: String,
        detail: String,
    },
}

impl From<TurnOutcome> for OutgoingMessage {
    fn from(outcome: TurnOutcome) -> Self {
        Self::Reply {
            user_text: outcome.user_text,
            intent: outcome.intent,
            reply_text: outcome.reply_text,
            audio_url: outcome.audio_handle.into_string(),
        }
    }
}

impl From<&TurnError> for OutgoingMessage {
    fn from(err: &TurnError) -> Self {
        Self::Error {
            message: TURN_ERROR_MESSAGE.to_string(),
            detail: err.to_string(),
        }
    }
}

impl OutgoingMessage {
    fn queue_full() -> Self {
        Self::Error {
            message: TURN_ERROR_MESSAGE.to_string(),
            detail: format!(
                "too many audio messages pending ({} queued); blob dropped",
                MAX_QUEUED_BLOBS
            ),
        }
    }
}

/// Upgrades `GET /ws/voice` and binds the connection to a caller.
///
/// Unknown or missing identifiers are not rejected: the session is bound to
/// the demo identity instead.
pub async fn voice_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(params): Query<VoiceConnectParams>,
) -> impl IntoResponse {
    let caller = resolve_caller(state.leads.as_ref(), params.lead_id.as_deref()).await;

    tracing::info!(
        remote_addr = %addr,
        history_key = %caller.history_key,
        demo = caller.is_demo,
        "voice connection accepted"
    );

    ws.max_message_size(MAX_AUDIO_MESSAGE_BYTES)
        .max_frame_size(MAX_AUDIO_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, caller))
}

/// What a single inbound frame means for the turn loop.
enum Inbound {
    Audio(Vec<u8>),
    Ignored,
    Closed,
}

fn inbound(frame: Option<Result<AxumMessage, axum::Error>>) -> Inbound {
    match frame {
        Some(Ok(AxumMessage::Binary(bytes))) => Inbound::Audio(bytes.to_vec()),
        Some(Ok(AxumMessage::Text(_))) => {
            tracing::warn!("ignoring text frame on voice socket; audio must be sent as binary");
            Inbound::Ignored
        }
        Some(Ok(AxumMessage::Ping(_) | AxumMessage::Pong(_))) => Inbound::Ignored,
        Some(Ok(AxumMessage::Close(_))) | None => Inbound::Closed,
        Some(Err(e)) => {
            tracing::debug!("voice socket read error: {}", e);
            Inbound::Closed
        }
    }
}

type WsSender = SplitSink<WebSocket, AxumMessage>;

async fn send_message(sender: &mut WsSender, message: &OutgoingMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("failed to serialize voice message: {}", e);
            return true;
        }
    };
    sender.send(AxumMessage::Text(json.into())).await.is_ok()
}

/// Runs the turn loop for one connection until the transport goes away.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, caller: ResolvedCaller) {
    let mut session = Session::connect(caller);
    if let Err(e) = session.activate() {
        tracing::error!(session_id = %session.id(), "failed to activate session: {}", e);
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    // Blobs that arrive while a turn is in flight, processed in order afterwards.
    let mut pending: VecDeque<Vec<u8>> = VecDeque::with_capacity(MAX_QUEUED_BLOBS);
    let session_id = session.id();

    'turns: loop {
        if let Err(e) = session.begin_receiving() {
            tracing::error!(session_id = %session.id(), "{}", e);
            break;
        }

        let audio = match pending.pop_front() {
            Some(audio) => audio,
            None => loop {
                match inbound(receiver.next().await) {
                    Inbound::Audio(audio) => break audio,
                    Inbound::Ignored => continue,
                    Inbound::Closed => break 'turns,
                }
            },
        };

        let result = {
            let turn = state.pipeline.run_turn(&mut session, audio);
            tokio::pin!(turn);
            loop {
                tokio::select! {
                    result = &mut turn => break Some(result),
                    frame = receiver.next() => match inbound(frame) {
                        Inbound::Audio(audio) if pending.len() < MAX_QUEUED_BLOBS => {
                            pending.push_back(audio);
                        }
                        Inbound::Audio(audio) => {
                            tracing::warn!(
                                %session_id,
                                audio_bytes = audio.len(),
                                "turn queue full; rejecting blob"
                            );
                            if !send_message(&mut sender, &OutgoingMessage::queue_full()).await {
                                break None;
                            }
                        }
                        Inbound::Ignored => {}
                        Inbound::Closed => break None,
                    },
                }
            }
        };

        let Some(result) = result else {
            tracing::info!(
                session_id = %session.id(),
                queued = pending.len(),
                "caller disconnected mid-turn; turn aborted"
            );
            break;
        };

        let message = match result {
            Ok(outcome) => OutgoingMessage::from(outcome),
            Err(e) => {
                tracing::error!(
                    session_id = %session.id(),
                    stage = e.stage().map(|s| s.as_str()).unwrap_or("session"),
                    "turn failed: {}",
                    e
                );
                OutgoingMessage::from(&e)
            }
        };

        if !send_message(&mut sender, &message).await {
            tracing::info!(session_id = %session.id(), "caller disconnected before reply was sent");
            break;
        }

        if let Err(e) = session.finish_turn() {
            tracing::error!(session_id = %session.id(), "{}", e);
            break;
        }
    }

    session.close();
    tracing::info!(
        session_id = %session.id(),
        history_key = session.history_key(),
        opened_at = %session.opened_at(),
        turns_completed = session.turns_completed(),
        turns_failed = session.turns_failed(),
        open_histories = state.pipeline.history().session_count(),
        "voice session closed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use domu_voice::AudioHandle;

    #[test]
    fn connect_params_read_lead_id() {
        let params: VoiceConnectParams = serde_json::from_str(r#"{"leadId": "lead-1"}"#).unwrap();
        assert_eq!(params.lead_id.as_deref(), Some("lead-1"));

        let params: VoiceConnectParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.lead_id, None);
    }

    #[test]
    fn reply_frame_uses_camel_case_fields() {
        let message = OutgoingMessage::from(TurnOutcome {
            user_text: "me interesa".to_string(),
            intent: Intent::Interested,
            reply_text: "¡Genial!".to_string(),
            audio_handle: AudioHandle::new("http://localhost:8000/audio/ws_reply_1.mp3"),
        });
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["type"], "reply");
        assert_eq!(json["userText"], "me interesa");
        assert_eq!(json["intent"], "INTERESTED");
        assert_eq!(json["replyText"], "¡Genial!");
        assert_eq!(json["audioUrl"], "http://localhost:8000/audio/ws_reply_1.mp3");
    }

    #[test]
    fn error_frame_carries_fixed_message_and_detail() {
        let err = TurnError::Timeout {
            stage: domu_agent::TurnStage::Synthesis,
            millis: 30_000,
        };
        let json = serde_json::to_value(OutgoingMessage::from(&err)).unwrap();

        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], TURN_ERROR_MESSAGE);
        assert_eq!(json["detail"], "synthesis stage timed out after 30000 ms");
    }
}
