//! Session lifecycle state machine.
//!
//! ```text
//! CONNECTING -> ACTIVE -> RECEIVING -> PROCESSING -> RESPONDING -> ACTIVE -> ...
//!                                          |                         ^
//!                                          +------ (turn error) -----+
//! any state -> CLOSED
//! ```
//!
//! `CLOSED` is terminal. A session is owned by exactly one connection task.

use crate::leads::ResolvedCaller;
use chrono::{DateTime, Utc};
use domu_types::LeadProfile;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of one caller connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    /// Idle, waiting for the next audio blob.
    Active,
    Receiving,
    Processing,
    Responding,
    Closed,
}

impl SessionState {
    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Connecting, Active) => true,
            (Active, Receiving) => true,
            (Receiving, Processing) => true,
            (Processing, Responding) => true,
            (Processing, Active) => true,
            (Responding, Active) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session transition from {from:?} to {to:?}")]
pub struct SessionError {
    pub from: SessionState,
    pub to: SessionState,
}

/// One caller's connection: identity, lead snapshot and lifecycle state.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    history_key: String,
    lead: LeadProfile,
    state: SessionState,
    turns_completed: u64,
    turns_failed: u64,
    opened_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session in `CONNECTING` for a resolved caller.
    pub fn connect(caller: ResolvedCaller) -> Self {
        Self {
            id: Uuid::new_v4(),
            history_key: caller.history_key,
            lead: caller.lead,
            state: SessionState::Connecting,
            turns_completed: 0,
            turns_failed: 0,
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn history_key(&self) -> &str {
        &self.history_key
    }

    pub fn lead(&self) -> &LeadProfile {
        &self.lead
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn turns_completed(&self) -> u64 {
        self.turns_completed
    }

    pub fn turns_failed(&self) -> u64 {
        self.turns_failed
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError {
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(session_id = %self.id, from = ?self.state, to = ?next, "session transition");
        self.state = next;
        Ok(())
    }

    /// `CONNECTING -> ACTIVE` once the identity is bound.
    pub fn activate(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Active)
    }

    /// `ACTIVE -> RECEIVING` while waiting for one complete audio blob.
    pub fn begin_receiving(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Receiving)
    }

    /// `RECEIVING -> PROCESSING` when a blob has arrived.
    pub fn begin_processing(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Processing)
    }

    /// `PROCESSING -> RESPONDING` after the turn is appended to history.
    pub fn begin_responding(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Responding)
    }

    /// Returns to `ACTIVE` after a result (reply or error) has been emitted.
    pub fn finish_turn(&mut self) -> Result<(), SessionError> {
        let succeeded = self.state == SessionState::Responding;
        self.transition(SessionState::Active)?;
        if succeeded {
            self.turns_completed += 1;
        } else {
            self.turns_failed += 1;
        }
        Ok(())
    }

    /// Moves to the terminal `CLOSED` state. Idempotent.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            tracing::trace!(session_id = %self.id, from = ?self.state, "session closed");
            self.state = SessionState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::connect(ResolvedCaller::demo())
    }

    #[test]
    fn happy_path_cycles_back_to_active() {
        let mut s = session();
        assert_eq!(s.state(), SessionState::Connecting);
        s.activate().unwrap();

        for _ in 0..2 {
            s.begin_receiving().unwrap();
            s.begin_processing().unwrap();
            s.begin_responding().unwrap();
            s.finish_turn().unwrap();
            assert_eq!(s.state(), SessionState::Active);
        }
        assert_eq!(s.turns_completed(), 2);
        assert_eq!(s.turns_failed(), 0);
    }

    #[test]
    fn failed_turn_returns_to_active_from_processing() {
        let mut s = session();
        s.activate().unwrap();
        s.begin_receiving().unwrap();
        s.begin_processing().unwrap();
        s.finish_turn().unwrap();

        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.turns_failed(), 1);
        s.begin_receiving().unwrap();
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut s = session();
        let err = s.begin_processing().unwrap_err();
        assert_eq!(err.from, SessionState::Connecting);
        assert_eq!(err.to, SessionState::Processing);

        s.activate().unwrap();
        assert!(s.begin_responding().is_err());
        assert!(s.finish_turn().is_err());
        assert_eq!(s.state(), SessionState::Active);
    }

    #[test]
    fn closed_is_terminal() {
        let mut s = session();
        s.activate().unwrap();
        s.begin_receiving().unwrap();
        s.close();
        s.close();

        assert!(s.is_closed());
        assert!(s.activate().is_err());
        assert!(s.begin_receiving().is_err());
    }

    #[test]
    fn binds_caller_identity() {
        let s = session();
        assert!(s.history_key().starts_with("demo:"));
        assert_eq!(s.lead().name, "Carlos Pérez");
    }
}
