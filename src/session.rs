//! # Interview Session Management
//!
//! Tracks every live interview session: its negotiated connection, its lifecycle, and the
//! conversation state its pipeline works on. The registry is the only state shared across
//! sessions.
//!
//! ## Session Lifecycle:
//! 1. **Connecting**: Offer accepted, waiting for the media connection
//! 2. **Active**: Pipeline running
//! 3. **Closing**: Cancel requested or interview finished, pipeline shutting down
//! 4. **Closed**: Resources released, about to leave the registry
//!
//! ## Signaling States:
//! `OfferReceived → AnswerSent → CandidatesExchanged → Connected → Disconnected`

use crate::context::ContextStore;
use crate::error::SignalingError;
use crate::interview::{build_question_pool, InterviewStateMachine};
use crate::pipeline::Frame;
use crate::setup::SetupContext;
use crate::transport::PeerConnection;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::Connecting => "connecting",
            SessionStatus::Active => "active",
            SessionStatus::Closing => "closing",
            SessionStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalingState {
    OfferReceived,
    AnswerSent,
    CandidatesExchanged,
    Connected,
    Disconnected,
}

/// Interview state one session's pipeline reads and writes.
///
/// Only the interview-logic stage touches the state machine and only the aggregation
/// stages append to the context, so the locks are held for a few instructions at a time.
pub struct Conversation {
    context: Mutex<ContextStore>,
    interview: Mutex<InterviewStateMachine>,
    setup: Option<SetupContext>,
}

impl Conversation {
    pub fn new(setup: Option<SetupContext>) -> Self {
        Self {
            context: Mutex::new(ContextStore::seeded(setup.as_ref())),
            interview: Mutex::new(InterviewStateMachine::new(build_question_pool(setup.as_ref()))),
            setup,
        }
    }

    pub fn context(&self) -> MutexGuard<'_, ContextStore> {
        self.context.lock()
    }

    pub fn interview(&self) -> MutexGuard<'_, InterviewStateMachine> {
        self.interview.lock()
    }

    pub fn setup(&self) -> Option<&SetupContext> {
        self.setup.as_ref()
    }
}

/// One registered interview session.
pub struct InterviewSession {
    pub pc_id: String,
    pub created_at: DateTime<Utc>,
    pub conversation: Arc<Conversation>,
    pub connection: Arc<dyn PeerConnection>,
    cancel: CancellationToken,
    status: RwLock<SessionStatus>,
    signaling: RwLock<SignalingState>,
    /// Pipeline input, present while the pipeline runs.
    input: RwLock<Option<mpsc::Sender<Frame>>>,
}

impl InterviewSession {
    pub fn new(pc_id: String, conversation: Arc<Conversation>, connection: Arc<dyn PeerConnection>) -> Self {
        Self {
            pc_id,
            created_at: Utc::now(),
            conversation,
            connection,
            cancel: CancellationToken::new(),
            status: RwLock::new(SessionStatus::Connecting),
            signaling: RwLock::new(SignalingState::OfferReceived),
            input: RwLock::new(None),
        }
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.read()
    }

    pub fn set_status(&self, status: SessionStatus) {
        *self.status.write() = status;
    }

    pub fn signaling_state(&self) -> SignalingState {
        *self.signaling.read()
    }

    /// Move the signaling state forward. Earlier states are ignored, so a late candidate
    /// batch can't pull a connected session back to `CandidatesExchanged`.
    pub fn advance_signaling(&self, next: SignalingState) {
        let mut state = self.signaling.write();
        if next > *state {
            *state = next;
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn attach_input(&self, input: mpsc::Sender<Frame>) {
        *self.input.write() = Some(input);
    }

    pub fn detach_input(&self) {
        *self.input.write() = None;
    }

    pub fn input(&self) -> Option<mpsc::Sender<Frame>> {
        self.input.read().clone()
    }

    pub fn info(&self) -> SessionInfo {
        let interview = self.conversation.interview();
        SessionInfo {
            pc_id: self.pc_id.clone(),
            status: self.status(),
            signaling_state: self.signaling_state(),
            interview_status: interview.status().as_str().to_string(),
            questions_asked: interview.current_index(),
            question_pool: interview.pool_size(),
            messages: self.conversation.context().len(),
            job_title: self.conversation.setup().and_then(|s| s.job_title()).map(str::to_string),
            created_at: self.created_at,
        }
    }
}

/// Serializable view of a session for `/api/sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub pc_id: String,
    pub status: SessionStatus,
    pub signaling_state: SignalingState,
    pub interview_status: String,
    pub questions_asked: usize,
    pub question_pool: usize,
    /// Conversation messages so far, system prompt included
    pub messages: usize,
    pub job_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registry of live sessions keyed by `pc_id`.
///
/// ## Thread Safety:
/// A single `RwLock<HashMap>`; every operation takes the lock once, so inserts, lookups
/// and removals never observe a half-updated map.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<InterviewSession>>>,
    max_concurrent_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_concurrent_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_concurrent_sessions,
        }
    }

    /// Register a session, enforcing the concurrency limit.
    pub fn insert(&self, session: Arc<InterviewSession>) -> Result<(), SignalingError> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_concurrent_sessions {
            return Err(SignalingError::CapacityExceeded(self.max_concurrent_sessions));
        }
        sessions.insert(session.pc_id.clone(), session);
        Ok(())
    }

    pub fn has_capacity(&self) -> bool {
        self.sessions.read().len() < self.max_concurrent_sessions
    }

    pub fn get(&self, pc_id: &str) -> Option<Arc<InterviewSession>> {
        self.sessions.read().get(pc_id).cloned()
    }

    pub fn remove(&self, pc_id: &str) -> Option<Arc<InterviewSession>> {
        self.sessions.write().remove(pc_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_sessions(&self) -> usize {
        self.max_concurrent_sessions
    }

    /// Snapshot of every session, oldest first.
    pub fn summary(&self) -> Vec<SessionInfo> {
        let sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        let mut infos: Vec<_> = sessions.iter().map(|session| session.info()).collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }

    /// Number of sessions per lifecycle status.
    pub fn status_counts(&self) -> HashMap<String, usize> {
        let sessions = self.sessions.read();
        let mut counts = HashMap::new();
        for session in sessions.values() {
            *counts.entry(session.status().as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Cancel every session still running (server shutdown). Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for session in self.sessions.read().values() {
            if !session.is_cancelled() {
                session.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::local::LocalPeerConnector;
    use crate::transport::{PeerConnector, SessionDescription};

    async fn session(pc_id: &str) -> Arc<InterviewSession> {
        let connector = LocalPeerConnector::new(16000);
        let connection = connector
            .accept(pc_id, &SessionDescription::offer("v=0"))
            .await
            .unwrap();
        Arc::new(InterviewSession::new(
            pc_id.to_string(),
            Arc::new(Conversation::new(None)),
            connection,
        ))
    }

    #[tokio::test]
    async fn test_registry_enforces_capacity() {
        let registry = SessionRegistry::new(2);
        registry.insert(session("a").await).unwrap();
        registry.insert(session("b").await).unwrap();

        let err = registry.insert(session("c").await).unwrap_err();
        assert!(matches!(err, SignalingError::CapacityExceeded(2)));
        assert_eq!(registry.len(), 2);

        registry.remove("a");
        assert!(registry.has_capacity());
        assert!(registry.get("a").is_none());
    }

    #[tokio::test]
    async fn test_cancel_all_skips_cancelled_sessions() {
        let registry = SessionRegistry::new(4);
        let first = session("a").await;
        first.cancel();
        registry.insert(first).unwrap();
        registry.insert(session("b").await).unwrap();

        assert_eq!(registry.cancel_all(), 1);
        assert!(registry.get("b").unwrap().is_cancelled());
        assert_eq!(registry.cancel_all(), 0);
    }

    #[tokio::test]
    async fn test_signaling_state_only_moves_forward() {
        let session = session("pc").await;
        session.advance_signaling(SignalingState::Connected);
        session.advance_signaling(SignalingState::CandidatesExchanged);
        assert_eq!(session.signaling_state(), SignalingState::Connected);
    }

    #[tokio::test]
    async fn test_summary_reports_progress() {
        let registry = SessionRegistry::new(4);
        let session = session("pc").await;
        session.conversation.interview().advance();
        session.set_status(SessionStatus::Active);
        registry.insert(session).unwrap();

        let summary = registry.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].questions_asked, 1);
        assert_eq!(summary[0].question_pool, 4);
        assert_eq!(summary[0].messages, 1);
        assert_eq!(summary[0].status, SessionStatus::Active);
        assert_eq!(registry.status_counts().get("active"), Some(&1));
    }
}
