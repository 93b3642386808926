//! # Session Signaling Manager
//!
//! Owns the offer/answer exchange and everything that hangs off a negotiated connection:
//! registering the session, running its pipeline, delivering the summary, and cleaning up.
//!
//! ## Session task:
//! 1. Wait for the transport to connect, giving up after `performance.connect_timeout_secs`
//!    (or when the session is cancelled)
//! 2. Start the pipeline and queue `StartInterview`
//! 3. Drain the pipeline output until the interview completes, the candidate ends it
//!    early, the connection drops, or the session is cancelled
//! 4. Deliver the summary when there is something to evaluate
//! 5. Cancel the pipeline, close the connection, leave the registry
//!
//! ## Listeners:
//! `on_connected` / `on_disconnected` callbacks receive the `pc_id`. They run on the
//! session task and should return quickly.

use crate::config::AppConfig;
use crate::error::SignalingError;
use crate::llm::LanguageModel;
use crate::pipeline::stages::{session_stages, StageSettings};
use crate::pipeline::{ControlSignal, Frame, Pipeline};
use crate::services::Collaborators;
use crate::session::{Conversation, InterviewSession, SessionRegistry, SessionStatus, SignalingState};
use crate::setup::{SetupContext, SetupStore};
use crate::summary::SummarySynthesizer;
use crate::transport::{ClientEvent, IceCandidate, PeerConnector, SessionDescription};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Sent to the client when the summary can't be produced.
pub const SESSION_ERROR_MESSAGE: &str = "An error occurred during the interview.";

pub type ConnectionListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Response body for `POST /api/offer`.
#[derive(Debug, Clone, Serialize)]
pub struct OfferAnswer {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub pc_id: String,
}

/// How a session's pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    EndedEarly,
    Disconnected,
    Cancelled,
}

pub struct SignalingManager {
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn PeerConnector>,
    setup_store: Arc<SetupStore>,
    collaborators: Collaborators,
    summary: SummarySynthesizer,
    settings: StageSettings,
    connect_timeout: Duration,
    on_connected: RwLock<Vec<ConnectionListener>>,
    on_disconnected: RwLock<Vec<ConnectionListener>>,
}

impl SignalingManager {
    pub fn new(
        config: &AppConfig,
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn PeerConnector>,
        setup_store: Arc<SetupStore>,
        collaborators: Collaborators,
    ) -> Self {
        let summary = SummarySynthesizer::new(
            collaborators.model.clone(),
            config.llm.summary_max_tokens,
            config.llm.temperature,
        );
        Self {
            registry,
            connector,
            setup_store,
            collaborators,
            summary,
            settings: StageSettings {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
                sample_rate: config.pipeline.audio_sample_rate,
            },
            connect_timeout: Duration::from_secs(config.performance.connect_timeout_secs),
            on_connected: RwLock::new(Vec::new()),
            on_disconnected: RwLock::new(Vec::new()),
        }
    }

    /// Language model shared by every session.
    pub fn model(&self) -> Arc<dyn LanguageModel> {
        self.collaborators.model.clone()
    }

    pub fn on_connected(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.on_connected.write().push(Arc::new(listener));
    }

    pub fn on_disconnected(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.on_disconnected.write().push(Arc::new(listener));
    }

    fn notify(listeners: &RwLock<Vec<ConnectionListener>>, pc_id: &str) {
        let listeners: Vec<_> = listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener(pc_id);
        }
    }

    /// Accept an offer: register a session, start it in the background, return the answer.
    ///
    /// A setup attached to the offer wins over the last `POST /api/setup` and also
    /// replaces it.
    pub async fn handle_offer(
        self: &Arc<Self>,
        offer: SessionDescription,
        setup: Option<SetupContext>,
    ) -> Result<OfferAnswer, SignalingError> {
        if offer.kind != "offer" {
            return Err(SignalingError::InvalidOffer(format!("expected type \"offer\", got \"{}\"", offer.kind)));
        }
        if offer.sdp.trim().is_empty() {
            return Err(SignalingError::InvalidOffer("empty SDP".to_string()));
        }
        if !self.registry.has_capacity() {
            return Err(SignalingError::CapacityExceeded(self.registry.max_sessions()));
        }

        if let Some(setup) = &setup {
            self.setup_store.record(setup.clone());
        }
        let setup = self.setup_store.resolve(setup);

        let pc_id = Uuid::new_v4().to_string();
        let connection = self.connector.accept(&pc_id, &offer).await?;
        let answer = connection.answer();

        let session = Arc::new(InterviewSession::new(
            pc_id.clone(),
            Arc::new(Conversation::new(setup)),
            connection.clone(),
        ));
        if let Err(err) = self.registry.insert(session.clone()) {
            connection.close().await;
            self.connector.release(&pc_id);
            return Err(err);
        }
        session.advance_signaling(SignalingState::AnswerSent);

        info!(
            pc_id = %pc_id,
            job_title = session.conversation.setup().and_then(|s| s.job_title()).unwrap_or("-"),
            questions = session.conversation.interview().pool_size(),
            "Offer accepted"
        );

        tokio::spawn(self.clone().run_session(session));

        Ok(OfferAnswer {
            sdp: answer.sdp,
            kind: answer.kind,
            pc_id,
        })
    }

    pub async fn handle_candidates(&self, pc_id: &str, candidates: Vec<IceCandidate>) -> Result<(), SignalingError> {
        let session = self
            .registry
            .get(pc_id)
            .ok_or_else(|| SignalingError::NotFound(pc_id.to_string()))?;

        session.connection.add_ice_candidates(candidates).await?;
        session.advance_signaling(SignalingState::CandidatesExchanged);
        Ok(())
    }

    /// The client went away: cancel the pipeline and drop the session.
    pub fn on_disconnect(&self, pc_id: &str) -> Result<(), SignalingError> {
        let session = self
            .registry
            .remove(pc_id)
            .ok_or_else(|| SignalingError::NotFound(pc_id.to_string()))?;

        info!(pc_id, "Session disconnected");
        session.set_status(SessionStatus::Closing);
        session.cancel();
        Ok(())
    }

    /// End a session on request: the interview stops early and a summary is attempted.
    pub async fn terminate(&self, pc_id: &str) -> Result<(), SignalingError> {
        let session = self
            .registry
            .get(pc_id)
            .ok_or_else(|| SignalingError::NotFound(pc_id.to_string()))?;

        info!(pc_id, "Termination requested");
        match session.input() {
            Some(input) if input.send(Frame::Control(ControlSignal::EndInterview)).await.is_ok() => {}
            _ => session.cancel(),
        }
        Ok(())
    }

    async fn run_session(self: Arc<Self>, session: Arc<InterviewSession>) {
        let pc_id = session.pc_id.clone();
        let cancel = session.cancel_token();

        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            connected = tokio::time::timeout(self.connect_timeout, session.connection.connected()) => {
                connected.unwrap_or_else(|_| {
                    warn!(
                        pc_id = %pc_id,
                        timeout_secs = self.connect_timeout.as_secs(),
                        "Media bridge never connected, releasing session"
                    );
                    false
                })
            }
        };
        let inbound = session.connection.take_input();
        let outcome = match inbound {
            Some(inbound) if connected => {
                session.advance_signaling(SignalingState::Connected);
                session.set_status(SessionStatus::Active);
                Self::notify(&self.on_connected, &pc_id);
                self.drive(&session, inbound, cancel.clone()).await
            }
            _ => {
                debug!(pc_id = %pc_id, "Session ended before connecting");
                Outcome::Cancelled
            }
        };

        info!(pc_id = %pc_id, outcome = ?outcome, "Interview session finished");
        self.cleanup(&session).await;
    }

    /// Run the pipeline until the session ends and deliver the summary if due.
    async fn drive(&self, session: &Arc<InterviewSession>, inbound: mpsc::Receiver<Frame>, cancel: CancellationToken) -> Outcome {
        let stages = session_stages(
            session.conversation.clone(),
            session.connection.clone(),
            &self.collaborators,
            self.settings,
        );
        let mut pipeline = Pipeline::new(stages).spawn(cancel.clone());
        let input = pipeline.input();

        // queued ahead of any client input so the greeting comes first
        let _ = input.send(Frame::Control(ControlSignal::StartInterview)).await;
        session.attach_input(input.clone());
        let pump = tokio::spawn(pump_inbound(inbound, input, cancel.clone()));

        let outcome = loop {
            tokio::select! {
                biased;
                _ = session.connection.closed() => break Outcome::Disconnected,
                frame = pipeline.next_output() => match frame {
                    Some(Frame::Control(ControlSignal::InterviewComplete)) => break Outcome::Completed,
                    Some(Frame::Control(ControlSignal::EndInterview)) => break Outcome::EndedEarly,
                    Some(_) => {}
                    None => break Outcome::Cancelled,
                },
            }
        };

        session.set_status(SessionStatus::Closing);
        session.detach_input();
        if matches!(outcome, Outcome::Completed | Outcome::EndedEarly) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => debug!(pc_id = %session.pc_id, "Cancelled while summarizing"),
                _ = self.deliver_summary(session) => {}
            }
        }

        pipeline.cancel();
        pipeline.join().await;
        if let Err(err) = pump.await {
            warn!(pc_id = %session.pc_id, error = %err, "Inbound pump failed");
        }
        outcome
    }

    /// Evaluate the answered questions and send the result (or an error) to the client.
    async fn deliver_summary(&self, session: &InterviewSession) {
        let qa_log = {
            let interview = session.conversation.interview();
            if !interview.has_answers() {
                info!(pc_id = %session.pc_id, "No answers recorded, closing without summary");
                return;
            }
            interview.qa_log().to_vec()
        };

        let event = match self.summary.synthesize(&qa_log).await {
            Ok(summary) => {
                info!(pc_id = %session.pc_id, overall_score = summary.overall_score, "Summary ready");
                ClientEvent::InterviewComplete { summary }
            }
            Err(err) => {
                error!(pc_id = %session.pc_id, error = %err, "Summary generation failed");
                ClientEvent::Error { content: SESSION_ERROR_MESSAGE.to_string() }
            }
        };

        if let Err(err) = session.connection.send_event(event).await {
            warn!(pc_id = %session.pc_id, error = %err, "Failed to deliver summary");
        }
    }

    async fn cleanup(&self, session: &InterviewSession) {
        session.cancel();
        session.detach_input();
        session.connection.close().await;
        self.connector.release(&session.pc_id);
        self.registry.remove(&session.pc_id);
        session.advance_signaling(SignalingState::Disconnected);
        session.set_status(SessionStatus::Closed);
        Self::notify(&self.on_disconnected, &session.pc_id);
    }
}

/// Forward transport input into the pipeline until either side stops.
async fn pump_inbound(mut inbound: mpsc::Receiver<Frame>, input: mpsc::Sender<Frame>, cancel: CancellationToken) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = inbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = input.send(frame) => sent,
        };
        if sent.is_err() {
            break;
        }
    }
}
