//! # Realtime Transport
//!
//! The signaling manager and the pipeline talk to the client through these traits only.
//! A [`PeerConnector`] turns an SDP offer into a [`PeerConnection`]; the connection carries
//! inbound media and data-channel messages as frames, and takes outbound events and media.
//!
//! ## Implementations:
//! - [`local::LocalPeerConnector`]: media bridge over a WebSocket (`/ws/media/{pc_id}`)

pub mod local;

use crate::error::ServiceError;
use crate::pipeline::{Frame, SynthesizedAudio, SynthesizedVideo};
use crate::summary::InterviewSummary;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// SDP offer or answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into(), kind: "offer".to_string() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp: sdp.into(), kind: "answer".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, alias = "sdpMid")]
    pub sdp_mid: Option<String>,
    #[serde(default, alias = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

/// Messages pushed to the client over the data channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "bot-transcription")]
    BotTranscription { data: String },

    #[serde(rename = "interview_complete")]
    InterviewComplete { summary: InterviewSummary },

    #[serde(rename = "error")]
    Error { content: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMedia {
    Audio(SynthesizedAudio),
    Video(SynthesizedVideo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    New,
    Connected,
    Closed,
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn pc_id(&self) -> &str;

    /// SDP answer produced for the offer.
    fn answer(&self) -> SessionDescription;

    fn state(&self) -> PeerState;

    async fn add_ice_candidates(&self, candidates: Vec<IceCandidate>) -> Result<(), ServiceError>;

    /// Inbound audio and client messages. Handed out once.
    fn take_input(&self) -> Option<mpsc::Receiver<Frame>>;

    async fn send_event(&self, event: ClientEvent) -> Result<(), ServiceError>;

    async fn send_media(&self, media: OutboundMedia) -> Result<(), ServiceError>;

    /// Resolves once the connection is up (`true`) or closed before connecting (`false`).
    async fn connected(&self) -> bool;

    /// Resolves once the connection is closed, by either side.
    async fn closed(&self);

    async fn close(&self);
}

#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Negotiate a connection for `offer`, identified by `pc_id`.
    async fn accept(
        &self,
        pc_id: &str,
        offer: &SessionDescription,
    ) -> Result<Arc<dyn PeerConnection>, ServiceError>;

    /// Forget a connection once its session is gone.
    fn release(&self, pc_id: &str);
}
