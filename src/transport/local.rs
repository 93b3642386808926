//! Local media bridge transport.
//!
//! The answer SDP points the client at `/ws/media/{pc_id}`. Once the client opens that
//! WebSocket the connection counts as connected; closing it disconnects the session.
//!
//! ## Bridge framing:
//! - **Client → Server binary**: 16-bit little-endian mono PCM
//! - **Client → Server text**: data-channel JSON (`client-ready`, `user-text`, ...)
//! - **Server → Client text**: [`ClientEvent`] JSON
//! - **Server → Client binary**: one tag byte (`0x01` audio PCM, `0x02` video) + payload

use super::{ClientEvent, IceCandidate, OutboundMedia, PeerConnection, PeerConnector, PeerState, SessionDescription};
use crate::error::ServiceError;
use crate::pipeline::{AudioChunk, Frame};
use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

const SERVICE: &str = "media bridge";

/// Inbound frames buffered before the pipeline picks them up.
const INBOUND_CAPACITY: usize = 64;

pub const AUDIO_TAG: u8 = 0x01;
pub const VIDEO_TAG: u8 = 0x02;

/// What the bridge socket writes to the client.
#[derive(Debug)]
pub enum BridgeMessage {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Decode little-endian 16-bit PCM. A trailing odd byte is ignored.
pub fn decode_pcm(bytes: &[u8], sample_rate: u32) -> AudioChunk {
    let mut samples = vec![0i16; bytes.len() / 2];
    LittleEndian::read_i16_into(&bytes[..samples.len() * 2], &mut samples);
    AudioChunk::new(samples, sample_rate)
}

/// Encode outbound media with its tag byte.
pub fn encode_media(media: &OutboundMedia) -> Vec<u8> {
    match media {
        OutboundMedia::Audio(audio) => {
            let mut bytes = Vec::with_capacity(1 + audio.samples.len() * 2);
            bytes.push(AUDIO_TAG);
            for sample in &audio.samples {
                // writing into a Vec can't fail
                let _ = bytes.write_i16::<LittleEndian>(*sample);
            }
            bytes
        }
        OutboundMedia::Video(video) => {
            let mut bytes = Vec::with_capacity(1 + video.data.len());
            bytes.push(VIDEO_TAG);
            bytes.extend_from_slice(&video.data);
            bytes
        }
    }
}

pub struct LocalPeerConnection {
    pc_id: String,
    answer: SessionDescription,
    sample_rate: u32,
    state: watch::Sender<PeerState>,
    inbound_tx: mpsc::Sender<Frame>,
    inbound_rx: Mutex<Option<mpsc::Receiver<Frame>>>,
    outbound_tx: mpsc::UnboundedSender<BridgeMessage>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<BridgeMessage>>>,
    candidates: Mutex<Vec<IceCandidate>>,
}

impl LocalPeerConnection {
    fn new(pc_id: &str, sample_rate: u32) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(PeerState::New);

        Self {
            pc_id: pc_id.to_string(),
            answer: SessionDescription::answer(bridge_answer_sdp(pc_id)),
            sample_rate,
            state,
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            candidates: Mutex::new(Vec::new()),
        }
    }

    /// Attach the bridge socket. Only the first attach succeeds.
    pub fn attach(&self) -> Option<mpsc::UnboundedReceiver<BridgeMessage>> {
        if self.state() == PeerState::Closed {
            return None;
        }
        let outbound = self.outbound_rx.lock().take()?;
        self.state.send_replace(PeerState::Connected);
        info!(pc_id = %self.pc_id, "Media bridge attached");
        Some(outbound)
    }

    /// The bridge socket went away.
    pub fn detach(&self) {
        if self.state.send_replace(PeerState::Closed) != PeerState::Closed {
            info!(pc_id = %self.pc_id, "Media bridge detached");
        }
    }

    /// Queue PCM bytes from the client. Dropped when the pipeline is not keeping up.
    pub fn push_audio(&self, bytes: &[u8]) {
        let chunk = decode_pcm(bytes, self.sample_rate);
        if let Err(mpsc::error::TrySendError::Full(_)) = self.inbound_tx.try_send(Frame::AudioChunk(chunk)) {
            warn!(pc_id = %self.pc_id, "Inbound audio queue full, dropping chunk");
        }
    }

    /// Queue a data-channel message from the client.
    pub fn push_message(&self, text: &str) -> Result<(), ServiceError> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|err| ServiceError::InvalidResponse {
            service: SERVICE,
            message: format!("client message is not JSON: {err}"),
        })?;
        self.inbound_tx
            .try_send(Frame::ClientMessage(value))
            .map_err(|err| ServiceError::Request {
                service: SERVICE,
                message: format!("inbound queue unavailable: {err}"),
            })
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.lock().len()
    }

    fn outbound(&self, message: BridgeMessage) -> Result<(), ServiceError> {
        self.outbound_tx.send(message).map_err(|_| ServiceError::Request {
            service: SERVICE,
            message: "bridge socket is gone".to_string(),
        })
    }
}

fn bridge_answer_sdp(pc_id: &str) -> String {
    format!(
        "v=0\r\no=- {} 1 IN IP4 0.0.0.0\r\ns=interview-coach\r\nt=0 0\r\na=x-media-bridge:/ws/media/{}\r\n",
        chrono::Utc::now().timestamp(),
        pc_id
    )
}

#[async_trait]
impl PeerConnection for LocalPeerConnection {
    fn pc_id(&self) -> &str {
        &self.pc_id
    }

    fn answer(&self) -> SessionDescription {
        self.answer.clone()
    }

    fn state(&self) -> PeerState {
        *self.state.borrow()
    }

    async fn add_ice_candidates(&self, candidates: Vec<IceCandidate>) -> Result<(), ServiceError> {
        let count = candidates.len();
        self.candidates.lock().extend(candidates);
        debug!(pc_id = %self.pc_id, count, total = self.candidate_count(), "Recorded ICE candidates");
        Ok(())
    }

    fn take_input(&self) -> Option<mpsc::Receiver<Frame>> {
        self.inbound_rx.lock().take()
    }

    async fn send_event(&self, event: ClientEvent) -> Result<(), ServiceError> {
        let text = serde_json::to_string(&event).map_err(|err| ServiceError::InvalidResponse {
            service: SERVICE,
            message: err.to_string(),
        })?;
        self.outbound(BridgeMessage::Text(text))
    }

    async fn send_media(&self, media: OutboundMedia) -> Result<(), ServiceError> {
        self.outbound(BridgeMessage::Binary(encode_media(&media)))
    }

    async fn connected(&self) -> bool {
        let mut state = self.state.subscribe();
        let connected = match state.wait_for(|state| *state != PeerState::New).await {
            Ok(state) => *state == PeerState::Connected,
            Err(_) => false,
        };
        connected
    }

    async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|state| *state == PeerState::Closed).await;
    }

    async fn close(&self) {
        let _ = self.outbound_tx.send(BridgeMessage::Close);
        self.detach();
    }
}

/// Connector handing out bridge-backed connections.
pub struct LocalPeerConnector {
    sample_rate: u32,
    connections: Mutex<HashMap<String, Arc<LocalPeerConnection>>>,
}

impl LocalPeerConnector {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the connection a bridge socket belongs to.
    pub fn bridge(&self, pc_id: &str) -> Option<Arc<LocalPeerConnection>> {
        self.connections.lock().get(pc_id).cloned()
    }
}

#[async_trait]
impl PeerConnector for LocalPeerConnector {
    async fn accept(
        &self,
        pc_id: &str,
        offer: &SessionDescription,
    ) -> Result<Arc<dyn PeerConnection>, ServiceError> {
        debug!(pc_id, offer_bytes = offer.sdp.len(), "Accepting offer over media bridge");
        let connection = Arc::new(LocalPeerConnection::new(pc_id, self.sample_rate));
        self.connections
            .lock()
            .insert(pc_id.to_string(), connection.clone());
        Ok(connection)
    }

    fn release(&self, pc_id: &str) {
        self.connections.lock().remove(pc_id);
    }
}
