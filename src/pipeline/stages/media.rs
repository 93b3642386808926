//! Transport edges of the chain: media in from the peer, events and media out to it.

use crate::pipeline::{Frame, Outbox, PipelineClosed, Stage};
use crate::transport::{ClientEvent, OutboundMedia, PeerConnection};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// First stage: admits inbound audio and client messages.
///
/// Empty chunks are dropped, as is audio at a sample rate the session wasn't set up for
/// (reported once).
pub struct TransportInput {
    pc_id: String,
    sample_rate: u32,
    chunks: u64,
    audio_ms: u64,
    rate_mismatch_reported: bool,
}

impl TransportInput {
    pub fn new(pc_id: String, sample_rate: u32) -> Self {
        Self {
            pc_id,
            sample_rate,
            chunks: 0,
            audio_ms: 0,
            rate_mismatch_reported: false,
        }
    }
}

#[async_trait]
impl Stage for TransportInput {
    fn name(&self) -> &'static str {
        "transport-input"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        match frame {
            Frame::AudioChunk(chunk) if chunk.is_empty() => Ok(()),
            Frame::AudioChunk(chunk) if chunk.sample_rate != self.sample_rate => {
                if !self.rate_mismatch_reported {
                    warn!(
                        pc_id = %self.pc_id,
                        expected = self.sample_rate,
                        received = chunk.sample_rate,
                        "Dropping audio with unexpected sample rate"
                    );
                    self.rate_mismatch_reported = true;
                }
                Ok(())
            }
            Frame::AudioChunk(chunk) => {
                if self.chunks == 0 {
                    debug!(pc_id = %self.pc_id, "First audio chunk received");
                }
                self.chunks += 1;
                self.audio_ms += chunk.duration_ms();
                out.send(Frame::AudioChunk(chunk)).await
            }
            other => out.send(other).await,
        }
    }

    fn shutdown(&mut self) {
        info!(pc_id = %self.pc_id, chunks = self.chunks, audio_ms = self.audio_ms, "Inbound media closed");
    }
}

/// Delivers transcripts, apologies and synthesized media to the client.
///
/// Media and apologies end here. Text and control frames continue to the assistant
/// aggregator and the session sink.
pub struct TransportOutput {
    connection: Arc<dyn PeerConnection>,
}

impl TransportOutput {
    pub fn new(connection: Arc<dyn PeerConnection>) -> Self {
        Self { connection }
    }

    async fn deliver(&self, event: ClientEvent) {
        if let Err(err) = self.connection.send_event(event).await {
            warn!(pc_id = %self.connection.pc_id(), error = %err, "Failed to deliver client event");
        }
    }

    async fn stream(&self, media: OutboundMedia) {
        if let Err(err) = self.connection.send_media(media).await {
            warn!(pc_id = %self.connection.pc_id(), error = %err, "Failed to send media");
        }
    }
}

#[async_trait]
impl Stage for TransportOutput {
    fn name(&self) -> &'static str {
        "transport-output"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        match frame {
            Frame::TranscriptSentence(sentence) => {
                self.deliver(ClientEvent::BotTranscription { data: sentence.clone() }).await;
                out.send(Frame::TranscriptSentence(sentence)).await
            }
            Frame::Apology(text) => {
                self.deliver(ClientEvent::BotTranscription { data: text }).await;
                Ok(())
            }
            Frame::SynthesizedAudio(audio) => {
                self.stream(OutboundMedia::Audio(audio)).await;
                Ok(())
            }
            Frame::SynthesizedVideo(video) => {
                debug!(pc_id = %self.connection.pc_id(), mime_type = %video.mime_type, bytes = video.data.len(), "Streaming avatar video");
                self.stream(OutboundMedia::Video(video)).await;
                Ok(())
            }
            Frame::AudioChunk(_) => Ok(()),
            other => out.send(other).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::test_support::run_stage;
    use crate::pipeline::{AudioChunk, ControlSignal};
    use crate::transport::local::{BridgeMessage, LocalPeerConnector};
    use crate::transport::{PeerConnector, SessionDescription};

    #[tokio::test]
    async fn test_input_drops_empty_and_mismatched_audio() {
        let frames = vec![
            Frame::AudioChunk(AudioChunk::new(vec![], 16000)),
            Frame::AudioChunk(AudioChunk::new(vec![1, 2], 8000)),
            Frame::AudioChunk(AudioChunk::new(vec![3, 4], 16000)),
            Frame::Control(ControlSignal::EndOfTurn),
        ];
        let emitted = run_stage(TransportInput::new("pc".to_string(), 16000), frames).await;

        assert_eq!(
            emitted,
            vec![
                Frame::AudioChunk(AudioChunk::new(vec![3, 4], 16000)),
                Frame::Control(ControlSignal::EndOfTurn),
            ]
        );
    }

    #[tokio::test]
    async fn test_output_sends_transcripts_and_apologies() {
        let connector = LocalPeerConnector::new(16000);
        let connection = connector.accept("pc", &SessionDescription::offer("v=0")).await.unwrap();
        let mut outbound = connector.bridge("pc").unwrap().attach().unwrap();

        let frames = vec![
            Frame::TranscriptSentence("Welcome.".to_string()),
            Frame::Apology("Sorry.".to_string()),
            Frame::Control(ControlSignal::ResponseEnd),
        ];
        let emitted = run_stage(TransportOutput::new(connection), frames).await;

        assert_eq!(
            emitted,
            vec![
                Frame::TranscriptSentence("Welcome.".to_string()),
                Frame::Control(ControlSignal::ResponseEnd),
            ]
        );
        for expected in ["Welcome.", "Sorry."] {
            match outbound.recv().await {
                Some(BridgeMessage::Text(text)) => {
                    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(value["type"], "bot-transcription");
                    assert_eq!(value["data"], expected);
                }
                other => panic!("unexpected bridge message: {:?}", other),
            }
        }
    }
}
