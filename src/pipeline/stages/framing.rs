//! Turns raw data-channel messages into control and text frames.

use crate::pipeline::{ControlSignal, Frame, Outbox, PipelineClosed, Stage};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Messages a client may send over the data channel.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "client-ready")]
    ClientReady,

    /// A typed or externally recognized utterance; completes the turn.
    #[serde(rename = "user-text")]
    UserText {
        #[serde(alias = "content", alias = "data")]
        text: String,
    },

    /// External turn detector decided the candidate stopped speaking.
    #[serde(rename = "end-of-turn")]
    EndOfTurn,

    #[serde(rename = "end_interview")]
    EndInterview,

    #[serde(rename = "disconnect-bot")]
    DisconnectBot,
}

#[derive(Default)]
pub struct ProtocolFraming;

impl ProtocolFraming {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for ProtocolFraming {
    fn name(&self) -> &'static str {
        "protocol-framing"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        let value = match frame {
            Frame::ClientMessage(value) => value,
            other => return out.send(other).await,
        };

        let message = match serde_json::from_value::<ClientMessage>(value) {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "Ignoring unrecognized client message");
                return Ok(());
            }
        };

        match message {
            ClientMessage::ClientReady => out.send(Frame::Control(ControlSignal::StartInterview)).await,
            ClientMessage::UserText { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(());
                }
                out.send(Frame::RecognizedText(text.to_string())).await?;
                out.send(Frame::Control(ControlSignal::EndOfTurn)).await
            }
            ClientMessage::EndOfTurn => out.send(Frame::Control(ControlSignal::EndOfTurn)).await,
            ClientMessage::EndInterview => out.send(Frame::Control(ControlSignal::EndInterview)).await,
            ClientMessage::DisconnectBot => out.send(Frame::Control(ControlSignal::Cancel)).await,
        }
    }
}
