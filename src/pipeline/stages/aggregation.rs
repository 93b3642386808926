//! Context aggregation: write completed user and assistant turns to the context store.

use crate::context::Role;
use crate::pipeline::{ControlSignal, Frame, Outbox, PipelineClosed, Stage};
use crate::session::Conversation;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Collects recognized text until end of turn, then records the user message.
///
/// Emits `UserTurn(text)` followed by the `EndOfTurn` that closed it. An end of turn with
/// nothing recognized is dropped, so silence never advances the interview.
pub struct UserAggregator {
    conversation: Arc<Conversation>,
    pending: Vec<String>,
}

impl UserAggregator {
    pub fn new(conversation: Arc<Conversation>) -> Self {
        Self {
            conversation,
            pending: Vec::new(),
        }
    }
}

#[async_trait]
impl Stage for UserAggregator {
    fn name(&self) -> &'static str {
        "context-aggregation(user)"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        match frame {
            Frame::RecognizedText(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.pending.push(text.to_string());
                }
                Ok(())
            }
            Frame::Control(ControlSignal::EndOfTurn) => {
                let utterance = self.pending.join(" ");
                self.pending.clear();
                if utterance.is_empty() {
                    debug!("End of turn without recognized speech");
                    return Ok(());
                }

                let position = self.conversation.context().append(Role::User, utterance.clone());
                debug!(position, "User turn recorded");
                out.send(Frame::UserTurn(utterance)).await?;
                out.send(Frame::Control(ControlSignal::EndOfTurn)).await
            }
            other => out.send(other).await,
        }
    }
}

/// Collects response fragments and records the assistant message at response end.
///
/// Last stage of the chain: transcript sentences and response text stop here, control
/// frames continue to the session sink.
pub struct AssistantAggregator {
    conversation: Arc<Conversation>,
    response: String,
}

impl AssistantAggregator {
    pub fn new(conversation: Arc<Conversation>) -> Self {
        Self {
            conversation,
            response: String::new(),
        }
    }
}

#[async_trait]
impl Stage for AssistantAggregator {
    fn name(&self) -> &'static str {
        "context-aggregation(assistant)"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        match frame {
            Frame::ResponseText(fragment) => {
                self.response.push_str(&fragment);
                Ok(())
            }
            Frame::TranscriptSentence(_) => Ok(()),
            Frame::Control(ControlSignal::ResponseEnd) => {
                let response = self.response.trim();
                if !response.is_empty() {
                    let position = self.conversation.context().append(Role::Assistant, response);
                    debug!(position, "Assistant turn recorded");
                }
                self.response.clear();
                out.send(Frame::Control(ControlSignal::ResponseEnd)).await
            }
            other => out.send(other).await,
        }
    }
}
