//! Language model stage: generates assistant turns.

use super::LLM_APOLOGY;
use crate::interview::Question;
use crate::llm::{ChatMessage, LanguageModel};
use crate::pipeline::{ControlSignal, Frame, Outbox, PipelineClosed, Stage};
use crate::session::Conversation;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Instruction appended to the prompt for one request. Never stored in the context.
pub(crate) fn question_directive(question: &Question) -> String {
    format!(
        "Briefly acknowledge the candidate's last response if there is one, then ask this next interview question, phrased naturally: \"{}\"",
        question.text()
    )
}

/// Make sure the reply ends by asking `question`.
///
/// A reply that doesn't end in a question mark gets the question appended as its own
/// sentence.
pub fn ensure_question(reply: &str, question: Option<&Question>) -> String {
    let reply = reply.trim();
    match question {
        Some(question) if !reply.ends_with('?') => {
            if reply.is_empty() {
                question.text().to_string()
            } else {
                format!("{} {}", reply, question.text())
            }
        }
        _ => reply.to_string(),
    }
}

/// Split text into word-sized fragments that concatenate back to the original.
pub fn fragments(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(' ')
}

pub struct LanguageModelStage {
    conversation: Arc<Conversation>,
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
}

impl LanguageModelStage {
    pub fn new(conversation: Arc<Conversation>, model: Arc<dyn LanguageModel>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            conversation,
            model,
            max_tokens,
            temperature,
        }
    }

    fn prompt(&self, next_question: Option<&Question>) -> Vec<ChatMessage> {
        let snapshot = self.conversation.context().snapshot();
        let mut messages: Vec<ChatMessage> = snapshot.iter().map(ChatMessage::from).collect();
        if let Some(question) = next_question {
            messages.push(ChatMessage::system(question_directive(question)));
        }
        messages
    }
}

#[async_trait]
impl Stage for LanguageModelStage {
    fn name(&self) -> &'static str {
        "language-model"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        let next_question = match frame {
            Frame::LlmRun { next_question } => next_question,
            other => return out.send(other).await,
        };

        let messages = self.prompt(next_question.as_ref());
        debug!(messages = messages.len(), "Requesting assistant turn");

        let result = out
            .guard(self.model.complete(&messages, self.max_tokens, self.temperature))
            .await?;
        let reply = match result {
            Ok(reply) => ensure_question(&reply, next_question.as_ref()),
            Err(err) => {
                warn!(error = %err, "Language model call failed");
                LLM_APOLOGY.to_string()
            }
        };

        for fragment in fragments(&reply) {
            out.send(Frame::ResponseText(fragment.to_string())).await?;
        }
        out.send(Frame::Control(ControlSignal::ResponseEnd)).await
    }
}
