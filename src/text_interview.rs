//! # Text-Mode Interview
//!
//! The same interview (question pool, context, summary) without any media: one
//! request/response exchange per candidate answer. Backs the `/ws/interview` socket.
//!
//! ## Turn flow:
//! 1. [`TextInterview::opening`] greets the candidate and asks the first question
//! 2. [`TextInterview::answer`] records the answer, then either asks the next question
//!    through the language model or returns the closing remark
//! 3. [`TextInterview::summary`] evaluates whatever was answered
//!
//! [`TextInterview::spawn_turns`] runs steps 2 and 3 on one task: answers are handled one
//! at a time in arrival order, and the summary follows once the pool is used up or the
//! answer channel closes.

use crate::context::Role;
use crate::error::SummaryError;
use crate::interview::{Advance, CLOSING_REMARK};
use crate::llm::{ChatMessage, LanguageModel};
use crate::pipeline::stages::language_model::{ensure_question, question_directive};
use crate::pipeline::stages::LLM_APOLOGY;
use crate::session::Conversation;
use crate::setup::SetupContext;
use crate::summary::{InterviewSummary, SummarySynthesizer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Opening line before the first question.
pub fn greeting(setup: Option<&SetupContext>) -> String {
    let position = match setup.and_then(|s| s.job_title()) {
        Some(job_title) => format!("the {} position", job_title),
        None => "this position".to_string(),
    };
    match setup.and_then(|s| s.company()) {
        Some(company) => format!(
            "Hello! Thank you for taking the time to interview with us today at {} for {}. ",
            company, position
        ),
        None => format!("Hello! Thank you for taking the time to interview with us today for {}. ", position),
    }
}

/// Reply to one candidate answer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextReply {
    pub content: String,
    /// The question pool is used up; the summary is due.
    pub complete: bool,
}

/// Output of the turn worker.
#[derive(Debug)]
pub enum TurnEvent {
    Reply(TextReply),
    /// Always the last event. `Ok(None)` when nothing was answered.
    Summary(Result<Option<InterviewSummary>, SummaryError>),
}

pub struct TextInterview {
    conversation: Conversation,
    model: Arc<dyn LanguageModel>,
    summary: SummarySynthesizer,
    max_tokens: u32,
    temperature: f32,
}

impl TextInterview {
    pub fn new(
        setup: Option<SetupContext>,
        model: Arc<dyn LanguageModel>,
        summary: SummarySynthesizer,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            conversation: Conversation::new(setup),
            model,
            summary,
            max_tokens,
            temperature,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn opening(&self) -> String {
        let first = match self.conversation.interview().advance() {
            Advance::Question(question) => question.text().to_string(),
            Advance::Exhausted => String::new(),
        };
        let message = format!("{}{}", greeting(self.conversation.setup()), first);
        self.conversation.context().append(Role::Assistant, message.clone());
        message
    }

    pub async fn answer(&self, text: &str) -> TextReply {
        let text = text.trim();
        let advance = {
            let mut interview = self.conversation.interview();
            if !interview.record_answer(text) {
                debug!("No pending question for this answer");
            }
            interview.advance()
        };
        self.conversation.context().append(Role::User, text);

        let question = match advance {
            Advance::Question(question) => question,
            Advance::Exhausted => {
                info!("Question pool exhausted, closing text interview");
                self.conversation.context().append(Role::Assistant, CLOSING_REMARK);
                return TextReply {
                    content: CLOSING_REMARK.to_string(),
                    complete: true,
                };
            }
        };

        let mut messages: Vec<ChatMessage> = self
            .conversation
            .context()
            .snapshot()
            .iter()
            .map(ChatMessage::from)
            .collect();
        messages.push(ChatMessage::system(question_directive(&question)));

        let content = match self.model.complete(&messages, self.max_tokens, self.temperature).await {
            Ok(reply) => ensure_question(&reply, Some(&question)),
            Err(err) => {
                warn!(error = %err, "Language model call failed");
                LLM_APOLOGY.to_string()
            }
        };
        self.conversation.context().append(Role::Assistant, content.clone());

        TextReply { content, complete: false }
    }

    /// `Ok(None)` when nothing was answered.
    pub async fn summary(&self) -> Result<Option<InterviewSummary>, SummaryError> {
        let qa_log = {
            let interview = self.conversation.interview();
            if !interview.has_answers() {
                return Ok(None);
            }
            interview.qa_log().to_vec()
        };
        self.summary.synthesize(&qa_log).await.map(Some)
    }

    /// Start the turn worker.
    ///
    /// Dropping the answer sender ends the interview early: queued answers are still
    /// handled, then the summary is produced. Dropping the event receiver stops the worker
    /// without a summary.
    pub fn spawn_turns(self: Arc<Self>) -> (mpsc::UnboundedSender<String>, mpsc::UnboundedReceiver<TurnEvent>) {
        let (answer_tx, mut answers) = mpsc::unbounded_channel::<String>();
        let (events, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = answers.recv().await {
                let reply = self.answer(&text).await;
                let complete = reply.complete;
                if events.send(TurnEvent::Reply(reply)).is_err() {
                    return;
                }
                if complete {
                    break;
                }
            }

            if events.is_closed() {
                debug!("Client gone, skipping summary");
                return;
            }
            let _ = events.send(TurnEvent::Summary(self.summary().await));
        });

        (answer_tx, event_rx)
    }
}
