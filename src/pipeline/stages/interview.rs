//! Interview logic: drives the state machine at turn boundaries.

use crate::interview::{Advance, InterviewStatus, CLOSING_REMARK};
use crate::pipeline::{ControlSignal, Frame, Outbox, PipelineClosed, Stage};
use crate::session::Conversation;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Records answers and picks the next question.
///
/// - `StartInterview` asks the first question (once).
/// - `UserTurn` fills the pending answer.
/// - `EndOfTurn` advances: the next question goes to the language model as `LlmRun`, or,
///   with the pool used up, the closing remark is spoken and `InterviewComplete` follows.
pub struct InterviewLogic {
    conversation: Arc<Conversation>,
    closed: bool,
}

impl InterviewLogic {
    pub fn new(conversation: Arc<Conversation>) -> Self {
        Self {
            conversation,
            closed: false,
        }
    }

    async fn ask_next(&mut self, out: &Outbox) -> Result<(), PipelineClosed> {
        let (advance, index) = {
            let mut interview = self.conversation.interview();
            let advance = interview.advance();
            (advance, interview.current_index())
        };

        match advance {
            Advance::Question(question) => {
                debug!(question_index = index, tag = ?question.tag(), "Asking question");
                out.send(Frame::LlmRun { next_question: Some(question) }).await
            }
            Advance::Exhausted => {
                info!(questions = index, "Question pool exhausted, closing interview");
                self.closed = true;
                out.send(Frame::ResponseText(CLOSING_REMARK.to_string())).await?;
                out.send(Frame::Control(ControlSignal::ResponseEnd)).await?;
                out.send(Frame::Control(ControlSignal::InterviewComplete)).await
            }
        }
    }
}

#[async_trait]
impl Stage for InterviewLogic {
    fn name(&self) -> &'static str {
        "interview-logic"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        match frame {
            Frame::Control(ControlSignal::StartInterview) => {
                let status = self.conversation.interview().status();
                if status != InterviewStatus::NotStarted {
                    debug!(status = status.as_str(), "Interview already started");
                    return Ok(());
                }
                info!("Starting interview");
                self.ask_next(out).await
            }
            Frame::UserTurn(text) => {
                if self.closed {
                    return Ok(());
                }
                if !self.conversation.interview().record_answer(&text) {
                    debug!("No pending question for this answer");
                }
                Ok(())
            }
            Frame::Control(ControlSignal::EndOfTurn) => {
                if self.closed {
                    debug!("Interview closed, ignoring end of turn");
                    return Ok(());
                }
                self.ask_next(out).await
            }
            other => out.send(other).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::test_support::run_stage;
    use crate::setup::SetupContext;

    fn answer(text: &str) -> Vec<Frame> {
        vec![Frame::UserTurn(text.to_string()), Frame::Control(ControlSignal::EndOfTurn)]
    }

    #[tokio::test]
    async fn test_start_asks_first_question_once() {
        let conversation = Arc::new(Conversation::new(None));
        let frames = vec![
            Frame::Control(ControlSignal::StartInterview),
            Frame::Control(ControlSignal::StartInterview),
        ];
        let emitted = run_stage(InterviewLogic::new(conversation.clone()), frames).await;

        assert_eq!(emitted.len(), 1);
        match &emitted[0] {
            Frame::LlmRun { next_question: Some(question) } => {
                assert_eq!(question.text(), "Tell me about yourself and your background.")
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(conversation.interview().current_index(), 1);
    }

    #[tokio::test]
    async fn test_full_interview_ends_with_closing_remark() {
        let conversation = Arc::new(Conversation::new(None));
        let pool = conversation.interview().pool_size();

        let mut frames = vec![Frame::Control(ControlSignal::StartInterview)];
        for i in 0..pool {
            frames.extend(answer(&format!("answer {}", i)));
        }
        let emitted = run_stage(InterviewLogic::new(conversation.clone()), frames).await;

        let runs = emitted.iter().filter(|f| matches!(f, Frame::LlmRun { .. })).count();
        assert_eq!(runs, pool);
        assert_eq!(
            &emitted[emitted.len() - 3..],
            &[
                Frame::ResponseText(CLOSING_REMARK.to_string()),
                Frame::Control(ControlSignal::ResponseEnd),
                Frame::Control(ControlSignal::InterviewComplete),
            ]
        );

        let interview = conversation.interview();
        assert!(interview.is_complete());
        assert!(interview.qa_log().iter().all(|item| item.answer.is_some()));
    }

    #[tokio::test]
    async fn test_turns_after_close_are_ignored() {
        let setup = SetupContext::default();
        let conversation = Arc::new(Conversation::new(Some(setup)));
        let pool = conversation.interview().pool_size();

        let mut frames = vec![Frame::Control(ControlSignal::StartInterview)];
        for i in 0..pool + 2 {
            frames.extend(answer(&format!("answer {}", i)));
        }
        let emitted = run_stage(InterviewLogic::new(conversation.clone()), frames).await;

        let completes = emitted
            .iter()
            .filter(|f| matches!(f, Frame::Control(ControlSignal::InterviewComplete)))
            .count();
        assert_eq!(completes, 1);
        assert_eq!(conversation.interview().qa_log().len(), pool);
    }

    #[tokio::test]
    async fn test_other_frames_pass_through() {
        let conversation = Arc::new(Conversation::new(None));
        let frames = vec![Frame::Control(ControlSignal::EndInterview)];
        let emitted = run_stage(InterviewLogic::new(conversation), frames).await;
        assert_eq!(emitted, vec![Frame::Control(ControlSignal::EndInterview)]);
    }
}
