//! # Interview State Machine
//!
//! Owns one session's question pool, the position within it, and the Q&A log.
//!
//! ## States:
//! `NotStarted → InProgress → Complete`
//!
//! ## Q&A Log Invariants:
//! - Items are only ever appended; the single mutation allowed is filling the answer of
//!   the most recent item.
//! - At most one item is pending (answer still `None`).
//! - The question index only moves forward and never passes the pool size.

use super::questions::Question;
use serde::Serialize;
use tracing::debug;

/// What the interviewer says once every question has been answered.
pub const CLOSING_REMARK: &str = "Thank you for sharing your thoughts. That concludes our interview today. I'll now prepare your feedback summary.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InterviewStatus::NotStarted => "not_started",
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Complete => "complete",
        }
    }
}

/// One asked question and, once given, its answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QaItem {
    pub index: usize,
    pub question: Question,
    pub answer: Option<String>,
}

/// Result of [`InterviewStateMachine::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The question to ask now.
    Question(Question),
    /// The pool is used up. Returned on every call from then on.
    Exhausted,
}

pub struct InterviewStateMachine {
    pool: Vec<Question>,
    next_index: usize,
    qa_log: Vec<QaItem>,
}

impl InterviewStateMachine {
    pub fn new(pool: Vec<Question>) -> Self {
        Self {
            pool,
            next_index: 0,
            qa_log: Vec::new(),
        }
    }

    /// Move to the next question.
    ///
    /// While a question is still unanswered it is returned again and nothing is appended,
    /// so a repeated end-of-turn without an answer re-asks instead of skipping ahead.
    pub fn advance(&mut self) -> Advance {
        if let Some(pending) = self.pending() {
            debug!(index = pending.index, "Question still pending, asking again");
            return Advance::Question(pending.question.clone());
        }

        match self.pool.get(self.next_index) {
            Some(question) => {
                let question = question.clone();
                self.qa_log.push(QaItem {
                    index: self.next_index,
                    question: question.clone(),
                    answer: None,
                });
                self.next_index += 1;
                debug!(index = self.next_index - 1, pool = self.pool.len(), "Advanced to next question");
                Advance::Question(question)
            }
            None => Advance::Exhausted,
        }
    }

    /// Fill the answer of the pending question.
    ///
    /// Returns `false` and leaves the log untouched when nothing is pending, e.g. an
    /// answer that arrives after the interview closed.
    pub fn record_answer(&mut self, text: &str) -> bool {
        match self.qa_log.last_mut() {
            Some(item) if item.answer.is_none() => {
                item.answer = Some(text.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_index >= self.pool.len()
            && self.qa_log.last().map_or(true, |item| item.answer.is_some())
    }

    pub fn status(&self) -> InterviewStatus {
        if self.is_complete() {
            InterviewStatus::Complete
        } else if self.qa_log.is_empty() {
            InterviewStatus::NotStarted
        } else {
            InterviewStatus::InProgress
        }
    }

    pub fn pending(&self) -> Option<&QaItem> {
        self.qa_log.last().filter(|item| item.answer.is_none())
    }

    pub fn has_answers(&self) -> bool {
        self.qa_log.iter().any(|item| item.answer.is_some())
    }

    /// Number of questions handed out so far.
    pub fn current_index(&self) -> usize {
        self.next_index
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    pub fn qa_log(&self) -> &[QaItem] {
        &self.qa_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::questions::build_question_pool;

    fn machine(n: usize) -> InterviewStateMachine {
        let pool = (0..n).map(|i| Question::new(format!("Question {}?", i), None)).collect();
        InterviewStateMachine::new(pool)
    }

    fn pending_count(m: &InterviewStateMachine) -> usize {
        m.qa_log().iter().filter(|item| item.answer.is_none()).count()
    }

    #[test]
    fn test_walks_pool_in_order_then_exhausts() {
        let mut m = machine(2);
        assert_eq!(m.status(), InterviewStatus::NotStarted);

        assert_eq!(m.advance(), Advance::Question(Question::new("Question 0?", None)));
        assert_eq!(m.status(), InterviewStatus::InProgress);
        assert!(m.record_answer("first"));

        assert_eq!(m.advance(), Advance::Question(Question::new("Question 1?", None)));
        assert!(!m.is_complete());
        assert!(m.record_answer("second"));
        assert!(m.is_complete());

        assert_eq!(m.advance(), Advance::Exhausted);
        assert_eq!(m.advance(), Advance::Exhausted);
        assert_eq!(m.current_index(), 2);
        assert_eq!(m.status(), InterviewStatus::Complete);
    }

    #[test]
    fn test_index_never_decreases_or_exceeds_pool() {
        let mut m = machine(3);
        let mut last = m.current_index();
        for turn in 0..10 {
            m.advance();
            m.record_answer(&format!("answer {}", turn));
            assert!(m.current_index() >= last);
            assert!(m.current_index() <= m.pool_size());
            assert!(pending_count(&m) <= 1);
            last = m.current_index();
        }
    }

    #[test]
    fn test_record_answer_without_pending_is_noop() {
        let mut m = machine(1);
        assert!(!m.record_answer("too early"));
        assert!(m.qa_log().is_empty());

        m.advance();
        m.record_answer("answer");
        let before = m.qa_log().to_vec();
        assert!(!m.record_answer("late answer"));
        assert_eq!(m.qa_log(), before.as_slice());
    }

    #[test]
    fn test_advance_with_pending_reasks_without_appending() {
        let mut m = machine(3);
        m.advance();
        let again = m.advance();

        assert_eq!(again, Advance::Question(Question::new("Question 0?", None)));
        assert_eq!(m.qa_log().len(), 1);
        assert_eq!(m.current_index(), 1);
        assert_eq!(pending_count(&m), 1);
    }

    #[test]
    fn test_has_answers_tracks_recorded_answers() {
        let mut m = InterviewStateMachine::new(build_question_pool(None));
        assert!(!m.has_answers());
        m.advance();
        assert!(!m.has_answers());
        m.record_answer("I build distributed systems.");
        assert!(m.has_answers());
    }
}
