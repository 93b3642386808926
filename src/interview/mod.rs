//! # Interview Module
//!
//! Question selection and the per-session interview state machine.
//!
//! ## Key Components:
//! - **Question pool**: base, role, focus-area and closing questions built once per session
//! - **State machine**: current position in the pool plus the append-only Q&A log

pub mod questions;      // Question pool construction
pub mod state_machine;  // Position tracking and Q&A log

pub use questions::{build_question_pool, Question};
pub use state_machine::{Advance, InterviewStateMachine, InterviewStatus, QaItem, CLOSING_REMARK};
