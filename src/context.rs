//! # Conversation Context Store
//!
//! Ordered, append-only conversation history for one session. Every model call sends a
//! snapshot of it, and the summary step reads it as the audit trail of the interview.
//!
//! ## Rules:
//! - The system message is seeded exactly once, when the store is created.
//! - Messages are only appended. Nothing is edited, removed, or reordered.
//! - `snapshot()` hands out a copy; the store itself is never touched by readers.

use crate::setup::SetupContext;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation message. `position` is its index in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub position: usize,
}

/// Immutable, cheaply clonable view of the history at one point in time.
pub type ContextSnapshot = Arc<[Message]>;

const COACH_PROMPT: &str = "You are a professional AI interview coach conducting a realistic job interview practice session.

Your role is to:
- Ask relevant behavioral and technical interview questions
- Listen actively to the candidate's responses
- Ask thoughtful follow-up questions when appropriate
- Maintain a professional but friendly demeanor
- Keep responses concise and natural, as in a real interview
- Do NOT provide feedback or scores during the interview

When you are given the next question to ask, work it into your reply naturally. Ask one question at a time and wait for the response.";

const FALLBACK_INSTRUCTIONS: &str = "Greet the candidate warmly and ask what job role they are preparing to interview for. Keep it brief and professional.";

/// Render the seeded system prompt for a session.
pub fn system_prompt(setup: Option<&SetupContext>) -> String {
    let Some(setup) = setup else {
        return format!("{}\n\n{}", COACH_PROMPT, FALLBACK_INSTRUCTIONS);
    };

    let focus = setup.focus_tags();
    let focus = if focus.is_empty() { "General".to_string() } else { focus.join(", ") };

    format!(
        "{coach}\n\nThe candidate has provided the following information:\n\
         - Target Position: {title}\n\
         - Company: {company}\n\
         - Interview Format: {format}\n\
         - Experience: {experience}\n\
         - Focus Areas: {focus}\n\n\
         Greet the candidate warmly by acknowledging you know they're preparing for the {role} role at {target}. \
         Start with your first interview question directly - do NOT ask them what role they're preparing for since you already know.",
        coach = COACH_PROMPT,
        title = setup.job_title().unwrap_or("Not specified"),
        company = setup.company().unwrap_or("Not specified"),
        format = setup.interview_format().unwrap_or("Not specified"),
        experience = setup.experience().unwrap_or("Not specified"),
        focus = focus,
        role = setup.job_title().unwrap_or("position"),
        target = setup.company().unwrap_or("their target company"),
    )
}

#[derive(Debug)]
pub struct ContextStore {
    messages: Vec<Message>,
}

impl ContextStore {
    /// Create a store seeded with the system prompt for `setup`.
    pub fn seeded(setup: Option<&SetupContext>) -> Self {
        let mut store = Self { messages: Vec::new() };
        store.append(Role::System, system_prompt(setup));
        store
    }

    /// Append a message and return its position.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> usize {
        let position = self.messages.len();
        self.messages.push(Message {
            role,
            content: content.into(),
            position,
        });
        position
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        Arc::from(self.messages.as_slice())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
