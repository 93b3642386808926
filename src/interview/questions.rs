//! # Question Pool
//!
//! Builds the ordered list of questions for one interview from the setup context.
//!
//! ## Pool Layout:
//! 1. **Intro**: always "Tell me about yourself..."
//! 2. **Role**: mentions the requested job title
//! 3. **Focus areas**: one question per requested focus tag, deduplicated by tag
//! 4. **Closing**: two fixed questions
//!
//! Tags only drive selection. Nothing downstream scores answers by tag.

use crate::setup::SetupContext;
use serde::Serialize;
use std::fmt;

/// Category a question was selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionTag {
    Technical,
    Behavioral,
    ProblemSolving,
    Communication,
}

impl fmt::Display for QuestionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionTag::Technical => "technical",
            QuestionTag::Behavioral => "behavioral",
            QuestionTag::ProblemSolving => "problem-solving",
            QuestionTag::Communication => "communication",
        };
        f.write_str(name)
    }
}

/// One interview question. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    text: String,
    tag: Option<QuestionTag>,
}

impl Question {
    pub fn new(text: impl Into<String>, tag: Option<QuestionTag>) -> Self {
        Self { text: text.into(), tag }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tag(&self) -> Option<QuestionTag> {
        self.tag
    }
}

const INTRO_QUESTION: &str = "Tell me about yourself and your background.";

const CLOSING_QUESTIONS: [&str; 2] = [
    "How do you handle tight deadlines and pressure?",
    "Where do you see yourself in five years?",
];

/// Focus-area templates in pool order. Several request tags may resolve to the same
/// question tag (leadership is asked as the behavioral conflict question).
const FOCUS_TEMPLATES: [(QuestionTag, &[&str], &str); 4] = [
    (
        QuestionTag::Technical,
        &["technical"],
        "Describe a technically challenging project you've worked on recently. What was your approach?",
    ),
    (
        QuestionTag::Behavioral,
        &["behavioral", "leadership"],
        "Tell me about a time when you had to deal with a difficult team member or conflict.",
    ),
    (
        QuestionTag::ProblemSolving,
        &["problem-solving", "problem_solving", "problemsolving"],
        "Walk me through your problem-solving process when facing a complex challenge.",
    ),
    (
        QuestionTag::Communication,
        &["communication"],
        "Describe a situation where you had to explain a complex concept to someone without technical knowledge.",
    ),
];

/// Build the question pool for a session.
///
/// ## Examples:
/// - no focus areas → 4 questions (intro, role, two closing)
/// - `["technical"]` → 5 questions
/// - `["behavioral", "leadership"]` → 5 questions, the behavioral question appears once
pub fn build_question_pool(setup: Option<&SetupContext>) -> Vec<Question> {
    let job_title = setup.and_then(|s| s.job_title()).unwrap_or("this position");
    let requested = setup.map(|s| s.focus_tags()).unwrap_or_default();

    let mut pool = vec![
        Question::new(INTRO_QUESTION, None),
        Question::new(format!("What interests you most about the {} role?", job_title), None),
    ];

    for (tag, aliases, text) in FOCUS_TEMPLATES.iter() {
        let wanted = requested.iter().any(|r| aliases.contains(&r.as_str()));
        if wanted {
            pool.push(Question::new(*text, Some(*tag)));
        }
    }

    pool.extend(CLOSING_QUESTIONS.iter().map(|text| Question::new(*text, None)));
    pool
}
