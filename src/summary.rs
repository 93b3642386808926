//! # Summary Synthesizer
//!
//! Turns a finished (or early-terminated) interview into a structured evaluation with one
//! language model call.
//!
//! ## Parsing:
//! Models tend to wrap JSON in markdown fences or add prose around it, so parsing is two
//! explicit steps: pull out the candidate JSON substring, then deserialize it. Scores may
//! come back fractional and lists may be missing; both are accepted. Only a reply that is
//! not JSON at all, or lacks `overall_score`, degrades to a fixed fallback that still
//! carries the model's text. Only a failed call (network or HTTP status) is an error.

use crate::error::SummaryError;
use crate::interview::QaItem;
use crate::llm::{ChatMessage, LanguageModel};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const EVALUATOR_PROMPT: &str = "You are an expert interview evaluator providing structured JSON feedback.";

const FALLBACK_SCORE: u32 = 75;

/// Round any JSON number into the 0-100 score range.
fn score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(value.round().clamp(0.0, 100.0) as u32)
}

/// Score and notes for one evaluated dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubScore {
    #[serde(deserialize_with = "score")]
    pub score: u32,
    pub feedback: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSummary {
    #[serde(deserialize_with = "score")]
    pub overall_score: u32,
    #[serde(default)]
    pub language_use: SubScore,
    #[serde(default)]
    pub answer_quality: SubScore,
    #[serde(default)]
    pub detailed_feedback: String,
    #[serde(default)]
    pub key_takeaways: Vec<String>,
}

impl InterviewSummary {
    /// Evaluation used when the model's reply can't be parsed.
    pub fn fallback(raw_text: &str) -> Self {
        Self {
            overall_score: FALLBACK_SCORE,
            language_use: SubScore {
                score: FALLBACK_SCORE,
                feedback: "Good communication overall.".to_string(),
                strengths: vec!["Clear expression".to_string()],
                improvements: vec!["Continue practicing".to_string()],
            },
            answer_quality: SubScore {
                score: FALLBACK_SCORE,
                feedback: "Satisfactory answers provided.".to_string(),
                strengths: vec!["Relevant responses".to_string()],
                improvements: vec!["More detail could help".to_string()],
            },
            detailed_feedback: raw_text.to_string(),
            key_takeaways: vec!["Keep practicing".to_string(), "Good effort overall".to_string()],
        }
    }
}

/// Render answered items as a `Q:`/`A:` transcript. Unanswered items are skipped.
pub fn transcript(qa_log: &[QaItem]) -> String {
    qa_log
        .iter()
        .filter_map(|item| {
            item.answer
                .as_ref()
                .map(|answer| format!("Q: {}\nA: {}", item.question.text(), answer))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn evaluation_prompt(transcript: &str) -> String {
    format!(
        r#"You are an expert interview evaluator. Analyze this interview transcript and provide detailed feedback.

Interview Transcript:
{transcript}

Provide a comprehensive evaluation in the following JSON format:
{{
    "overall_score": <number 0-100>,
    "language_use": {{
        "score": <number 0-100>,
        "feedback": "<detailed feedback on vocabulary, grammar, fluency, clarity>",
        "strengths": ["<strength1>", "<strength2>"],
        "improvements": ["<improvement1>", "<improvement2>"]
    }},
    "answer_quality": {{
        "score": <number 0-100>,
        "feedback": "<detailed feedback on relevance, completeness, depth, structure>",
        "strengths": ["<strength1>", "<strength2>"],
        "improvements": ["<improvement1>", "<improvement2>"]
    }},
    "detailed_feedback": "<overall comprehensive feedback paragraph>",
    "key_takeaways": ["<takeaway1>", "<takeaway2>", "<takeaway3>"]
}}

Be specific, constructive, and encouraging in your feedback."#
    )
}

/// Extract the JSON candidate from a model reply.
///
/// A ```` ```json ```` fence wins over a bare ```` ``` ```` fence; without fences the
/// trimmed text is the candidate.
pub fn extract_json_candidate(text: &str) -> &str {
    let fenced = |opening: &str| {
        let (_, after) = text.split_once(opening)?;
        Some(after.split("```").next().unwrap_or(after).trim())
    };
    fenced("```json").or_else(|| fenced("```")).unwrap_or_else(|| text.trim())
}

/// Parse a model reply, degrading to [`InterviewSummary::fallback`].
pub fn parse_summary(text: &str) -> InterviewSummary {
    let value: serde_json::Value = match serde_json::from_str(extract_json_candidate(text)) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Summary reply was not valid JSON, using fallback evaluation");
            return InterviewSummary::fallback(text);
        }
    };

    match serde_json::from_value(value) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(error = %err, "Summary JSON has no usable overall score, using fallback evaluation");
            InterviewSummary::fallback(text)
        }
    }
}

pub struct SummarySynthesizer {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
    temperature: f32,
}

impl SummarySynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32, temperature: f32) -> Self {
        Self { model, max_tokens, temperature }
    }

    pub async fn synthesize(&self, qa_log: &[QaItem]) -> Result<InterviewSummary, SummaryError> {
        let answered = qa_log.iter().filter(|item| item.answer.is_some()).count();
        info!(answered, "Generating interview summary");

        let messages = [
            ChatMessage::system(EVALUATOR_PROMPT),
            ChatMessage::user(evaluation_prompt(&transcript(qa_log))),
        ];
        let reply = self
            .model
            .complete(&messages, self.max_tokens, self.temperature)
            .await
            .map_err(SummaryError::SummaryGenerationFailed)?;

        Ok(parse_summary(&reply))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::interview::Question;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Model returning a canned reply and recording every request.
    pub(crate) struct CannedModel {
        pub reply: Result<String, u16>,
        pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl CannedModel {
        pub fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), requests: Mutex::new(Vec::new()) }
        }

        pub fn failing(status: u16) -> Self {
            Self { reply: Err(status), requests: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, messages: &[ChatMessage], _: u32, _: f32) -> Result<String, ServiceError> {
            self.requests.lock().push(messages.to_vec());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ServiceError::Status {
                    service: "language model",
                    status: *status,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    fn answered(question: &str, answer: Option<&str>) -> QaItem {
        QaItem {
            index: 0,
            question: Question::new(question, None),
            answer: answer.map(str::to_string),
        }
    }

    const VALID: &str = r#"{
        "overall_score": 82,
        "language_use": {"score": 80, "feedback": "Fluent", "strengths": ["clarity"], "improvements": []},
        "answer_quality": {"score": 84, "feedback": "Relevant", "strengths": [], "improvements": ["depth"]},
        "detailed_feedback": "Solid interview.",
        "key_takeaways": ["Use examples"]
    }"#;

    #[test]
    fn test_extract_json_candidate_strips_fences() {
        let fenced = format!("Here you go:\n```json\n{}\n```\nGood luck!", VALID);
        assert!(extract_json_candidate(&fenced).starts_with('{'));
        assert!(extract_json_candidate(&fenced).ends_with('}'));

        let bare = format!("```\n{}\n```", VALID);
        assert_eq!(extract_json_candidate(&bare), VALID.trim());
        assert_eq!(extract_json_candidate("  plain  "), "plain");
    }

    #[test]
    fn test_parse_summary_reads_fenced_json() {
        let summary = parse_summary(&format!("```json\n{}\n```", VALID));
        assert_eq!(summary.overall_score, 82);
        assert_eq!(summary.answer_quality.improvements, vec!["depth".to_string()]);
    }

    #[test]
    fn test_fractional_scores_and_missing_lists_are_kept() {
        let reply = r#"```json
        {
            "overall_score": 82.5,
            "language_use": {"score": 79.4, "feedback": "Fluent", "strengths": ["clarity"]},
            "answer_quality": {"score": 101, "feedback": "Relevant"},
            "detailed_feedback": "Solid interview."
        }
        ```"#;
        let summary = parse_summary(reply);

        assert_eq!(summary.overall_score, 83);
        assert_eq!(summary.language_use.score, 79);
        assert!(summary.language_use.improvements.is_empty());
        assert_eq!(summary.answer_quality.score, 100);
        assert_eq!(summary.detailed_feedback, "Solid interview.");
        assert!(summary.key_takeaways.is_empty());
    }

    #[test]
    fn test_json_without_overall_score_falls_back() {
        let reply = r#"{"detailed_feedback": "Solid interview."}"#;
        let summary = parse_summary(reply);
        assert_eq!(summary.overall_score, 75);
        assert_eq!(summary.detailed_feedback, reply);
    }

    #[test]
    fn test_prose_reply_falls_back() {
        let prose = "The candidate did well overall and communicated clearly.";
        let summary = parse_summary(prose);

        assert_eq!(summary.overall_score, 75);
        assert_eq!(summary.language_use.score, 75);
        assert_eq!(summary.answer_quality.feedback, "Satisfactory answers provided.");
        assert_eq!(summary.detailed_feedback, prose);
    }

    #[test]
    fn test_transcript_skips_unanswered_items() {
        let log = vec![
            answered("Tell me about yourself.", Some("I build APIs.")),
            answered("Where do you see yourself?", None),
        ];
        assert_eq!(transcript(&log), "Q: Tell me about yourself.\nA: I build APIs.");
    }

    #[tokio::test]
    async fn test_synthesize_sends_transcript() {
        let model = Arc::new(CannedModel::replying(VALID));
        let synthesizer = SummarySynthesizer::new(model.clone(), 1500, 0.7);
        let log = vec![answered("Tell me about yourself.", Some("I build APIs."))];

        let summary = synthesizer.synthesize(&log).await.unwrap();
        assert_eq!(summary.overall_score, 82);

        let requests = model.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0][0].content, EVALUATOR_PROMPT);
        assert!(requests[0][1].content.contains("A: I build APIs."));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_error() {
        let synthesizer = SummarySynthesizer::new(Arc::new(CannedModel::failing(500)), 1500, 0.7);
        let result = synthesizer.synthesize(&[answered("Q", Some("A"))]).await;
        assert!(matches!(result, Err(SummaryError::SummaryGenerationFailed(_))));
    }
}
