//! Frame types flowing between pipeline stages.
//!
//! Frames are moved from stage to stage, never shared, so each one has exactly one
//! consumer at a time.

use crate::interview::Question;

/// 16-bit mono PCM received from the client.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// Speech rendered for one transcript sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub text: String,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Encoded avatar video for one piece of synthesized speech.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedVideo {
    pub data: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Begin the interview: greet and ask the first question.
    StartInterview,
    /// The candidate finished speaking.
    EndOfTurn,
    /// The assistant reply is complete.
    ResponseEnd,
    /// Every question was answered and the closing remark went out.
    InterviewComplete,
    /// The candidate asked to stop early.
    EndInterview,
    /// Tear the session down.
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    AudioChunk(AudioChunk),
    /// Raw data-channel message, decoded by the protocol-framing stage.
    ClientMessage(serde_json::Value),
    RecognizedText(String),
    /// The aggregated candidate utterance, ahead of its `EndOfTurn`.
    UserTurn(String),
    /// Generate the next assistant turn, working in `next_question` when present.
    LlmRun { next_question: Option<Question> },
    ResponseText(String),
    TranscriptSentence(String),
    SynthesizedAudio(SynthesizedAudio),
    SynthesizedVideo(SynthesizedVideo),
    Apology(String),
    Control(ControlSignal),
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::AudioChunk(_) => "audio_chunk",
            Frame::ClientMessage(_) => "client_message",
            Frame::RecognizedText(_) => "recognized_text",
            Frame::UserTurn(_) => "user_turn",
            Frame::LlmRun { .. } => "llm_run",
            Frame::ResponseText(_) => "response_text",
            Frame::TranscriptSentence(_) => "transcript_sentence",
            Frame::SynthesizedAudio(_) => "synthesized_audio",
            Frame::SynthesizedVideo(_) => "synthesized_video",
            Frame::Apology(_) => "apology",
            Frame::Control(_) => "control",
        }
    }
}
