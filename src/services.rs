//! External media collaborators: speech recognition, speech synthesis, avatar rendering.
//!
//! The pipeline stages only see these traits. Any of them may be left unconfigured, in
//! which case the matching stage forwards frames unchanged. Timeouts are the
//! implementation's business; cancellation happens by dropping the returned future.

use crate::error::ServiceError;
use crate::llm::LanguageModel;
use crate::pipeline::{AudioChunk, SynthesizedAudio, SynthesizedVideo};
use async_trait::async_trait;
use std::sync::Arc;

/// One continuous recognition stream, opened per session.
///
/// Streams are not restartable: a failed push is reported, and the next push continues on
/// the same stream.
#[async_trait]
pub trait RecognitionStream: Send {
    /// Feed audio and return any utterance fragments it completed.
    async fn push(&mut self, chunk: &AudioChunk) -> Result<Vec<String>, ServiceError>;
}

pub trait SpeechRecognizer: Send + Sync {
    fn open_stream(&self, sample_rate: u32) -> Box<dyn RecognitionStream>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ServiceError>;
}

#[async_trait]
pub trait AvatarRenderer: Send + Sync {
    /// Render video for a piece of synthesized speech. `None` means no video for it.
    async fn render(&self, audio: &SynthesizedAudio) -> Result<Option<SynthesizedVideo>, ServiceError>;
}

/// Everything a session pipeline calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub model: Arc<dyn LanguageModel>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub avatar: Option<Arc<dyn AvatarRenderer>>,
}

impl Collaborators {
    /// Text-only setup: a language model and nothing else.
    pub fn text_only(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            recognizer: None,
            synthesizer: None,
            avatar: None,
        }
    }
}
