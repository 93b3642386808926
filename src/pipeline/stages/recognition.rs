//! Speech recognition stage.

use super::RECOGNITION_APOLOGY;
use crate::pipeline::{Frame, Outbox, PipelineClosed, Stage};
use crate::services::{RecognitionStream, SpeechRecognizer};
use async_trait::async_trait;
use tracing::warn;

/// Feeds audio to the session's recognition stream and emits recognized text.
///
/// Without a recognizer, audio passes through untouched and text arrives via
/// `user-text` messages instead.
pub struct SpeechRecognition {
    stream: Option<Box<dyn RecognitionStream>>,
    failing: bool,
}

impl SpeechRecognition {
    pub fn new(recognizer: Option<&dyn SpeechRecognizer>, sample_rate: u32) -> Self {
        Self {
            stream: recognizer.map(|recognizer| recognizer.open_stream(sample_rate)),
            failing: false,
        }
    }
}

#[async_trait]
impl Stage for SpeechRecognition {
    fn name(&self) -> &'static str {
        "speech-recognition"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        let chunk = match frame {
            Frame::AudioChunk(chunk) if self.stream.is_some() => chunk,
            other => return out.send(other).await,
        };
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };

        match out.guard(stream.push(&chunk)).await? {
            Ok(texts) => {
                self.failing = false;
                for text in texts.into_iter().filter(|text| !text.trim().is_empty()) {
                    out.send(Frame::RecognizedText(text)).await?;
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Speech recognition failed");
                // one apology per run of failures
                if self.failing {
                    return Ok(());
                }
                self.failing = true;
                out.send(Frame::Apology(RECOGNITION_APOLOGY.to_string())).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::pipeline::stages::test_support::run_stage;
    use crate::pipeline::AudioChunk;

    /// Recognizes one word per non-silent chunk; fails on chunks starting with -1.
    struct Words;

    struct WordStream {
        count: usize,
    }

    #[async_trait]
    impl RecognitionStream for WordStream {
        async fn push(&mut self, chunk: &AudioChunk) -> Result<Vec<String>, ServiceError> {
            if chunk.samples.first() == Some(&-1) {
                return Err(ServiceError::Request {
                    service: "speech recognition",
                    message: "socket reset".to_string(),
                });
            }
            self.count += 1;
            Ok(vec![format!("word{}", self.count)])
        }
    }

    impl SpeechRecognizer for Words {
        fn open_stream(&self, _sample_rate: u32) -> Box<dyn RecognitionStream> {
            Box::new(WordStream { count: 0 })
        }
    }

    fn chunk(first: i16) -> Frame {
        Frame::AudioChunk(AudioChunk::new(vec![first, 0], 16000))
    }

    #[tokio::test]
    async fn test_audio_becomes_text() {
        let emitted = run_stage(SpeechRecognition::new(Some(&Words), 16000), vec![chunk(5), chunk(5)]).await;
        assert_eq!(
            emitted,
            vec![Frame::RecognizedText("word1".to_string()), Frame::RecognizedText("word2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failures_apologise_once_and_continue() {
        let frames = vec![chunk(-1), chunk(-1), chunk(5)];
        let emitted = run_stage(SpeechRecognition::new(Some(&Words), 16000), frames).await;
        assert_eq!(
            emitted,
            vec![
                Frame::Apology(RECOGNITION_APOLOGY.to_string()),
                Frame::RecognizedText("word1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_without_recognizer_frames_pass_through() {
        let emitted = run_stage(SpeechRecognition::new(None, 16000), vec![chunk(5)]).await;
        assert_eq!(emitted, vec![chunk(5)]);
    }
}
