//! Transcript capture: sentence-granular transcripts of the assistant's replies.

use crate::pipeline::{ControlSignal, Frame, Outbox, PipelineClosed, Stage};
use crate::turn_buffer::TurnBuffer;
use async_trait::async_trait;

/// Runs response fragments through a [`TurnBuffer`].
///
/// Every fragment is forwarded, followed by any sentence it completed. The remainder is
/// flushed ahead of `ResponseEnd`.
#[derive(Default)]
pub struct TranscriptCapture {
    buffer: TurnBuffer,
}

impl TranscriptCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Stage for TranscriptCapture {
    fn name(&self) -> &'static str {
        "transcript-capture"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        match frame {
            Frame::ResponseText(fragment) => {
                let sentences = self.buffer.push(&fragment);
                out.send(Frame::ResponseText(fragment)).await?;
                for sentence in sentences {
                    out.send(Frame::TranscriptSentence(sentence)).await?;
                }
                Ok(())
            }
            Frame::Control(ControlSignal::ResponseEnd) => {
                if let Some(rest) = self.buffer.flush() {
                    out.send(Frame::TranscriptSentence(rest)).await?;
                }
                out.send(Frame::Control(ControlSignal::ResponseEnd)).await
            }
            other => out.send(other).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stages::test_support::run_stage;

    fn sentences(frames: &[Frame]) -> Vec<String> {
        frames
            .iter()
            .filter_map(|frame| match frame {
                Frame::TranscriptSentence(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_sentences_follow_fragments() {
        let frames = ["Hello wor", "ld. How", " are you?"]
            .iter()
            .map(|text| Frame::ResponseText(text.to_string()))
            .chain([Frame::Control(ControlSignal::ResponseEnd)])
            .collect();
        let emitted = run_stage(TranscriptCapture::new(), frames).await;

        assert_eq!(sentences(&emitted), vec!["Hello world.", "How are you?"]);
        assert_eq!(emitted[1], Frame::ResponseText("ld. How".to_string()));
        assert_eq!(emitted[2], Frame::TranscriptSentence("Hello world.".to_string()));
    }

    #[tokio::test]
    async fn test_remainder_flushed_at_response_end() {
        let frames = vec![
            Frame::ResponseText("No terminator here".to_string()),
            Frame::Control(ControlSignal::ResponseEnd),
        ];
        let emitted = run_stage(TranscriptCapture::new(), frames).await;
        assert_eq!(
            &emitted[1..],
            &[
                Frame::TranscriptSentence("No terminator here".to_string()),
                Frame::Control(ControlSignal::ResponseEnd),
            ]
        );
    }
}
