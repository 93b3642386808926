//! Speech synthesis and avatar rendering stages.
//!
//! Both forward the frame they work on before emitting what they rendered, so transcripts
//! reach the client ahead of the matching audio.

use super::{AVATAR_APOLOGY, SYNTHESIS_APOLOGY};
use crate::pipeline::{Frame, Outbox, PipelineClosed, Stage};
use crate::services::{AvatarRenderer, SpeechSynthesizer};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Renders transcript sentences and apologies to speech.
pub struct SpeechSynthesis {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    failing: bool,
}

impl SpeechSynthesis {
    pub fn new(synthesizer: Option<Arc<dyn SpeechSynthesizer>>) -> Self {
        Self {
            synthesizer,
            failing: false,
        }
    }
}

#[async_trait]
impl Stage for SpeechSynthesis {
    fn name(&self) -> &'static str {
        "speech-synthesis"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        let text = match &frame {
            Frame::TranscriptSentence(text) | Frame::Apology(text) => Some(text.clone()),
            _ => None,
        };
        let (Some(synthesizer), Some(text)) = (self.synthesizer.clone(), text) else {
            return out.send(frame).await;
        };

        out.send(frame).await?;
        match out.guard(synthesizer.synthesize(&text)).await? {
            Ok(audio) => {
                self.failing = false;
                out.send(Frame::SynthesizedAudio(audio)).await
            }
            Err(err) => {
                warn!(error = %err, "Speech synthesis failed");
                if self.failing {
                    return Ok(());
                }
                self.failing = true;
                out.send(Frame::Apology(SYNTHESIS_APOLOGY.to_string())).await
            }
        }
    }
}

/// Renders avatar video for synthesized speech.
pub struct AvatarRender {
    renderer: Option<Arc<dyn AvatarRenderer>>,
    failing: bool,
}

impl AvatarRender {
    pub fn new(renderer: Option<Arc<dyn AvatarRenderer>>) -> Self {
        Self {
            renderer,
            failing: false,
        }
    }
}

#[async_trait]
impl Stage for AvatarRender {
    fn name(&self) -> &'static str {
        "avatar-render"
    }

    async fn process(&mut self, frame: Frame, out: &Outbox) -> Result<(), PipelineClosed> {
        let audio = match frame {
            Frame::SynthesizedAudio(audio) if self.renderer.is_some() => audio,
            other => return out.send(other).await,
        };
        let Some(renderer) = self.renderer.clone() else {
            return Ok(());
        };
        let rendered = out.guard(renderer.render(&audio)).await?;
        out.send(Frame::SynthesizedAudio(audio)).await?;

        match rendered {
            Ok(Some(video)) => {
                self.failing = false;
                out.send(Frame::SynthesizedVideo(video)).await
            }
            Ok(None) => {
                self.failing = false;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Avatar rendering failed");
                if self.failing {
                    return Ok(());
                }
                self.failing = true;
                out.send(Frame::Apology(AVATAR_APOLOGY.to_string())).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::pipeline::stages::test_support::run_stage;
    use crate::pipeline::{SynthesizedAudio, SynthesizedVideo};

    struct Voice {
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for Voice {
        async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, ServiceError> {
            if self.fail {
                return Err(ServiceError::Status {
                    service: "speech synthesis",
                    status: 500,
                    body: String::new(),
                });
            }
            Ok(SynthesizedAudio {
                text: text.to_string(),
                samples: vec![0; 4],
                sample_rate: 24000,
            })
        }
    }

    struct Face;

    #[async_trait]
    impl AvatarRenderer for Face {
        async fn render(&self, audio: &SynthesizedAudio) -> Result<Option<SynthesizedVideo>, ServiceError> {
            Ok(Some(SynthesizedVideo {
                data: audio.text.as_bytes().to_vec(),
                mime_type: "video/webm".to_string(),
            }))
        }
    }

    fn sentence(text: &str) -> Frame {
        Frame::TranscriptSentence(text.to_string())
    }

    #[tokio::test]
    async fn test_sentence_followed_by_audio() {
        let stage = SpeechSynthesis::new(Some(Arc::new(Voice { fail: false })));
        let emitted = run_stage(stage, vec![sentence("Hi there.")]).await;

        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0], sentence("Hi there."));
        assert!(matches!(&emitted[1], Frame::SynthesizedAudio(audio) if audio.text == "Hi there."));
    }

    #[tokio::test]
    async fn test_synthesis_failure_apologises_once() {
        let stage = SpeechSynthesis::new(Some(Arc::new(Voice { fail: true })));
        let emitted = run_stage(stage, vec![sentence("One."), sentence("Two.")]).await;

        assert_eq!(
            emitted,
            vec![
                sentence("One."),
                Frame::Apology(SYNTHESIS_APOLOGY.to_string()),
                sentence("Two."),
            ]
        );
    }

    #[tokio::test]
    async fn test_avatar_renders_video_after_audio() {
        let audio = Frame::SynthesizedAudio(SynthesizedAudio {
            text: "Hi.".to_string(),
            samples: vec![1],
            sample_rate: 24000,
        });
        let emitted = run_stage(AvatarRender::new(Some(Arc::new(Face))), vec![audio.clone()]).await;

        assert_eq!(emitted[0], audio);
        assert!(matches!(&emitted[1], Frame::SynthesizedVideo(video) if video.data == b"Hi.".to_vec()));
    }

    #[tokio::test]
    async fn test_unconfigured_stages_forward_unchanged() {
        let emitted = run_stage(SpeechSynthesis::new(None), vec![sentence("Hello.")]).await;
        assert_eq!(emitted, vec![sentence("Hello.")]);

        let emitted = run_stage(AvatarRender::new(None), vec![sentence("Hello.")]).await;
        assert_eq!(emitted, vec![sentence("Hello.")]);
    }
}
