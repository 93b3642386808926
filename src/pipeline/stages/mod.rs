//! Pipeline stages and the canonical session chain.

pub mod aggregation;
pub mod framing;
pub mod interview;
pub mod language_model;
pub mod media;
pub mod recognition;
pub mod synthesis;
pub mod transcript;

pub use aggregation::{AssistantAggregator, UserAggregator};
pub use framing::ProtocolFraming;
pub use interview::InterviewLogic;
pub use language_model::LanguageModelStage;
pub use media::{TransportInput, TransportOutput};
pub use recognition::SpeechRecognition;
pub use synthesis::{AvatarRender, SpeechSynthesis};
pub use transcript::TranscriptCapture;

use super::Stage;
use crate::services::Collaborators;
use crate::session::Conversation;
use crate::transport::PeerConnection;
use std::sync::Arc;

pub const LLM_APOLOGY: &str = "I apologize, I'm having trouble connecting. Could you please repeat that?";
pub const RECOGNITION_APOLOGY: &str = "Sorry, I didn't catch that. Could you say it again?";
pub const SYNTHESIS_APOLOGY: &str = "Sorry, I'm having trouble with my voice right now. Please follow along with the transcript.";
pub const AVATAR_APOLOGY: &str = "Sorry, the video feed isn't available right now. We can continue with audio.";

/// Per-session generation settings.
#[derive(Debug, Clone, Copy)]
pub struct StageSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub sample_rate: u32,
}

/// Build the stage chain for one session, in canonical order.
pub fn session_stages(
    conversation: Arc<Conversation>,
    connection: Arc<dyn PeerConnection>,
    collaborators: &Collaborators,
    settings: StageSettings,
) -> Vec<Box<dyn Stage>> {
    let pc_id = connection.pc_id().to_string();
    vec![
        Box::new(TransportInput::new(pc_id, settings.sample_rate)),
        Box::new(ProtocolFraming::new()),
        Box::new(SpeechRecognition::new(collaborators.recognizer.as_deref(), settings.sample_rate)),
        Box::new(UserAggregator::new(conversation.clone())),
        Box::new(InterviewLogic::new(conversation.clone())),
        Box::new(LanguageModelStage::new(
            conversation.clone(),
            collaborators.model.clone(),
            settings.max_tokens,
            settings.temperature,
        )),
        Box::new(TranscriptCapture::new()),
        Box::new(SpeechSynthesis::new(collaborators.synthesizer.clone())),
        Box::new(AvatarRender::new(collaborators.avatar.clone())),
        Box::new(TransportOutput::new(connection)),
        Box::new(AssistantAggregator::new(conversation)),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::summary::tests::CannedModel;
    use crate::transport::local::LocalPeerConnector;
    use crate::transport::{PeerConnector, SessionDescription};

    #[tokio::test]
    async fn test_session_chain_is_in_canonical_order() {
        let connector = LocalPeerConnector::new(16000);
        let connection = connector.accept("pc", &SessionDescription::offer("v=0")).await.unwrap();
        let collaborators = Collaborators::text_only(Arc::new(CannedModel::replying("Hi?")));
        let settings = StageSettings { max_tokens: 300, temperature: 0.7, sample_rate: 16000 };

        let pipeline = Pipeline::new(session_stages(
            Arc::new(Conversation::new(None)),
            connection,
            &collaborators,
            settings,
        ));

        assert_eq!(
            pipeline.stage_names(),
            vec![
                "transport-input",
                "protocol-framing",
                "speech-recognition",
                "context-aggregation(user)",
                "interview-logic",
                "language-model",
                "transcript-capture",
                "speech-synthesis",
                "avatar-render",
                "transport-output",
                "context-aggregation(assistant)",
            ]
        );
    }
}
