//! # Language Model Collaborator
//!
//! The conversation pipeline and the summary synthesizer only see the [`LanguageModel`]
//! trait. The production implementation talks to Azure OpenAI chat completions over HTTPS.
//!
//! ## Endpoint shapes:
//! - API Management gateways (host contains `azure-api.net`):
//!   `{endpoint}/deployments/{deployment}/chat/completions?api-version=...`
//! - Azure OpenAI resources:
//!   `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//!
//! Both authenticate with the `api-key` header. Cancellation is handled by the caller
//! dropping the future; no timeout is applied here beyond the HTTP client's own.

use crate::config::LlmConfig;
use crate::context::{Message, Role};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "language model";

/// Wire message for chat completion requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System.as_str(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User.as_str(), content: content.into() }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate the assistant reply for `messages`.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Azure OpenAI chat completions client.
#[derive(Clone)]
pub struct AzureOpenAiClient {
    client: Client,
    url: String,
    api_key: String,
}

impl AzureOpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| ServiceError::Request {
                service: SERVICE,
                message: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self {
            client,
            url: completions_url(config),
            api_key: config.api_key.clone(),
        })
    }
}

/// Build the chat completions URL for either endpoint shape.
pub fn completions_url(config: &LlmConfig) -> String {
    let endpoint = config.endpoint.trim_end_matches('/');
    let prefix = if endpoint.contains("azure-api.net") { "" } else { "/openai" };
    format!(
        "{}{}/deployments/{}/chat/completions?api-version={}",
        endpoint, prefix, config.deployment, config.api_version
    )
}

#[async_trait]
impl LanguageModel for AzureOpenAiClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ServiceError> {
        debug!(messages = messages.len(), max_tokens, "Sending chat completion request");

        let body = ChatCompletionRequest { messages, max_tokens, temperature };
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ServiceError::Request {
                service: SERVICE,
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(status = status.as_u16(), "Chat completion returned an error status");
            return Err(ServiceError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            ServiceError::InvalidResponse {
                service: SERVICE,
                message: err.to_string(),
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ServiceError::InvalidResponse {
                service: SERVICE,
                message: "response contained no message content".to_string(),
            })
    }
}
