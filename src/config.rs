//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix, `__` between sections)
//! - Provider variables used by the hosted deployments (AZURE_OPENAI_*)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform / provider variables (HOST, PORT, AZURE_OPENAI_*)
//! 2. Environment variables (APP_SERVER__PORT, APP_LLM__TEMPERATURE, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub performance: PerformanceConfig,
    pub pipeline: PipelineConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Language model (Azure OpenAI chat completions) settings.
///
/// ## Fields:
/// - `endpoint`: Resource or API-Management base URL
/// - `deployment`: Deployment name used in the request path
/// - `api_version`: `api-version` query parameter
/// - `api_key`: Sent as the `api-key` header, never echoed by `/api/v1/config`
/// - `max_tokens` / `temperature`: Per-turn generation limits
/// - `summary_max_tokens`: Limit for the single post-interview evaluation call
/// - `request_timeout_secs`: HTTP client timeout owned by the collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub summary_max_tokens: u32,
    pub request_timeout_secs: u64,
}

/// Performance tuning configuration.
///
/// ## Tuning guidelines:
/// Every interview session holds one pipeline (eleven tasks) and one model conversation,
/// so `max_concurrent_sessions` is the main knob for memory and upstream API usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_sessions: usize,
    /// How long an accepted offer may wait for its media bridge before the slot is released
    pub connect_timeout_secs: u64,
}

/// Media settings for the conversation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sample rate of PCM audio arriving from the client (16-bit mono)
    pub audio_sample_rate: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 7860,
            },
            llm: LlmConfig {
                endpoint: String::new(),
                deployment: String::new(),
                api_version: "2024-09-01-preview".to_string(),
                api_key: String::new(),
                max_tokens: 300,
                temperature: 0.7,
                summary_max_tokens: 1500,
                request_timeout_secs: 60,
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,
                connect_timeout_secs: 30,
            },
            pipeline: PipelineConfig {
                audio_sample_rate: 16000,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_LLM__MAX_TOKENS=500`: Override per-turn token limit
    /// - `PORT=3000`: Special case for deployment platforms
    /// - `AZURE_OPENAI_ENDPOINT=https://...`: Provider endpoint
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        // Platform variables that don't follow the APP_ convention
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("AZURE_OPENAI_API_KEY", "llm.api_key"),
            ("AZURE_OPENAI_ENDPOINT", "llm.endpoint"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "llm.deployment"),
            ("AZURE_OPENAI_API_VERSION", "llm.api_version"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                settings = settings.set_override(key, value)?;
            }
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Missing provider credentials are not an error here: the server still starts and
    /// serves signaling, and model calls fail (and apologise) until credentials exist.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        if self.performance.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Connect timeout must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow::anyhow!("LLM temperature must be between 0.0 and 2.0"));
        }

        if self.llm.max_tokens == 0 || self.llm.summary_max_tokens == 0 {
            return Err(anyhow::anyhow!("LLM token limits must be greater than 0"));
        }

        if self.pipeline.audio_sample_rate == 0 {
            return Err(anyhow::anyhow!("Audio sample rate must be greater than 0"));
        }

        Ok(())
    }

    /// Whether enough provider settings exist to attempt model calls.
    pub fn llm_configured(&self) -> bool {
        !self.llm.endpoint.is_empty() && !self.llm.deployment.is_empty() && !self.llm.api_key.is_empty()
    }
}
