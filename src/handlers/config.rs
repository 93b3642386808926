use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

const REDACTED: &str = "********";

/// Effective configuration. The provider key is only reported as set or unset.
pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();
    let api_key = if config.llm.api_key.is_empty() { "" } else { REDACTED };

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": {
            "server": {
                "host": config.server.host,
                "port": config.server.port
            },
            "llm": {
                "endpoint": config.llm.endpoint,
                "deployment": config.llm.deployment,
                "api_version": config.llm.api_version,
                "api_key": api_key,
                "max_tokens": config.llm.max_tokens,
                "temperature": config.llm.temperature,
                "summary_max_tokens": config.llm.summary_max_tokens,
                "request_timeout_secs": config.llm.request_timeout_secs
            },
            "performance": {
                "max_concurrent_sessions": config.performance.max_concurrent_sessions
            },
            "pipeline": {
                "audio_sample_rate": config.pipeline.audio_sample_rate
            }
        }
    })))
}
