//! Content-generation client.
//!
//! With a configured credential this calls an OpenAI-compatible
//! chat-completions endpoint, asks for strict JSON and maps the reply into the
//! dashboard's payload shape. Without one it waits briefly and returns a
//! simulated payload so the dashboard stays demoable offline. Parsing and
//! mapping helpers are split out so they can be tested without a network.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::AiConfig;

pub const SIMULATED_CONFIDENCE: &str = "95.5%";
const DEFAULT_LOAD: &str = "15 min";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub context: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub complexity: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationPayload {
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub ai_confidence: String,
    pub estimated_load: String,
    pub raw_json: String,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned {0}")]
    Upstream(String),
    #[error("reply carried no message content")]
    MalformedReply,
    #[error("generated content was not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
}

pub async fn generate(
    ai: &AiConfig,
    req: &GenerationRequest,
) -> Result<GenerationPayload, GenerateError> {
    let Some(key) = ai.api_key.as_deref().filter(|k| !k.is_empty()) else {
        // Fixed wait so the demo path still feels like a generation round trip.
        tokio::time::sleep(Duration::from_millis(ai.simulate_delay_ms)).await;
        return Ok(simulated_payload(req));
    };

    let client = Client::builder()
        .timeout(Duration::from_secs(ai.request_timeout_secs))
        .build()?;
    let body = json!({
        "model": ai.model,
        "messages": [
            { "role": "system", "content": "You produce strict JSON and nothing else." },
            { "role": "user", "content": build_prompt(req) }
        ],
        "response_format": { "type": "json_object" },
        "max_tokens": 800
    });

    let resp = client
        .post(format!("{}/chat/completions", ai.api_url.trim_end_matches('/')))
        .bearer_auth(key)
        .json(&body)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(GenerateError::Upstream(resp.status().to_string()));
    }

    let reply: serde_json::Value = resp.json().await?;
    let content = extract_content(&reply).ok_or(GenerateError::MalformedReply)?;
    map_generated(req, &content)
}

pub fn build_prompt(req: &GenerationRequest) -> String {
    format!(
        "Generate learning content for a course dashboard.\n\
         Context: {}\n\
         Content type: {}\n\
         Complexity: {}\n\
         Language: {}\n\
         Respond with strict JSON only, using the keys \"title\", \
         \"duration\" (for example \"15 min\") and \"confidence\" (a percentage string).",
        req.context, req.content_type, req.complexity, req.language
    )
}

/// Pulls the assistant message out of a chat-completions reply.
pub fn extract_content(reply: &serde_json::Value) -> Option<String> {
    reply
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Maps generated JSON into the payload shape, defaulting missing fields.
/// `duration` carries over as `estimated_load`.
pub fn map_generated(
    req: &GenerationRequest,
    content: &str,
) -> Result<GenerationPayload, GenerateError> {
    let parsed: serde_json::Value = serde_json::from_str(content)?;
    Ok(GenerationPayload {
        title: parsed
            .get("title")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_title(req)),
        content_type: req.content_type.clone(),
        ai_confidence: parsed
            .get("confidence")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| SIMULATED_CONFIDENCE.to_string()),
        estimated_load: parsed
            .get("duration")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_LOAD.to_string()),
        raw_json: content.to_string(),
    })
}

pub fn simulated_payload(req: &GenerationRequest) -> GenerationPayload {
    let title = fallback_title(req);
    let raw = json!({
        "title": title,
        "duration": DEFAULT_LOAD,
        "confidence": SIMULATED_CONFIDENCE,
        "context": req.context,
        "type": req.content_type,
        "complexity": req.complexity,
        "language": req.language,
    });
    GenerationPayload {
        title,
        content_type: req.content_type.clone(),
        ai_confidence: SIMULATED_CONFIDENCE.to_string(),
        estimated_load: DEFAULT_LOAD.to_string(),
        raw_json: raw.to_string(),
    }
}

fn fallback_title(req: &GenerationRequest) -> String {
    format!("Generated {}: {}", req.content_type, req.context)
}
