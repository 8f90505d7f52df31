//! Chat-completion client for question generation.
//!
//! Calls the OpenAI `POST /v1/chat/completions` endpoint with
//! `response_format: json_object` so the model must return a single JSON
//! document. Retry behavior mirrors the embedding client: 429/5xx/network
//! errors back off and retry, other 4xx fail immediately.
//!
//! Requires the `OPENAI_API_KEY` environment variable.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::ChatConfig;

/// Run one chat completion and parse the reply content as JSON.
///
/// Any transport failure, non-retryable status, exhausted retries, or
/// unparseable reply is an error — the caller treats all of them as a
/// generation failure.
pub async fn complete_json(
    config: &ChatConfig,
    system: &str,
    user: &str,
) -> Result<serde_json::Value> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user}
        ],
        "temperature": config.temperature,
        "response_format": {"type": "json_object"},
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    let content = extract_content(&json)?;
                    return parse_reply(&content);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "OpenAI API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Chat completion failed after retries")))
}

/// Pull the assistant message content out of the API response.
fn extract_content(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))
}

/// Parse the reply content as a JSON object.
fn parse_reply(content: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| anyhow::anyhow!("Model reply is not valid JSON: {}", e))?;
    if !value.is_object() {
        bail!("Model reply is not a JSON object");
    }
    Ok(value)
}
