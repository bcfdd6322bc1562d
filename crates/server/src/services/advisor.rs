// Weather and farming recommendations. The text is opaque to the rest of the
// server and is passed through as-is.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{
    config::Config,
    error::{AppError, Result},
};

const SYSTEM_PROMPT: &str = "You are an agronomy assistant for smallholder farmers in West Africa. \
Given a location, reply with two or three sentences of practical advice for the coming days, \
covering expected weather and what it means for planting, irrigation and harvesting.";

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn recommendation(&self, location: &str) -> Result<String>;
}

/// Canned advice, rotated on every call.
#[derive(Default)]
pub struct StaticAdvisor {
    next: AtomicUsize,
}

impl StaticAdvisor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Advisor for StaticAdvisor {
    async fn recommendation(&self, location: &str) -> Result<String> {
        let templates = [
            "Sunny spells expected in {}. Ideal for harvesting mature crops. Consider irrigating young plants in the evening.",
            "High humidity in {}. Monitor for fungal diseases on tomato and potato plants. Ensure good air circulation.",
            "Light showers predicted for {}. Good time for planting new seeds. Hold off on pesticide application.",
        ];
        let i = self.next.fetch_add(1, Ordering::Relaxed) % templates.len();
        Ok(templates[i].replace("{}", location))
    }
}

/// OpenAI-compatible chat completions endpoint.
pub struct LlmAdvisor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmAdvisor {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
        })
    }

    async fn send(&self, body: &Value) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let mut request = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request.send().await
    }
}

fn extract_text(v: &Value) -> Option<String> {
    let content = v.get("choices")?.get(0)?.get("message")?.get("content")?;
    let text = match content {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
                .trim()
                .to_string(),
        ),
        _ => None,
    };
    text.filter(|s| !s.is_empty())
}

#[async_trait]
impl Advisor for LlmAdvisor {
    async fn recommendation(&self, location: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0.4,
            "max_tokens": 200,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Location: {location}") }
            ]
        });

        // A read with no side effects, so one retry on timeout or connect failure.
        let response = match self.send(&body).await {
            Err(e) if e.is_timeout() || e.is_connect() => {
                tracing::warn!(error = %e, "Advisor request failed, retrying once");
                self.send(&body).await
            }
            other => other,
        }
        .map_err(|e| AppError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!(
                "advisor returned {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::Transport(format!("invalid advisor response: {e}")))?;

        extract_text(&payload)
            .ok_or_else(|| AppError::Transport("advisor response had no text".to_string()))
    }
}

pub fn from_config(config: &Config) -> Result<Arc<dyn Advisor>> {
    match &config.advisor_base_url {
        Some(base_url) => {
            tracing::info!(%base_url, model = %config.advisor_model, "Using hosted advisor");
            Ok(Arc::new(LlmAdvisor::new(
                base_url.clone(),
                config.advisor_api_key.clone(),
                config.advisor_model.clone(),
                Duration::from_secs(config.advisor_timeout_secs),
            )?))
        }
        None => Ok(Arc::new(StaticAdvisor::new())),
    }
}
