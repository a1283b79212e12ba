//! Dialogue generation: the text each agent speaks.
//!
//! [`GeminiGenerator`] calls the Gemini `generateContent` REST endpoint.
//! [`MockGenerator`] answers offline (`llm_mode = "mock"`).
//!
//! API key: `GEMINI_API_KEY` in `.env`.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Produces reply text for a flattened prompt.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    /// Fails with a transport error or [`CoreError::NoContent`].
    async fn generate(&self, prompt: &str) -> CoreResult<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    stop_sequences: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
            stop_sequences: vec!["\n\n".to_string()],
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn build_request(prompt: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(prompt.to_string()),
            }],
        }],
        generation_config: GenerationConfig::default(),
    }
}

/// First text part of the first candidate.
fn extract_text(response: GenerateResponse) -> CoreResult<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or(CoreError::NoContent)
}

/// Gemini REST client.
pub struct GeminiGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// Create with an explicit API key and model name.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.into().trim().to_string(),
            model: model.into(),
            client,
        }
    }

    /// Build from `GEMINI_API_KEY`. Returns `None` when the key is missing or empty.
    pub fn from_env(model: &str) -> Option<Self> {
        let key = std::env::var("GEMINI_API_KEY").ok()?;
        if key.trim().is_empty() {
            return None;
        }
        Some(Self::new(key, model))
    }
}

#[async_trait]
impl DialogueGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> CoreResult<String> {
        let url = format!("{}/models/{}:generateContent", GEMINI_API_BASE, self.model);
        debug!(model = %self.model, chars = prompt.len(), "Sending prompt to Gemini");

        let res = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(prompt))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Generation(format!("Gemini API error {}: {}", status, body)));
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Generation(format!("Gemini response parse failed: {}", e)))?;
        extract_text(parsed)
    }
}

/// Offline generator: answers with a short deterministic line derived from the prompt.
#[derive(Debug, Default)]
pub struct MockGenerator {
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DialogueGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> CoreResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let who = prompt
            .split("You are ")
            .nth(1)
            .and_then(|rest| rest.split(',').next())
            .unwrap_or("An agent");
        let topic = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Current Segment: "))
            .map(|segment| format!("we are on {}", segment))
            .unwrap_or_else(|| "please pick a start and a destination".to_string());
        Ok(format!("{} here (update {}): {}.", who, n, topic))
    }
}
