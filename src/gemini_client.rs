use std::time::Duration;

use async_trait::async_trait;
use eyre::{eyre, Result};
use serde_json::{json, Value};
use tracing::{debug, error};
use url::Url;

use crate::config::GeminiConfig;

/// Text generation capability the router asks general questions.
#[async_trait]
pub trait Generate: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    system_instruction: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, system_instruction: String) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| eyre!("GEMINI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            system_instruction,
            client,
        })
    }

    // The key travels in the `x-goog-api-key` header so it never shows up in
    // URLs that reqwest errors print.
    fn api_url(&self) -> Result<Url> {
        let url = Url::parse(&format!("{}/{}:generateContent", self.base_url, self.model))?;
        Ok(url)
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "systemInstruction": {
                "parts": [
                    {
                        "text": self.system_instruction
                    }
                ]
            },
            "contents": [
                {
                    "role": "user",
                    "parts": [
                        {
                            "text": prompt
                        }
                    ]
                }
            ],
            "generationConfig": {
                "temperature": 0.7,
                "topP": 0.95,
                "topK": 40,
                "maxOutputTokens": 1024
            }
        })
    }
}

#[async_trait]
impl Generate for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request_body = self.request_body(prompt);

        debug!("Sending request to Gemini API: {}", serde_json::to_string_pretty(&request_body)?);

        let response = self.client.post(self.api_url()?)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.map_err(reqwest::Error::without_url)?;
            error!("API request failed with status {}: {}", status, error_text);
            return Err(eyre!("API request failed with status {}: {}", status, error_text));
        }

        let response_json: Value = response.json().await.map_err(reqwest::Error::without_url)?;

        debug!("Received response from Gemini API: {}", serde_json::to_string_pretty(&response_json)?);

        extract_text(&response_json)
    }
}

/// Joins the text parts of the first candidate.
fn extract_text(response_json: &Value) -> Result<String> {
    let first_candidate = response_json
        .get("candidates")
        .and_then(|candidates| candidates.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| eyre!("Gemini response has no candidates"))?;

    let mut result = String::new();
    if let Some(parts) = first_candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                result.push_str(text);
            }
        }
    }

    if result.trim().is_empty() {
        let finish_reason = first_candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("unknown");
        return Err(eyre!("Gemini returned no text (finish reason: {})", finish_reason));
    }

    Ok(result)
}
