use super::{GenerationRequest, LlmProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::AiConfig;

pub struct GeminiAdapter {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiAdapter {
    pub fn new(client: Client, settings: &AiConfig, api_key: &str) -> Self {
        Self {
            client,
            endpoint: settings.gemini_endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: settings.gemini_model.clone(),
        }
    }

    fn payload(&self, request: &GenerationRequest) -> Value {
        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".into(), json!(temperature));
        }
        if request.structured {
            generation_config.insert("responseMimeType".into(), json!("application/json"));
            if let Some(schema) = &request.json_schema {
                generation_config.insert("responseSchema".into(), schema.clone());
            }
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": generation_config,
        })
    }
}

/// Concatenated text parts of the first candidate.
fn extract_text(response: &Value) -> Result<String> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| anyhow!("Failed to extract content from Gemini response"))?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        let reason = response["candidates"][0]["finishReason"]
            .as_str()
            .unwrap_or("no text");
        return Err(anyhow!("Gemini returned an empty response ({})", reason));
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.payload(request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(error_text);
            return Err(anyhow!("Gemini API error ({}): {}", status.as_u16(), message));
        }

        let response_json: Value = res.json().await?;
        extract_text(&response_json)
    }
}
