use super::{GenerationRequest, LlmProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// OpenAI-compatible chat completions on OpenRouter.
pub struct OpenRouterAdapter {
    client: Client,
    endpoint_url: String,
    model: String,
    api_key: String,
    app_title: String,
    referer: String,
}

impl OpenRouterAdapter {
    pub fn new(client: Client, settings: &AiConfig, api_key: &str) -> Self {
        Self {
            client,
            endpoint_url: settings.openrouter_endpoint.clone(),
            model: settings.openrouter_model.clone(),
            api_key: api_key.to_string(),
            app_title: settings.app_title.clone(),
            referer: settings.referer.clone(),
        }
    }

    fn chat_request(&self, request: &GenerationRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
            temperature: request.temperature,
            response_format: request
                .structured
                .then_some(ResponseFormat { kind: "json_object" }),
        }
    }
}

fn parse_completion(raw_text: &str) -> Result<String> {
    // Parse JSON while stripping comments
    let stripped = json_comments::StripComments::new(raw_text.as_bytes());
    let response_body: ChatResponse = serde_json::from_reader(stripped)
        .map_err(|e| anyhow!("Failed to parse OpenRouter JSON: {}. Content: {}", e, raw_text))?;

    response_body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| anyhow!("No choices in OpenRouter response"))
}

#[async_trait]
impl LlmProvider for OpenRouterAdapter {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let res = self
            .client
            .post(&self.endpoint_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.app_title)
            .json(&self.chat_request(request))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(anyhow!(
                "OpenRouter API error ({}): {}",
                status.as_u16(),
                message
            ));
        }

        let raw_text = res.text().await?;
        parse_completion(&raw_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_sets_response_format() {
        let adapter = OpenRouterAdapter::new(Client::new(), &AiConfig::default(), "key");
        let body = serde_json::to_value(adapter.chat_request(&GenerationRequest::structured(
            "chunks",
            serde_json::json!({}),
        )))
        .unwrap();

        assert_eq!(body["model"], "google/gemini-2.5-pro");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["response_format"]["type"], "json_object");

        let plain = serde_json::to_value(adapter.chat_request(&GenerationRequest::text("t"))).unwrap();
        assert!(plain.get("response_format").is_none());
    }

    #[test]
    fn test_parse_completion_tolerates_comments() {
        let raw = r#"{
            // provider metadata
            "choices": [{ "message": { "role": "assistant", "content": "Done." } }]
        }"#;
        assert_eq!(parse_completion(raw).unwrap(), "Done.");
        assert!(parse_completion(r#"{"choices": []}"#).is_err());
        assert!(parse_completion("<html>").is_err());
    }
}
