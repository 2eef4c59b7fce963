mod gemini_adapter;
mod openrouter_adapter;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AiConfig;
use crate::error::{AppError, AppResult};
use crate::models::{ProviderKind, User};

pub use gemini_adapter::GeminiAdapter;
pub use openrouter_adapter::OpenRouterAdapter;

/// One generation call. With `json_schema` set the provider is asked for
/// structured output; the caller still validates whatever comes back.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub structured: bool,
    pub json_schema: Option<Value>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: Some(0.0),
            ..Default::default()
        }
    }

    pub fn structured(prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: Some(0.0),
            structured: true,
            json_schema: Some(schema),
        }
    }
}

/// Trait for LLM provider implementations
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Credentials and preference for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub primary: ProviderKind,
}

impl ProviderConfig {
    /// Primary first, then the other one.
    pub fn provider_order(&self) -> [ProviderKind; 2] {
        [self.primary, self.primary.other()]
    }

    pub fn api_key(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
            ProviderKind::OpenRouter => self.openrouter_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

impl From<&User> for ProviderConfig {
    fn from(user: &User) -> Self {
        Self {
            gemini_api_key: user.gemini_api_key.clone(),
            openrouter_api_key: user.openrouter_api_key.clone(),
            primary: user.primary_provider(),
        }
    }
}

/// Builds the adapter for a provider kind, failing when it cannot be used.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, kind: ProviderKind, config: &ProviderConfig) -> Result<Box<dyn LlmProvider>>;
}

pub struct HttpProviderFactory {
    client: Client,
    settings: AiConfig,
}

impl HttpProviderFactory {
    pub fn new(settings: AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn build(&self, kind: ProviderKind, config: &ProviderConfig) -> Result<Box<dyn LlmProvider>> {
        match kind {
            ProviderKind::Gemini => {
                let key = config
                    .api_key(kind)
                    .ok_or_else(|| anyhow!("Google Gemini API key is not configured."))?;
                Ok(Box::new(GeminiAdapter::new(
                    self.client.clone(),
                    &self.settings,
                    key,
                )))
            }
            ProviderKind::OpenRouter => {
                let key = config
                    .api_key(kind)
                    .ok_or_else(|| anyhow!("OpenRouter API key is not configured."))?;
                Ok(Box::new(OpenRouterAdapter::new(
                    self.client.clone(),
                    &self.settings,
                    key,
                )))
            }
        }
    }
}

/// Routes a request through the configured providers in order, one attempt
/// each.
#[derive(Clone)]
pub struct ProviderGateway {
    factory: Arc<dyn ProviderFactory>,
}

impl ProviderGateway {
    pub fn new(settings: AiConfig) -> Result<Self> {
        Ok(Self::with_factory(Arc::new(HttpProviderFactory::new(
            settings,
        )?)))
    }

    pub fn with_factory(factory: Arc<dyn ProviderFactory>) -> Self {
        Self { factory }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        config: &ProviderConfig,
    ) -> AppResult<String> {
        let mut last_error: Option<String> = None;

        for kind in config.provider_order() {
            tracing::info!("Attempting to use provider: {}", kind);
            let attempt = match self.factory.build(kind, config) {
                Ok(provider) => provider.generate(request).await,
                Err(e) => Err(e),
            };
            match attempt {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::error!("Error with {}: {}", kind, e);
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(AppError::ProviderExhausted {
            last_error: last_error.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted provider outcomes keyed by kind, recording every attempt.
    #[derive(Default)]
    pub struct FakeFactory {
        pub outcomes: HashMap<ProviderKind, std::result::Result<String, String>>,
        pub calls: Arc<Mutex<Vec<ProviderKind>>>,
        pub prompts: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFactory {
        pub fn with(mut self, kind: ProviderKind, outcome: std::result::Result<&str, &str>) -> Self {
            self.outcomes
                .insert(kind, outcome.map(str::to_string).map_err(str::to_string));
            self
        }

        pub fn gateway(self) -> (ProviderGateway, Arc<Mutex<Vec<ProviderKind>>>) {
            let calls = self.calls.clone();
            (ProviderGateway::with_factory(Arc::new(self)), calls)
        }
    }

    struct FakeProvider {
        kind: ProviderKind,
        outcome: std::result::Result<String, String>,
        calls: Arc<Mutex<Vec<ProviderKind>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.kind.as_str()
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.calls.lock().unwrap().push(self.kind);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.outcome.clone().map_err(|e| anyhow!(e))
        }
    }

    impl ProviderFactory for FakeFactory {
        fn build(&self, kind: ProviderKind, config: &ProviderConfig) -> Result<Box<dyn LlmProvider>> {
            if config.api_key(kind).is_none() {
                return Err(anyhow!("{} API key is not configured.", kind));
            }
            let outcome = self
                .outcomes
                .get(&kind)
                .cloned()
                .unwrap_or_else(|| Err(format!("{} not scripted", kind)));
            Ok(Box::new(FakeProvider {
                kind,
                outcome,
                calls: self.calls.clone(),
                prompts: self.prompts.clone(),
            }))
        }
    }

    pub fn both_keys(primary: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            gemini_api_key: Some("g-key".into()),
            openrouter_api_key: Some("or-key".into()),
            primary,
        }
    }
}
