use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub youtube: YoutubeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub https: Option<HttpsConfig>,
    pub ui_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpsConfig {
    pub enabled: bool,
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Model endpoints. API keys are not configured here; they belong to user
/// profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub openrouter_model: String,
    pub openrouter_endpoint: String,
    pub request_timeout_secs: u64,
    /// Sent to OpenRouter as `X-Title`.
    pub app_title: String,
    /// Sent to OpenRouter as `HTTP-Referer`.
    pub referer: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            gemini_model: "gemini-2.5-pro".to_string(),
            gemini_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            openrouter_model: "google/gemini-2.5-pro".to_string(),
            openrouter_endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            request_timeout_secs: 120,
            app_title: "Scriptflow".to_string(),
            referer: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub api_endpoint: String,
    /// Ids per statistics request. The Data API caps this at 50.
    pub batch_size: usize,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://www.googleapis.com/youtube/v3/videos".to_string(),
            batch_size: 50,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_template() -> &'static str {
        r#"[server]
host = "0.0.0.0"
port = 8080

[server.https]
enabled = false
cert_path = "certs/cert.pem"
key_path = "certs/key.pem"

# Optional: directory holding the built web client.
# ui_path = "./static"

[database]
# URL for the SQLite database. Ensure the directory exists.
url = "sqlite://scriptflow.db"

[jwt]
secret = "change-me-in-production"
expiration_hours = 24

[logging]
level = "info"

# Text generation providers. Keys are stored per user profile.
[ai]
gemini_model = "gemini-2.5-pro"
openrouter_model = "google/gemini-2.5-pro"
request_timeout_secs = 120
app_title = "Scriptflow"
referer = "http://localhost:8080"

[youtube]
batch_size = 50
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(Config::default_template()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ai.gemini_model, "gemini-2.5-pro");
        assert_eq!(
            config.ai.gemini_endpoint,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.youtube.batch_size, 50);
    }

    #[test]
    fn test_ai_and_youtube_sections_are_optional() {
        let minimal = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
url = "sqlite://test.db"

[jwt]
secret = "s"
expiration_hours = 1

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(minimal).unwrap();
        assert!(config.server.https.is_none());
        assert_eq!(config.ai.openrouter_model, "google/gemini-2.5-pro");
        assert_eq!(config.ai.request_timeout_secs, 120);
        assert_eq!(
            config.youtube.api_endpoint,
            "https://www.googleapis.com/youtube/v3/videos"
        );
    }
}
