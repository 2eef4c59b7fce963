use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::error::{AppError, AppResult};
use crate::models::{Chapter, PacingPoint, Role, ScriptChunk, User};
use crate::services::ai::{GenerationRequest, ProviderConfig, ProviderGateway};

const DEFAULT_REWRITE_INSTRUCTION: &str = "Rewrite the following script to improve its pacing, dialogue, and engagement. Keep the main plot and characters.";

const DEFAULT_KEYWORD_INSTRUCTION: &str = "Split this script into chunks of one or two sentences. For each chunk, give at most two keywords that name the concrete subject on screen (people, places, equipment, events). Write keywords in UPPERCASE, separated by commas.";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScriptDetails {
    pub ai_title: String,
    pub summary: String,
    pub timeline: Vec<Chapter>,
}

/// Script generation features on top of the provider gateway.
pub struct AiService {
    gateway: ProviderGateway,
}

impl AiService {
    pub fn new(gateway: ProviderGateway) -> Self {
        Self { gateway }
    }

    /// Title, summary and chapter timeline, requested concurrently. Any one
    /// failing fails the whole call.
    pub async fn generate_details(
        &self,
        config: &ProviderConfig,
        script: &str,
    ) -> AppResult<ScriptDetails> {
        let word_count = script.split_whitespace().count();

        let title_prompt = format!(
            "You are an expert YouTube title writer.\n\
             Read the script and write ONE title of at most 80 characters that names its main topic \
             and uses active, specific language. Do not mislead.\n\
             Output only the title.\n\nSCRIPT:\n{}",
            script
        );
        let summary_prompt = format!(
            "Summarize the script below in a single paragraph of no more than 120 words.\n\
             Cover the main events or points, who was involved, where and when, and the outcome.\n\
             Use neutral language, no quotes, and do not mention that this is a script or a summary.\n\nSCRIPT:\n{}",
            script
        );
        let timeline_prompt = format!(
            "You are a YouTube chapter editor. Produce a chapter timeline for the script below.\n\
             Assume roughly 160 words per minute of narration. Use 4 to 8 chapters with short titles.\n\
             Always start with \"00:00 – Intro\". Output one chapter per line as \"MM:SS – Title\" and nothing else.\n\n\
             Total script length: {} words\n\nSCRIPT:\n{}",
            word_count, script
        );

        let title_request = GenerationRequest::text(title_prompt);
        let summary_request = GenerationRequest::text(summary_prompt);
        let timeline_request = GenerationRequest::text(timeline_prompt);

        let (ai_title, summary, raw_timeline) = futures::try_join!(
            self.gateway.generate(&title_request, config),
            self.gateway.generate(&summary_request, config),
            self.gateway.generate(&timeline_request, config),
        )?;

        Ok(ScriptDetails {
            ai_title: ai_title.trim().to_string(),
            summary: summary.trim().to_string(),
            timeline: parse_timeline(&raw_timeline),
        })
    }

    pub async fn rewrite(
        &self,
        config: &ProviderConfig,
        original: &str,
        style_prompt: Option<&str>,
    ) -> AppResult<String> {
        let instruction = style_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_REWRITE_INSTRUCTION);
        let prompt = format!(
            "{}\n\nReturn only the rewritten script content.\n\nORIGINAL SCRIPT:\n{}",
            instruction, original
        );
        self.gateway
            .generate(&GenerationRequest::text(prompt), config)
            .await
    }

    pub async fn outline(&self, config: &ProviderConfig, idea_prompt: &str) -> AppResult<String> {
        self.gateway
            .generate(&GenerationRequest::text(idea_prompt), config)
            .await
    }

    pub async fn script_from_outline(
        &self,
        config: &ProviderConfig,
        outline: &str,
        script_prompt: &str,
    ) -> AppResult<String> {
        let prompt = format!("OUTLINE:\n{}\n{}", outline, script_prompt);
        self.gateway
            .generate(&GenerationRequest::text(prompt), config)
            .await
    }

    pub async fn split_keywords(
        &self,
        config: &ProviderConfig,
        script: &str,
        style_prompt: Option<&str>,
    ) -> AppResult<Vec<ScriptChunk>> {
        let instruction = style_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_KEYWORD_INSTRUCTION);
        let prompt = format!(
            "{}\n\nReturn JSON array: [{{\"content\": \"chunk text\", \"keyword\": \"KEYWORDS\"}}]\n\nSCRIPT:\n{}",
            instruction, script
        );
        let schema = json!({
            "type": "ARRAY",
            "description": "Script chunks, each with its content and keywords.",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "content": { "type": "STRING", "description": "One or two sentences of the script." },
                    "keyword": { "type": "STRING", "description": "Keywords in UPPERCASE, comma-separated." }
                },
                "required": ["content", "keyword"]
            }
        });

        let raw = self
            .gateway
            .generate(&GenerationRequest::structured(prompt, schema), config)
            .await?;
        parse_chunks(&raw)
    }

    pub async fn analyze_pacing(
        &self,
        config: &ProviderConfig,
        script: &str,
    ) -> AppResult<Vec<PacingPoint>> {
        let prompt = format!(
            "You are a script pacing analyst. Map the emotional and action intensity of the script over time.\n\
             1. Divide the script into 10-15 chunks at distinct beats or scenes.\n\
             2. Give each chunk an \"intensity\" from 1 (quiet setup) to 10 (climax).\n\
             3. Return the actual text of each chunk, not a summary.\n\n\
             Return a JSON array of objects with \"chunk\" and \"intensity\".\n\nSCRIPT:\n{}",
            script
        );
        let schema = json!({
            "type": "ARRAY",
            "description": "Pacing points, each with the chunk text and an intensity score.",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "chunk": { "type": "STRING", "description": "The text of the script chunk." },
                    "intensity": { "type": "NUMBER", "description": "Intensity from 1 to 10." }
                },
                "required": ["chunk", "intensity"]
            }
        });

        let raw = self
            .gateway
            .generate(&GenerationRequest::structured(prompt, schema), config)
            .await?;
        parse_pacing(&raw)
    }
}

/// Credentials for a generation call: the actor's own keys, or failing that
/// the first admin profile that has any.
pub fn resolve_provider_config(conn: &mut SqliteConnection, user: &User) -> AppResult<ProviderConfig> {
    use crate::schema::users;

    if user.has_provider_credentials() {
        return Ok(ProviderConfig::from(user));
    }

    let admins: Vec<User> = users::table
        .filter(users::role.eq(Role::Admin.as_str()))
        .order(users::id.asc())
        .select(User::as_select())
        .load(conn)?;

    match admins.iter().find(|a| a.has_provider_credentials()) {
        Some(admin) => {
            tracing::debug!("User {} has no provider keys; using admin {}", user.id, admin.id);
            Ok(ProviderConfig::from(admin))
        }
        None => Ok(ProviderConfig::from(user)),
    }
}

fn chapter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2}:\d{2})\s*[–-]\s*(.+)$").expect("valid chapter regex"))
}

/// Keeps only lines shaped like `MM:SS – Title`.
pub fn parse_timeline(raw: &str) -> Vec<Chapter> {
    raw.lines()
        .filter_map(|line| {
            let caps = chapter_regex().captures(line.trim())?;
            Some(Chapter {
                time: caps[1].to_string(),
                description: caps[2].trim().to_string(),
            })
        })
        .collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Elements of a structured response. Empty output or a non-array yields no
/// elements; text that is not JSON at all is a validation error. An object
/// wrapping a single array (as JSON-object mode tends to produce) is unwrapped.
pub fn parse_json_elements(raw: &str) -> AppResult<Vec<Value>> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let stripped = json_comments::StripComments::new(body.as_bytes());
    let value: Value = serde_json::from_reader(stripped)
        .map_err(|e| AppError::Validation(format!("provider returned malformed JSON: {}", e)))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => Ok(items),
                _ => {
                    tracing::warn!("Structured response was an object without a single array");
                    Ok(Vec::new())
                }
            }
        }
        _ => {
            tracing::warn!("Structured response was not an array");
            Ok(Vec::new())
        }
    }
}

pub fn parse_chunks(raw: &str) -> AppResult<Vec<ScriptChunk>> {
    Ok(parse_json_elements(raw)?
        .into_iter()
        .filter_map(|item| {
            Some(ScriptChunk {
                content: item.get("content")?.as_str()?.to_string(),
                keyword: item.get("keyword")?.as_str()?.to_string(),
            })
        })
        .collect())
}

pub fn parse_pacing(raw: &str) -> AppResult<Vec<PacingPoint>> {
    Ok(parse_json_elements(raw)?
        .into_iter()
        .filter_map(|item| {
            let chunk = item.get("chunk")?.as_str()?.to_string();
            let intensity = item.get("intensity")?.as_f64()?;
            (1.0..=10.0)
                .contains(&intensity)
                .then_some(PacingPoint { chunk, intensity })
        })
        .collect())
}
