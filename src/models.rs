use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::pipeline::PipelineStatus;

// Role model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    ContentCreator,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::ContentCreator => "content_creator",
            Role::Editor => "editor",
        }
    }

    /// Admins and managers run the workspace: folders, deletion, publishing.
    pub fn is_manager_or_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "content_creator" => Ok(Role::ContentCreator),
            "editor" => Ok(Role::Editor),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenRouter,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
        }
    }

    pub fn other(&self) -> ProviderKind {
        match self {
            ProviderKind::Gemini => ProviderKind::OpenRouter,
            ProviderKind::OpenRouter => ProviderKind::Gemini,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gemini" => Ok(ProviderKind::Gemini),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

// User (profile) models
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub openrouter_api_key: Option<String>,
    pub primary_provider: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    #[serde(skip_serializing)]
    pub youtube_api_key: Option<String>,
}

impl User {
    /// Parsed role. Unknown or missing roles read as `None`.
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().and_then(|r| r.parse().ok())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn primary_provider(&self) -> ProviderKind {
        self.primary_provider
            .parse()
            .unwrap_or(ProviderKind::Gemini)
    }

    pub fn has_provider_credentials(&self) -> bool {
        self.gemini_api_key.as_deref().is_some_and(|k| !k.is_empty())
            || self
                .openrouter_api_key
                .as_deref()
                .is_some_and(|k| !k.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

// Folder models
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::folders)]
pub struct Folder {
    pub id: i32,
    pub name: String,
    pub user_id: i32,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::folders)]
pub struct NewFolder {
    pub name: String,
    pub user_id: i32,
    pub parent_id: Option<i32>,
}

// Structured script payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub time: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptChunk {
    pub content: String,
    pub keyword: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingPoint {
    pub chunk: String,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptMode {
    Generate,
    Rewrite,
    Keyword,
    Note,
}

impl ScriptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptMode::Generate => "generate",
            ScriptMode::Rewrite => "rewrite",
            ScriptMode::Keyword => "keyword",
            ScriptMode::Note => "note",
        }
    }
}

// Script models
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::scripts)]
pub struct Script {
    pub id: i32,
    pub created_by: i32,
    pub folder_id: Option<i32>,
    pub title: String,
    pub ai_title: Option<String>,
    pub summary: String,
    pub body: String,
    #[serde(serialize_with = "json_text")]
    pub timeline: Option<String>,
    #[serde(serialize_with = "json_text")]
    pub split_script: Option<String>,
    #[serde(serialize_with = "json_text")]
    pub pacing: Option<String>,
    pub note: Option<String>,
    pub mode: Option<String>,
    pub idea_prompt: Option<String>,
    pub generated_outline: Option<String>,
    pub script_prompt: Option<String>,
    pub original_script: Option<String>,
    pub last_modified_by: Option<i32>,
    pub status: Option<String>,
    pub content_creator_id: Option<i32>,
    pub editor_id: Option<i32>,
    pub content_assigned_at: Option<NaiveDateTime>,
    pub content_completed_at: Option<NaiveDateTime>,
    pub edit_assigned_at: Option<NaiveDateTime>,
    pub edit_completed_at: Option<NaiveDateTime>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub youtube_link: Option<String>,
    pub youtube_title: Option<String>,
    pub youtube_views: Option<i64>,
    pub youtube_likes: Option<i64>,
    pub youtube_comments: Option<i64>,
    pub youtube_thumbnail_url: Option<String>,
    pub youtube_stats_last_updated: Option<NaiveDateTime>,
}

impl Script {
    /// `None` means the script has not been sent to the work pipeline.
    pub fn pipeline_status(&self) -> Option<PipelineStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Structured payloads are kept as JSON text; emit them as JSON, not strings.
fn json_text<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    let parsed = value
        .as_deref()
        .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
        .unwrap_or_else(|| serde_json::Value::Array(Vec::new()));
    parsed.serialize(serializer)
}

pub fn encode_json_list<T: Serialize>(items: &[T]) -> Option<String> {
    serde_json::to_string(items).ok()
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = crate::schema::scripts)]
pub struct NewScript {
    pub created_by: i32,
    pub folder_id: Option<i32>,
    pub title: String,
    pub ai_title: Option<String>,
    pub summary: String,
    pub body: String,
    pub timeline: Option<String>,
    pub split_script: Option<String>,
    pub pacing: Option<String>,
    pub note: Option<String>,
    pub mode: Option<String>,
    pub idea_prompt: Option<String>,
    pub generated_outline: Option<String>,
    pub script_prompt: Option<String>,
    pub original_script: Option<String>,
    pub last_modified_by: Option<i32>,
}

/// Content-only changes. Pipeline columns are absent: they only move through
/// the transition procedures in `services::pipeline_service`.
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::scripts)]
pub struct ScriptContentChanges {
    pub title: Option<String>,
    pub ai_title: Option<Option<String>>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub timeline: Option<Option<String>>,
    pub split_script: Option<Option<String>>,
    pub pacing: Option<Option<String>>,
    pub note: Option<Option<String>>,
    pub mode: Option<Option<String>>,
    pub idea_prompt: Option<Option<String>>,
    pub generated_outline: Option<Option<String>>,
    pub script_prompt: Option<Option<String>>,
    pub original_script: Option<Option<String>>,
    pub last_modified_by: Option<Option<i32>>,
}

/// Cached external video metrics. Refreshable independently of pipeline state.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = crate::schema::scripts, treat_none_as_null = true)]
pub struct VideoMetricsChanges {
    pub youtube_link: Option<String>,
    pub youtube_title: Option<String>,
    pub youtube_views: Option<i64>,
    pub youtube_likes: Option<i64>,
    pub youtube_comments: Option<i64>,
    pub youtube_thumbnail_url: Option<String>,
    pub youtube_stats_last_updated: Option<NaiveDateTime>,
}

// Prompt preset models
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::rewrite_styles)]
pub struct RewriteStyle {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub prompt: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::rewrite_styles)]
pub struct NewRewriteStyle {
    pub user_id: i32,
    pub name: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::keyword_styles)]
pub struct KeywordStyle {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub prompt: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::keyword_styles)]
pub struct NewKeywordStyle {
    pub user_id: i32,
    pub name: String,
    pub prompt: String,
}
