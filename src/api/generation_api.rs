use axum::{extract::State, Extension, Json};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{PacingPoint, ScriptChunk, User};
use crate::services::ai_service::{resolve_provider_config, ScriptDetails};
use crate::AppState;

#[derive(Deserialize)]
pub struct ScriptTextRequest {
    pub script: String,
}

#[derive(Deserialize)]
pub struct StyledScriptRequest {
    pub script: String,
    pub style_id: Option<i32>,
    pub style_prompt: Option<String>,
}

#[derive(Deserialize)]
pub struct OutlineRequest {
    pub prompt: String,
}

#[derive(Deserialize)]
pub struct ScriptFromOutlineRequest {
    pub outline: String,
    pub prompt: String,
}

#[derive(Serialize)]
pub struct TextResponse {
    pub text: String,
}

fn require_text(value: &str, field: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

enum StyleKind {
    Rewrite,
    Keyword,
}

/// An explicit prompt wins over a saved style. Saved styles are owner-only.
fn style_prompt(
    conn: &mut SqliteConnection,
    user: &User,
    req: &StyledScriptRequest,
    kind: StyleKind,
) -> AppResult<Option<String>> {
    use crate::schema::{keyword_styles, rewrite_styles};

    if let Some(prompt) = req.style_prompt.clone().filter(|p| !p.trim().is_empty()) {
        return Ok(Some(prompt));
    }
    let Some(style_id) = req.style_id else {
        return Ok(None);
    };

    let prompt = match kind {
        StyleKind::Rewrite => rewrite_styles::table
            .filter(rewrite_styles::id.eq(style_id))
            .filter(rewrite_styles::user_id.eq(user.id))
            .select(rewrite_styles::prompt)
            .first::<String>(conn)
            .optional()?,
        StyleKind::Keyword => keyword_styles::table
            .filter(keyword_styles::id.eq(style_id))
            .filter(keyword_styles::user_id.eq(user.id))
            .select(keyword_styles::prompt)
            .first::<String>(conn)
            .optional()?,
    };
    prompt
        .map(Some)
        .ok_or_else(|| AppError::not_found("Style", style_id))
}

pub async fn generate_details(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ScriptTextRequest>,
) -> AppResult<Json<ScriptDetails>> {
    require_text(&req.script, "script")?;
    let config = {
        let mut conn = state.db.get()?;
        resolve_provider_config(&mut conn, &user)?
    };
    let details = state.ai_service.generate_details(&config, &req.script).await?;
    Ok(Json(details))
}

pub async fn rewrite(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<StyledScriptRequest>,
) -> AppResult<Json<TextResponse>> {
    require_text(&req.script, "script")?;
    let (config, style) = {
        let mut conn = state.db.get()?;
        (
            resolve_provider_config(&mut conn, &user)?,
            style_prompt(&mut conn, &user, &req, StyleKind::Rewrite)?,
        )
    };
    let text = state
        .ai_service
        .rewrite(&config, &req.script, style.as_deref())
        .await?;
    Ok(Json(TextResponse { text }))
}

pub async fn outline(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<OutlineRequest>,
) -> AppResult<Json<TextResponse>> {
    require_text(&req.prompt, "prompt")?;
    let config = {
        let mut conn = state.db.get()?;
        resolve_provider_config(&mut conn, &user)?
    };
    let text = state.ai_service.outline(&config, &req.prompt).await?;
    Ok(Json(TextResponse { text }))
}

pub async fn script_from_outline(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ScriptFromOutlineRequest>,
) -> AppResult<Json<TextResponse>> {
    require_text(&req.outline, "outline")?;
    let config = {
        let mut conn = state.db.get()?;
        resolve_provider_config(&mut conn, &user)?
    };
    let text = state
        .ai_service
        .script_from_outline(&config, &req.outline, &req.prompt)
        .await?;
    Ok(Json(TextResponse { text }))
}

pub async fn split_keywords(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<StyledScriptRequest>,
) -> AppResult<Json<Vec<ScriptChunk>>> {
    require_text(&req.script, "script")?;
    let (config, style) = {
        let mut conn = state.db.get()?;
        (
            resolve_provider_config(&mut conn, &user)?,
            style_prompt(&mut conn, &user, &req, StyleKind::Keyword)?,
        )
    };
    let chunks = state
        .ai_service
        .split_keywords(&config, &req.script, style.as_deref())
        .await?;
    Ok(Json(chunks))
}

pub async fn analyze_pacing(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ScriptTextRequest>,
) -> AppResult<Json<Vec<PacingPoint>>> {
    require_text(&req.script, "script")?;
    let config = {
        let mut conn = state.db.get()?;
        resolve_provider_config(&mut conn, &user)?
    };
    let points = state.ai_service.analyze_pacing(&config, &req.script).await?;
    Ok(Json(points))
}
