//! Named prompt presets. Each user only sees and changes their own.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use diesel::prelude::*;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{KeywordStyle, NewKeywordStyle, NewRewriteStyle, RewriteStyle, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StyleRequest {
    pub name: String,
    pub prompt: String,
}

impl StyleRequest {
    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() || self.prompt.trim().is_empty() {
            return Err(AppError::Validation("style name and prompt are required".into()));
        }
        Ok(())
    }
}

pub async fn list_rewrite_styles(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<RewriteStyle>>> {
    use crate::schema::rewrite_styles::dsl::*;

    let mut conn = state.db.get()?;
    let results = rewrite_styles
        .filter(user_id.eq(user.id))
        .order(name.asc())
        .select(RewriteStyle::as_select())
        .load(&mut conn)?;
    Ok(Json(results))
}

pub async fn create_rewrite_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<StyleRequest>,
) -> AppResult<(StatusCode, Json<RewriteStyle>)> {
    use crate::schema::rewrite_styles;

    req.validate()?;
    let mut conn = state.db.get()?;
    let style = diesel::insert_into(rewrite_styles::table)
        .values(&NewRewriteStyle {
            user_id: user.id,
            name: req.name.trim().to_string(),
            prompt: req.prompt,
        })
        .returning(RewriteStyle::as_returning())
        .get_result(&mut conn)?;
    Ok((StatusCode::CREATED, Json(style)))
}

pub async fn update_rewrite_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(style_id): Path<i32>,
    Json(req): Json<StyleRequest>,
) -> AppResult<Json<RewriteStyle>> {
    use crate::schema::rewrite_styles::dsl::*;

    req.validate()?;
    let mut conn = state.db.get()?;
    diesel::update(rewrite_styles.filter(id.eq(style_id)).filter(user_id.eq(user.id)))
        .set((name.eq(req.name.trim()), prompt.eq(&req.prompt)))
        .returning(RewriteStyle::as_returning())
        .get_result(&mut conn)
        .optional()?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Rewrite style", style_id))
}

pub async fn delete_rewrite_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(style_id): Path<i32>,
) -> AppResult<StatusCode> {
    use crate::schema::rewrite_styles::dsl::*;

    let mut conn = state.db.get()?;
    let deleted = diesel::delete(rewrite_styles.filter(id.eq(style_id)).filter(user_id.eq(user.id)))
        .execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("Rewrite style", style_id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_keyword_styles(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<Vec<KeywordStyle>>> {
    use crate::schema::keyword_styles::dsl::*;

    let mut conn = state.db.get()?;
    let results = keyword_styles
        .filter(user_id.eq(user.id))
        .order(name.asc())
        .select(KeywordStyle::as_select())
        .load(&mut conn)?;
    Ok(Json(results))
}

pub async fn create_keyword_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<StyleRequest>,
) -> AppResult<(StatusCode, Json<KeywordStyle>)> {
    use crate::schema::keyword_styles;

    req.validate()?;
    let mut conn = state.db.get()?;
    let style = diesel::insert_into(keyword_styles::table)
        .values(&NewKeywordStyle {
            user_id: user.id,
            name: req.name.trim().to_string(),
            prompt: req.prompt,
        })
        .returning(KeywordStyle::as_returning())
        .get_result(&mut conn)?;
    Ok((StatusCode::CREATED, Json(style)))
}

pub async fn update_keyword_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(style_id): Path<i32>,
    Json(req): Json<StyleRequest>,
) -> AppResult<Json<KeywordStyle>> {
    use crate::schema::keyword_styles::dsl::*;

    req.validate()?;
    let mut conn = state.db.get()?;
    diesel::update(keyword_styles.filter(id.eq(style_id)).filter(user_id.eq(user.id)))
        .set((name.eq(req.name.trim()), prompt.eq(&req.prompt)))
        .returning(KeywordStyle::as_returning())
        .get_result(&mut conn)
        .optional()?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Keyword style", style_id))
}

pub async fn delete_keyword_style(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(style_id): Path<i32>,
) -> AppResult<StatusCode> {
    use crate::schema::keyword_styles::dsl::*;

    let mut conn = state.db.get()?;
    let deleted = diesel::delete(keyword_styles.filter(id.eq(style_id)).filter(user_id.eq(user.id)))
        .execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("Keyword style", style_id));
    }
    Ok(StatusCode::NO_CONTENT)
}
