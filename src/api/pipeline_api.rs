use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{Script, User};
use crate::pipeline::Actor;
use crate::services::analytics_service::PeriodFilter;
use crate::services::pipeline_service::{self, BoardFilter, WorkBoard};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    pub search: Option<String>,
}

pub async fn work_board(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<BoardQuery>,
) -> AppResult<Json<WorkBoard>> {
    let period = PeriodFilter::parse(query.year.as_deref(), query.month.as_deref())?;
    let filter = BoardFilter {
        year: period.year,
        month: period.month,
        search: query.search,
    };

    let mut conn = state.db.get()?;
    let board = pipeline_service::work_board(&mut conn, &filter, &Actor::from(&user))?;
    Ok(Json(board))
}

// One route per transition. Each takes only the script id; the actor comes
// from the authenticated user.

pub async fn send_to_work(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(pipeline_service::send_to_work(&mut conn, script_id, &Actor::from(&user))?))
}

pub async fn claim_content(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(pipeline_service::claim_content(&mut conn, script_id, &Actor::from(&user))?))
}

pub async fn complete_content(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(pipeline_service::complete_content(&mut conn, script_id, &Actor::from(&user))?))
}

pub async fn claim_edit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(pipeline_service::claim_edit(&mut conn, script_id, &Actor::from(&user))?))
}

pub async fn complete_edit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(pipeline_service::complete_edit(&mut conn, script_id, &Actor::from(&user))?))
}

pub async fn publish(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(pipeline_service::publish(&mut conn, script_id, &Actor::from(&user))?))
}
