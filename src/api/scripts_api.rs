use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{Script, User};
use crate::pipeline::Actor;
use crate::services::script_service::{self, ScriptInput};
use crate::services::script_store::{self, ScriptListFilter};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListScriptsQuery {
    pub folder_id: Option<i32>,
    /// Only scripts outside any folder.
    #[serde(default)]
    pub root: bool,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveScriptRequest {
    pub folder_id: Option<i32>,
}

pub async fn list_scripts(
    State(state): State<AppState>,
    Query(query): Query<ListScriptsQuery>,
) -> AppResult<Json<Vec<Script>>> {
    let mut conn = state.db.get()?;

    let folder_id = match (query.folder_id, query.root) {
        (Some(folder), _) => Some(Some(folder)),
        (None, true) => Some(None),
        (None, false) => None,
    };
    let filter = ScriptListFilter {
        folder_id,
        search: query.search,
        ..Default::default()
    };

    Ok(Json(script_store::list_scripts(&mut conn, &filter)?))
}

pub async fn get_script(
    State(state): State<AppState>,
    Path(script_id): Path<i32>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    Ok(Json(script_store::get_script(&mut conn, script_id)?))
}

pub async fn create_script(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(input): Json<ScriptInput>,
) -> AppResult<(StatusCode, Json<Script>)> {
    let mut conn = state.db.get()?;
    let script = script_service::create_script(&mut conn, &Actor::from(&user), input)?;
    Ok((StatusCode::CREATED, Json(script)))
}

pub async fn update_script(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
    Json(input): Json<ScriptInput>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    let script = script_service::update_script(&mut conn, &Actor::from(&user), script_id, input)?;
    Ok(Json(script))
}

pub async fn move_script(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
    Json(req): Json<MoveScriptRequest>,
) -> AppResult<Json<Script>> {
    let mut conn = state.db.get()?;
    let script =
        script_service::move_script(&mut conn, &Actor::from(&user), script_id, req.folder_id)?;
    Ok(Json(script))
}

pub async fn delete_script(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get()?;
    script_service::delete_script(&mut conn, &Actor::from(&user), script_id)?;
    Ok(StatusCode::NO_CONTENT)
}
