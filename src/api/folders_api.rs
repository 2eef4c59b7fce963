use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{Folder, User};
use crate::pipeline::Actor;
use crate::services::folder_service::{self, FolderDeletion};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

pub async fn list_folders(State(state): State<AppState>) -> AppResult<Json<Vec<Folder>>> {
    let mut conn = state.db.get()?;
    Ok(Json(folder_service::list_folders(&mut conn)?))
}

pub async fn create_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateFolderRequest>,
) -> AppResult<(StatusCode, Json<Folder>)> {
    let mut conn = state.db.get()?;
    let folder =
        folder_service::create_folder(&mut conn, &Actor::from(&user), &req.name, req.parent_id)?;
    Ok((StatusCode::CREATED, Json(folder)))
}

pub async fn rename_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(folder_id): Path<i32>,
    Json(req): Json<RenameFolderRequest>,
) -> AppResult<Json<Folder>> {
    let mut conn = state.db.get()?;
    let folder = folder_service::rename_folder(&mut conn, &Actor::from(&user), folder_id, &req.name)?;
    Ok(Json(folder))
}

pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(folder_id): Path<i32>,
) -> AppResult<Json<FolderDeletion>> {
    let mut conn = state.db.get()?;
    let deletion = folder_service::delete_folder(&mut conn, &Actor::from(&user), folder_id)?;
    Ok(Json(deletion))
}
