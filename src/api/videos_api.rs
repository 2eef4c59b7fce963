use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{Script, User};
use crate::services::video_service;
use crate::AppState;

#[derive(Deserialize)]
pub struct SetVideoLinkRequest {
    pub youtube_link: Option<String>,
}

pub async fn set_video_link(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(script_id): Path<i32>,
    Json(req): Json<SetVideoLinkRequest>,
) -> AppResult<Json<Script>> {
    let script = video_service::set_video_link(
        &state.db,
        &state.youtube,
        &user,
        script_id,
        req.youtube_link.as_deref(),
    )
    .await?;
    Ok(Json(script))
}
