use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{ProviderKind, Role, User};
use crate::pipeline::Actor;
use crate::services::profile_service::{
    self, CreateUserRequest, Profile, ProfileSettings, SettingsUpdate,
};
use crate::AppState;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: String,
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(flatten)]
    pub keys: SettingsUpdate,
    pub primary_provider: Option<ProviderKind>,
}

#[derive(Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Option<Role>,
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<Profile>>> {
    let mut conn = state.db.get()?;
    Ok(Json(profile_service::list_profiles(&mut conn)?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<Profile>)> {
    let mut conn = state.db.get()?;
    let profile = profile_service::create_user(&mut conn, &Actor::from(&user), req)?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(user_id): Path<i32>,
    Json(req): Json<ChangeRoleRequest>,
) -> AppResult<Json<Profile>> {
    let mut conn = state.db.get()?;
    let profile = profile_service::change_role(&mut conn, &Actor::from(&user), user_id, req.role)?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<Profile>> {
    let mut conn = state.db.get()?;
    let profile = profile_service::update_full_name(&mut conn, &Actor::from(&user), &req.full_name)?;
    Ok(Json(profile))
}

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> AppResult<Json<ProfileSettings>> {
    let mut conn = state.db.get()?;
    Ok(Json(profile_service::get_settings(&mut conn, &Actor::from(&user))?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateSettingsRequest>,
) -> AppResult<Json<ProfileSettings>> {
    let mut conn = state.db.get()?;
    let settings = profile_service::update_settings(
        &mut conn,
        &Actor::from(&user),
        req.keys,
        req.primary_provider,
    )?;
    Ok(Json(settings))
}
