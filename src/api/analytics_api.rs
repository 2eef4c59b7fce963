use axum::{
    extract::{Query, State},
    Extension, Json,
};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Script, User};
use crate::services::analytics_service::{
    self, EmployeePerformance, PeriodFilter, SortDirection, VideoPerformance, VideoSortKey,
    WorkOverview,
};
use crate::services::video_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

impl PeriodQuery {
    fn period(&self) -> AppResult<PeriodFilter> {
        PeriodFilter::parse(self.year.as_deref(), self.month.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub year: Option<String>,
    pub month: Option<String>,
    #[serde(default)]
    pub sort: VideoSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub updated: usize,
}

fn require_admin(user: &User) -> AppResult<()> {
    if !user.is_admin() {
        return Err(AppError::Authorization("analytics are restricted to admins".into()));
    }
    Ok(())
}

fn load_scripts(conn: &mut SqliteConnection) -> AppResult<Vec<Script>> {
    use crate::schema::scripts::dsl::*;
    Ok(scripts.select(Script::as_select()).load(conn)?)
}

pub async fn employees(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<Vec<EmployeePerformance>>> {
    use crate::schema::users;

    require_admin(&user)?;
    let period = query.period()?;
    let mut conn = state.db.get()?;
    let profiles: Vec<User> = users::table.select(User::as_select()).load(&mut conn)?;
    let scripts = load_scripts(&mut conn)?;
    Ok(Json(analytics_service::employee_performance(&profiles, &scripts, &period)))
}

pub async fn overview(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<WorkOverview>> {
    require_admin(&user)?;
    let period = query.period()?;
    let mut conn = state.db.get()?;
    let scripts = load_scripts(&mut conn)?;
    Ok(Json(analytics_service::work_overview(&scripts, &period)))
}

pub async fn videos(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<VideoQuery>,
) -> AppResult<Json<VideoPerformance>> {
    require_admin(&user)?;
    let period = PeriodFilter::parse(query.year.as_deref(), query.month.as_deref())?;
    let mut conn = state.db.get()?;
    let scripts = load_scripts(&mut conn)?;
    Ok(Json(analytics_service::video_performance(
        &scripts,
        &period,
        query.sort,
        query.direction,
    )))
}

pub async fn refresh_videos(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<RefreshResponse>> {
    let period = query.period()?;
    let updated =
        video_service::refresh_published_stats(&state.db, &state.youtube, &user, &period).await?;
    Ok(Json(RefreshResponse { updated }))
}
