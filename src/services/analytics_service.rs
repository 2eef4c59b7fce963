//! Read-only projections over scripts and profiles: per-employee turnaround,
//! pipeline overview counts and published-video performance.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{AppError, AppResult};
use crate::models::{Role, Script, User};
use crate::pipeline::PipelineStatus;

/// A (year, month) window. `None` on either side means "all".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl PeriodFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Accepts absent values, `"all"`, or numbers. Months are 1-12.
    pub fn parse(year: Option<&str>, month: Option<&str>) -> AppResult<Self> {
        fn part<T: std::str::FromStr>(raw: Option<&str>, what: &str) -> AppResult<Option<T>> {
            match raw.map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
                Some(s) => s
                    .parse()
                    .map(Some)
                    .map_err(|_| AppError::Validation(format!("invalid {}: {}", what, s))),
            }
        }

        let year = part::<i32>(year, "year")?;
        let month = part::<u32>(month, "month")?;
        if month.is_some_and(|m| !(1..=12).contains(&m)) {
            return Err(AppError::Validation("month must be between 1 and 12".into()));
        }
        Ok(Self { year, month })
    }

    pub fn contains(&self, ts: Option<NaiveDateTime>) -> bool {
        let Some(ts) = ts else {
            return false;
        };
        self.year.map_or(true, |y| ts.year() == y) && self.month.map_or(true, |m| ts.month() == m)
    }
}

/// Five-step heat scale, coldest (worst) to hottest (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatBand {
    Cold,
    Cool,
    Neutral,
    Warm,
    Hot,
}

/// Linear position of `value` within `[min, max]`, inverted when lower is
/// better. No band when the value is missing or every user has the same value.
pub fn heat_band(value: Option<f64>, min: f64, max: f64, lower_is_better: bool) -> Option<HeatBand> {
    let value = value?;
    if max == min {
        return None;
    }
    let percent = (value - min) / (max - min);
    let score = if lower_is_better { 1.0 - percent } else { percent };
    Some(if score > 0.8 {
        HeatBand::Hot
    } else if score > 0.6 {
        HeatBand::Warm
    } else if score > 0.4 {
        HeatBand::Neutral
    } else if score > 0.2 {
        HeatBand::Cool
    } else {
        HeatBand::Cold
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmployeeBands {
    pub completed_tasks: Option<HeatBand>,
    pub avg_content_duration: Option<HeatBand>,
    pub avg_edit_duration: Option<HeatBand>,
    pub total_views: Option<HeatBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeePerformance {
    pub user_id: i32,
    pub name: String,
    pub role: Option<Role>,
    pub completed_tasks: usize,
    pub completed_content_tasks: usize,
    pub completed_edit_tasks: usize,
    pub avg_content_duration_ms: Option<f64>,
    pub avg_edit_duration_ms: Option<f64>,
    pub avg_content_duration: String,
    pub avg_edit_duration: String,
    pub total_views: i64,
    pub bands: EmployeeBands,
}

fn duration_ms(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Option<f64> {
    Some((end? - start?).num_milliseconds() as f64)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn is_published(script: &Script) -> bool {
    script.pipeline_status() == Some(PipelineStatus::Published)
}

fn in_period(script: &Script, period: &PeriodFilter) -> bool {
    period.contains(script.content_completed_at) || period.contains(script.edit_completed_at)
}

/// Per-user turnaround for every non-admin profile, sorted by completed tasks
/// (highest first).
pub fn employee_performance(
    users: &[User],
    scripts: &[Script],
    period: &PeriodFilter,
) -> Vec<EmployeePerformance> {
    let period_scripts: Vec<&Script> = scripts.iter().filter(|s| in_period(s, period)).collect();

    let mut rows: Vec<EmployeePerformance> = users
        .iter()
        .filter(|u| !u.is_admin())
        .map(|user| {
            let content: Vec<f64> = period_scripts
                .iter()
                .filter(|s| {
                    s.content_creator_id == Some(user.id) && period.contains(s.content_completed_at)
                })
                .filter_map(|s| duration_ms(s.content_assigned_at, s.content_completed_at))
                .collect();
            let edit: Vec<f64> = period_scripts
                .iter()
                .filter(|s| s.editor_id == Some(user.id) && period.contains(s.edit_completed_at))
                .filter_map(|s| duration_ms(s.edit_assigned_at, s.edit_completed_at))
                .collect();

            let mut seen = HashSet::new();
            let total_views: i64 = period_scripts
                .iter()
                .filter(|s| is_published(s))
                .filter(|s| s.content_creator_id == Some(user.id) || s.editor_id == Some(user.id))
                .filter(|s| seen.insert(s.id))
                .map(|s| s.youtube_views.unwrap_or(0))
                .sum();

            let avg_content = mean(&content);
            let avg_edit = mean(&edit);

            EmployeePerformance {
                user_id: user.id,
                name: user.display_name().to_string(),
                role: user.role(),
                completed_tasks: content.len() + edit.len(),
                completed_content_tasks: content.len(),
                completed_edit_tasks: edit.len(),
                avg_content_duration_ms: avg_content,
                avg_edit_duration_ms: avg_edit,
                avg_content_duration: format_duration(avg_content),
                avg_edit_duration: format_duration(avg_edit),
                total_views,
                bands: EmployeeBands::default(),
            }
        })
        .collect();

    assign_bands(&mut rows);
    rows.sort_by(|a, b| b.completed_tasks.cmp(&a.completed_tasks));
    rows
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn assign_bands(rows: &mut [EmployeePerformance]) {
    let (task_min, task_max) = bounds(rows.iter().map(|r| r.completed_tasks as f64));
    let (views_min, views_max) = bounds(rows.iter().map(|r| r.total_views as f64));
    let (content_min, content_max) = bounds(rows.iter().filter_map(|r| r.avg_content_duration_ms));
    let (edit_min, edit_max) = bounds(rows.iter().filter_map(|r| r.avg_edit_duration_ms));

    for row in rows.iter_mut() {
        row.bands = EmployeeBands {
            completed_tasks: heat_band(Some(row.completed_tasks as f64), task_min, task_max, false),
            avg_content_duration: heat_band(row.avg_content_duration_ms, content_min, content_max, true),
            avg_edit_duration: heat_band(row.avg_edit_duration_ms, edit_min, edit_max, true),
            total_views: heat_band(Some(row.total_views as f64), views_min, views_max, false),
        };
    }
}

/// Compact human duration: `2d 3h`, `4h 10m`, `12m`, `< 1m`, or `—` when
/// there is nothing to show.
pub fn format_duration(ms: Option<f64>) -> String {
    let Some(ms) = ms.filter(|v| v.is_finite() && *v >= 0.0) else {
        return "—".to_string();
    };
    let total_minutes = (ms / 60_000.0).floor() as i64;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        "< 1m".to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkOverview {
    pub todo: usize,
    pub in_progress: usize,
    pub ready_for_edit: usize,
    pub ready_to_publish: usize,
    pub published: usize,
    pub total: usize,
}

/// Pipeline counts over scripts completed (in either phase) in the period.
/// Scripts outside the pipeline count as to-do.
pub fn work_overview(scripts: &[Script], period: &PeriodFilter) -> WorkOverview {
    let mut overview = WorkOverview::default();
    for script in scripts.iter().filter(|s| in_period(s, period)) {
        overview.total += 1;
        match script.pipeline_status() {
            None | Some(PipelineStatus::Todo) => overview.todo += 1,
            Some(PipelineStatus::ContentCreation) | Some(PipelineStatus::Editing) => {
                overview.in_progress += 1
            }
            Some(PipelineStatus::ReadyForEdit) => overview.ready_for_edit += 1,
            Some(PipelineStatus::ReadyToPublish) => overview.ready_to_publish += 1,
            Some(PipelineStatus::Published) => overview.published += 1,
        }
    }
    overview
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSortKey {
    #[default]
    PublishedAt,
    Title,
    Views,
    Likes,
    Comments,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRow {
    pub script_id: i32,
    pub title: String,
    pub youtube_link: String,
    pub thumbnail_url: Option<String>,
    pub views: i64,
    pub likes: i64,
    pub comments: i64,
    pub published_at: Option<NaiveDateTime>,
    pub stats_last_updated: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoPerformance {
    pub videos: Vec<VideoRow>,
    pub total_videos: usize,
    pub total_views: i64,
    pub total_likes: i64,
    pub total_comments: i64,
    pub avg_views: i64,
}

/// Published scripts with a linked video, filtered on publish date.
pub fn video_performance(
    scripts: &[Script],
    period: &PeriodFilter,
    sort: VideoSortKey,
    direction: SortDirection,
) -> VideoPerformance {
    let mut videos: Vec<VideoRow> = scripts
        .iter()
        .filter(|s| is_published(s) && period.contains(s.published_at))
        .filter_map(|s| {
            let link = s.youtube_link.clone().filter(|l| !l.is_empty())?;
            Some(VideoRow {
                script_id: s.id,
                title: s.youtube_title.clone().unwrap_or_else(|| s.title.clone()),
                youtube_link: link,
                thumbnail_url: s.youtube_thumbnail_url.clone(),
                views: s.youtube_views.unwrap_or(0),
                likes: s.youtube_likes.unwrap_or(0),
                comments: s.youtube_comments.unwrap_or(0),
                published_at: s.published_at,
                stats_last_updated: s.youtube_stats_last_updated,
            })
        })
        .collect();

    videos.sort_by(|a, b| {
        let ordering = match sort {
            VideoSortKey::PublishedAt => a.published_at.cmp(&b.published_at),
            VideoSortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            VideoSortKey::Views => a.views.cmp(&b.views),
            VideoSortKey::Likes => a.likes.cmp(&b.likes),
            VideoSortKey::Comments => a.comments.cmp(&b.comments),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let total_views: i64 = videos.iter().map(|v| v.views).sum();
    let total_videos = videos.len();
    let avg_views = if total_videos == 0 {
        0
    } else {
        (total_views as f64 / total_videos as f64).round() as i64
    };

    VideoPerformance {
        total_likes: videos.iter().map(|v| v.likes).sum(),
        total_comments: videos.iter().map(|v| v.comments).sum(),
        total_views,
        total_videos,
        avg_views,
        videos,
    }
}
