//! Persistence for scripts: plain reads and writes plus the conditional
//! update every pipeline transition commits through.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::{AppError, AppResult};
use crate::models::{NewScript, Script, ScriptContentChanges, VideoMetricsChanges};
use crate::pipeline::{ExpectedState, Phase, TransitionPatch};
use crate::schema::scripts;

/// Result of a conditional update.
#[derive(Debug)]
pub enum CasOutcome {
    Updated(Script),
    /// The row exists but no longer matches the expected state.
    Conflict,
    NotFound,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptListFilter {
    /// `Some(None)` selects scripts at the root, outside any folder.
    pub folder_id: Option<Option<i32>>,
    pub in_pipeline: Option<bool>,
    pub search: Option<String>,
}

pub fn get_script(conn: &mut SqliteConnection, script_id: i32) -> AppResult<Script> {
    scripts::table
        .find(script_id)
        .select(Script::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Script", script_id))
}

pub fn list_scripts(conn: &mut SqliteConnection, filter: &ScriptListFilter) -> AppResult<Vec<Script>> {
    let mut query = scripts::table
        .select(Script::as_select())
        .order(scripts::created_at.desc())
        .into_boxed();

    match filter.folder_id {
        Some(Some(folder)) => query = query.filter(scripts::folder_id.eq(folder)),
        Some(None) => query = query.filter(scripts::folder_id.is_null()),
        None => {}
    }

    match filter.in_pipeline {
        Some(true) => query = query.filter(scripts::status.is_not_null()),
        Some(false) => query = query.filter(scripts::status.is_null()),
        None => {}
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        query = query.filter(scripts::title.like(format!("%{}%", search.trim())));
    }

    Ok(query.load(conn)?)
}

pub fn insert_script(conn: &mut SqliteConnection, new_script: &NewScript) -> AppResult<Script> {
    Ok(diesel::insert_into(scripts::table)
        .values(new_script)
        .returning(Script::as_returning())
        .get_result(conn)?)
}

pub fn update_content(
    conn: &mut SqliteConnection,
    script_id: i32,
    changes: &ScriptContentChanges,
) -> AppResult<Script> {
    diesel::update(scripts::table.find(script_id))
        .set(changes)
        .returning(Script::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Script", script_id))
}

pub fn move_to_folder(
    conn: &mut SqliteConnection,
    script_id: i32,
    folder_id: Option<i32>,
) -> AppResult<Script> {
    diesel::update(scripts::table.find(script_id))
        .set(scripts::folder_id.eq(folder_id))
        .returning(Script::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Script", script_id))
}

pub fn update_video_metrics(
    conn: &mut SqliteConnection,
    script_id: i32,
    changes: &VideoMetricsChanges,
) -> AppResult<Script> {
    diesel::update(scripts::table.find(script_id))
        .set(changes)
        .returning(Script::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Script", script_id))
}

pub fn delete_script(conn: &mut SqliteConnection, script_id: i32) -> AppResult<()> {
    let deleted = diesel::delete(scripts::table.find(script_id)).execute(conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("Script", script_id));
    }
    Ok(())
}

/// Applies `patch` only if the row still matches `expected` at commit time.
/// Check and write are a single `UPDATE ... WHERE`, so two actors racing on
/// the same row cannot both succeed.
pub fn conditional_update(
    conn: &mut SqliteConnection,
    script_id: i32,
    expected: &ExpectedState,
    patch: &TransitionPatch,
) -> AppResult<CasOutcome> {
    let target = scripts::table.filter(scripts::id.eq(script_id));

    let updated = match (expected.status, expected.claimant) {
        (None, _) => diesel::update(target.filter(scripts::status.is_null()))
            .set(patch)
            .returning(Script::as_returning())
            .get_result(conn)
            .optional()?,
        (Some(status), None) => diesel::update(target.filter(scripts::status.eq(status.as_str())))
            .set(patch)
            .returning(Script::as_returning())
            .get_result(conn)
            .optional()?,
        (Some(status), Some((Phase::Content, claimant))) => diesel::update(
            target
                .filter(scripts::status.eq(status.as_str()))
                .filter(scripts::content_creator_id.eq(claimant)),
        )
        .set(patch)
        .returning(Script::as_returning())
        .get_result(conn)
        .optional()?,
        (Some(status), Some((Phase::Edit, claimant))) => diesel::update(
            target
                .filter(scripts::status.eq(status.as_str()))
                .filter(scripts::editor_id.eq(claimant)),
        )
        .set(patch)
        .returning(Script::as_returning())
        .get_result(conn)
        .optional()?,
    };

    if let Some(script) = updated {
        return Ok(CasOutcome::Updated(script));
    }

    let exists: i64 = scripts::table
        .filter(scripts::id.eq(script_id))
        .count()
        .get_result(conn)?;

    Ok(if exists == 0 {
        CasOutcome::NotFound
    } else {
        CasOutcome::Conflict
    })
}
