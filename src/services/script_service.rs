use diesel::sqlite::SqliteConnection;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{
    encode_json_list, Chapter, NewScript, PacingPoint, Role, Script, ScriptChunk,
    ScriptContentChanges, ScriptMode,
};
use crate::pipeline::Actor;
use crate::services::{folder_service, script_store};

const AUTHORS: &[Role] = &[Role::Admin, Role::Manager, Role::ContentCreator, Role::Editor];
const LEADS: &[Role] = &[Role::Admin, Role::Manager];

/// Editable script content. Absent fields are left unchanged; nullable fields
/// can be cleared with an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct ScriptInput {
    pub folder_id: Option<i32>,
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub ai_title: Option<Option<String>>,
    pub summary: Option<String>,
    pub body: Option<String>,
    pub timeline: Option<Vec<Chapter>>,
    pub split_script: Option<Vec<ScriptChunk>>,
    pub pacing: Option<Vec<PacingPoint>>,
    #[serde(default, with = "double_option")]
    pub note: Option<Option<String>>,
    pub mode: Option<ScriptMode>,
    #[serde(default, with = "double_option")]
    pub idea_prompt: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub generated_outline: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub script_prompt: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub original_script: Option<Option<String>>,
}

/// Distinguishes a missing field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

impl ScriptInput {
    fn into_changes(self, actor: &Actor) -> ScriptContentChanges {
        ScriptContentChanges {
            title: self.title,
            ai_title: self.ai_title,
            summary: self.summary,
            body: self.body,
            timeline: self.timeline.map(|t| encode_json_list(&t)),
            split_script: self.split_script.map(|c| encode_json_list(&c)),
            pacing: self.pacing.map(|p| encode_json_list(&p)),
            note: self.note,
            mode: self.mode.map(|m| Some(m.as_str().to_string())),
            idea_prompt: self.idea_prompt,
            generated_outline: self.generated_outline,
            script_prompt: self.script_prompt,
            original_script: self.original_script,
            last_modified_by: Some(Some(actor.id)),
        }
    }
}

fn check_folder(conn: &mut SqliteConnection, folder_id: Option<i32>) -> AppResult<()> {
    if let Some(folder) = folder_id {
        folder_service::get_folder(conn, folder)?;
    }
    Ok(())
}

/// New scripts start outside the pipeline.
pub fn create_script(
    conn: &mut SqliteConnection,
    actor: &Actor,
    input: ScriptInput,
) -> AppResult<Script> {
    actor.require_any_role(AUTHORS, "create scripts")?;
    check_folder(conn, input.folder_id)?;

    let title = input
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled Script".to_string());
    let folder_id = input.folder_id;
    let changes = input.into_changes(actor);

    let script = script_store::insert_script(
        conn,
        &NewScript {
            created_by: actor.id,
            folder_id,
            title,
            ai_title: changes.ai_title.flatten(),
            summary: changes.summary.unwrap_or_default(),
            body: changes.body.unwrap_or_default(),
            timeline: changes.timeline.flatten(),
            split_script: changes.split_script.flatten(),
            pacing: changes.pacing.flatten(),
            note: changes.note.flatten(),
            mode: changes.mode.flatten(),
            idea_prompt: changes.idea_prompt.flatten(),
            generated_outline: changes.generated_outline.flatten(),
            script_prompt: changes.script_prompt.flatten(),
            original_script: changes.original_script.flatten(),
            last_modified_by: Some(actor.id),
        },
    )?;

    tracing::info!("User {} created script {}", actor.id, script.id);
    Ok(script)
}

/// Content edits are last-write-wins. Pipeline columns cannot be reached from
/// here.
pub fn update_script(
    conn: &mut SqliteConnection,
    actor: &Actor,
    script_id: i32,
    input: ScriptInput,
) -> AppResult<Script> {
    actor.require_any_role(AUTHORS, "edit scripts")?;
    if input.folder_id.is_some() {
        return Err(AppError::Validation(
            "use the move operation to change a script's folder".into(),
        ));
    }
    if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    script_store::update_content(conn, script_id, &input.into_changes(actor))
}

pub fn move_script(
    conn: &mut SqliteConnection,
    actor: &Actor,
    script_id: i32,
    folder_id: Option<i32>,
) -> AppResult<Script> {
    actor.require_any_role(AUTHORS, "move scripts")?;
    check_folder(conn, folder_id)?;
    script_store::move_to_folder(conn, script_id, folder_id)
}

pub fn delete_script(conn: &mut SqliteConnection, actor: &Actor, script_id: i32) -> AppResult<()> {
    actor.require_any_role(LEADS, "delete scripts")?;
    script_store::delete_script(conn, script_id)?;
    tracing::info!("User {} deleted script {}", actor.id, script_id);
    Ok(())
}
