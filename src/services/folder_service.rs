use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::{Folder, NewFolder, Role};
use crate::pipeline::Actor;
use crate::schema::{folders, scripts};

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::ContentCreator, Role::Editor];
const FOLDER_ADMINS: &[Role] = &[Role::Admin, Role::Manager];

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FolderDeletion {
    pub folder_id: i32,
    pub removed_folders: usize,
    pub removed_scripts: i64,
}

pub fn get_folder(conn: &mut SqliteConnection, folder_id: i32) -> AppResult<Folder> {
    folders::table
        .find(folder_id)
        .select(Folder::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Folder", folder_id))
}

pub fn list_folders(conn: &mut SqliteConnection) -> AppResult<Vec<Folder>> {
    Ok(folders::table
        .select(Folder::as_select())
        .order(folders::name.asc())
        .load(conn)?)
}

/// Folders may only be created under an existing parent, and there is no
/// re-parenting, so the tree stays acyclic.
pub fn create_folder(
    conn: &mut SqliteConnection,
    actor: &Actor,
    name: &str,
    parent_id: Option<i32>,
) -> AppResult<Folder> {
    actor.require_any_role(ALL_ROLES, "create folders")?;

    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("folder name must not be empty".into()));
    }
    if let Some(parent) = parent_id {
        get_folder(conn, parent)?;
    }

    let folder = diesel::insert_into(folders::table)
        .values(&NewFolder {
            name: name.to_string(),
            user_id: actor.id,
            parent_id,
        })
        .returning(Folder::as_returning())
        .get_result(conn)?;

    tracing::info!("Created folder {} ({}) for user {}", folder.id, folder.name, actor.id);
    Ok(folder)
}

pub fn rename_folder(
    conn: &mut SqliteConnection,
    actor: &Actor,
    folder_id: i32,
    name: &str,
) -> AppResult<Folder> {
    actor.require_any_role(FOLDER_ADMINS, "rename folders")?;

    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("folder name must not be empty".into()));
    }

    diesel::update(folders::table.find(folder_id))
        .set(folders::name.eq(name))
        .returning(Folder::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Folder", folder_id))
}

/// Ids of `root` and every folder below it.
fn subtree_ids(conn: &mut SqliteConnection, root: i32) -> AppResult<Vec<i32>> {
    let mut ids = vec![root];
    let mut frontier = vec![root];
    while !frontier.is_empty() {
        let children: Vec<i32> = folders::table
            .filter(folders::parent_id.eq_any(frontier.clone()))
            .select(folders::id)
            .load(conn)?;
        ids.extend(&children);
        frontier = children;
    }
    Ok(ids)
}

/// Deletes a folder together with its sub-folders and every script inside
/// them. Removal is performed by the foreign-key cascade in one statement.
pub fn delete_folder(
    conn: &mut SqliteConnection,
    actor: &Actor,
    folder_id: i32,
) -> AppResult<FolderDeletion> {
    actor.require_any_role(FOLDER_ADMINS, "delete folders")?;

    conn.transaction(|conn| {
        get_folder(conn, folder_id)?;

        let subtree = subtree_ids(conn, folder_id)?;
        let removed_scripts: i64 = scripts::table
            .filter(scripts::folder_id.eq_any(subtree.clone()))
            .count()
            .get_result(conn)?;

        diesel::delete(folders::table.find(folder_id)).execute(conn)?;

        tracing::info!(
            "Deleted folder {} with {} sub-folders and {} scripts",
            folder_id,
            subtree.len() - 1,
            removed_scripts
        );

        Ok(FolderDeletion {
            folder_id,
            removed_folders: subtree.len(),
            removed_scripts,
        })
    })
}
