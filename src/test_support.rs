//! Fixtures shared by the inline test modules.

use diesel::prelude::*;
use tempfile::TempDir;

use crate::db::{self, DbConnection, DbPool};
use crate::models::{Folder, NewFolder, NewScript, NewUser, Role, Script, User};

/// A migrated SQLite database in a temporary directory. The directory lives as
/// long as the fixture.
pub struct TestDb {
    _dir: TempDir,
    pub pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        Self::with_pool_size(10)
    }

    pub fn with_pool_size(max_size: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptflow-test.db");
        let pool = db::create_pool_with_size(path.to_str().unwrap(), max_size).unwrap();
        db::run_migrations(&mut pool.get().unwrap()).unwrap();
        Self { _dir: dir, pool }
    }

    pub fn conn(&self) -> DbConnection {
        self.pool.get().unwrap()
    }
}

pub fn insert_user(conn: &mut SqliteConnection, name: &str, role: Option<Role>) -> User {
    use crate::schema::users;

    diesel::insert_into(users::table)
        .values(&NewUser {
            username: name.to_string(),
            password_hash: crate::auth::hash_password("secret").unwrap(),
            role: role.map(|r| r.as_str().to_string()),
            full_name: Some(format!("{} Person", name)),
            email: Some(format!("{}@example.com", name)),
        })
        .returning(User::as_returning())
        .get_result(conn)
        .unwrap()
}

pub fn insert_script(conn: &mut SqliteConnection, owner: &User, title: &str) -> Script {
    crate::services::script_store::insert_script(
        conn,
        &NewScript {
            created_by: owner.id,
            title: title.to_string(),
            body: format!("Body of {}", title),
            last_modified_by: Some(owner.id),
            ..Default::default()
        },
    )
    .unwrap()
}

pub fn insert_folder(
    conn: &mut SqliteConnection,
    owner: &User,
    name: &str,
    parent_id: Option<i32>,
) -> Folder {
    use crate::schema::folders;

    diesel::insert_into(folders::table)
        .values(&NewFolder {
            name: name.to_string(),
            user_id: owner.id,
            parent_id,
        })
        .returning(Folder::as_returning())
        .get_result(conn)
        .unwrap()
}
