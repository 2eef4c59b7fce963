use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::auth::hash_password;
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ProviderKind, Role, User};
use crate::pipeline::Actor;
use crate::schema::users;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: i32,
    pub username: String,
    pub role: Option<Role>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl From<&User> for Profile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// The signed-in user's own settings view. Keys are reported as set or unset,
/// never echoed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSettings {
    #[serde(flatten)]
    pub profile: Profile,
    pub primary_provider: ProviderKind,
    pub has_gemini_key: bool,
    pub has_openrouter_key: bool,
    pub has_youtube_key: bool,
}

fn is_set(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.is_empty())
}

impl From<&User> for ProfileSettings {
    fn from(user: &User) -> Self {
        Self {
            profile: Profile::from(user),
            primary_provider: user.primary_provider(),
            has_gemini_key: is_set(&user.gemini_api_key),
            has_openrouter_key: is_set(&user.openrouter_api_key),
            has_youtube_key: is_set(&user.youtube_api_key),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Admin-only credential settings. Absent fields stay as they are; an empty
/// string clears a key.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct SettingsUpdate {
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    #[serde(skip)]
    pub primary_provider: Option<String>,
}

fn username_taken(username: &str) -> AppError {
    AppError::Validation(format!("username '{}' is already taken", username))
}

fn load_user(conn: &mut SqliteConnection, user_id: i32) -> AppResult<User> {
    users::table
        .find(user_id)
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Profile", user_id))
}

pub fn list_profiles(conn: &mut SqliteConnection) -> AppResult<Vec<Profile>> {
    let all: Vec<User> = users::table
        .order(users::username.asc())
        .select(User::as_select())
        .load(conn)?;
    Ok(all.iter().map(Profile::from).collect())
}

pub fn create_user(conn: &mut SqliteConnection, actor: &Actor, req: CreateUserRequest) -> AppResult<Profile> {
    actor.require_any_role(&[Role::Admin], "create users")?;

    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("username and password are required".into()));
    }
    let taken = users::table
        .filter(users::username.eq(&username))
        .count()
        .get_result::<i64>(conn)?;
    if taken > 0 {
        return Err(username_taken(&username));
    }

    let password_hash = hash_password(&req.password)?;
    let user = diesel::insert_into(users::table)
        .values(&NewUser {
            username: username.clone(),
            password_hash,
            role: req.role.map(|r| r.as_str().to_string()),
            full_name: req.full_name,
            email: req.email,
        })
        .returning(User::as_returning())
        .get_result(conn)
        .map_err(|e| match e {
            // A concurrent create can slip past the check above
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                username_taken(&username)
            }
            other => AppError::from(other),
        })?;

    tracing::info!("User {} created user {} ({})", actor.id, user.id, user.username);
    Ok(Profile::from(&user))
}

pub fn update_full_name(conn: &mut SqliteConnection, actor: &Actor, full_name: &str) -> AppResult<Profile> {
    let full_name = full_name.trim();
    let user = diesel::update(users::table.find(actor.id))
        .set((
            users::full_name.eq((!full_name.is_empty()).then_some(full_name)),
            users::updated_at.eq(diesel::dsl::now),
        ))
        .returning(User::as_returning())
        .get_result(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Profile", actor.id))?;
    Ok(Profile::from(&user))
}

pub fn update_settings(
    conn: &mut SqliteConnection,
    actor: &Actor,
    mut update: SettingsUpdate,
    primary_provider: Option<ProviderKind>,
) -> AppResult<ProfileSettings> {
    actor.require_any_role(&[Role::Admin], "change provider settings")?;
    update.primary_provider = primary_provider.map(|p| p.as_str().to_string());

    let user = if update.gemini_api_key.is_none()
        && update.openrouter_api_key.is_none()
        && update.youtube_api_key.is_none()
        && update.primary_provider.is_none()
    {
        load_user(conn, actor.id)?
    } else {
        diesel::update(users::table.find(actor.id))
            .set((&update, users::updated_at.eq(diesel::dsl::now)))
            .returning(User::as_returning())
            .get_result(conn)?
    };
    tracing::info!("User {} updated provider settings", actor.id);
    Ok(ProfileSettings::from(&user))
}

pub fn get_settings(conn: &mut SqliteConnection, actor: &Actor) -> AppResult<ProfileSettings> {
    Ok(ProfileSettings::from(&load_user(conn, actor.id)?))
}

/// Admins assign roles to other users. Admin rights are neither granted nor
/// revoked here.
pub fn change_role(
    conn: &mut SqliteConnection,
    actor: &Actor,
    user_id: i32,
    role: Option<Role>,
) -> AppResult<Profile> {
    actor.require_any_role(&[Role::Admin], "change roles")?;
    if user_id == actor.id {
        return Err(AppError::Authorization("cannot change your own role".into()));
    }
    if role == Some(Role::Admin) {
        return Err(AppError::Authorization("cannot grant the admin role".into()));
    }

    let target = load_user(conn, user_id)?;
    if target.is_admin() {
        return Err(AppError::Authorization("cannot change an admin's role".into()));
    }

    let user = diesel::update(users::table.find(user_id))
        .set((
            users::role.eq(role.map(|r| r.as_str())),
            users::updated_at.eq(diesel::dsl::now),
        ))
        .returning(User::as_returning())
        .get_result(conn)?;

    tracing::info!(
        "User {} changed role of user {} to {}",
        actor.id,
        user_id,
        role.map(|r| r.as_str()).unwrap_or("none")
    );
    Ok(Profile::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_user, TestDb};

    #[test]
    fn test_admin_creates_users_and_names_are_unique() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let admin = insert_user(&mut conn, "admin", Some(Role::Admin));
        let editor = insert_user(&mut conn, "editor", Some(Role::Editor));

        let request = || CreateUserRequest {
            username: "newbie".into(),
            password: "pw".into(),
            role: Some(Role::ContentCreator),
            full_name: None,
            email: None,
        };

        let err = create_user(&mut conn, &Actor::from(&editor), request()).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let created = create_user(&mut conn, &Actor::from(&admin), request()).unwrap();
        assert_eq!(created.role, Some(Role::ContentCreator));

        let err = create_user(&mut conn, &Actor::from(&admin), request()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let names: Vec<String> = list_profiles(&mut conn).unwrap().into_iter().map(|p| p.username).collect();
        assert_eq!(names, vec!["admin", "editor", "newbie"]);
    }

    #[test]
    fn test_role_changes_never_touch_admins() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let admin = insert_user(&mut conn, "admin", Some(Role::Admin));
        let other_admin = insert_user(&mut conn, "boss", Some(Role::Admin));
        let pending = insert_user(&mut conn, "pending", None);
        let actor = Actor::from(&admin);

        let promoted = change_role(&mut conn, &actor, pending.id, Some(Role::Editor)).unwrap();
        assert_eq!(promoted.role, Some(Role::Editor));

        let demoted = change_role(&mut conn, &actor, pending.id, None).unwrap();
        assert_eq!(demoted.role, None);

        for (target, role) in [
            (admin.id, Some(Role::Manager)),
            (pending.id, Some(Role::Admin)),
            (other_admin.id, Some(Role::Editor)),
        ] {
            let err = change_role(&mut conn, &actor, target, role).unwrap_err();
            assert!(matches!(err, AppError::Authorization(_)));
        }

        let err = change_role(&mut conn, &actor, 999, Some(Role::Editor)).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn test_settings_are_admin_only_and_never_echo_keys() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let admin = insert_user(&mut conn, "admin", Some(Role::Admin));
        let manager = insert_user(&mut conn, "manager", Some(Role::Manager));

        let update = || SettingsUpdate {
            openrouter_api_key: Some("or-key".into()),
            ..Default::default()
        };

        let err = update_settings(&mut conn, &Actor::from(&manager), update(), None).unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let settings =
            update_settings(&mut conn, &Actor::from(&admin), update(), Some(ProviderKind::OpenRouter)).unwrap();
        assert!(settings.has_openrouter_key);
        assert!(!settings.has_gemini_key);
        assert_eq!(settings.primary_provider, ProviderKind::OpenRouter);

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("or-key"));
    }

    #[test]
    fn test_update_own_name() {
        let db = TestDb::new();
        let mut conn = db.conn();
        let editor = insert_user(&mut conn, "editor", Some(Role::Editor));

        let profile = update_full_name(&mut conn, &Actor::from(&editor), "  Edie Tor ").unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Edie Tor"));

        let cleared = update_full_name(&mut conn, &Actor::from(&editor), "").unwrap();
        assert_eq!(cleared.full_name, None);
    }

    #[test]
    fn test_concurrent_duplicate_usernames_are_validation_errors() {
        use std::sync::{Arc, Barrier};

        let db = TestDb::new();
        let admin = insert_user(&mut db.conn(), "admin", Some(Role::Admin));
        let actor = Actor::from(&admin);

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = db.pool.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut conn = pool.get().unwrap();
                    barrier.wait();
                    create_user(
                        &mut conn,
                        &actor,
                        CreateUserRequest {
                            username: "twin".into(),
                            password: "pw".into(),
                            role: None,
                            full_name: None,
                            email: None,
                        },
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for err in results.into_iter().filter_map(Result::err) {
            assert!(matches!(err, AppError::Validation(_)), "unexpected error {:?}", err);
        }
    }
}
