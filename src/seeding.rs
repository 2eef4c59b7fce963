use anyhow::Result;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::auth::hash_password;
use crate::db::DbPool;
use crate::models::{NewKeywordStyle, NewRewriteStyle, NewUser, Role, User};

const DEFAULT_REWRITE_STYLES: &[(&str, &str)] = &[
    (
        "Punchy",
        "Rewrite the script with short, energetic sentences. Cut filler and open every section with a hook.",
    ),
    (
        "Documentary",
        "Rewrite the script in a calm, authoritative documentary narration. Keep every fact and add smooth transitions.",
    ),
];

const DEFAULT_KEYWORD_STYLES: &[(&str, &str)] = &[(
    "B-roll",
    "Split this script into chunks of one or two sentences. For each chunk, give at most two keywords describing footage that could be shown on screen. Write keywords in UPPERCASE, separated by commas.",
)];

pub fn seed_defaults(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get()?;
    tracing::info!("Seeding default values...");

    let admin = seed_admin(&mut conn)?;
    seed_styles(&mut conn, &admin)?;

    Ok(())
}

fn seed_admin(conn: &mut SqliteConnection) -> Result<User> {
    use crate::schema::users::dsl::*;

    if let Some(existing) = users
        .filter(username.eq("admin"))
        .select(User::as_select())
        .first(conn)
        .optional()?
    {
        return Ok(existing);
    }

    tracing::info!("Seeding user: admin");
    let new_user = NewUser {
        username: "admin".to_string(),
        password_hash: hash_password("admin")?,
        role: Some(Role::Admin.as_str().to_string()),
        full_name: Some("Administrator".to_string()),
        email: None,
    };

    Ok(diesel::insert_into(users)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(conn)?)
}

/// Starter presets for the seeded admin. Presets that already exist by name
/// are left alone.
fn seed_styles(conn: &mut SqliteConnection, admin: &User) -> Result<()> {
    use crate::schema::{keyword_styles, rewrite_styles};

    for &(style_name, style_prompt) in DEFAULT_REWRITE_STYLES {
        let exists: i64 = rewrite_styles::table
            .filter(rewrite_styles::user_id.eq(admin.id))
            .filter(rewrite_styles::name.eq(style_name))
            .count()
            .get_result(conn)?;
        if exists == 0 {
            tracing::info!("Seeding rewrite style: {}", style_name);
            diesel::insert_into(rewrite_styles::table)
                .values(&NewRewriteStyle {
                    user_id: admin.id,
                    name: style_name.to_string(),
                    prompt: style_prompt.to_string(),
                })
                .execute(conn)?;
        }
    }

    for &(style_name, style_prompt) in DEFAULT_KEYWORD_STYLES {
        let exists: i64 = keyword_styles::table
            .filter(keyword_styles::user_id.eq(admin.id))
            .filter(keyword_styles::name.eq(style_name))
            .count()
            .get_result(conn)?;
        if exists == 0 {
            tracing::info!("Seeding keyword style: {}", style_name);
            diesel::insert_into(keyword_styles::table)
                .values(&NewKeywordStyle {
                    user_id: admin.id,
                    name: style_name.to_string(),
                    prompt: style_prompt.to_string(),
                })
                .execute(conn)?;
        }
    }

    Ok(())
}
