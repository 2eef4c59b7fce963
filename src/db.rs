use anyhow::Result;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel::sqlite::SqliteConnection;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Per-connection pragmas. Foreign keys must be on for folder deletion to
/// cascade; the busy timeout lets concurrent writers queue instead of failing.
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

const DEFAULT_POOL_SIZE: u32 = 10;

pub fn create_pool(database_url: &str) -> Result<DbPool> {
    create_pool_with_size(database_url, DEFAULT_POOL_SIZE)
}

pub fn create_pool_with_size(database_url: &str, max_size: u32) -> Result<DbPool> {
    let path = database_url.strip_prefix("sqlite://").unwrap_or(database_url);
    let manager = ConnectionManager::<SqliteConnection>::new(path);
    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout_ms: BUSY_TIMEOUT_MS,
        }))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(conn: &mut DbConnection) -> Result<()> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("Migration error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestDb;
    use diesel::prelude::*;
    use diesel::sql_types::Integer;

    #[derive(QueryableByName)]
    struct PragmaValue {
        #[diesel(sql_type = Integer)]
        foreign_keys: i32,
    }

    #[test]
    fn test_pooled_connections_enforce_foreign_keys() {
        let db = TestDb::new();
        let mut conn = db.conn();

        let value: PragmaValue = diesel::sql_query("PRAGMA foreign_keys")
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(value.foreign_keys, 1);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = TestDb::new();
        run_migrations(&mut db.conn()).unwrap();
    }
}
