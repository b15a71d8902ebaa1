//! Version-tracked database migrations for the libSQL backend.
//!
//! Steps are numbered and applied in order; `_migrations` records which
//! ones a database already has.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "moderation_log",
        sql: r#"
            CREATE TABLE IF NOT EXISTS moderation_log (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                guard_id TEXT NOT NULL,
                action TEXT NOT NULL,
                reason TEXT NOT NULL,
                message_id TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_moderation_log_chat ON moderation_log(chat_id);
            CREATE INDEX IF NOT EXISTS idx_moderation_log_timestamp ON moderation_log(timestamp);
        "#,
    },
    Migration {
        version: 2,
        name: "moderation_log_sender_index",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_moderation_log_chat_sender
                ON moderation_log(chat_id, sender_id);
        "#,
    },
];

const CREATE_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

fn migration_err(context: &str, e: libsql::Error) -> DatabaseError {
    DatabaseError::Migration(format!("{context}: {e}"))
}

/// Bring the schema up to date. Each pending step runs in its own
/// transaction together with its `_migrations` row, so a failed step
/// leaves the recorded version where it was.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(CREATE_VERSION_TABLE, ())
        .await
        .map_err(|e| migration_err("create _migrations", e))?;

    let applied = applied_version(conn).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);
    for migration in pending {
        apply(conn, migration).await?;
    }

    tracing::debug!(from = applied, to = applied_version(conn).await?, "Schema up to date");
    Ok(())
}

async fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let Migration { version, name, sql } = *migration;
    tracing::info!(version, name, "Applying migration");

    let context = format!("V{version} ({name})");
    let tx = conn
        .transaction()
        .await
        .map_err(|e| migration_err(&context, e))?;
    tx.execute_batch(sql)
        .await
        .map_err(|e| migration_err(&context, e))?;
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| migration_err(&context, e))?;
    tx.commit().await.map_err(|e| migration_err(&context, e))
}

/// Highest recorded version; 0 on a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| migration_err("read schema version", e))?;
    match rows
        .next()
        .await
        .map_err(|e| migration_err("read schema version", e))?
    {
        Some(row) => row.get(0).map_err(|e| migration_err("read schema version", e)),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &["moderation_log", "_migrations"] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let version = applied_version(&conn).await.unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn version_tracking() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let row1 = rows.next().await.unwrap().unwrap();
        let v1: i64 = row1.get(0).unwrap();
        let n1: String = row1.get(1).unwrap();
        assert_eq!(v1, 1);
        assert_eq!(n1, "moderation_log");

        let row2 = rows.next().await.unwrap().unwrap();
        let n2: String = row2.get(1).unwrap();
        assert_eq!(n2, "moderation_log_sender_index");
    }

    #[tokio::test]
    async fn failed_step_is_rolled_back() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let broken = Migration {
            version: 3,
            name: "broken",
            sql: "CREATE TABLE half_done (id TEXT); INSERT INTO no_such_table VALUES (1);",
        };
        let err = apply(&conn, &broken).await.unwrap_err();
        assert!(err.to_string().contains("V3 (broken)"));

        assert_eq!(applied_version(&conn).await.unwrap(), 2);
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='half_done'",
                (),
            )
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 0);
    }
}
