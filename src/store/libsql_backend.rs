//! libSQL backend — async `ViolationLog` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{ViolationAction, ViolationLog, ViolationRecord};

/// libSQL-backed violation log.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlViolationLog {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlViolationLog {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let log = Self::from_database(db).await?;
        info!(path = %path.display(), "Violation log opened");
        Ok(log)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

const VIOLATION_COLUMNS: &str =
    "id, chat_id, sender_id, guard_id, action, reason, message_id, timestamp";

fn row_to_record(row: &libsql::Row) -> Result<ViolationRecord, String> {
    let id: String = row.get(0).map_err(|e| e.to_string())?;
    let action: String = row.get(4).map_err(|e| e.to_string())?;
    let timestamp: String = row.get(7).map_err(|e| e.to_string())?;

    Ok(ViolationRecord {
        id: Uuid::parse_str(&id).map_err(|e| format!("bad id '{id}': {e}"))?,
        chat_id: row.get(1).map_err(|e| e.to_string())?,
        sender_id: row.get(2).map_err(|e| e.to_string())?,
        guard_id: row.get(3).map_err(|e| e.to_string())?,
        action: action.parse()?,
        reason: row.get(5).map_err(|e| e.to_string())?,
        message_id: row.get(6).map_err(|e| e.to_string())?,
        timestamp: parse_datetime(&timestamp),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl ViolationLog for LibSqlViolationLog {
    async fn log_violation(&self, record: &ViolationRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO moderation_log (id, chat_id, sender_id, guard_id, action, reason, message_id, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    record.chat_id.as_str(),
                    record.sender_id.as_str(),
                    record.guard_id.as_str(),
                    record.action.as_str(),
                    record.reason.as_str(),
                    record.message_id.as_str(),
                    record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("log_violation: {e}")))?;

        debug!(
            chat_id = %record.chat_id,
            guard_id = %record.guard_id,
            action = record.action.as_str(),
            "Violation logged"
        );
        Ok(())
    }

    async fn recent_violations(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<ViolationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {VIOLATION_COLUMNS} FROM moderation_log WHERE chat_id = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
                ),
                params![chat_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_violations: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_violations: {e}")))?
        {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping moderation_log row: {e}"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_log() -> LibSqlViolationLog {
        LibSqlViolationLog::new_memory().await.unwrap()
    }

    fn record(chat: &str, guard: &str, action: ViolationAction) -> ViolationRecord {
        ViolationRecord::new(
            chat,
            "15550001111@s.whatsapp.net",
            guard,
            action,
            "Links are not allowed in this group.",
            "MSG1",
        )
    }

    #[tokio::test]
    async fn log_and_read_back() {
        let log = test_log().await;
        let rec = record("a@g.us", "no-links", ViolationAction::Deleted);
        log.log_violation(&rec).await.unwrap();

        let fetched = log.recent_violations("a@g.us", 10).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, rec.id);
        assert_eq!(fetched[0].guard_id, "no-links");
        assert_eq!(fetched[0].action, ViolationAction::Deleted);
        assert_eq!(fetched[0].message_id, "MSG1");
        assert_eq!(fetched[0].timestamp, rec.timestamp);
    }

    #[tokio::test]
    async fn recent_is_per_chat_newest_first_and_limited() {
        let log = test_log().await;
        let base = Utc::now();
        for i in 0..5 {
            let mut rec = record("a@g.us", "no-spam", ViolationAction::Logged);
            rec.timestamp = base + Duration::seconds(i);
            rec.message_id = format!("MSG{i}");
            log.log_violation(&rec).await.unwrap();
        }
        log.log_violation(&record("b@g.us", "no-links", ViolationAction::Logged))
            .await
            .unwrap();

        let fetched = log.recent_violations("a@g.us", 3).await.unwrap();
        let ids: Vec<&str> = fetched.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(ids, vec!["MSG4", "MSG3", "MSG2"]);

        assert_eq!(log.recent_violations("b@g.us", 10).await.unwrap().len(), 1);
        assert!(log.recent_violations("c@g.us", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_backed_log_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("guard.db");

        {
            let log = LibSqlViolationLog::new_local(&path).await.unwrap();
            log.log_violation(&record("a@g.us", "no-links", ViolationAction::Deleted))
                .await
                .unwrap();
        }

        let reopened = LibSqlViolationLog::new_local(&path).await.unwrap();
        assert_eq!(reopened.recent_violations("a@g.us", 10).await.unwrap().len(), 1);
    }

    #[test]
    fn parse_datetime_formats() {
        let dt = parse_datetime("2024-01-15T10:00:00.000000000Z");
        assert_eq!(dt.to_rfc3339(), "2024-01-15T10:00:00+00:00");
        let sqlite = parse_datetime("2024-01-15 10:00:00.5");
        assert_eq!(sqlite.timestamp(), dt.timestamp());
        assert_eq!(parse_datetime("garbage"), DateTime::<Utc>::MIN_UTC);
    }
}
