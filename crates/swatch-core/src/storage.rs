use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::SwatchError;
use crate::kv::KeyValueStore;
use crate::models::{AuditRecord, AuditStatus, Snapshot, SnapshotKind};

const SCHEMA_V1: &str = include_str!("../../../migrations/001_initial.sql");

/// SQLite-backed local storage: key-value entries, snapshots, published
/// pointers and audits.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, SwatchError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, SwatchError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    // ── Key-value ───────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, SwatchError> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(Into::into)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), SwatchError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ── Snapshots ───────────────────────────────────────────────

    /// Append a snapshot and return it with its assigned id.
    pub fn insert_snapshot(
        &self,
        kind: SnapshotKind,
        data: &serde_json::Value,
        label: Option<&str>,
    ) -> Result<Snapshot, SwatchError> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO snapshots (kind, data, label, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.as_db_str(),
                serde_json::to_string(data)?,
                label,
                created_at.to_rfc3339()
            ],
        )?;
        Ok(Snapshot {
            id: self.conn.last_insert_rowid().to_string(),
            kind,
            data: data.clone(),
            label: label.map(str::to_string),
            created_at,
        })
    }

    /// Get a snapshot by id. Non-numeric ids never match.
    pub fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, SwatchError> {
        let Ok(rowid) = id.parse::<i64>() else {
            return Ok(None);
        };
        self.conn
            .query_row(
                "SELECT id, kind, data, label, created_at FROM snapshots WHERE id = ?1",
                params![rowid],
                row_to_snapshot,
            )
            .optional()
            .map(Option::flatten)
            .map_err(Into::into)
    }

    /// Most recent snapshots of a kind, newest first.
    pub fn list_snapshots(
        &self,
        kind: SnapshotKind,
        limit: u32,
    ) -> Result<Vec<Snapshot>, SwatchError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, data, label, created_at FROM snapshots
             WHERE kind = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![kind.as_db_str(), limit], row_to_snapshot)?
            .filter_map(|r| r.ok().flatten())
            .collect();
        Ok(rows)
    }

    pub fn latest_snapshot(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, SwatchError> {
        Ok(self.list_snapshots(kind, 1)?.into_iter().next())
    }

    // ── Published pointers ──────────────────────────────────────

    pub fn upsert_published(&self, kind: SnapshotKind, snapshot_id: &str) -> Result<(), SwatchError> {
        self.conn.execute(
            "INSERT INTO published_state (kind, snapshot_id, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(kind) DO UPDATE SET snapshot_id = excluded.snapshot_id,
                                             updated_at = excluded.updated_at",
            params![kind.as_db_str(), snapshot_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_published(&self, kind: SnapshotKind) -> Result<Option<String>, SwatchError> {
        self.conn
            .query_row(
                "SELECT snapshot_id FROM published_state WHERE kind = ?1",
                params![kind.as_db_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    // ── Audits ──────────────────────────────────────────────────

    pub fn insert_audit(&self, record: &AuditRecord) -> Result<i64, SwatchError> {
        self.conn.execute(
            "INSERT INTO audits (scope, status, summary, app_version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.scope,
                record.status.as_db_str(),
                serde_json::to_string(&record.summary)?,
                record.app_version,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent audits for a scope, newest first.
    pub fn recent_audits(&self, scope: &str, limit: u32) -> Result<Vec<AuditRecord>, SwatchError> {
        let mut stmt = self.conn.prepare(
            "SELECT scope, status, summary, app_version, created_at FROM audits
             WHERE scope = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![scope, limit], |row| {
                let status: String = row.get(1)?;
                let summary: String = row.get(2)?;
                let created_at: String = row.get(4)?;
                Ok(AuditRecord {
                    scope: row.get(0)?,
                    status: AuditStatus::from_db_str(&status).unwrap_or(AuditStatus::Fail),
                    summary: serde_json::from_str(&summary).unwrap_or_default(),
                    app_version: row.get(3)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

impl KeyValueStore for Storage {
    fn read(&self, key: &str) -> Option<String> {
        self.kv_get(key)
            .map_err(|e| tracing::warn!(error = %e, key, "kv read failed"))
            .ok()
            .flatten()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SwatchError> {
        self.kv_set(key, value)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), SwatchError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────

/// Parse a datetime string from SQLite (either RFC 3339 or SQLite's `datetime('now')` format).
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    DateTime::default()
}

/// Rows with an unknown kind or undecodable payload map to `None`.
fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Snapshot>> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let data: String = row.get(2)?;
    let created_at: String = row.get(4)?;

    let Some(kind) = SnapshotKind::from_db_str(&kind) else {
        return Ok(None);
    };
    let Ok(data) = serde_json::from_str(&data) else {
        return Ok(None);
    };
    Ok(Some(Snapshot {
        id: id.to_string(),
        kind,
        data,
        label: row.get(3)?,
        created_at: parse_datetime(&created_at),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::QaItem;
    use serde_json::json;

    #[test]
    fn test_kv_set_and_overwrite() {
        let db = Storage::open_memory().unwrap();
        assert_eq!(db.kv_get("ds-tokens").unwrap(), None);
        db.kv_set("ds-tokens", "{}").unwrap();
        db.kv_set("ds-tokens", r#"{"--a":"1"}"#).unwrap();
        assert_eq!(db.kv_get("ds-tokens").unwrap().as_deref(), Some(r#"{"--a":"1"}"#));
    }

    #[test]
    fn test_snapshot_insert_get_latest() {
        let db = Storage::open_memory().unwrap();
        let first = db
            .insert_snapshot(SnapshotKind::Tokens, &json!({"--color-bg": "#fff"}), None)
            .unwrap();
        let second = db
            .insert_snapshot(SnapshotKind::Tokens, &json!({"--color-bg": "#000"}), Some("dark"))
            .unwrap();
        db.insert_snapshot(SnapshotKind::Catalog, &json!([]), None)
            .unwrap();

        assert_ne!(first.id, second.id);
        let fetched = db.get_snapshot(&first.id).unwrap().unwrap();
        assert_eq!(fetched.data, json!({"--color-bg": "#fff"}));
        assert_eq!(fetched.kind, SnapshotKind::Tokens);

        let latest = db.latest_snapshot(SnapshotKind::Tokens).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.label.as_deref(), Some("dark"));

        assert_eq!(db.list_snapshots(SnapshotKind::Tokens, 10).unwrap().len(), 2);
        assert!(db.latest_snapshot(SnapshotKind::Registry).unwrap().is_none());
        assert!(db.get_snapshot("local-123").unwrap().is_none());
    }

    #[test]
    fn test_published_pointer_upserts() {
        let db = Storage::open_memory().unwrap();
        assert_eq!(db.get_published(SnapshotKind::Tokens).unwrap(), None);
        db.upsert_published(SnapshotKind::Tokens, "1").unwrap();
        db.upsert_published(SnapshotKind::Tokens, "7").unwrap();
        assert_eq!(db.get_published(SnapshotKind::Tokens).unwrap().as_deref(), Some("7"));
        assert_eq!(db.get_published(SnapshotKind::Catalog).unwrap(), None);
    }

    #[test]
    fn test_audit_roundtrip() {
        let db = Storage::open_memory().unwrap();
        let record = AuditRecord {
            scope: "smoke".into(),
            status: AuditStatus::Fail,
            summary: vec![QaItem::pass("dom.critical"), QaItem::fail("theme.integrity", "no theme")],
            app_version: "0.1.0".into(),
            created_at: Utc::now(),
        };
        db.insert_audit(&record).unwrap();

        let audits = db.recent_audits("smoke", 5).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].status, AuditStatus::Fail);
        assert_eq!(audits[0].summary, record.summary);
        assert!(db.recent_audits("boot", 5).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swatch.db");
        {
            let db = Storage::open(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Storage::open(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
