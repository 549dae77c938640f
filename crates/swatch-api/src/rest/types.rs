use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use swatch_core::models::{AuditRecord, Snapshot, SnapshotKind};
use swatch_core::qa::QaItem;

// ── Snapshots ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct NewSnapshot<'a> {
    pub kind: &'a str,
    pub data: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<&'a str>,
}

/// A `snapshots` row. Ids may be integers or UUID strings depending on
/// how the table was created.
#[derive(Debug, Deserialize)]
pub struct SnapshotRow {
    pub id: serde_json::Value,
    pub kind: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SnapshotRow {
    /// `None` for rows of a kind this client does not know.
    pub fn into_snapshot(self) -> Option<Snapshot> {
        let kind = SnapshotKind::from_db_str(&self.kind)?;
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Some(Snapshot {
            id,
            kind,
            data: self.data,
            label: self.label,
            created_at: self.created_at,
        })
    }
}

// ── Published pointers ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PublishedUpsert<'a> {
    pub kind: &'a str,
    pub snapshot_id: &'a str,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PublishedRow {
    pub snapshot_id: serde_json::Value,
}

impl PublishedRow {
    pub fn into_id(self) -> Option<String> {
        match self.snapshot_id {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

// ── Audits ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct NewAudit<'a> {
    pub scope: &'a str,
    pub status: &'a str,
    pub summary: &'a [QaItem],
    pub app_version: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a AuditRecord> for NewAudit<'a> {
    fn from(record: &'a AuditRecord) -> Self {
        Self {
            scope: &record.scope,
            status: record.status.as_db_str(),
            summary: &record.summary,
            app_version: &record.app_version,
            created_at: record.created_at,
        }
    }
}
