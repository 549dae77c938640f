use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use swatch_api::RemoteStore;
use swatch_core::error::SwatchError;
use swatch_core::models::{AuditRecord, Snapshot, SnapshotKind};
use swatch_core::storage::Storage;

/// Snapshot/audit store backed by the local SQLite database.
///
/// `rusqlite::Connection` is not `Sync`, so the storage lives on a dedicated
/// thread and requests reach it over a channel.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
}

enum DbCommand {
    InsertSnapshot {
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
        reply: oneshot::Sender<Result<Snapshot, SwatchError>>,
    },
    GetSnapshot {
        id: String,
        reply: oneshot::Sender<Result<Option<Snapshot>, SwatchError>>,
    },
    ListSnapshots {
        kind: SnapshotKind,
        limit: u32,
        reply: oneshot::Sender<Result<Vec<Snapshot>, SwatchError>>,
    },
    UpsertPublished {
        kind: SnapshotKind,
        snapshot_id: String,
        reply: oneshot::Sender<Result<(), SwatchError>>,
    },
    GetPublished {
        kind: SnapshotKind,
        reply: oneshot::Sender<Result<Option<String>, SwatchError>>,
    },
    InsertAudit {
        record: AuditRecord,
        reply: oneshot::Sender<Result<(), SwatchError>>,
    },
    RecentAudits {
        scope: String,
        limit: u32,
        reply: oneshot::Sender<Result<Vec<AuditRecord>, SwatchError>>,
    },
}

impl DbHandle {
    pub fn open(path: &Path) -> Option<Self> {
        let storage = Storage::open(path)
            .map_err(|e| tracing::error!("Failed to open database: {e}"))
            .ok()?;
        Self::spawn(storage)
    }

    /// Move an already opened storage onto the actor thread.
    pub fn spawn(storage: Storage) -> Option<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))
            .map_err(|e| tracing::error!("Failed to spawn DB thread: {e}"))
            .ok()?;

        Some(Self { tx })
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, SwatchError>>) -> DbCommand,
    ) -> Result<T, SwatchError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(make(reply));
        rx.await
            .unwrap_or_else(|_| Err(SwatchError::Config("DB actor closed".into())))
    }

    pub async fn recent_audits(
        &self,
        scope: &str,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, SwatchError> {
        let scope = scope.to_string();
        self.request(|reply| DbCommand::RecentAudits {
            scope,
            limit,
            reply,
        })
        .await
    }
}

impl RemoteStore for DbHandle {
    type Error = SwatchError;

    async fn insert_snapshot(
        &self,
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
    ) -> Result<Snapshot, SwatchError> {
        self.request(|reply| DbCommand::InsertSnapshot {
            kind,
            data,
            label,
            reply,
        })
        .await
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, SwatchError> {
        let id = id.to_string();
        self.request(|reply| DbCommand::GetSnapshot { id, reply }).await
    }

    async fn list_snapshots(
        &self,
        kind: SnapshotKind,
        limit: u32,
    ) -> Result<Vec<Snapshot>, SwatchError> {
        self.request(|reply| DbCommand::ListSnapshots { kind, limit, reply })
            .await
    }

    async fn latest_snapshot(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, SwatchError> {
        Ok(self.list_snapshots(kind, 1).await?.into_iter().next())
    }

    async fn upsert_published(
        &self,
        kind: SnapshotKind,
        snapshot_id: &str,
    ) -> Result<(), SwatchError> {
        let snapshot_id = snapshot_id.to_string();
        self.request(|reply| DbCommand::UpsertPublished {
            kind,
            snapshot_id,
            reply,
        })
        .await
    }

    async fn get_published(&self, kind: SnapshotKind) -> Result<Option<String>, SwatchError> {
        self.request(|reply| DbCommand::GetPublished { kind, reply })
            .await
    }

    async fn insert_audit(&self, record: AuditRecord) -> Result<(), SwatchError> {
        self.request(|reply| DbCommand::InsertAudit { record, reply })
            .await
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::InsertSnapshot {
                kind,
                data,
                label,
                reply,
            } => {
                let _ = reply.send(storage.insert_snapshot(kind, &data, label.as_deref()));
            }
            DbCommand::GetSnapshot { id, reply } => {
                let _ = reply.send(storage.get_snapshot(&id));
            }
            DbCommand::ListSnapshots { kind, limit, reply } => {
                let _ = reply.send(storage.list_snapshots(kind, limit));
            }
            DbCommand::UpsertPublished {
                kind,
                snapshot_id,
                reply,
            } => {
                let _ = reply.send(storage.upsert_published(kind, &snapshot_id));
            }
            DbCommand::GetPublished { kind, reply } => {
                let _ = reply.send(storage.get_published(kind));
            }
            DbCommand::InsertAudit { record, reply } => {
                let _ = reply.send(storage.insert_audit(&record).map(|_| ()));
            }
            DbCommand::RecentAudits {
                scope,
                limit,
                reply,
            } => {
                let _ = reply.send(storage.recent_audits(&scope, limit));
            }
        }
    }
    tracing::debug!("DB actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use swatch_core::models::AuditStatus;
    use swatch_core::qa::QaItem;

    fn handle() -> DbHandle {
        DbHandle::spawn(Storage::open_memory().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_and_published_through_actor() {
        let db = handle();
        let snap = db
            .insert_snapshot(SnapshotKind::Tokens, json!({"--color-bg": "#111111"}), None)
            .await
            .unwrap();
        db.upsert_published(SnapshotKind::Tokens, &snap.id)
            .await
            .unwrap();

        let published = db.get_published(SnapshotKind::Tokens).await.unwrap();
        assert_eq!(published.as_deref(), Some(snap.id.as_str()));

        let fetched = db.get_snapshot(&snap.id).await.unwrap().unwrap();
        assert_eq!(fetched.data, json!({"--color-bg": "#111111"}));
        assert_eq!(
            db.latest_snapshot(SnapshotKind::Tokens).await.unwrap().unwrap().id,
            snap.id
        );
    }

    #[tokio::test]
    async fn test_audit_through_actor() {
        let db = handle();
        db.insert_audit(AuditRecord {
            scope: "smoke".into(),
            status: AuditStatus::Pass,
            summary: vec![QaItem::pass("dom.critical")],
            app_version: "0.1.0".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let audits = db.recent_audits("smoke", 10).await.unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].status, AuditStatus::Pass);
    }
}
