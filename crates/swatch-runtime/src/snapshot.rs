//! Snapshot and audit service: a best-effort policy layer over an optional
//! [`RemoteStore`].
//!
//! Nothing here returns an error. Writes against a missing or failing store
//! degrade to a fabricated value or a no-op, reads degrade to `None` or an
//! empty list, and every failure is logged at warning level.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use swatch_api::RemoteStore;
use swatch_core::models::{AuditRecord, AuditStatus, Snapshot, SnapshotKind};
use swatch_core::qa::QaItem;

/// Prefix of snapshot ids fabricated without a store.
pub const LOCAL_ID_PREFIX: &str = "local-";

pub struct SnapshotService<R> {
    remote: Option<R>,
    app_version: String,
    local_counter: AtomicU64,
}

impl<R: RemoteStore> SnapshotService<R> {
    pub fn new(remote: Option<R>) -> Self {
        Self {
            remote,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            local_counter: AtomicU64::new(0),
        }
    }

    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// Whether a remote store is configured. When it is not, the console runs
    /// in local mode.
    pub fn is_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    /// Append a snapshot. Always yields a snapshot: when the store is absent
    /// or the write fails, a local one with a synthetic id that was never
    /// persisted.
    pub async fn save_snapshot(
        &self,
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
    ) -> Snapshot {
        if let Some(remote) = &self.remote {
            match remote.insert_snapshot(kind, data.clone(), label.clone()).await {
                Ok(snapshot) => {
                    tracing::info!(id = %snapshot.id, %kind, "Snapshot saved");
                    return snapshot;
                }
                Err(e) => {
                    tracing::warn!(error = %e, %kind, "Snapshot save failed, keeping a local copy");
                }
            }
        }

        let snapshot = Snapshot {
            id: self.local_id(),
            kind,
            data,
            label,
            created_at: Utc::now(),
        };
        tracing::debug!(id = %snapshot.id, %kind, "Fabricated local snapshot");
        snapshot
    }

    /// Point `kind`'s published pointer at `snapshot_id`. Returns whether the
    /// store accepted it. Local ids are never published.
    pub async fn publish_snapshot(&self, kind: SnapshotKind, snapshot_id: &str) -> bool {
        let Some(remote) = &self.remote else {
            tracing::warn!(%kind, snapshot_id, "Remote store not configured, publish skipped");
            return false;
        };
        if snapshot_id.starts_with(LOCAL_ID_PREFIX) {
            tracing::warn!(%kind, snapshot_id, "Refusing to publish a snapshot that was never persisted");
            return false;
        }
        match remote.upsert_published(kind, snapshot_id).await {
            Ok(()) => {
                tracing::info!(%kind, snapshot_id, "Snapshot published");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, %kind, snapshot_id, "Failed to publish snapshot");
                false
            }
        }
    }

    pub async fn get_published(&self, kind: SnapshotKind) -> Option<String> {
        let remote = self.remote.as_ref()?;
        remote
            .get_published(kind)
            .await
            .map_err(|e| tracing::warn!(error = %e, %kind, "Failed to read published pointer"))
            .ok()
            .flatten()
    }

    pub async fn latest_snapshot(&self, kind: SnapshotKind) -> Option<Snapshot> {
        let remote = self.remote.as_ref()?;
        remote
            .latest_snapshot(kind)
            .await
            .map_err(|e| tracing::warn!(error = %e, %kind, "Failed to read latest snapshot"))
            .ok()
            .flatten()
    }

    pub async fn snapshot(&self, id: &str) -> Option<Snapshot> {
        let remote = self.remote.as_ref()?;
        remote
            .get_snapshot(id)
            .await
            .map_err(|e| tracing::warn!(error = %e, id, "Failed to read snapshot"))
            .ok()
            .flatten()
    }

    /// Newest first; empty without a store.
    pub async fn list(&self, kind: SnapshotKind, limit: u32) -> Vec<Snapshot> {
        let Some(remote) = &self.remote else {
            return Vec::new();
        };
        remote
            .list_snapshots(kind, limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, %kind, "Failed to list snapshots");
                Vec::new()
            })
    }

    /// Append one audit record. Best-effort.
    pub async fn record_audit(&self, scope: &str, status: AuditStatus, items: Vec<QaItem>) {
        let Some(remote) = &self.remote else {
            tracing::debug!(scope, "Remote store not configured, audit not recorded");
            return;
        };
        let record = AuditRecord {
            scope: scope.to_string(),
            status,
            summary: items,
            app_version: self.app_version.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = remote.insert_audit(record).await {
            tracing::warn!(error = %e, scope, "Failed to record audit");
        }
    }

    fn local_id(&self) -> String {
        let n = self.local_counter.fetch_add(1, Ordering::Relaxed);
        format!("{LOCAL_ID_PREFIX}{}-{n}", Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbHandle;
    use serde_json::json;
    use swatch_core::storage::Storage;

    fn local() -> SnapshotService<DbHandle> {
        SnapshotService::new(None)
    }

    fn sqlite() -> SnapshotService<DbHandle> {
        SnapshotService::new(DbHandle::spawn(Storage::open_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_local_mode_fabricates_snapshots() {
        let service = local();
        assert!(!service.is_configured());

        let a = service
            .save_snapshot(SnapshotKind::Tokens, json!({"--color-bg": "#fff"}), None)
            .await;
        let b = service.save_snapshot(SnapshotKind::Tokens, json!({}), None).await;
        assert!(a.id.starts_with(LOCAL_ID_PREFIX));
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, SnapshotKind::Tokens);

        assert_eq!(service.get_published(SnapshotKind::Tokens).await, None);
        assert!(service.latest_snapshot(SnapshotKind::Tokens).await.is_none());
        assert!(service.snapshot(&a.id).await.is_none());
        assert!(service.list(SnapshotKind::Tokens, 5).await.is_empty());
        assert!(!service.publish_snapshot(SnapshotKind::Tokens, &a.id).await);
        service
            .record_audit("smoke", AuditStatus::Pass, vec![QaItem::pass("dom.critical")])
            .await;
    }

    #[tokio::test]
    async fn test_publish_then_read_back() {
        let service = sqlite();
        assert!(service.is_configured());

        let snap = service
            .save_snapshot(SnapshotKind::Catalog, json!([{"id": "button", "name": "Button"}]), Some("v1".into()))
            .await;
        assert!(!snap.id.starts_with(LOCAL_ID_PREFIX));
        assert!(service.publish_snapshot(SnapshotKind::Catalog, &snap.id).await);

        let id = service.get_published(SnapshotKind::Catalog).await.unwrap();
        let fetched = service.snapshot(&id).await.unwrap();
        assert_eq!(fetched.label.as_deref(), Some("v1"));
        assert_eq!(service.list(SnapshotKind::Catalog, 5).await.len(), 1);
        assert_eq!(service.get_published(SnapshotKind::Tokens).await, None);
    }
}
