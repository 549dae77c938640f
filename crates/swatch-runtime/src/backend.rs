use std::sync::Arc;

use swatch_api::{RemoteStore, RestStore};
use swatch_core::config::{AppConfig, RemoteBackend, RemoteConfig};
use swatch_core::models::{AuditRecord, Snapshot, SnapshotKind};

use crate::db::DbHandle;
use crate::RuntimeError;

/// The remote store selected by `[remote] backend`.
#[derive(Clone)]
pub enum Backend {
    Rest(Arc<RestStore>),
    Sqlite(DbHandle),
}

impl Backend {
    /// Build the configured backend. `None` means local mode: the backend
    /// is `none`, or the configured one could not be set up.
    pub fn from_config(remote: &RemoteConfig) -> Option<Self> {
        match remote.backend {
            RemoteBackend::None => None,
            RemoteBackend::Rest => match remote.rest_endpoint() {
                Some((url, key)) => {
                    tracing::info!(url = %url, "Using REST remote store");
                    Some(Self::Rest(Arc::new(RestStore::new(url, key))))
                }
                None => {
                    tracing::warn!("REST remote store needs a valid url and api_key");
                    None
                }
            },
            RemoteBackend::Sqlite => {
                let path = AppConfig::ensure_db_path()
                    .map_err(|e| tracing::warn!(error = %e, "No data directory for SQLite store"))
                    .ok()?;
                tracing::info!(path = %path.display(), "Using SQLite snapshot store");
                DbHandle::open(&path).map(Self::Sqlite)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rest(_) => "rest",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

fn remote(e: swatch_api::RemoteError) -> RuntimeError {
    RuntimeError::Remote(e.to_string())
}

fn database(e: swatch_core::error::SwatchError) -> RuntimeError {
    RuntimeError::Database(e.to_string())
}

impl RemoteStore for Backend {
    type Error = RuntimeError;

    async fn insert_snapshot(
        &self,
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
    ) -> Result<Snapshot, RuntimeError> {
        match self {
            Self::Rest(s) => s.insert_snapshot(kind, data, label).await.map_err(remote),
            Self::Sqlite(db) => db.insert_snapshot(kind, data, label).await.map_err(database),
        }
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, RuntimeError> {
        match self {
            Self::Rest(s) => s.get_snapshot(id).await.map_err(remote),
            Self::Sqlite(db) => db.get_snapshot(id).await.map_err(database),
        }
    }

    async fn list_snapshots(
        &self,
        kind: SnapshotKind,
        limit: u32,
    ) -> Result<Vec<Snapshot>, RuntimeError> {
        match self {
            Self::Rest(s) => s.list_snapshots(kind, limit).await.map_err(remote),
            Self::Sqlite(db) => db.list_snapshots(kind, limit).await.map_err(database),
        }
    }

    async fn latest_snapshot(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, RuntimeError> {
        match self {
            Self::Rest(s) => s.latest_snapshot(kind).await.map_err(remote),
            Self::Sqlite(db) => db.latest_snapshot(kind).await.map_err(database),
        }
    }

    async fn upsert_published(
        &self,
        kind: SnapshotKind,
        snapshot_id: &str,
    ) -> Result<(), RuntimeError> {
        match self {
            Self::Rest(s) => s.upsert_published(kind, snapshot_id).await.map_err(remote),
            Self::Sqlite(db) => db.upsert_published(kind, snapshot_id).await.map_err(database),
        }
    }

    async fn get_published(&self, kind: SnapshotKind) -> Result<Option<String>, RuntimeError> {
        match self {
            Self::Rest(s) => s.get_published(kind).await.map_err(remote),
            Self::Sqlite(db) => db.get_published(kind).await.map_err(database),
        }
    }

    async fn insert_audit(&self, record: AuditRecord) -> Result<(), RuntimeError> {
        match self {
            Self::Rest(s) => s.insert_audit(record).await.map_err(remote),
            Self::Sqlite(db) => db.insert_audit(record).await.map_err(database),
        }
    }
}
