//! Capability interface for the remote snapshot/audit store.
//!
//! Backends (REST, local SQLite) implement [`RemoteStore`]; the snapshot
//! service above them decides how failures degrade.

use std::future::Future;

use swatch_core::models::{AuditRecord, Snapshot, SnapshotKind};

/// Append-only snapshot log, per-kind published pointers and audit log.
pub trait RemoteStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append a snapshot. Returns it with its store-assigned id.
    fn insert_snapshot(
        &self,
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
    ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send;

    fn get_snapshot(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send;

    /// Newest snapshots of `kind` first.
    fn list_snapshots(
        &self,
        kind: SnapshotKind,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Snapshot>, Self::Error>> + Send;

    fn latest_snapshot(
        &self,
        kind: SnapshotKind,
    ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send;

    /// Point `kind`'s published pointer at `snapshot_id`.
    fn upsert_published(
        &self,
        kind: SnapshotKind,
        snapshot_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn get_published(
        &self,
        kind: SnapshotKind,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    fn insert_audit(
        &self,
        record: AuditRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
