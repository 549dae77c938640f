mod audit;
mod snapshot;

pub use audit::{AuditRecord, AuditStatus};
pub use snapshot::{Snapshot, SnapshotKind};
