//! Safety boot: run the smoke suite at startup and, if it fails, restore
//! the published snapshots once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use swatch_api::RemoteStore;
use swatch_core::models::SnapshotKind;
use swatch_core::qa::QaReport;
use swatch_core::registry::{Catalog, CatalogCache, ModuleResolver, SharedCatalog};
use swatch_core::tokens::{SharedTokenStore, TokenMap};

use crate::smoke::SmokeQa;
use crate::snapshot::SnapshotService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Booting,
    Checking,
    Recovering,
    /// Terminal: the first run passed, or at least one kind was restored.
    Recovered,
    /// Terminal: recovery found nothing to restore.
    Degraded,
}

impl std::fmt::Display for BootState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Booting => write!(f, "booting"),
            Self::Checking => write!(f, "checking"),
            Self::Recovering => write!(f, "recovering"),
            Self::Recovered => write!(f, "recovered"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Outcome of one boot.
#[derive(Debug)]
pub struct BootReport {
    pub state: BootState,
    /// The initial smoke report.
    pub report: QaReport,
    /// Kinds restored during recovery.
    pub restored: Vec<SnapshotKind>,
    /// Delayed diagnostic re-run, present only after a successful recovery.
    /// Its outcome is logged and never fed back into the state machine.
    pub recheck: Option<JoinHandle<QaReport>>,
}

pub struct SafetyBoot<R, M> {
    qa: Arc<SmokeQa<R, M>>,
    snapshots: Arc<SnapshotService<R>>,
    tokens: SharedTokenStore,
    catalog: SharedCatalog,
    catalog_cache: Option<Mutex<CatalogCache>>,
    recheck_delay: Duration,
    state: BootState,
}

impl<R, M> SafetyBoot<R, M>
where
    R: RemoteStore + 'static,
    M: ModuleResolver + 'static,
{
    pub fn new(
        qa: Arc<SmokeQa<R, M>>,
        snapshots: Arc<SnapshotService<R>>,
        tokens: SharedTokenStore,
        catalog: SharedCatalog,
        recheck_delay: Duration,
    ) -> Self {
        Self {
            qa,
            snapshots,
            tokens,
            catalog,
            catalog_cache: None,
            recheck_delay,
            state: BootState::Booting,
        }
    }

    /// Also overwrite this cache when the catalog is restored.
    pub fn with_catalog_cache(mut self, cache: CatalogCache) -> Self {
        self.catalog_cache = Some(Mutex::new(cache));
        self
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    fn transition(&mut self, next: BootState) {
        tracing::info!(from = %self.state, to = %next, "Boot state");
        self.state = next;
    }

    #[tracing::instrument(name = "safety_boot", skip(self))]
    pub async fn run(&mut self) -> BootReport {
        self.transition(BootState::Checking);
        let report = self.qa.run().await;

        if report.pass {
            self.transition(BootState::Recovered);
            return BootReport {
                state: self.state,
                report,
                restored: Vec::new(),
                recheck: None,
            };
        }

        self.transition(BootState::Recovering);
        let mut restored = Vec::new();
        for &kind in SnapshotKind::RECOVERABLE {
            if self.recover(kind).await {
                restored.push(kind);
            }
        }

        if restored.is_empty() {
            self.transition(BootState::Degraded);
            tracing::error!(
                summary = %report.summary(),
                "No published snapshot could be restored, running degraded"
            );
            return BootReport {
                state: self.state,
                report,
                restored,
                recheck: None,
            };
        }

        self.transition(BootState::Recovered);
        tracing::info!(?restored, "Recovered from published snapshots");
        BootReport {
            state: self.state,
            report,
            restored,
            recheck: Some(self.spawn_recheck()),
        }
    }

    /// Restore one kind from its published snapshot. Failures are logged
    /// and reported as `false`.
    async fn recover(&self, kind: SnapshotKind) -> bool {
        let Some(id) = self.snapshots.get_published(kind).await else {
            tracing::debug!(%kind, "No published snapshot");
            return false;
        };
        let Some(snapshot) = self.snapshots.snapshot(&id).await else {
            tracing::warn!(%kind, id = %id, "Published snapshot is missing");
            return false;
        };

        let result = match kind {
            SnapshotKind::Tokens => self.restore_tokens(snapshot.data),
            SnapshotKind::Catalog => self.restore_catalog(snapshot.data),
            SnapshotKind::Registry | SnapshotKind::AppState => {
                Err(format!("{kind} snapshots are not restorable"))
            }
        };
        match result {
            Ok(()) => {
                tracing::info!(%kind, id = %id, "Restored published snapshot");
                true
            }
            Err(e) => {
                tracing::warn!(%kind, id = %id, error = %e, "Failed to restore snapshot");
                false
            }
        }
    }

    fn restore_tokens(&self, data: serde_json::Value) -> Result<(), String> {
        let captured: TokenMap = serde_json::from_value(data).map_err(|e| e.to_string())?;
        let mut store = self
            .tokens
            .lock()
            .map_err(|_| "token store lock poisoned".to_string())?;
        store.restore(&captured).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn restore_catalog(&self, data: serde_json::Value) -> Result<(), String> {
        let captured: Catalog = serde_json::from_value(data).map_err(|e| e.to_string())?;
        if let Some(cache) = &self.catalog_cache {
            let cache = cache.lock().map_err(|_| "catalog cache lock poisoned".to_string())?;
            cache.save(&captured).map_err(|e| e.to_string())?;
        }
        *self
            .catalog
            .write()
            .map_err(|_| "catalog lock poisoned".to_string())? = captured;
        Ok(())
    }

    fn spawn_recheck(&self) -> JoinHandle<QaReport> {
        let qa = Arc::clone(&self.qa);
        let delay = self.recheck_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let report = qa.run().await;
            if report.pass {
                tracing::info!(summary = %report.summary(), "Post-recovery re-check passed");
            } else {
                tracing::warn!(summary = %report.summary(), "Post-recovery re-check still failing");
            }
            report
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(BootState::Recovering.to_string(), "recovering");
        assert_eq!(BootState::Degraded.to_string(), "degraded");
    }
}
