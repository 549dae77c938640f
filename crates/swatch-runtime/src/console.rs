use std::sync::{Arc, RwLock};
use std::time::Duration;

use swatch_core::config::AppConfig;
use swatch_core::dom::{Document, VirtualDocument};
use swatch_core::models::{AuditRecord, SnapshotKind};
use swatch_core::registry::{Catalog, CatalogCache, Manifest, Registry, SharedCatalog, SharedRegistry};
use swatch_core::storage::Storage;
use swatch_core::surface::SurfacePolicy;
use swatch_core::tokens::{SharedTokenStore, TokenStore};

use crate::backend::Backend;
use crate::boot::SafetyBoot;
use crate::resolver::FsModuleResolver;
use crate::smoke::{SmokeQa, AUDIT_SCOPE};
use crate::snapshot::SnapshotService;
use crate::RuntimeError;

pub type ConsoleQa = SmokeQa<Backend, FsModuleResolver>;
pub type ConsoleBoot = SafetyBoot<Backend, FsModuleResolver>;

/// Everything one console session needs, wired from configuration.
pub struct Console {
    config: AppConfig,
    document: Arc<VirtualDocument>,
    tokens: SharedTokenStore,
    registry: SharedRegistry,
    catalog: SharedCatalog,
    backend: Option<Backend>,
    snapshots: Arc<SnapshotService<Backend>>,
    policy: SurfacePolicy,
    qa: Arc<ConsoleQa>,
}

impl Console {
    /// Open the local database, hydrate the token store, load the project
    /// manifest and connect the configured remote store.
    pub fn open(config: AppConfig) -> Result<Self, RuntimeError> {
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let token_kv = Storage::open(&db_path).map_err(|e| RuntimeError::Database(e.to_string()))?;

        let document = Arc::new(VirtualDocument::mount_app(&config.document));
        let store = TokenStore::new(&config.tokens, token_kv, document.clone() as Arc<dyn Document>);
        store.apply(store.stored());
        let tokens = store.into_shared();

        let (registry, catalog) = load_project(&config, &db_path)?;
        tracing::info!(
            components = registry.len(),
            listed = catalog.len(),
            "Project loaded"
        );
        let registry: SharedRegistry = Arc::new(RwLock::new(registry));
        let catalog: SharedCatalog = Arc::new(RwLock::new(catalog));

        let backend = Backend::from_config(&config.remote);
        if backend.is_none() {
            tracing::info!("Remote store not configured, running in local mode");
        }
        let snapshots = Arc::new(SnapshotService::new(backend.clone()));

        let policy = SurfacePolicy::builtin().map_err(|e| RuntimeError::Config(e.to_string()))?;

        let qa = Arc::new(SmokeQa::new(
            tokens.clone(),
            document.clone(),
            registry.clone(),
            catalog.clone(),
            FsModuleResolver::new(config.project.preview_root.clone()),
            snapshots.clone(),
            config.document.clone(),
            config.qa.clone(),
        ));

        Ok(Self {
            config,
            document,
            tokens,
            registry,
            catalog,
            backend,
            snapshots,
            policy,
            qa,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn document(&self) -> &Arc<VirtualDocument> {
        &self.document
    }

    pub fn tokens(&self) -> &SharedTokenStore {
        &self.tokens
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    /// Name of the configured remote store, `None` in local mode.
    pub fn remote_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(Backend::name)
    }

    pub fn snapshots(&self) -> &Arc<SnapshotService<Backend>> {
        &self.snapshots
    }

    pub fn policy(&self) -> &SurfacePolicy {
        &self.policy
    }

    pub fn qa(&self) -> &Arc<ConsoleQa> {
        &self.qa
    }

    /// A safety boot over this console's state.
    pub fn safety_boot(&self) -> Result<ConsoleBoot, RuntimeError> {
        let boot = SafetyBoot::new(
            self.qa.clone(),
            self.snapshots.clone(),
            self.tokens.clone(),
            self.catalog.clone(),
            Duration::from_millis(self.config.qa.recheck_delay_ms),
        );
        let db_path =
            AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?;
        let cache_kv = Storage::open(&db_path).map_err(|e| RuntimeError::Database(e.to_string()))?;
        Ok(boot.with_catalog_cache(CatalogCache::new(cache_kv)))
    }

    /// Most recent smoke audits, newest first. Only the SQLite store can be
    /// read back.
    pub async fn recent_audits(&self, limit: u32) -> Result<Vec<AuditRecord>, RuntimeError> {
        match &self.backend {
            Some(Backend::Sqlite(db)) => db
                .recent_audits(AUDIT_SCOPE, limit)
                .await
                .map_err(|e| RuntimeError::Database(e.to_string())),
            Some(other) => Err(RuntimeError::Remote(format!(
                "audit history is not readable from the {} store",
                other.name()
            ))),
            None => Err(RuntimeError::Config(
                "remote store not configured, no audit history".into(),
            )),
        }
    }

    /// The current state of `kind`, as a snapshot payload.
    pub fn capture(&self, kind: SnapshotKind) -> Result<serde_json::Value, RuntimeError> {
        let poisoned = |what: &str| RuntimeError::Config(format!("{what} lock poisoned"));
        let value = match kind {
            SnapshotKind::Tokens => {
                let store = self.tokens.lock().map_err(|_| poisoned("token store"))?;
                serde_json::to_value(store.stored())
            }
            SnapshotKind::Catalog => {
                let catalog = self.catalog.read().map_err(|_| poisoned("catalog"))?;
                serde_json::to_value(&*catalog)
            }
            SnapshotKind::Registry => {
                let registry = self.registry.read().map_err(|_| poisoned("registry"))?;
                Ok(registry.describe())
            }
            SnapshotKind::AppState => {
                let store = self.tokens.lock().map_err(|_| poisoned("token store"))?;
                Ok(serde_json::json!({
                    "theme": self.config.document.theme,
                    "tokens": store.stored(),
                    "remote": self.snapshots.is_configured(),
                }))
            }
        };
        value.map_err(|e| RuntimeError::Config(e.to_string()))
    }
}

/// Registry and catalog from the manifest. Without a manifest the registry is
/// empty and the catalog comes from the local cache, if any.
fn load_project(
    config: &AppConfig,
    db_path: &std::path::Path,
) -> Result<(Registry, Catalog), RuntimeError> {
    let path = &config.project.manifest;
    if path.exists() {
        let manifest = Manifest::load(path).map_err(|e| RuntimeError::Config(e.to_string()))?;
        return Ok((manifest.registry, manifest.catalog));
    }

    tracing::warn!(path = %path.display(), "No project manifest, using cached catalog");
    let cache_kv = Storage::open(db_path).map_err(|e| RuntimeError::Database(e.to_string()))?;
    let catalog = CatalogCache::new(cache_kv).load().unwrap_or_default();
    Ok((Registry::new(), catalog))
}
