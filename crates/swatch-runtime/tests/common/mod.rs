#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;

use swatch_api::RemoteStore;
use swatch_core::config::AppConfig;
use swatch_core::dom::VirtualDocument;
use swatch_core::kv::MemoryKv;
use swatch_core::models::{AuditRecord, Snapshot, SnapshotKind};
use swatch_core::registry::{Manifest, ModuleResolver, SharedCatalog, SharedRegistry};
use swatch_core::tokens::{SharedTokenStore, TokenStore};
use swatch_runtime::{SmokeQa, SnapshotService};

pub const MANIFEST: &str = r#"
    [[component]]
    id = "button"
    name = "Button"
    component = "function"
    schema = { variant = "string" }
    preview = { module = "previews/button.tsx", export = "ButtonPreview" }

    [[component]]
    id = "card"
    name = "Card"
    component = "object"
    marker = "$$typeof"
    schema = { elevated = "boolean" }
    preview = { module = "previews/card.tsx", export = "CardPreview" }
"#;

// ── Remote store fakes ──────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    snapshots: Vec<Snapshot>,
    published: HashMap<SnapshotKind, String>,
    audits: Vec<AuditRecord>,
}

/// In-memory remote store.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRemote {
    pub fn audits(&self) -> Vec<AuditRecord> {
        self.state.lock().unwrap().audits.clone()
    }
}

impl RemoteStore for MemoryRemote {
    type Error = io::Error;

    async fn insert_snapshot(
        &self,
        kind: SnapshotKind,
        data: serde_json::Value,
        label: Option<String>,
    ) -> Result<Snapshot, io::Error> {
        let mut state = self.state.lock().unwrap();
        let snapshot = Snapshot {
            id: (state.snapshots.len() + 1).to_string(),
            kind,
            data,
            label,
            created_at: Utc::now(),
        };
        state.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>, io::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.snapshots.iter().find(|s| s.id == id).cloned())
    }

    async fn list_snapshots(
        &self,
        kind: SnapshotKind,
        limit: u32,
    ) -> Result<Vec<Snapshot>, io::Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .snapshots
            .iter()
            .rev()
            .filter(|s| s.kind == kind)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn latest_snapshot(&self, kind: SnapshotKind) -> Result<Option<Snapshot>, io::Error> {
        Ok(self.list_snapshots(kind, 1).await?.into_iter().next())
    }

    async fn upsert_published(&self, kind: SnapshotKind, snapshot_id: &str) -> Result<(), io::Error> {
        self.state
            .lock()
            .unwrap()
            .published
            .insert(kind, snapshot_id.to_string());
        Ok(())
    }

    async fn get_published(&self, kind: SnapshotKind) -> Result<Option<String>, io::Error> {
        Ok(self.state.lock().unwrap().published.get(&kind).cloned())
    }

    async fn insert_audit(&self, record: AuditRecord) -> Result<(), io::Error> {
        self.state.lock().unwrap().audits.push(record);
        Ok(())
    }
}

/// A remote store that is configured but never reachable.
#[derive(Clone, Default)]
pub struct DownRemote;

fn down() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, "remote store down")
}

impl RemoteStore for DownRemote {
    type Error = io::Error;

    async fn insert_snapshot(
        &self,
        _kind: SnapshotKind,
        _data: serde_json::Value,
        _label: Option<String>,
    ) -> Result<Snapshot, io::Error> {
        Err(down())
    }

    async fn get_snapshot(&self, _id: &str) -> Result<Option<Snapshot>, io::Error> {
        Err(down())
    }

    async fn list_snapshots(
        &self,
        _kind: SnapshotKind,
        _limit: u32,
    ) -> Result<Vec<Snapshot>, io::Error> {
        Err(down())
    }

    async fn latest_snapshot(&self, _kind: SnapshotKind) -> Result<Option<Snapshot>, io::Error> {
        Err(down())
    }

    async fn upsert_published(&self, _kind: SnapshotKind, _id: &str) -> Result<(), io::Error> {
        Err(down())
    }

    async fn get_published(&self, _kind: SnapshotKind) -> Result<Option<String>, io::Error> {
        Err(down())
    }

    async fn insert_audit(&self, _record: AuditRecord) -> Result<(), io::Error> {
        Err(down())
    }
}

/// A remote store that accepts audit writes and never answers them.
#[derive(Clone, Default)]
pub struct StalledRemote;

impl RemoteStore for StalledRemote {
    type Error = io::Error;

    async fn insert_snapshot(
        &self,
        _kind: SnapshotKind,
        _data: serde_json::Value,
        _label: Option<String>,
    ) -> Result<Snapshot, io::Error> {
        Err(down())
    }

    async fn get_snapshot(&self, _id: &str) -> Result<Option<Snapshot>, io::Error> {
        Ok(None)
    }

    async fn list_snapshots(
        &self,
        _kind: SnapshotKind,
        _limit: u32,
    ) -> Result<Vec<Snapshot>, io::Error> {
        Ok(Vec::new())
    }

    async fn latest_snapshot(&self, _kind: SnapshotKind) -> Result<Option<Snapshot>, io::Error> {
        Ok(None)
    }

    async fn upsert_published(&self, _kind: SnapshotKind, _id: &str) -> Result<(), io::Error> {
        Err(down())
    }

    async fn get_published(&self, _kind: SnapshotKind) -> Result<Option<String>, io::Error> {
        Ok(None)
    }

    async fn insert_audit(&self, _record: AuditRecord) -> Result<(), io::Error> {
        std::future::pending().await
    }
}

// ── Module resolver fakes ───────────────────────────────────────

/// Resolves modules from a fixed table, optionally after a delay.
#[derive(Clone, Default)]
pub struct StaticResolver {
    modules: HashMap<String, Vec<String>>,
    delay: Option<Duration>,
}

impl StaticResolver {
    pub fn with_previews() -> Self {
        Self::default()
            .module("previews/button.tsx", &["ButtonPreview", "default"])
            .module("previews/card.tsx", &["CardPreview"])
    }

    pub fn module(mut self, name: &str, exports: &[&str]) -> Self {
        self.modules.insert(
            name.to_string(),
            exports.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl ModuleResolver for StaticResolver {
    async fn resolve(&self, module: &str) -> Result<Vec<String>, String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.modules
            .get(module)
            .cloned()
            .ok_or_else(|| format!("cannot load `{module}`"))
    }
}

// ── Console fixture ─────────────────────────────────────────────

pub struct Fixture {
    pub config: AppConfig,
    pub document: Arc<VirtualDocument>,
    pub kv: Arc<MemoryKv>,
    pub tokens: SharedTokenStore,
    pub registry: SharedRegistry,
    pub catalog: SharedCatalog,
}

impl Fixture {
    /// A healthy console: themed root mounted, tokens applied, manifest loaded.
    pub fn new() -> Self {
        let config = AppConfig::default();
        let document = Arc::new(VirtualDocument::mount_app(&config.document));
        let kv = Arc::new(MemoryKv::new());
        let store = TokenStore::new(&config.tokens, kv.clone(), document.clone());
        store.apply(store.stored());

        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        Self {
            config,
            document,
            kv,
            tokens: store.into_shared(),
            registry: Arc::new(RwLock::new(manifest.registry)),
            catalog: Arc::new(RwLock::new(manifest.catalog)),
        }
    }

    pub fn qa<R, M>(&self, resolver: M, snapshots: Arc<SnapshotService<R>>) -> SmokeQa<R, M>
    where
        R: RemoteStore + 'static,
        M: ModuleResolver,
    {
        SmokeQa::new(
            self.tokens.clone(),
            self.document.clone(),
            self.registry.clone(),
            self.catalog.clone(),
            resolver,
            snapshots,
            self.config.document.clone(),
            self.config.qa.clone(),
        )
    }
}
