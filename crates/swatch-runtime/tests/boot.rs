mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{Fixture, MemoryRemote, StaticResolver};
use swatch_core::dom::Document;
use swatch_core::kv::MemoryKv;
use swatch_core::models::SnapshotKind;
use swatch_core::registry::{CatalogCache, CatalogEntry};
use swatch_core::storage::Storage;
use swatch_runtime::{BootState, DbHandle, SafetyBoot, SnapshotService};

fn boot<R>(fx: &Fixture, snapshots: Arc<SnapshotService<R>>) -> SafetyBoot<R, StaticResolver>
where
    R: swatch_api::RemoteStore + 'static,
{
    let qa = Arc::new(fx.qa(StaticResolver::with_previews(), snapshots.clone()));
    SafetyBoot::new(
        qa,
        snapshots,
        fx.tokens.clone(),
        fx.catalog.clone(),
        Duration::ZERO,
    )
}

/// Break catalog integrity: list a component the registry does not have.
fn break_catalog(fx: &Fixture) {
    fx.catalog.write().unwrap().push(CatalogEntry {
        id: "ghost".into(),
        name: "Ghost".into(),
        category: None,
        description: None,
    });
}

#[tokio::test]
async fn test_passing_boot_is_recovered_without_recheck() {
    let fx = Fixture::new();
    let mut boot = boot(&fx, Arc::new(SnapshotService::new(Some(MemoryRemote::default()))));
    assert_eq!(boot.state(), BootState::Booting);

    let outcome = boot.run().await;
    assert_eq!(outcome.state, BootState::Recovered);
    assert!(outcome.report.pass);
    assert!(outcome.restored.is_empty());
    assert!(outcome.recheck.is_none());
}

#[tokio::test]
async fn test_failing_boot_restores_published_tokens() {
    let fx = Fixture::new();
    break_catalog(&fx);

    let snapshots = Arc::new(SnapshotService::new(Some(MemoryRemote::default())));
    let snap = snapshots
        .save_snapshot(SnapshotKind::Tokens, json!({"--color-bg": "#111111"}), None)
        .await;
    assert!(snapshots.publish_snapshot(SnapshotKind::Tokens, &snap.id).await);

    let mut boot = boot(&fx, snapshots);
    let outcome = boot.run().await;

    assert!(!outcome.report.pass);
    assert_eq!(outcome.state, BootState::Recovered);
    assert_eq!(boot.state(), BootState::Recovered);
    assert_eq!(outcome.restored, [SnapshotKind::Tokens]);

    assert_eq!(fx.document.computed("--color-bg").as_deref(), Some("#111111"));
    let reloaded = fx.tokens.lock().unwrap().load();
    assert_eq!(reloaded.get("--color-bg").map(String::as_str), Some("#111111"));

    // The re-check only reports; the ghost entry is still missing.
    let recheck = outcome.recheck.unwrap().await.unwrap();
    assert!(!recheck.pass);
}

#[tokio::test]
async fn test_no_published_snapshot_degrades() {
    let fx = Fixture::new();
    break_catalog(&fx);

    let snapshots = Arc::new(SnapshotService::new(Some(MemoryRemote::default())));
    // Saved but never published.
    snapshots
        .save_snapshot(SnapshotKind::Tokens, json!({"--color-bg": "#111111"}), None)
        .await;

    let outcome = boot(&fx, snapshots).run().await;
    assert_eq!(outcome.state, BootState::Degraded);
    assert!(outcome.restored.is_empty());
    assert!(outcome.recheck.is_none());
    assert_eq!(fx.document.computed("--color-bg").as_deref(), Some("#ffffff"));
}

#[tokio::test]
async fn test_local_mode_failure_degrades() {
    let fx = Fixture::new();
    break_catalog(&fx);

    let outcome = boot(&fx, Arc::new(SnapshotService::<DbHandle>::new(None)))
        .run()
        .await;
    assert_eq!(outcome.state, BootState::Degraded);
}

#[tokio::test]
async fn test_catalog_recovery_overwrites_catalog_and_cache() {
    let fx = Fixture::new();
    let good = fx.catalog.read().unwrap().clone();
    break_catalog(&fx);

    let snapshots = Arc::new(SnapshotService::new(DbHandle::spawn(
        Storage::open_memory().unwrap(),
    )));
    let snap = snapshots
        .save_snapshot(SnapshotKind::Catalog, serde_json::to_value(&good).unwrap(), Some("good".into()))
        .await;
    snapshots.publish_snapshot(SnapshotKind::Catalog, &snap.id).await;

    let cache_kv = Arc::new(MemoryKv::new());
    let mut boot = boot(&fx, snapshots).with_catalog_cache(CatalogCache::new(cache_kv.clone()));
    let outcome = boot.run().await;

    assert_eq!(outcome.state, BootState::Recovered);
    assert_eq!(outcome.restored, [SnapshotKind::Catalog]);
    assert_eq!(*fx.catalog.read().unwrap(), good);
    assert_eq!(CatalogCache::new(cache_kv).load(), Some(good));

    let recheck = outcome.recheck.unwrap().await.unwrap();
    assert!(recheck.pass, "{}", recheck.summary());
}

#[tokio::test]
async fn test_one_kind_failing_does_not_block_another() {
    let fx = Fixture::new();
    let good = fx.catalog.read().unwrap().clone();
    break_catalog(&fx);

    let snapshots = Arc::new(SnapshotService::new(Some(MemoryRemote::default())));
    // A tokens payload with nothing valid in it cannot be restored.
    let tokens = snapshots
        .save_snapshot(SnapshotKind::Tokens, json!({"--space-md": "wide"}), None)
        .await;
    snapshots.publish_snapshot(SnapshotKind::Tokens, &tokens.id).await;
    let catalog = snapshots
        .save_snapshot(SnapshotKind::Catalog, serde_json::to_value(&good).unwrap(), None)
        .await;
    snapshots.publish_snapshot(SnapshotKind::Catalog, &catalog.id).await;

    let outcome = boot(&fx, snapshots).run().await;
    assert_eq!(outcome.state, BootState::Recovered);
    assert_eq!(outcome.restored, [SnapshotKind::Catalog]);
    assert_eq!(fx.tokens.lock().unwrap().get("--space-md"), Some("16px"));
}
