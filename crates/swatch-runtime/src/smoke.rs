//! Smoke QA: a fixed battery of integrity checks against live console state.
//!
//! Checks run in a fixed order and each is guarded on its own; an internal
//! fault in one check becomes a `qa.systemError` item and the remaining
//! checks still run. Every run appends one audit record (scope `smoke`) from
//! a background task; the report never waits on it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinSet;

use swatch_api::RemoteStore;
use swatch_core::config::{DocumentConfig, QaConfig};
use swatch_core::dom::Document;
use swatch_core::models::AuditStatus;
use swatch_core::qa::{QaItem, QaReport};
use swatch_core::registry::{ComponentRef, ModuleResolver, SharedCatalog, SharedRegistry};
use swatch_core::tokens::{SharedTokenStore, TokenMap};

use crate::snapshot::SnapshotService;

pub const CHECK_CATALOG: &str = "registry.catalog";
pub const CHECK_RENDERABLE: &str = "registry.renderable";
pub const CHECK_SCHEMAS: &str = "registry.schemas";
pub const CHECK_TOKENS: &str = "tokens.roundTrip";
pub const CHECK_IMPORTS: &str = "imports.preview";
pub const CHECK_DOM: &str = "dom.critical";
pub const CHECK_THEME: &str = "theme.integrity";
pub const SYSTEM_ERROR: &str = "qa.systemError";

/// Audit scope of smoke runs.
pub const AUDIT_SCOPE: &str = "smoke";

/// Token writes exercised by the round-trip check.
pub const PROBE_TOKENS: &[(&str, &str)] = &[("--color-primary", "#3366ff"), ("--space-md", "12px")];

/// Unexpected failure inside a check (as opposed to a failed check).
#[derive(Debug, thiserror::Error)]
enum Fault {
    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}

type CheckResult = Result<QaItem, Fault>;

pub struct SmokeQa<R, M> {
    tokens: SharedTokenStore,
    document: Arc<dyn Document>,
    registry: SharedRegistry,
    catalog: SharedCatalog,
    resolver: M,
    snapshots: Arc<SnapshotService<R>>,
    document_config: DocumentConfig,
    qa_config: QaConfig,
    audits: Mutex<JoinSet<()>>,
}

impl<R: RemoteStore + 'static, M: ModuleResolver> SmokeQa<R, M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tokens: SharedTokenStore,
        document: Arc<dyn Document>,
        registry: SharedRegistry,
        catalog: SharedCatalog,
        resolver: M,
        snapshots: Arc<SnapshotService<R>>,
        document_config: DocumentConfig,
        qa_config: QaConfig,
    ) -> Self {
        Self {
            tokens,
            document,
            registry,
            catalog,
            resolver,
            snapshots,
            document_config,
            qa_config,
            audits: Mutex::new(JoinSet::new()),
        }
    }

    /// Run every check, then hand the audit write to a background task.
    #[tracing::instrument(name = "smoke_qa", skip(self))]
    pub async fn run(&self) -> QaReport {
        let mut items = Vec::with_capacity(7);

        items.push(guard(CHECK_CATALOG, self.check_catalog()));
        items.push(guard(CHECK_RENDERABLE, self.check_renderable()));
        items.push(guard(CHECK_SCHEMAS, self.check_schemas()));
        items.push(guard(CHECK_TOKENS, self.check_token_round_trip()));
        items.push(guard(CHECK_IMPORTS, self.check_imports().await));
        items.push(guard(CHECK_DOM, Ok(self.check_dom())));
        items.push(guard(CHECK_THEME, Ok(self.check_theme())));

        let report = QaReport::new(items);
        if report.pass {
            tracing::info!(summary = %report.summary(), "Smoke QA passed");
        } else {
            tracing::warn!(summary = %report.summary(), "Smoke QA failed");
        }

        self.spawn_audit(AuditStatus::from_pass(report.pass), report.items.clone());
        report
    }

    /// Wait for audit writes still in flight. Each is bounded by
    /// `[qa] audit_timeout_ms`; pending writes are aborted when the runner
    /// is dropped.
    pub async fn settle_audits(&self) {
        let mut pending = match self.audits.lock() {
            Ok(mut audits) => std::mem::take(&mut *audits),
            Err(_) => return,
        };
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Audit task failed");
            }
        }
    }

    fn spawn_audit(&self, status: AuditStatus, items: Vec<QaItem>) {
        let snapshots = Arc::clone(&self.snapshots);
        let limit = Duration::from_millis(self.qa_config.audit_timeout_ms);
        let write = async move {
            let record = snapshots.record_audit(AUDIT_SCOPE, status, items);
            if tokio::time::timeout(limit, record).await.is_err() {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "Audit write timed out, dropped");
            }
        };

        match self.audits.lock() {
            Ok(mut audits) => {
                while audits.try_join_next().is_some() {}
                audits.spawn(write);
            }
            Err(_) => {
                tokio::spawn(write);
            }
        }
    }

    /// Every catalog entry must map to a renderable registry entry.
    fn check_catalog(&self) -> CheckResult {
        let registry = self.registry.read().map_err(|_| Fault::Poisoned("registry"))?;
        let catalog = self.catalog.read().map_err(|_| Fault::Poisoned("catalog"))?;

        let failing: Vec<&str> = catalog
            .iter()
            .filter(|entry| {
                !registry
                    .get(&entry.id)
                    .is_some_and(|r| r.component.is_renderable())
            })
            .map(|entry| entry.id.as_str())
            .collect();

        Ok(if failing.is_empty() {
            QaItem::pass(CHECK_CATALOG)
        } else {
            QaItem::fail(
                CHECK_CATALOG,
                format!("missing or not renderable: {}", failing.join(", ")),
            )
        })
    }

    fn check_renderable(&self) -> CheckResult {
        let registry = self.registry.read().map_err(|_| Fault::Poisoned("registry"))?;

        let broken: Vec<String> = registry
            .entries()
            .filter_map(|e| match &e.component {
                ComponentRef::Renderable(_) => None,
                ComponentRef::NotRenderable { reason } => Some(format!("{} ({reason})", e.id)),
            })
            .collect();

        Ok(if broken.is_empty() {
            QaItem::pass(CHECK_RENDERABLE)
        } else {
            QaItem::fail(CHECK_RENDERABLE, broken.join(", "))
        })
    }

    /// Advisory: lists entries without a props schema.
    fn check_schemas(&self) -> CheckResult {
        let registry = self.registry.read().map_err(|_| Fault::Poisoned("registry"))?;

        let missing: Vec<&str> = registry
            .entries()
            .filter(|e| e.props_schema.is_none())
            .map(|e| e.id.as_str())
            .collect();

        let note = (!missing.is_empty()).then(|| format!("no props schema: {}", missing.join(", ")));
        Ok(QaItem::advisory(CHECK_SCHEMAS, note))
    }

    /// Write the probe tokens, read them back, then restore prior values.
    fn check_token_round_trip(&self) -> CheckResult {
        let mut store = self.tokens.lock().map_err(|_| Fault::Poisoned("token store"))?;
        let prior: TokenMap = store.load();
        let mut problems = Vec::new();

        for (name, value) in PROBE_TOKENS {
            let outcome = store.set(name, value);
            if let Some(reason) = outcome.rejection() {
                problems.push(format!("{name} rejected: {reason}"));
                continue;
            }
            match self.document.computed(name) {
                Some(rendered) if rendered == *value => {}
                Some(rendered) => problems.push(format!("{name} renders `{rendered}`, expected `{value}`")),
                None => problems.push(format!("{name} not rendered")),
            }
        }

        for (name, _) in PROBE_TOKENS {
            if let Err(e) = store.revert(name, prior.get(*name).map(String::as_str)) {
                problems.push(format!("{name} not reverted: {e}"));
            }
        }

        Ok(if problems.is_empty() {
            QaItem::pass(CHECK_TOKENS)
        } else {
            QaItem::fail(CHECK_TOKENS, problems.join("; "))
        })
    }

    /// Resolve a bounded sample of preview modules concurrently.
    async fn check_imports(&self) -> CheckResult {
        let sample: Vec<(String, String, String)> = {
            let registry = self.registry.read().map_err(|_| Fault::Poisoned("registry"))?;
            registry
                .entries()
                .filter_map(|e| {
                    e.preview
                        .as_ref()
                        .map(|p| (e.id.clone(), p.module.clone(), p.export.clone()))
                })
                .take(self.qa_config.import_sample)
                .collect()
        };

        if sample.is_empty() {
            return Ok(QaItem::pass(CHECK_IMPORTS).with_note("no preview modules declared"));
        }

        let timeout = Duration::from_millis(self.qa_config.import_timeout_ms);
        let attempts = sample.iter().map(|(id, module, export)| async move {
            match tokio::time::timeout(timeout, self.resolver.resolve(module)).await {
                Ok(Ok(exports)) if exports.iter().any(|e| e == export) => None,
                Ok(Ok(_)) => Some(format!("{id}: `{module}` has no export `{export}`")),
                Ok(Err(e)) => Some(format!("{id}: {e}")),
                Err(_) => Some(format!("{id}: `{module}` timed out after {}ms", timeout.as_millis())),
            }
        });
        let failures: Vec<String> = join_all(attempts).await.into_iter().flatten().collect();

        Ok(if failures.is_empty() {
            QaItem::pass(CHECK_IMPORTS).with_note(format!("{} module(s) resolved", sample.len()))
        } else {
            QaItem::fail(CHECK_IMPORTS, failures.join("; "))
        })
    }

    fn check_dom(&self) -> QaItem {
        let missing: Vec<&str> = self
            .document_config
            .required_selectors
            .iter()
            .filter(|s| !self.document.exists(s))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            QaItem::pass(CHECK_DOM)
        } else {
            QaItem::fail(CHECK_DOM, format!("missing: {}", missing.join(", ")))
        }
    }

    /// Root carries a theme attribute and a non-empty background token.
    fn check_theme(&self) -> QaItem {
        let cfg = &self.document_config;
        let theme = self
            .document
            .attribute(&cfg.root_selector, &cfg.theme_attribute)
            .filter(|t| !t.trim().is_empty());
        let background = self
            .document
            .computed(&cfg.background_token)
            .filter(|v| !v.trim().is_empty());

        match (theme, background) {
            (Some(theme), Some(_)) => QaItem::pass(CHECK_THEME).with_note(format!("theme `{theme}`")),
            (None, _) => QaItem::fail(
                CHECK_THEME,
                format!("{} has no `{}` attribute", cfg.root_selector, cfg.theme_attribute),
            ),
            (Some(_), None) => QaItem::fail(
                CHECK_THEME,
                format!("`{}` resolves to nothing", cfg.background_token),
            ),
        }
    }
}

fn guard(check: &str, result: CheckResult) -> QaItem {
    result.unwrap_or_else(|fault| {
        tracing::error!(check, %fault, "Smoke check faulted");
        QaItem::fail(SYSTEM_ERROR, format!("{check}: {fault}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_converts_faults() {
        let item = guard(CHECK_TOKENS, Err(Fault::Poisoned("token store")));
        assert_eq!(item.name, SYSTEM_ERROR);
        assert!(!item.ok);
        assert_eq!(item.note.as_deref(), Some("tokens.roundTrip: token store lock poisoned"));

        let item = guard(CHECK_DOM, Ok(QaItem::pass(CHECK_DOM)));
        assert_eq!(item, QaItem::pass(CHECK_DOM));
    }
}
