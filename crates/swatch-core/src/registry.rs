//! Component registry and catalog collaborators.
//!
//! The registry maps a component id to its implementation and metadata; the
//! catalog is the list of components surfaced in the console. Both are read
//! from a project manifest:
//!
//! ```toml
//! [[component]]
//! id = "button"
//! name = "Button"
//! category = "actions"
//! component = "function"
//! schema = { variant = "string" }
//! preview = { module = "previews/button.tsx", export = "ButtonPreview" }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::SwatchError;
use crate::kv::KeyValueStore;

/// Object markers that identify a component implementation.
pub const COMPONENT_MARKERS: &[&str] = &["$$typeof", "render"];

/// Key of the cached catalog in the local key-value store.
pub const CATALOG_CACHE_KEY: &str = "ds-catalog";

/// How a component is implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// A render function.
    Function,
    /// An object carrying one of [`COMPONENT_MARKERS`].
    Marked(String),
}

/// The registry's answer to "is this a component".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentRef {
    Renderable(ComponentKind),
    NotRenderable { reason: String },
}

impl ComponentRef {
    pub fn is_renderable(&self) -> bool {
        matches!(self, Self::Renderable(_))
    }
}

/// A lazily loaded preview module and the export it must provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewModule {
    pub module: String,
    pub export: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub id: String,
    pub component: ComponentRef,
    pub props_schema: Option<serde_json::Value>,
    pub preview: Option<PreviewModule>,
}

/// Component registry, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: RegistryEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    pub fn remove(&mut self, id: &str) -> Option<RegistryEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializable view for registry snapshots.
    pub fn describe(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .entries()
            .map(|e| {
                serde_json::json!({
                    "id": e.id,
                    "renderable": e.component.is_renderable(),
                    "has_schema": e.props_schema.is_some(),
                    "preview": e.preview,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    }
}

/// Shared registry handle. Read-only to the QA engine.
pub type SharedRegistry = Arc<RwLock<Registry>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The component list shown in the console.
pub type Catalog = Vec<CatalogEntry>;

/// Shared, replaceable catalog (recovery overwrites it).
pub type SharedCatalog = Arc<RwLock<Catalog>>;

/// Local cached copy of the catalog.
pub struct CatalogCache {
    store: Box<dyn KeyValueStore>,
}

impl CatalogCache {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Cached catalog, or `None` when absent or unreadable.
    pub fn load(&self) -> Option<Catalog> {
        let raw = self.store.read(CATALOG_CACHE_KEY)?;
        serde_json::from_str(&raw)
            .map_err(|e| tracing::warn!(error = %e, "Ignoring corrupt catalog cache"))
            .ok()
    }

    pub fn save(&self, catalog: &Catalog) -> Result<(), SwatchError> {
        let json = serde_json::to_string(catalog)?;
        self.store.write(CATALOG_CACHE_KEY, &json)
    }
}

/// Resolves a preview module and lists its exports.
pub trait ModuleResolver: Send + Sync {
    fn resolve(
        &self,
        module: &str,
    ) -> impl Future<Output = Result<Vec<String>, String>> + Send;
}

// ── Manifest ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    component: Vec<ManifestComponent>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestComponent {
    id: String,
    name: Option<String>,
    category: Option<String>,
    description: Option<String>,
    /// `function`, `object`, or absent.
    component: Option<String>,
    marker: Option<String>,
    schema: Option<serde_json::Value>,
    preview: Option<PreviewModule>,
    #[serde(default = "default_true")]
    listed: bool,
}

fn default_true() -> bool {
    true
}

/// Registry and catalog as declared by a project manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub registry: Registry,
    pub catalog: Catalog,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, SwatchError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a manifest. Without explicit `[[catalog]]` tables, the catalog
    /// lists every `listed` component.
    pub fn from_toml(content: &str) -> Result<Self, SwatchError> {
        let file: ManifestFile =
            toml::from_str(content).map_err(|e| SwatchError::Manifest(e.to_string()))?;

        let mut registry = Registry::new();
        let mut derived = Vec::new();
        for c in file.component {
            if c.listed {
                derived.push(CatalogEntry {
                    id: c.id.clone(),
                    name: c.name.clone().unwrap_or_else(|| c.id.clone()),
                    category: c.category.clone(),
                    description: c.description.clone(),
                });
            }
            registry.insert(RegistryEntry {
                component: component_ref(c.component.as_deref(), c.marker.as_deref()),
                id: c.id,
                props_schema: c.schema,
                preview: c.preview,
            });
        }

        let catalog = if file.catalog.is_empty() {
            derived
        } else {
            file.catalog
        };
        Ok(Self { registry, catalog })
    }
}

fn component_ref(kind: Option<&str>, marker: Option<&str>) -> ComponentRef {
    match (kind, marker) {
        (Some("function"), _) => ComponentRef::Renderable(ComponentKind::Function),
        (Some("object"), Some(m)) if COMPONENT_MARKERS.contains(&m) => {
            ComponentRef::Renderable(ComponentKind::Marked(m.to_string()))
        }
        (Some("object"), Some(m)) => ComponentRef::NotRenderable {
            reason: format!("unrecognized component marker `{m}`"),
        },
        (Some("object"), None) => ComponentRef::NotRenderable {
            reason: "object without a component marker".into(),
        },
        (Some(other), _) => ComponentRef::NotRenderable {
            reason: format!("`{other}` is not a component"),
        },
        (None, _) => ComponentRef::NotRenderable {
            reason: "no component reference".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;

    const MANIFEST: &str = r#"
        [[component]]
        id = "button"
        name = "Button"
        category = "actions"
        component = "function"
        schema = { variant = "string" }
        preview = { module = "previews/button.tsx", export = "ButtonPreview" }

        [[component]]
        id = "card"
        component = "object"
        marker = "$$typeof"

        [[component]]
        id = "legacy"
        component = "object"
        listed = false

        [[component]]
        id = "ghost"
    "#;

    #[test]
    fn test_manifest_builds_registry() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        let reg = &manifest.registry;
        assert_eq!(reg.len(), 4);

        let button = reg.get("button").unwrap();
        assert_eq!(button.component, ComponentRef::Renderable(ComponentKind::Function));
        assert_eq!(button.props_schema, Some(serde_json::json!({"variant": "string"})));
        assert_eq!(button.preview.as_ref().unwrap().export, "ButtonPreview");

        assert_eq!(
            reg.get("card").unwrap().component,
            ComponentRef::Renderable(ComponentKind::Marked("$$typeof".into()))
        );
        assert!(!reg.get("legacy").unwrap().component.is_renderable());
        assert!(!reg.get("ghost").unwrap().component.is_renderable());
    }

    #[test]
    fn test_catalog_derived_from_listed_components() {
        let manifest = Manifest::from_toml(MANIFEST).unwrap();
        let ids: Vec<&str> = manifest.catalog.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["button", "card", "ghost"]);
        assert_eq!(manifest.catalog[1].name, "card");
    }

    #[test]
    fn test_explicit_catalog_wins() {
        let manifest = Manifest::from_toml(
            r#"
            [[component]]
            id = "button"
            component = "function"

            [[catalog]]
            id = "tooltip"
            name = "Tooltip"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.catalog.len(), 1);
        assert_eq!(manifest.catalog[0].id, "tooltip");
    }

    #[test]
    fn test_invalid_manifest_is_an_error() {
        assert!(matches!(
            Manifest::from_toml("[[component]]\nname = 3"),
            Err(SwatchError::Manifest(_))
        ));
    }

    #[test]
    fn test_catalog_cache_roundtrip() {
        let cache = CatalogCache::new(MemoryKv::new());
        assert!(cache.load().is_none());

        let catalog = vec![CatalogEntry {
            id: "button".into(),
            name: "Button".into(),
            category: None,
            description: None,
        }];
        cache.save(&catalog).unwrap();
        assert_eq!(cache.load(), Some(catalog));
    }
}
