//! The document the token store materializes custom properties onto.
//!
//! [`Document`] is the seam between the token runtime and whatever renders
//! it. [`VirtualDocument`] is a headless implementation: a set of mounted
//! elements with attributes, the inline custom properties written on the
//! scoping element, and an external stylesheet layer that can override them.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::config::DocumentConfig;
use crate::tokens::TokenMap;

/// Sink and inspector for custom properties and critical DOM nodes.
pub trait Document: Send + Sync {
    /// Write one custom property onto the scoping element.
    fn set_property(&self, name: &str, value: &str);

    /// Write every entry onto the scoping element in a single pass.
    fn set_properties(&self, tokens: &TokenMap);

    /// Remove a custom property from the scoping element.
    fn remove_property(&self, name: &str);

    /// The value the document actually resolves for `name`, if non-empty.
    fn computed(&self, name: &str) -> Option<String>;

    /// Whether an element matching `selector` is present.
    fn exists(&self, selector: &str) -> bool;

    /// Attribute value on the first element matching `selector`.
    fn attribute(&self, selector: &str, attr: &str) -> Option<String>;
}

#[derive(Debug, Default)]
struct DocState {
    elements: BTreeMap<String, BTreeMap<String, String>>,
    inline: TokenMap,
    overrides: TokenMap,
    batches: u64,
}

/// In-process document.
#[derive(Debug, Default)]
pub struct VirtualDocument {
    state: Mutex<DocState>,
}

impl VirtualDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// A document with the application root mounted and themed.
    pub fn mount_app(config: &DocumentConfig) -> Self {
        let doc = Self::new();
        doc.mount(
            &config.root_selector,
            [(config.theme_attribute.as_str(), config.theme.as_str())],
        );
        doc
    }

    fn state(&self) -> MutexGuard<'_, DocState> {
        // A poisoned lock only means a writer panicked mid-update; the maps
        // are still structurally valid.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mount an element addressed by `selector` with the given attributes.
    pub fn mount<'a>(&self, selector: &str, attrs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state().elements.insert(selector.to_string(), attrs);
    }

    /// Remove a mounted element.
    pub fn unmount(&self, selector: &str) {
        self.state().elements.remove(selector);
    }

    /// Set or replace an attribute on a mounted element.
    pub fn set_attribute(&self, selector: &str, attr: &str, value: &str) {
        if let Some(attrs) = self.state().elements.get_mut(selector) {
            attrs.insert(attr.to_string(), value.to_string());
        }
    }

    /// Drop an attribute from a mounted element.
    pub fn remove_attribute(&self, selector: &str, attr: &str) {
        if let Some(attrs) = self.state().elements.get_mut(selector) {
            attrs.remove(attr);
        }
    }

    /// Simulate an external stylesheet overriding a custom property.
    pub fn override_property(&self, name: &str, value: &str) {
        self.state()
            .overrides
            .insert(name.to_string(), value.to_string());
    }

    /// The value written inline on the scoping element, ignoring overrides.
    pub fn inline(&self, name: &str) -> Option<String> {
        self.state().inline.get(name).cloned()
    }

    /// Number of write passes performed so far.
    pub fn batches(&self) -> u64 {
        self.state().batches
    }
}

impl Document for VirtualDocument {
    fn set_property(&self, name: &str, value: &str) {
        let mut state = self.state();
        state.inline.insert(name.to_string(), value.to_string());
        state.batches += 1;
    }

    fn set_properties(&self, tokens: &TokenMap) {
        let mut state = self.state();
        for (name, value) in tokens {
            state.inline.insert(name.clone(), value.clone());
        }
        state.batches += 1;
    }

    fn remove_property(&self, name: &str) {
        self.state().inline.remove(name);
    }

    fn computed(&self, name: &str) -> Option<String> {
        let state = self.state();
        state
            .overrides
            .get(name)
            .or_else(|| state.inline.get(name))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn exists(&self, selector: &str) -> bool {
        let state = self.state();
        find(&state, selector).is_some()
    }

    fn attribute(&self, selector: &str, attr: &str) -> Option<String> {
        let state = self.state();
        find(&state, selector).and_then(|attrs| attrs.get(attr).cloned())
    }
}

static EMPTY_ATTRS: BTreeMap<String, String> = BTreeMap::new();

/// Resolve a selector against mounted elements.
///
/// Supports `:root`/`html`, exact keys (`#root`, `.app`), and attribute
/// selectors (`[data-theme]`, `[data-theme="dark"]`).
fn find<'s>(state: &'s DocState, selector: &str) -> Option<&'s BTreeMap<String, String>> {
    let selector = selector.trim();
    if matches!(selector, ":root" | "html") {
        return Some(state.elements.get(selector).unwrap_or(&EMPTY_ATTRS));
    }
    if let Some(inner) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let (attr, expected) = match inner.split_once('=') {
            Some((a, v)) => (a.trim(), Some(v.trim().trim_matches(['"', '\'']))),
            None => (inner.trim(), None),
        };
        return state.elements.values().find(|attrs| match (attrs.get(attr), expected) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        });
    }
    state.elements.get(selector)
}
