//! Token surface policy: which custom properties a component may consume.
//!
//! Every component may use the global design tokens plus tokens under its
//! own prefixes. Anything else is a violation, and violations come with
//! suggested replacements.

mod suggest;

pub use suggest::{Confidence, Suggestion};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::SwatchError;

const DEFAULT_SURFACES: &str = include_str!("../../../../config/surfaces.toml");

/// File extensions considered by [`scan_dir`].
const SOURCE_EXTENSIONS: &[&str] = &["css", "scss", "tsx", "jsx", "ts", "js", "vue", "svelte"];

/// `var(--x)` references and quoted `"--x"` names.
static RE_TOKEN_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:var\(\s*|["'])(--[A-Za-z][A-Za-z0-9_-]*)"#).unwrap()
});

#[derive(Debug, Clone, Deserialize)]
struct SurfacesFile {
    global: Vec<String>,
    #[serde(default)]
    components: BTreeMap<String, Vec<String>>,
}

/// Allowed token prefixes, global and per component.
#[derive(Debug, Clone)]
pub struct SurfacePolicy {
    global: BTreeSet<String>,
    /// Keyed by lowercased component id.
    components: BTreeMap<String, Vec<String>>,
    known_tokens: Vec<String>,
}

impl SurfacePolicy {
    /// The built-in policy.
    pub fn builtin() -> Result<Self, SwatchError> {
        Self::from_toml(DEFAULT_SURFACES)
    }

    pub fn from_toml(content: &str) -> Result<Self, SwatchError> {
        let file: SurfacesFile =
            toml::from_str(content).map_err(|e| SwatchError::Config(e.to_string()))?;
        Ok(Self {
            global: file.global.into_iter().collect(),
            components: file
                .components
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            known_tokens: crate::tokens::default_tokens().into_keys().collect(),
        })
    }

    /// Prefixes `component` may consume: its own plus the global set.
    pub fn allowed_prefixes(&self, component: &str) -> BTreeSet<String> {
        let mut allowed = self.global.clone();
        allowed.extend(self.own_prefixes(component).iter().cloned());
        allowed
    }

    fn own_prefixes(&self, component: &str) -> &[String] {
        self.components
            .get(&component.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `token` falls under one of the component's allowed prefixes.
    pub fn is_allowed(&self, component: &str, token: &str) -> bool {
        self.allowed_prefixes(component)
            .iter()
            .any(|p| token.starts_with(p.as_str()) || token == p.trim_end_matches('-'))
    }

    /// Inspect a component's source for token usage.
    pub fn analyze(&self, component: &str, source: &str) -> SurfaceAnalysis {
        let used_tokens = extract_tokens(source);
        let violations: Vec<String> = used_tokens
            .iter()
            .filter(|t| !self.is_allowed(component, t))
            .cloned()
            .collect();

        let own = self.own_prefixes(component).first().map(String::as_str);
        let suggestions = violations
            .iter()
            .flat_map(|t| suggest::suggest(t, own, &self.known_tokens))
            .collect();

        let cleanliness_score = if used_tokens.is_empty() {
            1.0
        } else {
            (used_tokens.len() - violations.len()) as f64 / used_tokens.len() as f64
        };

        SurfaceAnalysis {
            component: component.to_string(),
            used_tokens,
            violations,
            suggestions,
            cleanliness_score,
        }
    }
}

/// Custom properties referenced by `source`, deduplicated in first-seen order.
pub fn extract_tokens(source: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    RE_TOKEN_USE
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceAnalysis {
    pub component: String,
    pub used_tokens: Vec<String>,
    pub violations: Vec<String>,
    pub suggestions: Vec<Suggestion>,
    /// Share of used tokens that are allowed, in `[0, 1]`.
    pub cleanliness_score: f64,
}

impl SurfaceAnalysis {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Aggregate over several analyses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceHealth {
    pub components: usize,
    pub used_tokens: usize,
    pub violations: usize,
    pub average_score: f64,
    /// Components with violations, lowest score first.
    pub worst: Vec<(String, f64)>,
}

pub fn health(analyses: &[SurfaceAnalysis]) -> SurfaceHealth {
    let average_score = if analyses.is_empty() {
        1.0
    } else {
        analyses.iter().map(|a| a.cleanliness_score).sum::<f64>() / analyses.len() as f64
    };

    let mut worst: Vec<(String, f64)> = analyses
        .iter()
        .filter(|a| !a.is_clean())
        .map(|a| (a.component.clone(), a.cleanliness_score))
        .collect();
    worst.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    SurfaceHealth {
        components: analyses.len(),
        used_tokens: analyses.iter().map(|a| a.used_tokens.len()).sum(),
        violations: analyses.iter().map(|a| a.violations.len()).sum(),
        average_score,
        worst,
    }
}

/// Analyze every source file under `root`. The component id is the file
/// name up to its first dot (`Button.module.css` → `Button`).
pub fn scan_dir(policy: &SurfacePolicy, root: &Path) -> Result<Vec<SurfaceAnalysis>, SwatchError> {
    let mut analyses = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let is_source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !is_source {
            continue;
        }
        let Some(component) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .filter(|n| !n.is_empty())
        else {
            continue;
        };

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };
        analyses.push(policy.analyze(component, &source));
    }

    analyses.sort_by(|a, b| a.component.cmp(&b.component));
    tracing::debug!(files = analyses.len(), root = %root.display(), "Surface scan complete");
    Ok(analyses)
}
