use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use swatch_core::registry::ModuleResolver;

static RE_EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*export\s+(?:declare\s+)?(?:async\s+)?(?:function\*?|const|let|var|class|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    )
    .unwrap()
});

static RE_EXPORT_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\s+default\b").unwrap());

static RE_EXPORT_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*export\s*(?:type\s*)?\{([^}]*)\}").unwrap());

/// Resolves preview modules from files under a root directory.
#[derive(Debug, Clone)]
pub struct FsModuleResolver {
    root: PathBuf,
}

impl FsModuleResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, module: &str) -> Result<PathBuf, String> {
        let relative = Path::new(module.trim_start_matches("./"));
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(format!("module `{module}` escapes the preview root"));
        }
        Ok(self.root.join(relative))
    }
}

impl ModuleResolver for FsModuleResolver {
    async fn resolve(&self, module: &str) -> Result<Vec<String>, String> {
        let path = self.locate(module)?;
        let source = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("cannot load `{module}`: {e}"))?;
        Ok(scan_exports(&source))
    }
}

/// Names exported by an ES module source, in declaration order.
pub fn scan_exports(source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for cap in RE_EXPORT_DECL.captures_iter(source) {
        push(&cap[1]);
    }
    for cap in RE_EXPORT_LIST.captures_iter(source) {
        for spec in cap[1].split(',') {
            // `a as b` exports `b`.
            let exported = spec.rsplit(" as ").next().unwrap_or(spec).trim();
            push(exported);
        }
    }
    if RE_EXPORT_DEFAULT.is_match(source) {
        push("default");
    }
    names
}
