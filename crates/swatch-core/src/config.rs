use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SwatchError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Environment variable overriding `[remote] url`.
pub const REMOTE_URL_ENV: &str = "SWATCH_REMOTE_URL";
/// Environment variable overriding `[remote] api_key`.
pub const REMOTE_KEY_ENV: &str = "SWATCH_REMOTE_KEY";

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tokens: TokensConfig,
    pub document: DocumentConfig,
    pub qa: QaConfig,
    pub remote: RemoteConfig,
    pub project: ProjectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub app_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    pub storage_key: String,
    pub scope_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub root_selector: String,
    pub theme_attribute: String,
    pub theme: String,
    pub required_selectors: Vec<String>,
    pub background_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    pub import_sample: usize,
    pub import_timeout_ms: u64,
    pub recheck_delay_ms: u64,
    /// Upper bound on one background audit write.
    #[serde(default = "default_audit_timeout_ms")]
    pub audit_timeout_ms: u64,
}

fn default_audit_timeout_ms() -> u64 {
    5000
}

/// Which remote store backs snapshots and audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    #[default]
    None,
    Rest,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub backend: RemoteBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub manifest: PathBuf,
    pub preview_root: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
}

impl RemoteConfig {
    /// Validated REST endpoint, if the rest backend has everything it needs.
    pub fn rest_endpoint(&self) -> Option<(url::Url, String)> {
        if self.backend != RemoteBackend::Rest {
            return None;
        }
        let raw = self.url.as_deref()?.trim();
        let key = self.api_key.as_deref()?.trim();
        if raw.is_empty() || key.is_empty() {
            return None;
        }
        match url::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some((url, key.to_string())),
            Ok(url) => {
                tracing::warn!(scheme = url.scheme(), "Unsupported remote URL scheme");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Invalid remote URL");
                None
            }
        }
    }
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults,
    /// then environment overrides for the remote store.
    pub fn load() -> Result<Self, SwatchError> {
        let user_path = Self::config_path();
        let mut config = if user_path.exists() {
            let user_str = std::fs::read_to_string(&user_path)?;
            toml::from_str(&user_str).map_err(|e| SwatchError::Config(e.to_string()))?
        } else {
            toml::from_str(DEFAULT_CONFIG).map_err(|e| SwatchError::Config(e.to_string()))?
        };
        Self::apply_env(&mut config);
        Ok(config)
    }

    /// Load config from an explicit path, without the user-file lookup.
    pub fn load_from(path: &std::path::Path) -> Result<Self, SwatchError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig =
            toml::from_str(&content).map_err(|e| SwatchError::Config(e.to_string()))?;
        Self::apply_env(&mut config);
        Ok(config)
    }

    fn apply_env(config: &mut AppConfig) {
        if let Ok(url) = std::env::var(REMOTE_URL_ENV) {
            config.remote.url = Some(url);
            if config.remote.backend == RemoteBackend::None {
                config.remote.backend = RemoteBackend::Rest;
            }
        }
        if let Ok(key) = std::env::var(REMOTE_KEY_ENV) {
            config.remote.api_key = Some(key);
        }
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), SwatchError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SwatchError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the database file.
    pub fn db_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join("swatch.db"))
            .unwrap_or_else(|| PathBuf::from("swatch.db"))
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, SwatchError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "swatch")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.tokens.storage_key, "ds-tokens");
        assert_eq!(config.document.background_token, "--color-bg");
        assert_eq!(config.qa.import_sample, 8);
        assert_eq!(config.remote.backend, RemoteBackend::None);
        assert!(config.logging.directory.is_none());
        assert_eq!(config.qa.audit_timeout_ms, 5000);
    }

    #[test]
    fn test_audit_timeout_defaults_when_absent() {
        let qa: QaConfig = toml::from_str(
            "import_sample = 4\nimport_timeout_ms = 100\nrecheck_delay_ms = 10\n",
        )
        .unwrap();
        assert_eq!(qa.audit_timeout_ms, 5000);
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(
            deserialized.document.required_selectors,
            config.document.required_selectors
        );
    }

    #[test]
    fn test_rest_endpoint_requires_url_and_key() {
        let mut remote = RemoteConfig {
            backend: RemoteBackend::Rest,
            url: Some("https://example.supabase.co".into()),
            api_key: None,
        };
        assert!(remote.rest_endpoint().is_none());

        remote.api_key = Some("anon".into());
        let (url, key) = remote.rest_endpoint().unwrap();
        assert_eq!(url.host_str(), Some("example.supabase.co"));
        assert_eq!(key, "anon");

        remote.url = Some("not a url".into());
        assert!(remote.rest_endpoint().is_none());

        remote.url = Some("https://example.supabase.co".into());
        remote.backend = RemoteBackend::None;
        assert!(remote.rest_endpoint().is_none());
    }
}
