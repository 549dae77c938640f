use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a snapshot captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Tokens,
    Catalog,
    Registry,
    AppState,
}

impl SnapshotKind {
    pub const ALL: &[SnapshotKind] = &[Self::Tokens, Self::Catalog, Self::Registry, Self::AppState];

    /// Kinds the safety boot knows how to restore.
    pub const RECOVERABLE: &[SnapshotKind] = &[Self::Tokens, Self::Catalog];

    /// Database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Catalog => "catalog",
            Self::Registry => "registry",
            Self::AppState => "app_state",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "tokens" => Some(Self::Tokens),
            "catalog" => Some(Self::Catalog),
            "registry" => Some(Self::Registry),
            "app_state" => Some(Self::AppState),
            _ => None,
        }
    }
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db_str())
    }
}

impl std::str::FromStr for SnapshotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(&s.to_ascii_lowercase().replace('-', "_"))
            .ok_or_else(|| format!("unknown snapshot kind: {s}"))
    }
}

/// Immutable point-in-time capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub kind: SnapshotKind,
    pub data: serde_json::Value,
    #[serde(default)]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}
