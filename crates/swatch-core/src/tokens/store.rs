use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{default_tokens, normalize_value, to_css, Rejection, TokenMap};
use crate::config::TokensConfig;
use crate::dom::Document;
use crate::error::SwatchError;
use crate::kv::KeyValueStore;

/// Capacity of the change broadcast; slow observers see `Lagged` and resync.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Notification fired on every successful token mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenChange {
    Set { name: String, value: String },
    Removed { name: String },
    Reset,
    Restored,
}

/// Result of a token write.
///
/// Callers that only want the map use [`SetOutcome::into_tokens`]; a
/// rejected write hands back the unchanged map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    Applied(TokenMap),
    Rejected { reason: Rejection, tokens: TokenMap },
}

impl SetOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected { reason, .. } => Some(reason),
        }
    }

    pub fn into_tokens(self) -> TokenMap {
        match self {
            Self::Applied(tokens) | Self::Rejected { tokens, .. } => tokens,
        }
    }
}

/// Owner of the live token map and its persisted copy.
pub struct TokenStore {
    storage_key: String,
    scope_selector: String,
    persistence: Box<dyn KeyValueStore>,
    document: Arc<dyn Document>,
    tokens: TokenMap,
    changes: broadcast::Sender<TokenChange>,
}

/// Thread-safe handle to the token store.
pub type SharedTokenStore = Arc<Mutex<TokenStore>>;

impl TokenStore {
    /// Create a store and hydrate it from persistence.
    ///
    /// Nothing is written to the document until [`TokenStore::apply`].
    pub fn new(
        config: &TokensConfig,
        persistence: impl KeyValueStore + 'static,
        document: Arc<dyn Document>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let mut store = Self {
            storage_key: config.storage_key.clone(),
            scope_selector: config.scope_selector.clone(),
            persistence: Box::new(persistence),
            document,
            tokens: TokenMap::new(),
            changes,
        };
        store.load();
        store
    }

    /// Wrap the store in a shared handle.
    pub fn into_shared(self) -> SharedTokenStore {
        Arc::new(Mutex::new(self))
    }

    /// Persisted tokens merged over the defaults.
    ///
    /// Corrupt persisted data falls back to the defaults alone; persisted
    /// entries that fail validation are dropped so their default applies.
    pub fn load(&mut self) -> TokenMap {
        let mut tokens = default_tokens();
        if let Some(raw) = self.persistence.read(&self.storage_key) {
            match serde_json::from_str::<TokenMap>(&raw) {
                Ok(persisted) => {
                    for (name, raw) in persisted {
                        match normalize_value(&name, &raw) {
                            Ok(value) => {
                                tokens.insert(name, value);
                            }
                            Err(reason) => {
                                tracing::warn!(token = %name, %reason, "Dropping invalid persisted token");
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, key = %self.storage_key, "Ignoring corrupt persisted tokens");
                }
            }
        }
        self.tokens = tokens.clone();
        tokens
    }

    /// The in-memory map as of the last load or write.
    pub fn stored(&self) -> &TokenMap {
        &self.tokens
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.tokens.get(name).map(String::as_str)
    }

    pub fn document(&self) -> &Arc<dyn Document> {
        &self.document
    }

    /// Validate, persist and apply a single token.
    ///
    /// Rejected values leave the map, the persisted copy and the document
    /// untouched.
    pub fn set(&mut self, name: &str, raw: &str) -> SetOutcome {
        let current = self.load();
        let name = name.trim();

        let value = match normalize_value(name, raw) {
            Ok(value) => value,
            Err(reason) => {
                tracing::warn!(token = name, %reason, "Rejected token write");
                return SetOutcome::Rejected {
                    reason,
                    tokens: current,
                };
            }
        };

        let mut next = current.clone();
        next.insert(name.to_string(), value.clone());
        if let Err(e) = self.persist(&next) {
            tracing::warn!(token = name, error = %e, "Failed to persist token write");
            return SetOutcome::Rejected {
                reason: Rejection::Persistence(e.to_string()),
                tokens: current,
            };
        }

        self.document.set_property(name, &value);
        self.tokens = next.clone();
        let _ = self.changes.send(TokenChange::Set {
            name: name.to_string(),
            value,
        });
        SetOutcome::Applied(next)
    }

    /// Put `name` back to a value previously read from this store, or drop
    /// it when `previous` is `None`. The value is not re-validated.
    pub fn revert(&mut self, name: &str, previous: Option<&str>) -> Result<(), SwatchError> {
        let mut next = self.load();
        match previous {
            Some(value) => {
                next.insert(name.to_string(), value.to_string());
            }
            None => {
                next.remove(name);
            }
        }
        self.persist(&next)?;

        match previous {
            Some(value) => self.document.set_property(name, value),
            None => self.document.remove_property(name),
        }
        self.tokens = next;
        let _ = self.changes.send(match previous {
            Some(value) => TokenChange::Set {
                name: name.to_string(),
                value: value.to_string(),
            },
            None => TokenChange::Removed {
                name: name.to_string(),
            },
        });
        Ok(())
    }

    /// Write every token onto the document in one pass.
    pub fn apply(&self, tokens: &TokenMap) {
        self.document.set_properties(tokens);
    }

    /// Restore, persist and re-apply the default map.
    pub fn reset(&mut self) -> TokenMap {
        let defaults = default_tokens();
        if let Err(e) = self.persist(&defaults) {
            tracing::warn!(error = %e, "Failed to persist token reset");
        }
        for name in self.tokens.keys() {
            if !defaults.contains_key(name) {
                self.document.remove_property(name);
            }
        }
        self.apply(&defaults);
        self.tokens = defaults.clone();
        let _ = self.changes.send(TokenChange::Reset);
        defaults
    }

    /// Replace the persisted map with a captured one and apply it.
    ///
    /// Entries that fail validation are skipped. Fails if the payload holds
    /// no valid entry or cannot be persisted.
    pub fn restore(&mut self, captured: &TokenMap) -> Result<TokenMap, SwatchError> {
        let mut accepted = TokenMap::new();
        for (name, raw) in captured {
            match normalize_value(name, raw) {
                Ok(value) => {
                    accepted.insert(name.trim().to_string(), value);
                }
                Err(reason) => {
                    tracing::warn!(token = %name, %reason, "Skipping invalid token in snapshot");
                }
            }
        }
        if accepted.is_empty() && !captured.is_empty() {
            return Err(SwatchError::Config(
                "snapshot holds no valid tokens".into(),
            ));
        }

        self.persist(&accepted)?;
        let previous = std::mem::take(&mut self.tokens);
        let tokens = self.load();
        for name in previous.keys() {
            if !tokens.contains_key(name) {
                self.document.remove_property(name);
            }
        }
        self.apply(&tokens);
        let _ = self.changes.send(TokenChange::Restored);
        Ok(tokens)
    }

    /// Rendered values as a CSS block on the scoping selector.
    pub fn export_css(&self) -> String {
        to_css(&self.scope_selector, &self.rendered())
    }

    /// Rendered values as a JSON object.
    pub fn export_json(&self) -> Result<String, SwatchError> {
        Ok(serde_json::to_string_pretty(&self.rendered())?)
    }

    /// What the document actually resolves for each stored token, falling
    /// back to the stored value when nothing is computed.
    pub fn rendered(&self) -> TokenMap {
        self.tokens
            .iter()
            .map(|(name, stored)| {
                let value = self
                    .document
                    .computed(name)
                    .unwrap_or_else(|| stored.clone());
                (name.clone(), value)
            })
            .collect()
    }

    /// Subscribe to change notifications. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenChange> {
        self.changes.subscribe()
    }

    fn persist(&self, tokens: &TokenMap) -> Result<(), SwatchError> {
        let json = serde_json::to_string(tokens)?;
        self.persistence.write(&self.storage_key, &json)
    }
}
