//! Action type registry: owner-scoped catalogue of loggable actions
//!
//! Populated at startup via explicit registration calls. Entries are never
//! persisted or pruned; registering an existing `(owner, key)` pair replaces
//! its label and description.

use crate::error::{ActivityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A registered category of loggable action, scoped to one owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionType {
    pub owner: String,
    pub type_key: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

/// In-memory registry keyed by owner, then action key
#[derive(Default)]
pub struct ActionTypeRegistry {
    types: RwLock<BTreeMap<String, BTreeMap<String, ActionType>>>,
}

impl ActionTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) an action type
    ///
    /// Owner and key are validated here so that bad keys fail at startup
    /// rather than at log time.
    pub fn register_action_type(
        &self,
        owner: &str,
        type_key: &str,
        label: &str,
        description: &str,
    ) -> Result<()> {
        validate_slug("owner", owner)?;
        validate_slug("action type", type_key)?;

        let action = ActionType {
            owner: owner.to_string(),
            type_key: type_key.to_string(),
            label: label.to_string(),
            description: description.to_string(),
        };

        let mut types = self.types.write().map_err(|e| {
            ActivityError::Config(format!("Action type registry lock poisoned: {}", e))
        })?;
        let replaced = types
            .entry(owner.to_string())
            .or_default()
            .insert(type_key.to_string(), action)
            .is_some();

        tracing::debug!(owner, type_key, replaced, "Action type registered");
        Ok(())
    }

    /// Look up a single action type
    pub fn get(&self, owner: &str, type_key: &str) -> Option<ActionType> {
        let types = self.types.read().ok()?;
        types.get(owner).and_then(|m| m.get(type_key)).cloned()
    }

    /// Whether `(owner, type_key)` has been registered
    pub fn contains(&self, owner: &str, type_key: &str) -> bool {
        self.get(owner, type_key).is_some()
    }

    /// Resolve the display label, falling back to the raw key
    pub fn label(&self, owner: &str, type_key: &str) -> String {
        self.get(owner, type_key)
            .map(|t| t.label)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| type_key.to_string())
    }

    /// Distinct owner slugs, sorted
    pub fn owners(&self) -> Vec<String> {
        match self.types.read() {
            Ok(types) => types.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// All registered action types, sorted by owner then key
    pub fn types(&self) -> Vec<ActionType> {
        match self.types.read() {
            Ok(types) => types.values().flat_map(|m| m.values().cloned()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Action types registered by one owner
    pub fn types_for(&self, owner: &str) -> Vec<ActionType> {
        match self.types.read() {
            Ok(types) => types
                .get(owner)
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Total number of registered action types
    pub fn len(&self) -> usize {
        match self.types.read() {
            Ok(types) => types.values().map(|m| m.len()).sum(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validate an owner slug, action key, or event kind
///
/// Accepts non-empty ASCII letters, digits, `_`, `-` and `.`.
pub fn validate_slug(what: &'static str, value: &str) -> Result<()> {
    let invalid = |reason: &str| ActivityError::InvalidKey {
        what,
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.len() > 64 {
        return Err(invalid("must be at most 64 characters"));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(invalid(&format!("unexpected character '{}'", c)));
    }
    Ok(())
}
