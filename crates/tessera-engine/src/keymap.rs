//! Logical key table.
//!
//! Games declare the logical keys they understand (`up`, `action`, ...) with a
//! default physical binding. The host resolves each physical key press through
//! the table before the game sees it; unbound keys never reach the game.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::EngineError;

/// One logical key and its current binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBinding {
    /// Logical id delivered to the game.
    pub key_id: String,
    /// Human-readable name for menus.
    pub key_name: String,
    pub description: String,
    pub default_key: String,
    /// Physical key currently bound.
    pub key: String,
}

/// Ordered table of [`KeyBinding`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    bindings: Vec<KeyBinding>,
}

impl KeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a logical key bound to `default_key`.
    ///
    /// Redefining an existing id replaces its binding in place.
    pub fn define(
        &mut self,
        key_id: impl Into<String>,
        key_name: impl Into<String>,
        description: impl Into<String>,
        default_key: impl Into<String>,
    ) -> &mut Self {
        let default_key = default_key.into();
        let binding = KeyBinding {
            key_id: key_id.into(),
            key_name: key_name.into(),
            description: description.into(),
            key: default_key.clone(),
            default_key,
        };
        match self.bindings.iter_mut().find(|b| b.key_id == binding.key_id) {
            Some(existing) => *existing = binding,
            None => self.bindings.push(binding),
        }
        self
    }

    /// Bind a logical key to a different physical key.
    pub fn rebind(&mut self, key_id: &str, key: impl Into<String>) -> Result<(), EngineError> {
        let binding = self
            .bindings
            .iter_mut()
            .find(|b| b.key_id == key_id)
            .ok_or_else(|| EngineError::UnknownKey {
                key_id: key_id.to_owned(),
            })?;
        binding.key = key.into();
        debug!(key_id, key = %binding.key, "key rebound");
        Ok(())
    }

    /// Restore every binding to its default key.
    pub fn reset(&mut self) {
        for binding in &mut self.bindings {
            binding.key.clone_from(&binding.default_key);
        }
    }

    /// The logical id bound to a physical key, compared case-insensitively.
    /// The first matching binding wins.
    pub fn resolve(&self, physical_key: &str) -> Option<&str> {
        let wanted = physical_key.to_lowercase();
        self.bindings
            .iter()
            .find(|b| b.key.to_lowercase() == wanted)
            .map(|b| b.key_id.as_str())
    }

    pub fn binding(&self, key_id: &str) -> Option<&KeyBinding> {
        self.bindings.iter().find(|b| b.key_id == key_id)
    }

    pub fn bindings(&self) -> &[KeyBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn arrows() -> KeyMapping {
        let mut keys = KeyMapping::new();
        keys.define("up", "Up", "Move up", "ArrowUp")
            .define("down", "Down", "Move down", "ArrowDown")
            .define("action", "Undo", "Undo the last move", "Enter");
        keys
    }

    #[test]
    fn resolve_ignores_case() {
        let keys = arrows();
        assert_eq!(keys.resolve("arrowup"), Some("up"));
        assert_eq!(keys.resolve("ARROWDOWN"), Some("down"));
        assert_eq!(keys.resolve("enter"), Some("action"));
        assert_eq!(keys.resolve("Space"), None);
    }

    #[test]
    fn rebind_moves_the_physical_key() {
        let mut keys = arrows();
        keys.rebind("up", "w").unwrap();
        assert_eq!(keys.resolve("W"), Some("up"));
        assert_eq!(keys.resolve("ArrowUp"), None);
        assert_eq!(keys.binding("up").unwrap().default_key, "ArrowUp");

        keys.reset();
        assert_eq!(keys.resolve("arrowup"), Some("up"));
    }

    #[test]
    fn rebinding_an_undeclared_key_fails() {
        let mut keys = arrows();
        let err = keys.rebind("jump", "Space").unwrap_err();
        assert!(matches!(err, EngineError::UnknownKey { key_id } if key_id == "jump"));
    }

    #[test]
    fn redefine_replaces_in_place() {
        let mut keys = arrows();
        keys.define("up", "Up", "Climb", "k");
        assert_eq!(keys.len(), 3);
        assert_eq!(keys.bindings()[0].description, "Climb");
        assert_eq!(keys.resolve("K"), Some("up"));
    }

    #[test]
    fn first_binding_wins_on_collision() {
        let mut keys = arrows();
        keys.rebind("down", "ArrowUp").unwrap();
        assert_eq!(keys.resolve("arrowup"), Some("up"));
    }
}
