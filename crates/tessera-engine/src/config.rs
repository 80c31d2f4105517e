//! Engine configuration.
//!
//! ```
//! use tessera_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{"gameProps": {"tileSize": 8, "pixelSize": 3}}"#).unwrap();
//! assert_eq!(config.game_props.tile_size, 8);
//! assert_eq!(config.ticks_per_second, 60);
//! ```

use serde::{Deserialize, Serialize};
use tessera_grid::render::GameProps;

use crate::EngineError;

/// Scale and clock settings for a [`GameEngine`](crate::game::GameEngine).
///
/// Missing fields fall back to their defaults when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub game_props: GameProps,
    /// Scheduler ticks per wall-clock second. Must be positive.
    pub ticks_per_second: u32,
}

impl Default for EngineConfig {
    /// 5-pixel tiles drawn at 2x, 60 ticks per second.
    fn default() -> Self {
        Self {
            game_props: GameProps::default(),
            ticks_per_second: 60,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json).map_err(EngineError::Config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(EngineError::Config)
    }

    /// Reject settings no engine can run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ticks_per_second == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "ticks_per_second must be positive".into(),
            });
        }
        if self.game_props.tile_size == 0 || self.game_props.pixel_size == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "tile and pixel sizes must be positive".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
