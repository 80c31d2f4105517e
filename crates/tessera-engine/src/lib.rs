//! Tessera engine -- level-driven game host on top of [`tessera_grid`].
//!
//! This crate provides the driver around a board: a [`Game`](game::Game)
//! trait for game logic, a [`GameEngine`](game::GameEngine) that loads
//! levels, resolves physical keys through a [`KeyMapping`](keymap::KeyMapping)
//! and redraws on request, and a [`TickScheduler`](tick::TickScheduler) for
//! periodic handlers.
//!
//! # Quick Start
//!
//! ```
//! use tessera_engine::prelude::*;
//!
//! struct Walk;
//!
//! impl Game for Walk {
//!     fn define_levels(&mut self) -> Vec<Level> {
//!         let player = EntityTemplate::new(SolidTile::new("#0af")).with_alias("player").build();
//!         vec![Level::new(vec![LegendEntry::new('C', player, "fg")], ["C.."])]
//!     }
//!
//!     fn define_key_mapping(&mut self, keys: &mut KeyMapping) {
//!         keys.define("right", "Right", "Walk right", "ArrowRight");
//!     }
//!
//!     fn on_input(&mut self, ctx: &mut GameContext<'_>, event: &InputEvent) -> Result<(), EngineError> {
//!         let hero = ctx.find_entity("player")?;
//!         ctx.board_mut().hook_to_movement(hero, event)?;
//!         ctx.request_redraw();
//!         Ok(())
//!     }
//! }
//!
//! let mut engine = GameEngine::new(Walk, DrawList::new(), EngineConfig::default()).unwrap();
//! engine.handle_key("arrowright").unwrap();
//! assert_eq!(engine.renderer().color_at(Position::new(1, 0)), Some(&Color::new("#0af")));
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod game;
pub mod keymap;
pub mod tick;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the grid crate for convenience.
pub use tessera_grid;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine and by game hooks.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Grid(#[from] tessera_grid::GridError),

    #[error("the game defines no levels")]
    NoLevels,

    /// `next_level` was called on the last level.
    #[error("no level after the last of {count}")]
    NoMoreLevels { count: usize },

    #[error("invalid schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// The logical key was never defined.
    #[error("unknown key '{key_id}'")]
    UnknownKey { key_id: String },

    #[error("failed to parse engine config")]
    Config(#[source] serde_json::Error),

    #[error("invalid engine config: {reason}")]
    InvalidConfig { reason: String },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    // Everything from the grid prelude.
    pub use tessera_grid::prelude::*;

    pub use crate::config::EngineConfig;
    pub use crate::game::{Game, GameContext, GameEngine};
    pub use crate::keymap::{KeyBinding, KeyMapping};
    pub use crate::tick::{ScheduleHandle, TickHandler, TickInfo, TickScheduler};
    pub use crate::EngineError;
}
