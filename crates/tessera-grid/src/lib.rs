//! Tessera grid -- tile-grid boards with cascading movement physics.
//!
//! A [`Board`](board::Board) holds ordered layers of entities on an integer
//! tile grid. Entities carry an optional physics ruleset naming which other
//! entities block them, get pushed or dragged by them, get destroyed by
//! them, or react to being entered. A single move request is resolved as a
//! whole cascade: a side-effect-free dry run over every affected entity,
//! then a depth-first commit. Boards snapshot and restore every entity for
//! undo.
//!
//! # Quick Start
//!
//! ```
//! use std::rc::Rc;
//! use tessera_grid::prelude::*;
//!
//! let wall = EntityTemplate::new(SolidTile::new("#444")).with_alias("wall").build();
//! let crate_ = EntityTemplate::new(SolidTile::new("#a60"))
//!     .with_alias("crate")
//!     .with_physics(EntityPhysics::new().blocking(EntityCollection::of(["walls"])))
//!     .build();
//! let player = EntityTemplate::new(SolidTile::new("#0af"))
//!     .with_alias("player")
//!     .with_physics(
//!         EntityPhysics::new()
//!             .blocking(EntityCollection::of(["walls"]))
//!             .pushable(EntityCollection::of(["crate"])),
//!     )
//!     .build();
//!
//! let level = Level::new(
//!     vec![
//!         LegendEntry::new('A', wall, "walls"),
//!         LegendEntry::new('B', crate_, "fg"),
//!         LegendEntry::new('C', Rc::clone(&player), "fg"),
//!     ],
//!     ["AAAAA", "AC.BA", "AAAAA"],
//! );
//! let mut board = level.create_board(|_, _| {}).unwrap();
//! let hero = board.find_entity("player").unwrap();
//!
//! board.store_step();
//! assert!(board.move_relative(hero, Position::RIGHT, None, MoveReason::UserInput).unwrap());
//! // The crate is against the wall now.
//! assert!(!board.move_relative(hero, Position::RIGHT, None, MoveReason::UserInput).unwrap());
//!
//! board.store_step();
//! board.go_back().unwrap();
//! assert_eq!(board.entity(hero).unwrap().position(), Position::new(1, 1));
//! ```

#![deny(unsafe_code)]

pub mod board;
pub mod collection;
pub mod composite;
pub mod entity;
pub mod input;
pub mod layer;
pub mod level;
pub mod movement;
pub mod position;
pub mod render;
pub mod snapshot;
pub mod state;
pub mod template;
pub mod timebox;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by board operations.
///
/// A blocked move is not an error; it is `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The entity is not on the board (destroyed, released or never spawned).
    #[error("entity {entity} is not on the board")]
    StaleEntity { entity: entity::EntityId },

    #[error("composite {composite} does not exist")]
    UnknownComposite { composite: composite::CompositeId },

    /// No attached entity carries the alias.
    #[error("no entity with alias '{alias}'")]
    UnknownAlias { alias: String },

    #[error("layer '{layer}' does not exist")]
    UnknownLayer { layer: String },

    #[error(transparent)]
    Undo(#[from] timebox::UndoError),

    #[error("invalid level: {0}")]
    Level(#[from] level::LevelError),

    #[error(transparent)]
    Render(#[from] render::RenderError),

    /// A state-bag value could not be converted.
    #[error("state value '{key}' could not be converted")]
    State {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize board snapshot")]
    Snapshot(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::board::Board;
    pub use crate::collection::{CollectionItem, EntityCollection};
    pub use crate::composite::{Actor, ComposedEntity, CompositeId, Footprint, Piece};
    pub use crate::entity::{Entity, EntityHandlers, EntityId, IDLE};
    pub use crate::input::{InputEvent, KeyPress, MouseClick};
    pub use crate::layer::{Layer, LayerId};
    pub use crate::level::{LegendEntry, Level, LevelError};
    pub use crate::movement::{Cascade, EntityPhysics, MoveReason};
    pub use crate::position::Position;
    pub use crate::render::{
        Blank, Color, DrawList, GameProps, RenderContext, RenderError, Renderable, Renderer,
        SolidTile,
    };
    pub use crate::snapshot::BoardSnapshot;
    pub use crate::state::StateBag;
    pub use crate::template::EntityTemplate;
    pub use crate::timebox::{TimeBox, UndoError};
    pub use crate::GridError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
