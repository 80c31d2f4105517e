//! Serializable board snapshots.
//!
//! A [`BoardSnapshot`] records every layer, every attached entity's position,
//! animation and state, and every live composite's state. It is the
//! observable state of a level: two boards with equal snapshots look and
//! behave the same. Renderables and handlers are not part of it.
//!
//! [`Board::state_hash`] digests the JSON form with BLAKE3, which makes it a
//! cheap equality check for undo and replay tests.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::composite::{CompositeId, Footprint};
use crate::entity::EntityId;
use crate::position::Position;
use crate::state::StateBag;
use crate::GridError;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One attached entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    pub alias: Option<String>,
    pub position: Position,
    pub animation_state: String,
    pub state: StateBag,
}

/// One layer, members in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub alias: String,
    pub entities: Vec<EntitySnapshot>,
}

/// One composite whose pieces are on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSnapshot {
    pub composite_id: CompositeId,
    pub alias: Option<String>,
    pub footprint: Footprint,
    pub pieces: Vec<EntityId>,
    pub state: StateBag,
}

/// The observable state of a whole board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub layers: Vec<LayerSnapshot>,
    pub composites: Vec<CompositeSnapshot>,
}

impl BoardSnapshot {
    /// The snapshot of the last layer named `alias`.
    pub fn layer(&self, alias: &str) -> Option<&LayerSnapshot> {
        self.layers.iter().rev().find(|l| l.alias == alias)
    }

    /// Every entity, in paint order.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> + '_ {
        self.layers.iter().flat_map(|l| l.entities.iter())
    }

    pub fn to_json(&self) -> Result<String, GridError> {
        serde_json::to_string(self).map_err(GridError::Snapshot)
    }

    /// BLAKE3 hex digest of the JSON form.
    pub fn hash(&self) -> Result<String, GridError> {
        let bytes = serde_json::to_vec(self).map_err(GridError::Snapshot)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

// ---------------------------------------------------------------------------
// Board capture
// ---------------------------------------------------------------------------

impl Board {
    /// Capture the observable state of the board.
    pub fn capture_snapshot(&self) -> BoardSnapshot {
        let layers = self
            .layers()
            .iter()
            .map(|layer| LayerSnapshot {
                alias: layer.alias().to_owned(),
                entities: layer
                    .members()
                    .iter()
                    .filter_map(|id| self.entity(*id).ok())
                    .map(|e| EntitySnapshot {
                        entity_id: e.id(),
                        alias: e.alias().map(str::to_owned),
                        position: e.position(),
                        animation_state: e.animation_state().to_owned(),
                        state: e.state.clone(),
                    })
                    .collect(),
            })
            .collect();

        let composites = self
            .composites()
            .filter(|c| c.origin().is_some_and(|id| self.is_alive(id)))
            .map(|c| CompositeSnapshot {
                composite_id: c.id(),
                alias: c.alias().map(str::to_owned),
                footprint: c.footprint(),
                pieces: c.pieces().iter().map(|p| p.entity).collect(),
                state: c.state.clone(),
            })
            .collect();

        BoardSnapshot { layers, composites }
    }

    /// BLAKE3 hex digest of [`capture_snapshot`](Self::capture_snapshot).
    pub fn state_hash(&self) -> Result<String, GridError> {
        self.capture_snapshot().hash()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::MoveReason;
    use crate::render::Blank;
    use std::rc::Rc;

    fn two_layer_board() -> (Board, EntityId) {
        let mut board = Board::new();
        let bg = board.new_layer(Some("bg"));
        let fg = board.new_layer(Some("fg"));
        board.spawn_entity(bg, Position::ZERO, Rc::new(Blank), Some("floor")).unwrap();
        let player = board
            .spawn_entity(fg, Position::new(1, 1), Rc::new(Blank), Some("player"))
            .unwrap();
        (board, player)
    }

    #[test]
    fn snapshot_lists_layers_in_paint_order() {
        let (board, player) = two_layer_board();
        let snapshot = board.capture_snapshot();

        let aliases: Vec<&str> = snapshot.layers.iter().map(|l| l.alias.as_str()).collect();
        assert_eq!(aliases, vec!["bg", "fg"]);
        let fg = snapshot.layer("fg").unwrap();
        assert_eq!(fg.entities[0].entity_id, player);
        assert_eq!(fg.entities[0].position, Position::new(1, 1));
        assert_eq!(fg.entities[0].animation_state, "idle");
        assert_eq!(snapshot.entities().count(), 2);
    }

    #[test]
    fn hash_is_stable_and_tracks_changes() {
        let (mut board, player) = two_layer_board();
        let before = board.state_hash().unwrap();
        assert_eq!(before.len(), 64);
        assert!(before.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(before, board.state_hash().unwrap());

        board
            .move_relative(player, Position::RIGHT, None, MoveReason::UserInput)
            .unwrap();
        assert_ne!(before, board.state_hash().unwrap());
    }

    #[test]
    fn snapshot_json_parses_back() {
        let (board, _) = two_layer_board();
        let snapshot = board.capture_snapshot();
        let parsed: BoardSnapshot = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn destroyed_entities_are_not_captured() {
        let (mut board, player) = two_layer_board();
        board.destroy(player).unwrap();
        let snapshot = board.capture_snapshot();
        assert!(snapshot.layer("fg").unwrap().entities.is_empty());
    }
}
