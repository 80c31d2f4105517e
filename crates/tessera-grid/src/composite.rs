//! Multi-tile actors and the single/composite [`Actor`] handle.
//!
//! A [`ComposedEntity`] covers a rectangular [`Footprint`] with one ordinary
//! piece entity per cell. Pieces live in a layer like any other entity, share
//! the composite's physics, alias and handlers, and carry a back-reference to
//! their composite. The movement core keeps the shape rigid: a piece that
//! moves drags every sibling along by the same displacement, and a piece can
//! only move if every sibling can.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::entity::EntityId;
use crate::movement::MoveReason;
use crate::position::Position;
use crate::render::RenderContext;
use crate::state::StateBag;
use crate::timebox::{TimeBox, UndoError};
use crate::GridError;

// ---------------------------------------------------------------------------
// CompositeId / Footprint
// ---------------------------------------------------------------------------

/// Index of a composite in its board's composite arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeId(u32);

impl CompositeId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "composite#{}", self.0)
    }
}

/// Size of a composite in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// An `n x n` footprint.
    pub const fn square(n: u32) -> Self {
        Self::new(n, n)
    }

    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Cell offsets relative to the origin, row-major.
    pub fn offsets(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }
}

// ---------------------------------------------------------------------------
// ComposedEntity
// ---------------------------------------------------------------------------

/// One cell of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub entity: EntityId,
    /// Offset of this piece from the composite's origin.
    pub offset: Position,
}

/// A rigid multi-tile actor.
#[derive(Debug)]
pub struct ComposedEntity {
    id: CompositeId,
    alias: Option<String>,
    footprint: Footprint,
    pieces: Vec<Piece>,
    /// Composite-level payload, independent of the pieces' own state bags.
    pub state: StateBag,
    history: TimeBox<StateBag>,
}

impl ComposedEntity {
    pub(crate) fn new(
        id: CompositeId,
        alias: Option<String>,
        footprint: Footprint,
        pieces: Vec<Piece>,
        state: StateBag,
    ) -> Self {
        Self {
            id,
            alias,
            footprint,
            pieces,
            state,
            history: TimeBox::new(),
        }
    }

    pub fn id(&self) -> CompositeId {
        self.id
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// The piece at offset `(0, 0)`.
    pub fn origin(&self) -> Option<EntityId> {
        self.pieces.first().map(|p| p.entity)
    }

    /// Every piece except `entity`, in piece order.
    pub fn siblings_of(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.pieces
            .iter()
            .map(|p| p.entity)
            .filter(move |e| *e != entity)
    }

    pub fn store_step(&mut self) {
        self.history.store_step(self.state.clone());
    }

    pub fn go_back(&mut self) -> Result<(), UndoError> {
        self.state = self.history.pop_step()?.clone();
        Ok(())
    }

    pub(crate) fn restore_current(&mut self) -> Result<(), UndoError> {
        self.state = self.history.current().cloned().ok_or(UndoError::Empty)?;
        Ok(())
    }

    pub(crate) fn discard_step(&mut self) {
        self.history.discard_step();
    }

    pub(crate) fn reset_history(&mut self) {
        self.history.reset();
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A handle to whatever a template spawned: one entity or one composite.
///
/// Callers drive both variants through the same methods and never need to
/// know which one they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    Single(EntityId),
    Composed(CompositeId),
}

impl Actor {
    /// The entity that stands for this actor: the entity itself or the
    /// composite's origin piece.
    pub fn primary_entity(&self, board: &Board) -> Result<EntityId, GridError> {
        match *self {
            Actor::Single(id) => Ok(id),
            Actor::Composed(cid) => board
                .composite(cid)?
                .origin()
                .ok_or(GridError::UnknownComposite { composite: cid }),
        }
    }

    /// Every entity making up this actor.
    pub fn entities(&self, board: &Board) -> Result<Vec<EntityId>, GridError> {
        match *self {
            Actor::Single(id) => Ok(vec![id]),
            Actor::Composed(cid) => Ok(board
                .composite(cid)?
                .pieces()
                .iter()
                .map(|p| p.entity)
                .collect()),
        }
    }

    /// Position of the entity, or of the composite's origin cell.
    pub fn position(&self, board: &Board) -> Result<Position, GridError> {
        let primary = self.primary_entity(board)?;
        Ok(board.entity(primary)?.position())
    }

    /// Size in tiles; `1 x 1` for a single entity.
    pub fn footprint(&self, board: &Board) -> Result<Footprint, GridError> {
        match *self {
            Actor::Single(_) => Ok(Footprint::square(1)),
            Actor::Composed(cid) => Ok(board.composite(cid)?.footprint()),
        }
    }

    /// Whether the actor is currently attached to the board.
    pub fn is_alive(&self, board: &Board) -> bool {
        self.primary_entity(board)
            .map(|id| board.is_alive(id))
            .unwrap_or(false)
    }

    /// Request a relative move of the whole actor.
    pub fn move_relative(
        &self,
        board: &mut Board,
        displacement: Position,
        reason: MoveReason,
    ) -> Result<bool, GridError> {
        let primary = self.primary_entity(board)?;
        board.move_relative(primary, displacement, None, reason)
    }

    /// Dry-run a relative move of the whole actor.
    pub fn can_move_relative(
        &self,
        board: &Board,
        displacement: Position,
        reason: MoveReason,
    ) -> Result<bool, GridError> {
        let primary = self.primary_entity(board)?;
        board.can_move_relative(primary, displacement, None, reason)
    }

    /// Remove the actor from its layer.
    pub fn destroy(&self, board: &mut Board) -> Result<(), GridError> {
        let primary = self.primary_entity(board)?;
        board.destroy(primary)
    }

    /// Paint every entity of the actor.
    pub fn render(&self, board: &Board, ctx: &mut RenderContext<'_>) -> Result<(), GridError> {
        for id in self.entities(board)? {
            board.entity(id)?.render(ctx)?;
        }
        Ok(())
    }

    /// Snapshot the actor's own undo history.
    pub fn store_step(&self, board: &mut Board) -> Result<(), GridError> {
        for id in self.entities(board)? {
            board.entity_mut(id)?.store_step();
        }
        if let Actor::Composed(cid) = *self {
            board.composite_mut(cid)?.store_step();
        }
        Ok(())
    }

    /// Restore the actor's previous snapshot from its own history.
    ///
    /// Unlike [`Board::go_back`] this leaves layer membership alone.
    pub fn go_back(&self, board: &mut Board) -> Result<(), GridError> {
        for id in self.entities(board)? {
            board.entity_mut(id)?.go_back()?;
        }
        if let Actor::Composed(cid) = *self {
            board.composite_mut(cid)?.go_back()?;
        }
        Ok(())
    }
}

impl From<EntityId> for Actor {
    fn from(id: EntityId) -> Self {
        Actor::Single(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_offsets_are_row_major() {
        let offsets: Vec<Position> = Footprint::new(2, 2).offsets().collect();
        assert_eq!(
            offsets,
            vec![
                Position::new(0, 0),
                Position::new(1, 0),
                Position::new(0, 1),
                Position::new(1, 1),
            ]
        );
        assert_eq!(Footprint::square(3).cell_count(), 9);
    }

    #[test]
    fn composite_state_history() {
        let mut c = ComposedEntity::new(
            CompositeId::new(0),
            Some("crate".into()),
            Footprint::square(2),
            Vec::new(),
            StateBag::new(),
        );
        c.store_step();
        c.state.set("cracked", true).unwrap();
        c.store_step();
        c.go_back().unwrap();
        assert!(!c.state.contains("cracked"));
        assert!(c.go_back().is_err());
    }
}
