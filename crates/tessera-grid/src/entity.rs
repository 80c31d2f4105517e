//! Entity identifiers, allocation and the entity record itself.
//!
//! An [`EntityId`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and an *index* in the low 32 bits. The generation is bumped
//! every time an index is recycled, which allows immediate stale-ID detection.
//!
//! An [`Entity`] is a positioned, stateful actor living in exactly one layer
//! of a [`Board`](crate::board::Board). It owns its animation set, its state
//! bag, an optional physics ruleset, its event handlers and a private undo
//! stack of `(state, position, animation_state)` snapshots.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::composite::CompositeId;
use crate::input::{KeyPress, MouseClick};
use crate::layer::LayerId;
use crate::movement::{EntityPhysics, MoveReason};
use crate::position::Position;
use crate::render::{RenderContext, RenderError, Renderable};
use crate::state::StateBag;
use crate::timebox::{TimeBox, UndoError};
use crate::GridError;

/// Name of the animation every entity starts in.
pub const IDLE: &str = "idle";

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`]s with generational tracking.
///
/// Free indices are kept in a FIFO queue so that generations are spread out
/// over time rather than concentrated on a hot index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl EntityAllocator {
    /// Create a new, empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`EntityId`].
    ///
    /// If a recycled index is available it will be reused with an incremented
    /// generation; otherwise a brand-new index is created.
    pub fn allocate(&mut self) -> EntityId {
        if let Some(index) = self.free_indices.pop_front() {
            // Generation was already bumped on deallocation.
            self.alive[index as usize] = true;
            EntityId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            EntityId::new(index, 0)
        }
    }

    /// Release an id, bumping the generation for its index so that any
    /// outstanding handles become stale.
    ///
    /// Returns `false` if the id was already released or is stale.
    pub fn deallocate(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    /// Returns `true` if `id` is allocated and its generation is current.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }

    /// Number of allocated ids.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }
}

// ---------------------------------------------------------------------------
// Event handlers
// ---------------------------------------------------------------------------

/// Veto hook consulted during every dry run: `(board, entity, from, to, reason)`.
pub type CanMoveHandler = Rc<dyn Fn(&Board, EntityId, Position, Position, MoveReason) -> bool>;

/// Fired when a user-input move commits: `(board, entity, from, to, reason)`.
pub type MoveHandler =
    Rc<dyn Fn(&mut Board, EntityId, Position, Position, MoveReason) -> Result<(), GridError>>;

/// Fired on a destroying-tagged entity when a mover steps onto it:
/// `(board, target, destroyer)`.
pub type DestroyHandler =
    Rc<dyn Fn(&mut Board, EntityId, Option<EntityId>) -> Result<(), GridError>>;

/// Fired on the mover when it steps onto an enterable entity:
/// `(board, mover, entered)`.
pub type EnterHandler = Rc<dyn Fn(&mut Board, EntityId, EntityId) -> Result<(), GridError>>;

/// Fired for every key press routed through the board.
pub type KeyHandler = Rc<dyn Fn(&mut Board, EntityId, &KeyPress) -> Result<(), GridError>>;

/// Fired when the entity's tile is clicked.
pub type ClickHandler = Rc<dyn Fn(&mut Board, EntityId, &MouseClick) -> Result<(), GridError>>;

/// The optional event handlers of an entity.
///
/// Handlers are reference-counted closures so that templates can hand the
/// same set to every instance they spawn.
#[derive(Clone, Default)]
pub struct EntityHandlers {
    pub can_move: Option<CanMoveHandler>,
    pub on_move: Option<MoveHandler>,
    pub on_destroy: Option<DestroyHandler>,
    pub on_enter: Option<EnterHandler>,
    pub on_key: Option<KeyHandler>,
    pub on_click: Option<ClickHandler>,
}

impl EntityHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_move(
        mut self,
        f: impl Fn(&Board, EntityId, Position, Position, MoveReason) -> bool + 'static,
    ) -> Self {
        self.can_move = Some(Rc::new(f));
        self
    }

    pub fn on_move(
        mut self,
        f: impl Fn(&mut Board, EntityId, Position, Position, MoveReason) -> Result<(), GridError>
            + 'static,
    ) -> Self {
        self.on_move = Some(Rc::new(f));
        self
    }

    pub fn on_destroy(
        mut self,
        f: impl Fn(&mut Board, EntityId, Option<EntityId>) -> Result<(), GridError> + 'static,
    ) -> Self {
        self.on_destroy = Some(Rc::new(f));
        self
    }

    pub fn on_enter(
        mut self,
        f: impl Fn(&mut Board, EntityId, EntityId) -> Result<(), GridError> + 'static,
    ) -> Self {
        self.on_enter = Some(Rc::new(f));
        self
    }

    pub fn on_key(
        mut self,
        f: impl Fn(&mut Board, EntityId, &KeyPress) -> Result<(), GridError> + 'static,
    ) -> Self {
        self.on_key = Some(Rc::new(f));
        self
    }

    pub fn on_click(
        mut self,
        f: impl Fn(&mut Board, EntityId, &MouseClick) -> Result<(), GridError> + 'static,
    ) -> Self {
        self.on_click = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for EntityHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityHandlers")
            .field("can_move", &self.can_move.is_some())
            .field("on_move", &self.on_move.is_some())
            .field("on_destroy", &self.on_destroy.is_some())
            .field("on_enter", &self.on_enter.is_some())
            .field("on_key", &self.on_key.is_some())
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A named appearance an entity can switch to.
#[derive(Clone)]
pub struct Animation {
    pub name: String,
    pub render: Rc<dyn Renderable>,
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation").field("name", &self.name).finish()
    }
}

/// One undo step of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStep {
    pub state: StateBag,
    pub position: Position,
    pub animation_state: String,
}

/// A positioned actor on the board.
///
/// Entities are created through [`Board::spawn_entity`] or an
/// [`EntityTemplate`](crate::template::EntityTemplate) and addressed by
/// [`EntityId`] everywhere else.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    layer: LayerId,
    attached: bool,
    position: Position,
    alias: Option<String>,
    animation_state: String,
    animations: Vec<Animation>,
    /// Free-form per-game payload.
    pub state: StateBag,
    physics: Option<Rc<EntityPhysics>>,
    handlers: EntityHandlers,
    history: TimeBox<EntityStep>,
    composite: Option<CompositeId>,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        layer: LayerId,
        position: Position,
        idle: Rc<dyn Renderable>,
        alias: Option<String>,
    ) -> Self {
        Self {
            id,
            layer,
            attached: true,
            position,
            alias,
            animation_state: IDLE.to_owned(),
            animations: vec![Animation {
                name: IDLE.to_owned(),
                render: idle,
            }],
            state: StateBag::new(),
            physics: None,
            handlers: EntityHandlers::default(),
            history: TimeBox::new(),
            composite: None,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The layer this entity belongs to.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Whether the entity is currently a member of its layer.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Whether the entity occupies the cell of `p` (offsets ignored).
    pub fn is_at(&self, p: Position) -> bool {
        self.position.same_cell(p)
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn animation_state(&self) -> &str {
        &self.animation_state
    }

    pub fn physics(&self) -> Option<&Rc<EntityPhysics>> {
        self.physics.as_ref()
    }

    pub fn handlers(&self) -> &EntityHandlers {
        &self.handlers
    }

    /// The composite this entity is a piece of, if any.
    pub fn composite(&self) -> Option<CompositeId> {
        self.composite
    }

    /// Number of undo steps stored for this entity.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // -- mutation -----------------------------------------------------------

    /// Register an additional named animation.
    pub fn add_animation(&mut self, name: &str, render: Rc<dyn Renderable>) {
        self.animations.push(Animation {
            name: name.to_owned(),
            render,
        });
    }

    /// Switch the current animation.
    ///
    /// The name is not validated here; rendering an unregistered name fails
    /// with [`RenderError::UnknownAnimation`].
    pub fn set_animation_state(&mut self, name: &str) {
        self.animation_state = name.to_owned();
    }

    pub fn set_physics(&mut self, physics: Rc<EntityPhysics>) {
        self.physics = Some(physics);
    }

    pub fn set_handlers(&mut self, handlers: EntityHandlers) {
        self.handlers = handlers;
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    pub(crate) fn set_composite(&mut self, composite: CompositeId) {
        self.composite = Some(composite);
    }

    // -- rendering ----------------------------------------------------------

    /// The renderable registered for the current animation state.
    pub fn current_animation(&self) -> Result<&Rc<dyn Renderable>, RenderError> {
        self.animations
            .iter()
            .find(|a| a.name == self.animation_state)
            .map(|a| &a.render)
            .ok_or_else(|| RenderError::UnknownAnimation {
                entity: self.id,
                animation: self.animation_state.clone(),
            })
    }

    /// Paint the current animation translated to the entity's position.
    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let animation = self.current_animation()?;
        animation.render(&mut ctx.with_offset(self.position));
        Ok(())
    }

    // -- undo ---------------------------------------------------------------

    /// Snapshot `(state, position, animation_state)`.
    pub fn store_step(&mut self) {
        self.history.store_step(EntityStep {
            state: self.state.clone(),
            position: self.position,
            animation_state: self.animation_state.clone(),
        });
    }

    /// Pop the newest snapshot and restore the one below it.
    pub fn go_back(&mut self) -> Result<(), UndoError> {
        let step = self.history.pop_step()?.clone();
        self.apply_step(step);
        Ok(())
    }

    /// Restore the newest snapshot without popping it.
    pub fn restore_current(&mut self) -> Result<(), UndoError> {
        let step = self.history.current().cloned().ok_or(UndoError::Empty)?;
        self.apply_step(step);
        Ok(())
    }

    /// Drop the newest snapshot without restoring anything.
    pub(crate) fn discard_step(&mut self) {
        self.history.discard_step();
    }

    pub(crate) fn reset_history(&mut self) {
        self.history.reset();
    }

    fn apply_step(&mut self, step: EntityStep) {
        self.state = step.state;
        self.position = step.position;
        self.animation_state = step.animation_state;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
