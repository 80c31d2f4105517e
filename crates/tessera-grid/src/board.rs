//! The [`Board`] is the top-level container of a running level. It owns the
//! entity allocator, every entity and composite, the ordered layers and the
//! per-template instance ledger, and it fans undo steps out to all of them.
//!
//! Entities are addressed by [`EntityId`] everywhere. An entity removed from
//! its layer stays in the arena, detached, so that [`Board::go_back`] can
//! bring it back; ids of entities spawned after the restored step are
//! released.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::composite::{Actor, ComposedEntity, CompositeId, Footprint, Piece};
use crate::entity::{Entity, EntityAllocator, EntityId};
use crate::input::InputEvent;
use crate::layer::{Layer, LayerId};
use crate::movement::{self, Cascade, MoveAttempt, MoveReason};
use crate::position::Position;
use crate::render::{RenderContext, Renderable};
use crate::state::StateBag;
use crate::template::EntityTemplate;
use crate::timebox::UndoError;
use crate::GridError;

/// What [`Board::go_back`] does with one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepAction {
    /// Present before and after: pop and restore the previous step.
    Pop,
    /// Destroyed in between: re-attach and restore its newest step.
    Reattach,
    /// Spawned in between and stepped: drop its newest step and detach.
    Discard,
    /// Spawned after the last step: detach.
    Detach,
}

/// An ordered stack of layers plus everything living in them.
#[derive(Default)]
pub struct Board {
    allocator: EntityAllocator,
    entities: Vec<Option<Entity>>,
    composites: Vec<Option<ComposedEntity>>,
    layers: Vec<Layer>,
    instances: Vec<(Rc<EntityTemplate>, Actor)>,
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    // -- layers -------------------------------------------------------------

    /// Append a layer on top of the existing ones.
    ///
    /// Without an alias the layer is named `"Layer N"`, N counting from 1.
    pub fn new_layer(&mut self, alias: Option<&str>) -> LayerId {
        let id = LayerId::new(self.layers.len());
        let alias = alias
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Layer {}", self.layers.len() + 1));
        trace!(layer = %id, alias = %alias, "layer created");
        self.layers.push(Layer::new(id, alias));
        id
    }

    /// Resolve a layer alias. The last layer registered under it wins.
    pub fn layer_id(&self, alias: &str) -> Result<LayerId, GridError> {
        self.layers
            .iter()
            .rposition(|l| l.alias() == alias)
            .map(LayerId::new)
            .ok_or_else(|| GridError::UnknownLayer {
                layer: alias.to_owned(),
            })
    }

    pub fn layer(&self, id: LayerId) -> Result<&Layer, GridError> {
        self.layers.get(id.index()).ok_or_else(|| GridError::UnknownLayer {
            layer: id.to_string(),
        })
    }

    /// Layers in paint order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    // -- entities -----------------------------------------------------------

    /// The attached entity with this id.
    pub fn entity(&self, id: EntityId) -> Result<&Entity, GridError> {
        match self.slot(id) {
            Some(e) if e.is_attached() => Ok(e),
            _ => Err(GridError::StaleEntity { entity: id }),
        }
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, GridError> {
        match self.slot_mut(id) {
            Some(e) if e.is_attached() => Ok(e),
            _ => Err(GridError::StaleEntity { entity: id }),
        }
    }

    /// Whether `id` names an entity currently attached to a layer.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entity(id).is_ok()
    }

    /// Attached entities in paint order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.layers
            .iter()
            .flat_map(|l| l.members().iter())
            .filter_map(|id| self.slot(*id))
    }

    /// Number of attached entities.
    pub fn entity_count(&self) -> usize {
        self.layers.iter().map(Layer::len).sum()
    }

    /// Attached entities occupying the cell of `at`, in paint order.
    pub fn entities_at(&self, at: Position) -> Vec<EntityId> {
        self.entities()
            .filter(|e| e.is_at(at))
            .map(Entity::id)
            .collect()
    }

    /// First member of `layer` occupying the cell of `at`.
    pub fn entity_at(&self, layer: LayerId, at: Position) -> Result<Option<EntityId>, GridError> {
        let layer = self.layer(layer)?;
        Ok(layer
            .members()
            .iter()
            .copied()
            .find(|id| self.slot(*id).is_some_and(|e| e.is_at(at))))
    }

    fn slot(&self, id: EntityId) -> Option<&Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.entities.get(id.index() as usize)?.as_ref()
    }

    fn slot_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.allocator.is_alive(id) {
            return None;
        }
        self.entities.get_mut(id.index() as usize)?.as_mut()
    }

    // -- aliases ------------------------------------------------------------

    /// Default alias expansion used by collections: members of the layer
    /// with that alias, then attached entities carrying the alias that are
    /// not already listed.
    pub fn resolve_alias(&self, alias: &str) -> Vec<EntityId> {
        let mut resolved: Vec<EntityId> = match self.layer_id(alias) {
            Ok(layer) => self.layers[layer.index()].members().to_vec(),
            Err(_) => Vec::new(),
        };
        let by_name: Vec<EntityId> = self
            .entities()
            .filter(|e| e.alias() == Some(alias) && !resolved.contains(&e.id()))
            .map(Entity::id)
            .collect();
        resolved.extend(by_name);
        resolved
    }

    /// The first attached entity carrying `alias`, in paint order.
    pub fn find_entity(&self, alias: &str) -> Result<EntityId, GridError> {
        self.entities()
            .find(|e| e.alias() == Some(alias))
            .map(Entity::id)
            .ok_or_else(|| GridError::UnknownAlias {
                alias: alias.to_owned(),
            })
    }

    // -- spawning / destruction -----------------------------------------------

    /// Create an entity in `layer` with `idle` as its idle animation.
    pub fn spawn_entity(
        &mut self,
        layer: LayerId,
        position: Position,
        idle: Rc<dyn Renderable>,
        alias: Option<&str>,
    ) -> Result<EntityId, GridError> {
        self.layer(layer)?;
        let id = self.allocator.allocate();
        let entity = Entity::new(id, layer, position, idle, alias.map(str::to_owned));

        let idx = id.index() as usize;
        if idx >= self.entities.len() {
            self.entities.resize_with(idx + 1, || None);
        }
        self.entities[idx] = Some(entity);
        self.layers[layer.index()].push(id);
        trace!(entity = %id, layer = %layer, at = %position, "entity spawned");
        Ok(id)
    }

    /// Register already-spawned pieces as one composite.
    pub(crate) fn add_composite(
        &mut self,
        alias: Option<String>,
        footprint: Footprint,
        pieces: Vec<Piece>,
        state: StateBag,
    ) -> Result<CompositeId, GridError> {
        let cid = CompositeId::new(self.composites.len() as u32);
        for piece in &pieces {
            self.entity_mut(piece.entity)?.set_composite(cid);
        }
        self.composites
            .push(Some(ComposedEntity::new(cid, alias, footprint, pieces, state)));
        Ok(cid)
    }

    pub fn composite(&self, id: CompositeId) -> Result<&ComposedEntity, GridError> {
        self.composites
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(GridError::UnknownComposite { composite: id })
    }

    pub fn composite_mut(&mut self, id: CompositeId) -> Result<&mut ComposedEntity, GridError> {
        self.composites
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GridError::UnknownComposite { composite: id })
    }

    /// Every registered composite that undo could still bring back, live or
    /// not. [`reset_history`](Self::reset_history) drops the dead ones.
    pub fn composites(&self) -> impl Iterator<Item = &ComposedEntity> + '_ {
        self.composites.iter().flatten()
    }

    /// Remove an entity from its layer. A composite piece takes its whole
    /// composite with it.
    ///
    /// Does not fire `on_destroy`; the entity can come back via
    /// [`go_back`](Self::go_back).
    pub fn destroy(&mut self, id: EntityId) -> Result<(), GridError> {
        let targets = match self.entity(id)?.composite() {
            Some(cid) => self.composite(cid)?.pieces().iter().map(|p| p.entity).collect(),
            None => vec![id],
        };
        for target in targets {
            let Some(entity) = self.slot_mut(target) else {
                continue;
            };
            entity.set_attached(false);
            let layer = entity.layer();
            self.layers[layer.index()].remove(target);
            debug!(entity = %target, "entity destroyed");
        }
        Ok(())
    }

    // -- templates ----------------------------------------------------------

    pub(crate) fn record_instance(&mut self, template: &Rc<EntityTemplate>, actor: Actor) {
        self.instances.push((Rc::clone(template), actor));
    }

    /// Live actors spawned from `template` on this board, in spawn order.
    pub fn instances_of(&self, template: &Rc<EntityTemplate>) -> Vec<Actor> {
        self.instances
            .iter()
            .filter(|(t, actor)| Rc::ptr_eq(t, template) && actor.is_alive(self))
            .map(|(_, actor)| *actor)
            .collect()
    }

    // -- movement -----------------------------------------------------------

    /// Request a relative move and resolve its whole cascade.
    ///
    /// `Ok(false)` means the move was illegal and nothing changed. An `Err`
    /// means the request itself was invalid (e.g. a stale id) or a handler
    /// failed.
    pub fn move_relative(
        &mut self,
        id: EntityId,
        displacement: Position,
        source: Option<EntityId>,
        reason: MoveReason,
    ) -> Result<bool, GridError> {
        let mut cascade = Cascade::new();
        self.move_with_cascade(id, displacement, source, reason, &mut cascade)
    }

    /// [`move_relative`](Self::move_relative) with caller-owned cascade
    /// bookkeeping, e.g. to inspect which entities moved.
    pub fn move_with_cascade(
        &mut self,
        id: EntityId,
        displacement: Position,
        source: Option<EntityId>,
        reason: MoveReason,
        cascade: &mut Cascade,
    ) -> Result<bool, GridError> {
        let attempt = MoveAttempt::new(self, id, displacement, source, reason)?;
        movement::move_entity(self, &attempt, cascade)
    }

    /// Dry-run a relative move without changing anything.
    pub fn can_move_relative(
        &self,
        id: EntityId,
        displacement: Position,
        source: Option<EntityId>,
        reason: MoveReason,
    ) -> Result<bool, GridError> {
        let attempt = MoveAttempt::new(self, id, displacement, source, reason)?;
        movement::can_move(self, &attempt, &mut Cascade::new())
    }

    /// Translate `up`/`down`/`left`/`right` key presses into user moves.
    ///
    /// Returns `None` when the event is not a movement key, otherwise
    /// whether the move happened.
    pub fn hook_to_movement(
        &mut self,
        id: EntityId,
        event: &InputEvent,
    ) -> Result<Option<bool>, GridError> {
        let InputEvent::KeyPressed(key) = event else {
            return Ok(None);
        };
        let step = match key.keyname.as_str() {
            "up" => Position::UP,
            "down" => Position::DOWN,
            "left" => Position::LEFT,
            "right" => Position::RIGHT,
            _ => return Ok(None),
        };
        self.move_relative(id, step, None, MoveReason::UserInput)
            .map(Some)
    }

    /// Route an input event to entity handlers.
    ///
    /// Key presses go to every entity with an `on_key` handler, clicks to
    /// the `on_click` handlers of entities on the clicked tile. Handlers run
    /// in paint order against the entity list as it was when the event
    /// arrived; entities destroyed by an earlier handler are skipped.
    pub fn dispatch_input(&mut self, event: &InputEvent) -> Result<(), GridError> {
        match event {
            InputEvent::KeyPressed(key) => {
                let targets: Vec<_> = self
                    .entities()
                    .filter_map(|e| e.handlers().on_key.clone().map(|h| (e.id(), h)))
                    .collect();
                for (id, handler) in targets {
                    if self.is_alive(id) {
                        handler(self, id, key)?;
                    }
                }
            }
            InputEvent::MouseClick(click) => {
                let targets: Vec<_> = self
                    .entities()
                    .filter(|e| e.is_at(click.tile))
                    .filter_map(|e| e.handlers().on_click.clone().map(|h| (e.id(), h)))
                    .collect();
                for (id, handler) in targets {
                    if self.is_alive(id) {
                        handler(self, id, click)?;
                    }
                }
            }
        }
        Ok(())
    }

    // -- undo ---------------------------------------------------------------

    /// Snapshot every layer's membership and every attached entity and
    /// composite.
    pub fn store_step(&mut self) {
        let Board {
            layers,
            entities,
            composites,
            ..
        } = &mut *self;

        for layer in layers.iter_mut() {
            layer.store_step();
            for id in layer.members() {
                if let Some(Some(entity)) = entities.get_mut(id.index() as usize) {
                    entity.store_step();
                }
            }
        }
        for composite in composites.iter_mut().flatten() {
            let origin_attached = composite
                .origin()
                .and_then(|id| entities.get(id.index() as usize))
                .and_then(Option::as_ref)
                .is_some_and(Entity::is_attached);
            if origin_attached {
                composite.store_step();
            }
        }
        trace!(steps = self.history_len(), "board step stored");
    }

    /// Whether [`go_back`](Self::go_back) would succeed.
    pub fn can_go_back(&self) -> bool {
        self.layers.iter().all(Layer::can_go_back)
    }

    /// Number of undo steps every layer has (the minimum across layers).
    pub fn history_len(&self) -> usize {
        self.layers.iter().map(Layer::history_len).min().unwrap_or(0)
    }

    /// Restore the board to the previous step.
    ///
    /// Fails with [`UndoError::InsufficientHistory`] before touching anything
    /// unless every layer holds at least two steps. Destroyed entities come
    /// back; entities spawned after the restored step are removed.
    pub fn go_back(&mut self) -> Result<(), GridError> {
        if let Some(layer) = self.layers.iter().find(|l| !l.can_go_back()) {
            return Err(UndoError::InsufficientHistory {
                available: layer.history_len(),
            }
            .into());
        }

        let mut actions: HashMap<EntityId, StepAction> = HashMap::new();
        for layer in &mut self.layers {
            let popped = layer.current_step().cloned().unwrap_or_default();
            let restored = layer.history_mut().pop_step()?.clone();

            for id in &restored {
                let action = if popped.contains(id) {
                    StepAction::Pop
                } else {
                    StepAction::Reattach
                };
                actions.insert(*id, action);
            }
            for id in popped.iter().chain(layer.members()) {
                if !restored.contains(id) {
                    let action = if popped.contains(id) {
                        StepAction::Discard
                    } else {
                        StepAction::Detach
                    };
                    actions.insert(*id, action);
                }
            }
            layer.set_members(restored);
        }

        for (&id, &action) in &actions {
            let Some(entity) = self.slot_mut(id) else {
                continue;
            };
            match action {
                StepAction::Pop => {
                    entity.go_back()?;
                    entity.set_attached(true);
                }
                StepAction::Reattach => {
                    entity.restore_current()?;
                    entity.set_attached(true);
                }
                StepAction::Discard | StepAction::Detach => {
                    if action == StepAction::Discard {
                        entity.discard_step();
                    }
                    entity.set_attached(false);
                    if entity.history_len() == 0 {
                        self.release(id);
                    }
                }
            }
        }

        for composite in self.composites.iter_mut().flatten() {
            let action = composite.origin().and_then(|id| actions.get(&id).copied());
            match action {
                Some(StepAction::Pop) => composite.go_back()?,
                Some(StepAction::Reattach) => composite.restore_current()?,
                Some(StepAction::Discard) => composite.discard_step(),
                Some(StepAction::Detach) | None => {}
            }
        }

        debug!(steps = self.history_len(), "board went back one step");
        Ok(())
    }

    /// Drop every stored step on the board.
    ///
    /// Detached entities, dead composites and dead template instances can no
    /// longer come back, so they are released here.
    pub fn reset_history(&mut self) {
        for layer in &mut self.layers {
            layer.reset_history();
        }

        let instances = std::mem::take(&mut self.instances);
        self.instances = instances
            .into_iter()
            .filter(|(_, actor)| actor.is_alive(self))
            .collect();

        let mut pruned_composites = 0;
        for slot in &mut self.composites {
            let Some(composite) = slot else {
                continue;
            };
            let alive = composite
                .origin()
                .and_then(|id| self.entities.get(id.index() as usize))
                .and_then(Option::as_ref)
                .is_some_and(Entity::is_attached);
            if alive {
                composite.reset_history();
            } else {
                *slot = None;
                pruned_composites += 1;
            }
        }

        let mut detached = Vec::new();
        for entity in self.entities.iter_mut().flatten() {
            entity.reset_history();
            if !entity.is_attached() {
                detached.push(entity.id());
            }
        }
        for id in &detached {
            self.release(*id);
        }

        debug!(
            released = detached.len(),
            composites = pruned_composites,
            instances = self.instances.len(),
            "board history reset"
        );
    }

    /// Number of template instances still tracked, live or restorable.
    pub fn tracked_instances(&self) -> usize {
        self.instances.len()
    }

    fn release(&mut self, id: EntityId) {
        if self.allocator.deallocate(id) {
            if let Some(slot) = self.entities.get_mut(id.index() as usize) {
                *slot = None;
            }
            trace!(entity = %id, "entity released");
        }
    }

    // -- rendering ----------------------------------------------------------

    /// Paint every layer in order, every entity in layer order.
    pub fn render(&self, ctx: &mut RenderContext<'_>) -> Result<(), GridError> {
        for entity in self.entities() {
            entity.render(ctx)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("layers", &self.layers)
            .field("entities", &self.entity_count())
            .field("composites", &self.composites().count())
            .field("instances", &self.instances.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
