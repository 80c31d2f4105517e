//! Blueprints that spawn entities and composites.
//!
//! An [`EntityTemplate`] bundles an idle appearance, extra animations, an
//! initial state bag, a physics ruleset, event handlers and an optional
//! composite footprint. Templates are shared as `Rc<EntityTemplate>`; the
//! board remembers which template spawned which [`Actor`], so game code can
//! ask "does this door template still have live instances?".

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::trace;

use crate::board::Board;
use crate::composite::{Actor, Footprint, Piece};
use crate::entity::{Animation, EntityHandlers, IDLE};
use crate::layer::LayerId;
use crate::movement::EntityPhysics;
use crate::position::Position;
use crate::render::{split_renderable, Renderable};
use crate::state::StateBag;
use crate::GridError;

/// A blueprint for entities of one kind.
#[derive(Clone)]
pub struct EntityTemplate {
    alias: Option<String>,
    idle: Rc<dyn Renderable>,
    animations: Vec<Animation>,
    state: StateBag,
    physics: Option<Rc<EntityPhysics>>,
    handlers: EntityHandlers,
    footprint: Option<Footprint>,
}

impl EntityTemplate {
    /// A template whose idle animation is `idle`.
    pub fn new(idle: impl Renderable + 'static) -> Self {
        Self::from_renderable(Rc::new(idle))
    }

    pub fn from_renderable(idle: Rc<dyn Renderable>) -> Self {
        Self {
            alias: None,
            idle,
            animations: Vec::new(),
            state: StateBag::new(),
            physics: None,
            handlers: EntityHandlers::default(),
            footprint: None,
        }
    }

    // -- builders -------------------------------------------------------------

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_animation(mut self, name: &str, render: impl Renderable + 'static) -> Self {
        self.animations.push(Animation {
            name: name.to_owned(),
            render: Rc::new(render),
        });
        self
    }

    /// Seed the initial state of every instance.
    pub fn with_state(mut self, key: &str, value: impl Serialize) -> Result<Self, GridError> {
        self.state.set(key, value)?;
        Ok(self)
    }

    pub fn with_state_bag(mut self, state: StateBag) -> Self {
        self.state = state;
        self
    }

    pub fn with_physics(mut self, physics: EntityPhysics) -> Self {
        self.physics = Some(Rc::new(physics));
        self
    }

    pub fn with_handlers(mut self, handlers: EntityHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Spawn `n x n` composites instead of single entities.
    pub fn with_tile_size(self, n: u32) -> Self {
        self.with_footprint(Footprint::square(n))
    }

    pub fn with_footprint(mut self, footprint: Footprint) -> Self {
        self.footprint = Some(footprint);
        self
    }

    /// Finish building and share the template.
    pub fn build(self) -> Rc<Self> {
        Rc::new(self)
    }

    // -- accessors ------------------------------------------------------------

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn footprint(&self) -> Option<Footprint> {
        self.footprint
    }

    pub fn physics(&self) -> Option<&Rc<EntityPhysics>> {
        self.physics.as_ref()
    }

    // -- spawning -------------------------------------------------------------

    /// Instantiate the template at `position` in `layer`.
    ///
    /// A template with a footprint larger than one tile yields a composite
    /// whose origin cell is `position`.
    pub fn create_entity(
        self: &Rc<Self>,
        board: &mut Board,
        position: Position,
        layer: LayerId,
    ) -> Result<Actor, GridError> {
        let actor = match self.footprint {
            Some(footprint) if footprint.cell_count() > 1 => {
                self.create_composite(board, position, layer, footprint)?
            }
            _ => {
                let id = board.spawn_entity(layer, position, Rc::clone(&self.idle), self.alias())?;
                self.configure(board, id, &self.animations)?;
                Actor::Single(id)
            }
        };
        board.record_instance(self, actor);
        trace!(?actor, alias = ?self.alias, at = %position, "template instantiated");
        Ok(actor)
    }

    fn create_composite(
        &self,
        board: &mut Board,
        origin: Position,
        layer: LayerId,
        footprint: Footprint,
    ) -> Result<Actor, GridError> {
        let idle_pieces = split_renderable(&self.idle, footprint);
        let animation_pieces: Vec<Vec<Rc<dyn Renderable>>> = self
            .animations
            .iter()
            .map(|a| split_renderable(&a.render, footprint))
            .collect();

        let mut pieces = Vec::with_capacity(footprint.cell_count());
        for (i, offset) in footprint.offsets().enumerate() {
            let id = board.spawn_entity(
                layer,
                origin + offset,
                Rc::clone(&idle_pieces[i]),
                self.alias(),
            )?;
            let animations: Vec<Animation> = self
                .animations
                .iter()
                .zip(&animation_pieces)
                .map(|(a, split)| Animation {
                    name: a.name.clone(),
                    render: Rc::clone(&split[i]),
                })
                .collect();
            self.configure(board, id, &animations)?;
            pieces.push(Piece { entity: id, offset });
        }

        let cid = board.add_composite(self.alias.clone(), footprint, pieces, self.state.clone())?;
        Ok(Actor::Composed(cid))
    }

    fn configure(
        &self,
        board: &mut Board,
        id: crate::entity::EntityId,
        animations: &[Animation],
    ) -> Result<(), GridError> {
        let entity = board.entity_mut(id)?;
        entity.state = self.state.clone();
        for animation in animations.iter().filter(|a| a.name != IDLE) {
            entity.add_animation(&animation.name, Rc::clone(&animation.render));
        }
        if let Some(physics) = &self.physics {
            entity.set_physics(Rc::clone(physics));
        }
        entity.set_handlers(self.handlers.clone());
        Ok(())
    }

    // -- instance ledger ------------------------------------------------------

    /// Live actors spawned from this template on `board`.
    pub fn instances(self: &Rc<Self>, board: &Board) -> Vec<Actor> {
        board.instances_of(self)
    }

    pub fn has_instances(self: &Rc<Self>, board: &Board) -> bool {
        !self.instances(board).is_empty()
    }

    pub fn first_instance(self: &Rc<Self>, board: &Board) -> Option<Actor> {
        self.instances(board).into_iter().next()
    }

    /// Run `f` on every live instance. The instance list is taken before the
    /// first call, so `f` may destroy or spawn freely.
    pub fn for_each_instance(
        self: &Rc<Self>,
        board: &mut Board,
        mut f: impl FnMut(&mut Board, Actor) -> Result<(), GridError>,
    ) -> Result<(), GridError> {
        for actor in self.instances(board) {
            f(board, actor)?;
        }
        Ok(())
    }
}

impl fmt::Debug for EntityTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTemplate")
            .field("alias", &self.alias)
            .field("animations", &self.animations)
            .field("state", &self.state)
            .field("has_physics", &self.physics.is_some())
            .field("handlers", &self.handlers)
            .field("footprint", &self.footprint)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
