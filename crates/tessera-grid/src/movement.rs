//! Movement resolution: legality checks and cascading side effects.
//!
//! A move request is a [`MoveAttempt`]: which entity moves, by how much, who
//! caused it and why. Resolution runs in two phases:
//!
//! 1. **Dry run** ([`can_move`]): the mover's `can_move` handler and the five
//!    [`MovementPolicy`] evaluators must all agree. Pushable and Stickable
//!    recurse into dry runs of the entities they would displace; a composite
//!    piece also dry-runs every sibling. Nothing is mutated.
//! 2. **Commit** ([`move_entity`]): only after a passing dry run. Handlers
//!    fire, composite siblings follow, the policies apply their side effects
//!    in order (recursing depth-first into the displaced entities) and
//!    finally the mover's position is replaced.
//!
//! Every sub-move of one top-level request shares a [`Cascade`]. The dry run
//! records one plan per entity: the first attempt that reached it, its
//! verdict, and the entities it displaces. An entity reached again is
//! answered from its plan, or with `true` while its own dry run is still in
//! progress, so each entity is evaluated once however it is connected.
//!
//! The commit phase executes the plans and never re-validates. Every entity
//! of a cascade moves by the same step, and the whole set was checked
//! against the board as it stood before anything moved, so either all of it
//! moves or none of it does.
//!
//! Policies run in a fixed order: Blocking, Pushable, Stickable, Destroying,
//! Enterable.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::board::Board;
use crate::collection::EntityCollection;
use crate::composite::CompositeId;
use crate::entity::EntityId;
use crate::position::Position;
use crate::GridError;

// ---------------------------------------------------------------------------
// MoveReason
// ---------------------------------------------------------------------------

/// Why a move was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveReason {
    /// Direct player input. The only reason that fires `on_move`.
    UserInput,
    /// Displaced by a pushing entity.
    Push,
    /// Dragged along by an entity it sticks to.
    Stick,
    /// Following a sibling piece of the same composite.
    Composed,
    /// Engine-internal relocation: no policy side effects are applied.
    Internal,
    /// Anything else.
    Other,
}

impl fmt::Display for MoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveReason::UserInput => "user-input",
            MoveReason::Push => "push",
            MoveReason::Stick => "stick",
            MoveReason::Composed => "composed",
            MoveReason::Internal => "internal",
            MoveReason::Other => "other",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// EntityPhysics
// ---------------------------------------------------------------------------

/// The physics ruleset of an entity: which other entities block it, get
/// pushed by it, stick to it, get destroyed by it, and react to being
/// entered by it.
#[derive(Debug, Clone, Default)]
pub struct EntityPhysics {
    pub blocking: Option<EntityCollection>,
    pub pushable: Option<EntityCollection>,
    pub sticking: Option<EntityCollection>,
    pub destroying: Option<EntityCollection>,
    pub handles_entering: Option<EntityCollection>,
}

impl EntityPhysics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocking(mut self, collection: EntityCollection) -> Self {
        self.blocking = Some(collection);
        self
    }

    pub fn pushable(mut self, collection: EntityCollection) -> Self {
        self.pushable = Some(collection);
        self
    }

    pub fn sticking(mut self, collection: EntityCollection) -> Self {
        self.sticking = Some(collection);
        self
    }

    pub fn destroying(mut self, collection: EntityCollection) -> Self {
        self.destroying = Some(collection);
        self
    }

    pub fn handles_entering(mut self, collection: EntityCollection) -> Self {
        self.handles_entering = Some(collection);
        self
    }
}

// ---------------------------------------------------------------------------
// MoveAttempt / Cascade
// ---------------------------------------------------------------------------

/// One requested move, with its positions resolved at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveAttempt {
    pub mover: EntityId,
    pub displacement: Position,
    pub source: Option<EntityId>,
    pub reason: MoveReason,
    pub old_position: Position,
    pub new_position: Position,
    /// Composite the mover belongs to, if any.
    pub composite: Option<CompositeId>,
}

impl MoveAttempt {
    /// Describe a move of `mover` by `displacement`.
    ///
    /// Fails with [`GridError::StaleEntity`] if the mover is not on the board.
    pub fn new(
        board: &Board,
        mover: EntityId,
        displacement: Position,
        source: Option<EntityId>,
        reason: MoveReason,
    ) -> Result<Self, GridError> {
        let entity = board.entity(mover)?;
        let old_position = entity.position();
        Ok(Self {
            mover,
            displacement,
            source,
            reason,
            old_position,
            new_position: old_position + displacement,
            composite: entity.composite(),
        })
    }

    /// The unit step applied to entities this move displaces.
    pub fn push_vector(&self) -> Position {
        self.displacement.push_vector()
    }

    fn is_self_sourced(&self) -> bool {
        self.source == Some(self.mover)
    }

    /// Whether `other` can be affected by this move at all.
    ///
    /// An entity never acts on itself or on pieces of its own composite.
    fn may_affect(&self, board: &Board, other: EntityId) -> bool {
        if other == self.mover {
            return false;
        }
        match self.composite {
            Some(cid) => board
                .entity(other)
                .map(|e| e.composite() != Some(cid))
                .unwrap_or(false),
            None => true,
        }
    }

    fn sub_attempt(
        &self,
        board: &Board,
        mover: EntityId,
        displacement: Position,
        reason: MoveReason,
    ) -> Result<MoveAttempt, GridError> {
        MoveAttempt::new(board, mover, displacement, Some(self.mover), reason)
    }
}

/// The dry-run result for one entity.
#[derive(Debug, Clone)]
struct Plan {
    attempt: MoveAttempt,
    allowed: bool,
    /// Per policy, in [`POLICIES`] order: the entities it displaces.
    displaced: Vec<Vec<EntityId>>,
}

impl Plan {
    fn new(attempt: MoveAttempt) -> Self {
        Self {
            attempt,
            allowed: true,
            displaced: vec![Vec::new(); POLICIES.len()],
        }
    }

    fn refused(attempt: MoveAttempt) -> Self {
        Self {
            allowed: false,
            ..Self::new(attempt)
        }
    }
}

/// Bookkeeping shared by every sub-move of one top-level move.
///
/// A cascade belongs to exactly one top-level request; reusing it for a
/// second request answers that request from the first one's plans.
#[derive(Debug, Clone, Default)]
pub struct Cascade {
    resolving: Vec<EntityId>,
    plans: HashMap<EntityId, Plan>,
    moved: HashSet<EntityId>,
    committed: Vec<EntityId>,
}

impl Cascade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is currently inside its own dry run.
    pub fn is_resolving(&self, id: EntityId) -> bool {
        self.resolving.contains(&id)
    }

    /// The finished dry-run verdict for `id`, if it was evaluated.
    pub fn verdict(&self, id: EntityId) -> Option<bool> {
        self.plans.get(&id).map(|plan| plan.allowed)
    }

    /// Number of entities whose dry run finished.
    pub fn evaluated(&self) -> usize {
        self.plans.len()
    }

    /// Whether `id` has already committed a move in this cascade.
    pub fn has_moved(&self, id: EntityId) -> bool {
        self.moved.contains(&id)
    }

    /// Entities that committed, in commit order.
    pub fn committed(&self) -> &[EntityId] {
        &self.committed
    }

    /// Returns `false` if `id` had already moved.
    fn mark_moved(&mut self, id: EntityId) -> bool {
        let first = self.moved.insert(id);
        if first {
            self.committed.push(id);
        }
        first
    }

    /// The attempt to commit for `id`: its planned one, or `fallback` for an
    /// entity the dry run never had to look at.
    fn attempt_for(
        &self,
        id: EntityId,
        fallback: impl FnOnce() -> Result<MoveAttempt, GridError>,
    ) -> Result<Option<MoveAttempt>, GridError> {
        match self.plans.get(&id) {
            Some(plan) if plan.allowed => Ok(Some(plan.attempt)),
            Some(_) => Ok(None),
            None => fallback().map(Some),
        }
    }
}

// ---------------------------------------------------------------------------
// MovementPolicy
// ---------------------------------------------------------------------------

/// One physics rule evaluated for every move.
pub trait MovementPolicy {
    fn name(&self) -> &'static str;

    /// The physics collection this policy reads.
    fn collection<'p>(&self, physics: &'p EntityPhysics) -> Option<&'p EntityCollection>;

    /// Entities this policy acts on, computed from the board as it is now.
    ///
    /// Defaults to collection members occupying the target cell.
    fn affected(
        &self,
        board: &Board,
        attempt: &MoveAttempt,
        physics: &EntityPhysics,
    ) -> Result<Vec<EntityId>, GridError> {
        let Some(collection) = self.collection(physics) else {
            return Ok(Vec::new());
        };
        let mut affected = Vec::new();
        for id in collection.iter(board) {
            if attempt.may_affect(board, id) && board.entity(id)?.is_at(attempt.new_position) {
                affected.push(id);
            }
        }
        Ok(affected)
    }

    /// Dry-run verdict.
    fn allows(
        &self,
        _board: &Board,
        _attempt: &MoveAttempt,
        _affected: &[EntityId],
        _cascade: &mut Cascade,
    ) -> Result<bool, GridError> {
        Ok(true)
    }

    /// Whether the affected entities are moved along. The commit phase
    /// hands such a policy the entities the dry run approved instead of
    /// recomputing them.
    fn displaces(&self) -> bool {
        false
    }

    /// Commit-time side effects.
    fn apply(
        &self,
        _board: &mut Board,
        _attempt: &MoveAttempt,
        _affected: &[EntityId],
        _cascade: &mut Cascade,
    ) -> Result<(), GridError> {
        Ok(())
    }
}

/// Vetoes moves onto any blocking entity.
#[derive(Debug, Clone, Copy)]
pub struct Blocking;

/// Pushes pushable entities at the target cell one unit further.
#[derive(Debug, Clone, Copy)]
pub struct Pushable;

/// Drags sticking entities adjacent to the old position along.
#[derive(Debug, Clone, Copy)]
pub struct Stickable;

/// Signals destruction to destroying-tagged entities at the target cell.
#[derive(Debug, Clone, Copy)]
pub struct Destroying;

/// Fires the mover's `on_enter` for the first enterable entity at the target.
#[derive(Debug, Clone, Copy)]
pub struct Enterable;

/// The policies in evaluation order.
pub const POLICIES: [&dyn MovementPolicy; 5] =
    [&Blocking, &Pushable, &Stickable, &Destroying, &Enterable];

impl MovementPolicy for Blocking {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn collection<'p>(&self, physics: &'p EntityPhysics) -> Option<&'p EntityCollection> {
        physics.blocking.as_ref()
    }

    fn allows(
        &self,
        _board: &Board,
        _attempt: &MoveAttempt,
        affected: &[EntityId],
        _cascade: &mut Cascade,
    ) -> Result<bool, GridError> {
        Ok(affected.is_empty())
    }
}

impl MovementPolicy for Pushable {
    fn name(&self) -> &'static str {
        "pushable"
    }

    fn displaces(&self) -> bool {
        true
    }

    fn collection<'p>(&self, physics: &'p EntityPhysics) -> Option<&'p EntityCollection> {
        physics.pushable.as_ref()
    }

    fn allows(
        &self,
        board: &Board,
        attempt: &MoveAttempt,
        affected: &[EntityId],
        cascade: &mut Cascade,
    ) -> Result<bool, GridError> {
        displaced_can_move(board, attempt, affected, MoveReason::Push, cascade)
    }

    fn apply(
        &self,
        board: &mut Board,
        attempt: &MoveAttempt,
        affected: &[EntityId],
        cascade: &mut Cascade,
    ) -> Result<(), GridError> {
        displace(board, attempt, affected, MoveReason::Push, cascade)
    }
}

impl MovementPolicy for Stickable {
    fn name(&self) -> &'static str {
        "stickable"
    }

    fn displaces(&self) -> bool {
        true
    }

    fn collection<'p>(&self, physics: &'p EntityPhysics) -> Option<&'p EntityCollection> {
        physics.sticking.as_ref()
    }

    /// Members adjacent to the old position, except any sharing a cell with
    /// the entity that caused this move.
    fn affected(
        &self,
        board: &Board,
        attempt: &MoveAttempt,
        physics: &EntityPhysics,
    ) -> Result<Vec<EntityId>, GridError> {
        let Some(collection) = self.collection(physics) else {
            return Ok(Vec::new());
        };
        let source_position = match attempt.source {
            Some(source) if board.is_alive(source) => Some(board.entity(source)?.position()),
            _ => None,
        };

        let mut affected = Vec::new();
        for id in collection.iter(board) {
            if !attempt.may_affect(board, id) {
                continue;
            }
            let position = board.entity(id)?.position();
            let by_source = source_position.is_some_and(|s| s.same_cell(position));
            if !by_source && position.is_adjacent(attempt.old_position) {
                affected.push(id);
            }
        }
        Ok(affected)
    }

    fn allows(
        &self,
        board: &Board,
        attempt: &MoveAttempt,
        affected: &[EntityId],
        cascade: &mut Cascade,
    ) -> Result<bool, GridError> {
        displaced_can_move(board, attempt, affected, MoveReason::Stick, cascade)
    }

    fn apply(
        &self,
        board: &mut Board,
        attempt: &MoveAttempt,
        affected: &[EntityId],
        cascade: &mut Cascade,
    ) -> Result<(), GridError> {
        displace(board, attempt, affected, MoveReason::Stick, cascade)
    }
}

impl MovementPolicy for Destroying {
    fn name(&self) -> &'static str {
        "destroying"
    }

    fn collection<'p>(&self, physics: &'p EntityPhysics) -> Option<&'p EntityCollection> {
        physics.destroying.as_ref()
    }

    /// Removal is left to each target's `on_destroy` handler.
    fn apply(
        &self,
        board: &mut Board,
        attempt: &MoveAttempt,
        affected: &[EntityId],
        _cascade: &mut Cascade,
    ) -> Result<(), GridError> {
        for &target in affected {
            if !board.is_alive(target) {
                continue;
            }
            let handler = board.entity(target)?.handlers().on_destroy.clone();
            match handler {
                Some(on_destroy) => {
                    debug!(target = %target, destroyer = %attempt.mover, "destroy signalled");
                    on_destroy(board, target, Some(attempt.mover))?;
                }
                None => trace!(target = %target, "destroy signalled without handler"),
            }
        }
        Ok(())
    }
}

impl MovementPolicy for Enterable {
    fn name(&self) -> &'static str {
        "enterable"
    }

    fn collection<'p>(&self, physics: &'p EntityPhysics) -> Option<&'p EntityCollection> {
        physics.handles_entering.as_ref()
    }

    /// Only the first matched entity is reported, even when several share
    /// the target cell.
    fn apply(
        &self,
        board: &mut Board,
        attempt: &MoveAttempt,
        affected: &[EntityId],
        _cascade: &mut Cascade,
    ) -> Result<(), GridError> {
        let Some(&entered) = affected.first() else {
            return Ok(());
        };
        let handler = board.entity(attempt.mover)?.handlers().on_enter.clone();
        if let Some(on_enter) = handler {
            debug!(mover = %attempt.mover, entered = %entered, "enter");
            on_enter(board, attempt.mover, entered)?;
        }
        Ok(())
    }
}

fn displaced_can_move(
    board: &Board,
    attempt: &MoveAttempt,
    affected: &[EntityId],
    reason: MoveReason,
    cascade: &mut Cascade,
) -> Result<bool, GridError> {
    let mut verdict = true;
    for &item in affected {
        let sub = attempt.sub_attempt(board, item, attempt.push_vector(), reason)?;
        verdict &= can_move(board, &sub, cascade)?;
    }
    Ok(verdict)
}

fn displace(
    board: &mut Board,
    attempt: &MoveAttempt,
    affected: &[EntityId],
    reason: MoveReason,
    cascade: &mut Cascade,
) -> Result<(), GridError> {
    for &item in affected {
        if !board.is_alive(item) || cascade.has_moved(item) {
            continue;
        }
        let planned = cascade.attempt_for(item, || {
            attempt.sub_attempt(board, item, attempt.push_vector(), reason)
        })?;
        match planned {
            Some(sub) => commit(board, &sub, cascade)?,
            None => debug!(entity = %item, %reason, "displaced entity has no approved plan"),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Dry run: would `attempt` be legal right now?
///
/// Never mutates the board. Each entity is evaluated once per cascade; an
/// entity reached again is answered from its recorded verdict, or with
/// `true` while its own evaluation is still running (a ring).
pub fn can_move(board: &Board, attempt: &MoveAttempt, cascade: &mut Cascade) -> Result<bool, GridError> {
    let mover = attempt.mover;

    if attempt.is_self_sourced() {
        return Ok(true);
    }
    if cascade.is_resolving(mover) || cascade.has_moved(mover) {
        trace!(entity = %mover, reason = %attempt.reason, "cascade re-entered entity");
        return Ok(true);
    }
    if let Some(verdict) = cascade.verdict(mover) {
        trace!(entity = %mover, verdict, "dry run reused");
        return Ok(verdict);
    }

    let entity = board.entity(mover)?;
    if let Some(can_move_handler) = entity.handlers().can_move.clone() {
        if !can_move_handler(
            board,
            mover,
            attempt.old_position,
            attempt.new_position,
            attempt.reason,
        ) {
            trace!(entity = %mover, "move vetoed by handler");
            cascade.plans.insert(mover, Plan::refused(*attempt));
            return Ok(false);
        }
    }
    let physics = entity.physics().cloned();

    cascade.resolving.push(mover);
    let plan = evaluate(board, attempt, physics.as_deref(), cascade);
    cascade.resolving.pop();

    let plan = plan?;
    let allowed = plan.allowed;
    cascade.plans.insert(mover, plan);
    Ok(allowed)
}

fn evaluate(
    board: &Board,
    attempt: &MoveAttempt,
    physics: Option<&EntityPhysics>,
    cascade: &mut Cascade,
) -> Result<Plan, GridError> {
    let mut plan = Plan::new(*attempt);

    if let Some(physics) = physics {
        for (slot, policy) in POLICIES.iter().enumerate() {
            let affected = policy.affected(board, attempt, physics)?;
            let allowed = policy.allows(board, attempt, &affected, cascade)?;
            trace!(
                entity = %attempt.mover,
                policy = policy.name(),
                affected = affected.len(),
                allowed,
                "policy verdict"
            );
            plan.allowed &= allowed;
            if policy.displaces() {
                plan.displaced[slot] = affected;
            }
        }
    }

    // A piece can only move if the whole shape can.
    if let Some(cid) = attempt.composite {
        if attempt.reason != MoveReason::Composed {
            let siblings: Vec<EntityId> = board.composite(cid)?.siblings_of(attempt.mover).collect();
            for sibling in siblings {
                let sub = attempt.sub_attempt(board, sibling, attempt.displacement, MoveReason::Composed)?;
                plan.allowed &= can_move(board, &sub, cascade)?;
            }
        }
    }

    Ok(plan)
}

/// Resolve `attempt` completely: dry run, then commit.
///
/// Returns `Ok(false)` without touching the board when the dry run fails.
/// An entity that already moved in this cascade is not moved again and
/// reports `Ok(true)`.
pub fn move_entity(
    board: &mut Board,
    attempt: &MoveAttempt,
    cascade: &mut Cascade,
) -> Result<bool, GridError> {
    let mover = attempt.mover;

    if cascade.has_moved(mover) {
        trace!(entity = %mover, "already moved in this cascade");
        return Ok(true);
    }
    if !can_move(board, attempt, cascade)? {
        debug!(entity = %mover, to = %attempt.new_position, reason = %attempt.reason, "move blocked");
        return Ok(false);
    }
    commit(board, attempt, cascade)?;
    Ok(true)
}

/// Carry out an approved move and everything its plan displaces.
fn commit(board: &mut Board, attempt: &MoveAttempt, cascade: &mut Cascade) -> Result<(), GridError> {
    let mover = attempt.mover;
    if !cascade.mark_moved(mover) {
        return Ok(());
    }
    let displaced = cascade
        .plans
        .get(&mover)
        .map(|plan| plan.displaced.clone())
        .unwrap_or_default();

    if attempt.reason == MoveReason::UserInput {
        let handler = board.entity(mover)?.handlers().on_move.clone();
        if let Some(on_move) = handler {
            on_move(
                board,
                mover,
                attempt.old_position,
                attempt.new_position,
                attempt.reason,
            )?;
        }
    }

    if let Some(cid) = attempt.composite {
        if attempt.reason != MoveReason::Composed {
            let siblings: Vec<EntityId> = board.composite(cid)?.siblings_of(mover).collect();
            for sibling in siblings {
                if !board.is_alive(sibling) || cascade.has_moved(sibling) {
                    continue;
                }
                let planned = cascade.attempt_for(sibling, || {
                    attempt.sub_attempt(board, sibling, attempt.displacement, MoveReason::Composed)
                })?;
                if let Some(sub) = planned {
                    commit(board, &sub, cascade)?;
                }
            }
        }
    }

    if attempt.reason != MoveReason::Internal && !attempt.is_self_sourced() {
        if let Some(physics) = board.entity(mover)?.physics().cloned() {
            for (slot, policy) in POLICIES.iter().enumerate() {
                if !board.is_alive(mover) {
                    break;
                }
                let affected = if policy.displaces() {
                    displaced.get(slot).cloned().unwrap_or_default()
                } else {
                    policy.affected(board, attempt, &physics)?
                };
                policy.apply(board, attempt, &affected, cascade)?;
            }
        }
    }

    match board.entity_mut(mover) {
        Ok(entity) => {
            entity.set_position(attempt.new_position);
            debug!(
                entity = %mover,
                from = %attempt.old_position,
                to = %attempt.new_position,
                reason = %attempt.reason,
                "move committed"
            );
        }
        Err(_) => debug!(entity = %mover, "mover left the board during its own move"),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityHandlers;
    use crate::render::Blank;
    use std::cell::Cell;
    use std::rc::Rc;

    fn spawn(board: &mut Board, layer: &str, x: i32, y: i32, alias: &str) -> EntityId {
        let layer = board.layer_id(layer).unwrap();
        board
            .spawn_entity(layer, Position::new(x, y), Rc::new(Blank), Some(alias))
            .unwrap()
    }

    fn board() -> Board {
        let mut board = Board::new();
        board.new_layer(Some("walls"));
        board.new_layer(Some("boxes"));
        board.new_layer(Some("fg"));
        board
    }

    #[test]
    fn push_vector_of_attempt() {
        let mut b = board();
        let p = spawn(&mut b, "fg", 0, 0, "player");
        let attempt = MoveAttempt::new(&b, p, Position::new(-3, 2), None, MoveReason::Other).unwrap();
        assert_eq!(attempt.push_vector(), Position::LEFT);
        assert_eq!(attempt.new_position, Position::new(-3, 2));
    }

    #[test]
    fn policies_run_in_fixed_order() {
        let names: Vec<&str> = POLICIES.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["blocking", "pushable", "stickable", "destroying", "enterable"]
        );
    }

    #[test]
    fn blocking_affected_only_at_target_cell() {
        let mut b = board();
        let p = spawn(&mut b, "fg", 1, 1, "player");
        spawn(&mut b, "walls", 2, 1, "wall");
        spawn(&mut b, "walls", 0, 1, "wall");
        let physics = EntityPhysics::new().blocking(EntityCollection::of(["walls"]));

        let right = MoveAttempt::new(&b, p, Position::RIGHT, None, MoveReason::UserInput).unwrap();
        let up = MoveAttempt::new(&b, p, Position::UP, None, MoveReason::UserInput).unwrap();
        assert_eq!(Blocking.affected(&b, &right, &physics).unwrap().len(), 1);
        assert!(Blocking.affected(&b, &up, &physics).unwrap().is_empty());
    }

    #[test]
    fn sticking_excludes_entities_in_source_cell() {
        let mut b = board();
        let mover = spawn(&mut b, "fg", 1, 1, "slime");
        let source = spawn(&mut b, "fg", 0, 1, "player");
        let glued = spawn(&mut b, "boxes", 1, 0, "glue");
        let under_source = spawn(&mut b, "boxes", 0, 1, "glue");
        let physics = EntityPhysics::new().sticking(EntityCollection::of(["glue"]));

        let attempt =
            MoveAttempt::new(&b, mover, Position::RIGHT, Some(source), MoveReason::Push).unwrap();
        let affected = Stickable.affected(&b, &attempt, &physics).unwrap();
        assert_eq!(affected, vec![glued]);
        assert!(!affected.contains(&under_source));
    }

    #[test]
    fn cascade_tracks_commit_order_once() {
        let mut cascade = Cascade::new();
        let a = EntityId::new(0, 0);
        let b = EntityId::new(1, 0);
        assert!(cascade.mark_moved(a));
        assert!(cascade.mark_moved(b));
        assert!(!cascade.mark_moved(a));
        assert_eq!(cascade.committed(), &[a, b]);
        assert!(cascade.has_moved(b));
        assert!(!cascade.is_resolving(a));
    }

    #[test]
    fn dry_run_evaluates_each_entity_once() {
        let mut b = board();
        let checks = Rc::new(Cell::new(0));
        let mut blob = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                let id = spawn(&mut b, "fg", x, y, "blob");
                let counter = Rc::clone(&checks);
                let entity = b.entity_mut(id).unwrap();
                entity.set_physics(Rc::new(
                    EntityPhysics::new().sticking(EntityCollection::of(["blob"])),
                ));
                entity.set_handlers(EntityHandlers::new().can_move(move |_, _, _, _, _| {
                    counter.set(counter.get() + 1);
                    true
                }));
                blob.push(id);
            }
        }

        let attempt = MoveAttempt::new(&b, blob[0], Position::UP, None, MoveReason::UserInput).unwrap();
        let mut cascade = Cascade::new();
        assert!(can_move(&b, &attempt, &mut cascade).unwrap());
        assert_eq!(checks.get(), 9);
        assert_eq!(cascade.evaluated(), 9);
        assert!(blob.iter().all(|id| cascade.verdict(*id) == Some(true)));

        // Committing does not ask again.
        assert!(move_entity(&mut b, &attempt, &mut cascade).unwrap());
        assert_eq!(checks.get(), 9);
        assert_eq!(cascade.committed().len(), 9);
    }

    #[test]
    fn refusal_is_recorded_and_reused() {
        let mut b = board();
        let p = spawn(&mut b, "fg", 0, 0, "player");
        let stuck = spawn(&mut b, "boxes", 1, 0, "box");
        b.entity_mut(p).unwrap().set_physics(Rc::new(
            EntityPhysics::new().pushable(EntityCollection::of(["box"])),
        ));
        b.entity_mut(stuck)
            .unwrap()
            .set_handlers(EntityHandlers::new().can_move(|_, _, _, _, _| false));

        let attempt = MoveAttempt::new(&b, p, Position::RIGHT, None, MoveReason::UserInput).unwrap();
        let mut cascade = Cascade::new();
        assert!(!can_move(&b, &attempt, &mut cascade).unwrap());
        assert_eq!(cascade.verdict(stuck), Some(false));
        assert_eq!(cascade.verdict(p), Some(false));
        assert!(!move_entity(&mut b, &attempt, &mut cascade).unwrap());
        assert!(cascade.committed().is_empty());
    }
}
