//! Z-ordered entity lists.
//!
//! A [`Layer`] is an insertion-ordered list of entity ids. Order inside a
//! layer is paint order; layers themselves paint in board order. Membership
//! is snapshotted into the layer's own [`TimeBox`] on every board step so
//! that destruction and spawning can be undone.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::timebox::TimeBox;

/// Index of a layer in its board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(usize);

impl LayerId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// An ordered bag of entities.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    alias: String,
    members: Vec<EntityId>,
    history: TimeBox<Vec<EntityId>>,
}

impl Layer {
    pub(crate) fn new(id: LayerId, alias: String) -> Self {
        Self {
            id,
            alias,
            members: Vec::new(),
            history: TimeBox::new(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Member ids in paint order.
    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of membership snapshots stored.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub(crate) fn push(&mut self, id: EntityId) {
        self.members.push(id);
    }

    /// Remove `id`; returns whether it was a member.
    pub(crate) fn remove(&mut self, id: EntityId) -> bool {
        match self.members.iter().position(|m| *m == id) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn store_step(&mut self) {
        self.history.store_step(self.members.clone());
    }

    pub(crate) fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    /// The newest membership snapshot, if any.
    pub(crate) fn current_step(&self) -> Option<&Vec<EntityId>> {
        self.history.current()
    }

    pub(crate) fn history_mut(&mut self) -> &mut TimeBox<Vec<EntityId>> {
        &mut self.history
    }

    pub(crate) fn set_members(&mut self, members: Vec<EntityId>) {
        self.members = members;
    }

    pub(crate) fn reset_history(&mut self) {
        self.history.reset();
    }
}
