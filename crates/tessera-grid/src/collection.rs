//! Deferred, filterable views over board entities.
//!
//! An [`EntityCollection`] never stores a membership list. It holds three
//! input buckets (entity ids, layer ids and aliases) plus a stack of filter
//! predicates, and re-expands them against the board every time it is
//! iterated. A collection built before an entity joins a referenced layer
//! therefore sees that entity on the next iteration.
//!
//! Iteration order is fixed: direct entities, then layer members (in layer
//! paint order), then alias-resolved entities (alias order, then resolver
//! order). Entities that are stale or detached are skipped silently.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::board::Board;
use crate::entity::{Entity, EntityId};
use crate::layer::LayerId;

/// Predicate applied to every candidate entity.
pub type EntityFilter = Rc<dyn Fn(&Entity) -> bool>;

/// Expands an alias into entity ids.
pub type AliasResolver = Rc<dyn Fn(&Board, &str) -> Vec<EntityId>>;

// ---------------------------------------------------------------------------
// CollectionItem
// ---------------------------------------------------------------------------

/// A raw item that can be placed into one of a collection's buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionItem {
    Alias(String),
    Layer(LayerId),
    Entity(EntityId),
}

impl From<&str> for CollectionItem {
    fn from(alias: &str) -> Self {
        CollectionItem::Alias(alias.to_owned())
    }
}

impl From<String> for CollectionItem {
    fn from(alias: String) -> Self {
        CollectionItem::Alias(alias)
    }
}

impl From<LayerId> for CollectionItem {
    fn from(layer: LayerId) -> Self {
        CollectionItem::Layer(layer)
    }
}

impl From<EntityId> for CollectionItem {
    fn from(entity: EntityId) -> Self {
        CollectionItem::Entity(entity)
    }
}

// ---------------------------------------------------------------------------
// EntityCollection
// ---------------------------------------------------------------------------

/// A live view over entities selected by id, layer or alias.
#[derive(Clone, Default)]
pub struct EntityCollection {
    aliases: Vec<String>,
    layers: Vec<LayerId>,
    entities: Vec<EntityId>,
    filters: Vec<EntityFilter>,
    resolver: Option<AliasResolver>,
}

impl EntityCollection {
    /// An empty collection using the board's own alias resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection over the given items.
    ///
    /// ```
    /// use tessera_grid::prelude::*;
    ///
    /// let blocking = EntityCollection::of(["walls", "door"]);
    /// assert!(blocking.is_included(&"door".into()));
    /// ```
    pub fn of<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CollectionItem>,
    {
        let mut collection = Self::new();
        for item in items {
            collection.add_item(item);
        }
        collection
    }

    /// Replace the alias resolver.
    ///
    /// The default resolver is [`Board::resolve_alias`].
    pub fn with_resolver(
        mut self,
        resolver: impl Fn(&Board, &str) -> Vec<EntityId> + 'static,
    ) -> Self {
        self.resolver = Some(Rc::new(resolver));
        self
    }

    /// Append an item to the bucket matching its kind.
    pub fn add_item(&mut self, item: impl Into<CollectionItem>) {
        match item.into() {
            CollectionItem::Alias(alias) => self.aliases.push(alias),
            CollectionItem::Layer(layer) => self.layers.push(layer),
            CollectionItem::Entity(entity) => self.entities.push(entity),
        }
    }

    /// Builder form of [`add_item`](Self::add_item).
    pub fn with(mut self, item: impl Into<CollectionItem>) -> Self {
        self.add_item(item);
        self
    }

    /// Whether the raw item was placed in one of the buckets.
    ///
    /// This inspects the buckets, not the expanded membership.
    pub fn is_included(&self, item: &CollectionItem) -> bool {
        match item {
            CollectionItem::Alias(alias) => self.aliases.iter().any(|a| a == alias),
            CollectionItem::Layer(layer) => self.layers.contains(layer),
            CollectionItem::Entity(entity) => self.entities.contains(entity),
        }
    }

    /// A new view that additionally requires `predicate`.
    ///
    /// The receiver is left untouched; both views share buckets and
    /// resolver. Predicates compose by logical AND.
    pub fn filter(&self, predicate: impl Fn(&Entity) -> bool + 'static) -> Self {
        let mut filtered = self.clone();
        filtered.filters.push(Rc::new(predicate));
        filtered
    }

    // -- expansion ----------------------------------------------------------

    /// Iterate the current members, re-expanding every bucket.
    pub fn iter<'b>(&'b self, board: &'b Board) -> impl Iterator<Item = EntityId> + 'b {
        let direct = self.entities.iter().copied();

        let layered = self.layers.iter().flat_map(move |layer| {
            let members: &[EntityId] = match board.layer(*layer) {
                Ok(l) => l.members(),
                Err(_) => {
                    trace!(layer = %layer, "collection references a missing layer");
                    &[]
                }
            };
            members.iter().copied()
        });

        let aliased = self.aliases.iter().flat_map(move |alias| match &self.resolver {
            Some(resolve) => resolve(board, alias),
            None => board.resolve_alias(alias),
        });

        direct
            .chain(layered)
            .chain(aliased)
            .filter(move |id| self.admits(board, *id))
    }

    fn admits(&self, board: &Board, id: EntityId) -> bool {
        match board.entity(id) {
            Ok(entity) => self.filters.iter().all(|f| f(entity)),
            Err(_) => {
                trace!(entity = %id, "collection skipped stale entity");
                false
            }
        }
    }

    /// Materialize the current members.
    pub fn collect(&self, board: &Board) -> Vec<EntityId> {
        self.iter(board).collect()
    }

    /// Call `f(id, index)` for every current member.
    pub fn for_each(&self, board: &Board, mut f: impl FnMut(EntityId, usize)) {
        for (index, id) in self.iter(board).enumerate() {
            f(id, index);
        }
    }

    /// Map every current member.
    pub fn map<T>(&self, board: &Board, mut f: impl FnMut(&Entity) -> T) -> Vec<T> {
        self.iter(board)
            .filter_map(|id| board.entity(id).ok())
            .map(|e| f(e))
            .collect()
    }

    pub fn contains(&self, board: &Board, id: EntityId) -> bool {
        self.iter(board).any(|m| m == id)
    }

    pub fn first(&self, board: &Board) -> Option<EntityId> {
        self.iter(board).next()
    }

    /// Number of current members, counting an entity once per bucket hit.
    pub fn len(&self, board: &Board) -> usize {
        self.iter(board).count()
    }

    pub fn is_empty(&self, board: &Board) -> bool {
        self.first(board).is_none()
    }
}

impl fmt::Debug for EntityCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityCollection")
            .field("aliases", &self.aliases)
            .field("layers", &self.layers)
            .field("entities", &self.entities)
            .field("filters", &self.filters.len())
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use crate::render::Blank;

    fn board_with_walls() -> (Board, LayerId, Vec<EntityId>) {
        let mut board = Board::new();
        let walls = board.new_layer(Some("walls"));
        let ids = (0..3)
            .map(|x| {
                board
                    .spawn_entity(walls, Position::new(x, 0), Rc::new(Blank), Some("wall"))
                    .unwrap()
            })
            .collect();
        (board, walls, ids)
    }

    #[test]
    fn bucket_order_is_direct_layer_alias() {
        let mut board = Board::new();
        let a = board.new_layer(Some("a"));
        let b = board.new_layer(Some("b"));
        let in_a = board.spawn_entity(a, Position::new(0, 0), Rc::new(Blank), None).unwrap();
        let in_b = board.spawn_entity(b, Position::new(1, 0), Rc::new(Blank), None).unwrap();
        let named = board
            .spawn_entity(a, Position::new(2, 0), Rc::new(Blank), Some("hero"))
            .unwrap();

        let collection = EntityCollection::new()
            .with("hero")
            .with(b)
            .with(in_a);

        assert_eq!(collection.collect(&board), vec![in_a, in_b, named]);
    }

    #[test]
    fn layer_membership_is_live() {
        let (mut board, walls, ids) = board_with_walls();
        let collection = EntityCollection::of([walls]);
        assert_eq!(collection.len(&board), 3);

        let late = board
            .spawn_entity(walls, Position::new(9, 9), Rc::new(Blank), None)
            .unwrap();
        assert_eq!(collection.len(&board), 4);
        assert!(collection.contains(&board, late));

        board.destroy(ids[0]).unwrap();
        assert!(!collection.contains(&board, ids[0]));
    }

    #[test]
    fn alias_referencing_layer_is_live() {
        let (mut board, walls, _) = board_with_walls();
        let collection = EntityCollection::of(["walls"]);
        let before = collection.len(&board);

        board
            .spawn_entity(walls, Position::new(5, 5), Rc::new(Blank), None)
            .unwrap();
        assert_eq!(collection.len(&board), before + 1);
    }

    #[test]
    fn filter_does_not_mutate_receiver() {
        let (board, walls, ids) = board_with_walls();
        let all = EntityCollection::of([walls]);
        let left = all.filter(|e| e.position().x < 1);

        assert_eq!(all.len(&board), 3);
        assert_eq!(left.collect(&board), vec![ids[0]]);
    }

    #[test]
    fn filter_order_does_not_change_members() {
        let (board, walls, _) = board_with_walls();
        let all = EntityCollection::of([walls]);
        let p = |e: &Entity| e.position().x >= 1;
        let q = |e: &Entity| e.position().x <= 1;

        assert_eq!(
            all.filter(p).filter(q).collect(&board),
            all.filter(q).filter(p).collect(&board)
        );
    }

    #[test]
    fn stale_entities_are_skipped() {
        let (mut board, _, ids) = board_with_walls();
        let collection = EntityCollection::of([ids[1]]);
        board.destroy(ids[1]).unwrap();
        assert!(collection.is_empty(&board));
        assert_eq!(collection.first(&board), None);
    }

    #[test]
    fn custom_resolver_replaces_alias_lookup() {
        let (board, _, ids) = board_with_walls();
        let last = ids[2];
        let collection = EntityCollection::of(["anything"]).with_resolver(move |_, _| vec![last]);
        assert_eq!(collection.collect(&board), vec![last]);
    }

    #[test]
    fn is_included_inspects_buckets() {
        let (_, walls, ids) = board_with_walls();
        let collection = EntityCollection::of(["walls"]).with(ids[0]);

        assert!(collection.is_included(&"walls".into()));
        assert!(collection.is_included(&ids[0].into()));
        assert!(!collection.is_included(&walls.into()));
        assert!(!collection.is_included(&"door".into()));
    }

    #[test]
    fn map_and_for_each_visit_in_order() {
        let (board, walls, ids) = board_with_walls();
        let collection = EntityCollection::of([walls]);

        let xs = collection.map(&board, |e| e.position().x);
        assert_eq!(xs, vec![0, 1, 2]);

        let mut seen = Vec::new();
        collection.for_each(&board, |id, index| seen.push((index, id)));
        assert_eq!(seen, vec![(0, ids[0]), (1, ids[1]), (2, ids[2])]);
    }
}
