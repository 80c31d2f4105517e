//! Property tests for movement and undo.
//!
//! These tests build random walled rooms with boxes stacked on two layers,
//! drive the player with random key sequences, and check board invariants
//! after every move. Sticky blobs of random size check that clusters move
//! as one.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use proptest::prelude::*;
use tessera_grid::prelude::*;

const SIDE: i32 = 8;
const INTERIOR: usize = ((SIDE - 2) * (SIDE - 2)) as usize;
const BOX_LAYERS: [&str; 2] = ["low", "fg"];

/// One interior cell: whether a box sits on the low layer and on the fg
/// layer.
type Cell = (bool, bool);

/// Interior cells (inside the border walls), row-major. The player always
/// starts in the top-left interior cell.
fn room_strategy() -> impl Strategy<Value = Vec<Cell>> {
    prop::collection::vec(
        (prop::bool::weighted(0.3), prop::bool::weighted(0.3)),
        INTERIOR,
    )
}

fn direction_strategy() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::UP),
        Just(Position::DOWN),
        Just(Position::LEFT),
        Just(Position::RIGHT),
    ]
}

/// Build a room. Jammed boxes block each other; otherwise they push each
/// other in chains.
fn build(cells: &[Cell], jammed: bool) -> (Board, EntityId) {
    let box_physics = if jammed {
        EntityPhysics::new().blocking(EntityCollection::of(["walls", "box"]))
    } else {
        EntityPhysics::new()
            .blocking(EntityCollection::of(["walls"]))
            .pushable(EntityCollection::of(["box"]))
    };
    let box_template = EntityTemplate::new(Blank)
        .with_alias("box")
        .with_physics(box_physics)
        .build();
    let player = EntityTemplate::new(Blank)
        .with_alias("player")
        .with_physics(
            EntityPhysics::new()
                .blocking(EntityCollection::of(["walls"]))
                .pushable(EntityCollection::of(["box"])),
        )
        .build();
    let wall = EntityTemplate::new(Blank).with_alias("wall").build();

    let mut board = Board::new();
    let walls = board.new_layer(Some("walls"));
    let low = board.new_layer(Some("low"));
    let fg = board.new_layer(Some("fg"));

    for y in 0..SIDE {
        for x in 0..SIDE {
            let at = Position::new(x, y);
            if x == 0 || y == 0 || x == SIDE - 1 || y == SIDE - 1 {
                wall.create_entity(&mut board, at, walls).unwrap();
                continue;
            }
            let (on_low, on_fg) = cells[((y - 1) * (SIDE - 2) + (x - 1)) as usize];
            if on_low {
                box_template.create_entity(&mut board, at, low).unwrap();
            }
            if on_fg && (x, y) != (1, 1) {
                box_template.create_entity(&mut board, at, fg).unwrap();
            }
        }
    }
    let hero = player
        .create_entity(&mut board, Position::new(1, 1), fg)
        .unwrap()
        .primary_entity(&board)
        .unwrap();
    (board, hero)
}

/// No two entities of one layer share a cell and none stands inside a wall.
fn check_no_overlap(board: &Board) -> Result<(), TestCaseError> {
    let walls: HashSet<Position> = board
        .resolve_alias("walls")
        .into_iter()
        .map(|id| board.entity(id).unwrap().position())
        .collect();
    for layer in BOX_LAYERS {
        let mut occupied = HashSet::new();
        for id in board.resolve_alias(layer) {
            let at = board.entity(id).unwrap().position();
            prop_assert!(!walls.contains(&at), "entity {} inside a wall at {}", id, at);
            prop_assert!(occupied.insert(at), "two entities share {} on {}", at, layer);
        }
    }
    Ok(())
}

fn positions(board: &Board) -> HashMap<EntityId, Position> {
    board.entities().map(|e| (e.id(), e.position())).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn pushing_never_overlaps(
        cells in room_strategy(),
        jammed in any::<bool>(),
        moves in prop::collection::vec(direction_strategy(), 1..40),
    ) {
        let (mut board, hero) = build(&cells, jammed);
        check_no_overlap(&board)?;

        for d in moves {
            let before = board.state_hash().unwrap();
            let start = positions(&board);
            let moved = board.move_relative(hero, d, None, MoveReason::UserInput).unwrap();

            if moved {
                prop_assert_eq!(board.entity(hero).unwrap().position(), start[&hero] + d);
                // Everything else either stayed or moved by the same step.
                for (id, at) in positions(&board) {
                    let was = start[&id];
                    prop_assert!(at == was || at == was + d, "{} jumped from {} to {}", id, was, at);
                }
            } else {
                // A refused move changes nothing at all.
                prop_assert_eq!(board.state_hash().unwrap(), before);
            }
            check_no_overlap(&board)?;
        }
    }

    #[test]
    fn dry_run_agrees_with_commit(
        cells in room_strategy(),
        jammed in any::<bool>(),
        moves in prop::collection::vec(direction_strategy(), 1..30),
    ) {
        let (mut board, hero) = build(&cells, jammed);
        for d in moves {
            let predicted = board.can_move_relative(hero, d, None, MoveReason::UserInput).unwrap();
            let moved = board.move_relative(hero, d, None, MoveReason::UserInput).unwrap();
            prop_assert_eq!(predicted, moved);
        }
    }

    #[test]
    fn undo_unwinds_every_move(
        cells in room_strategy(),
        jammed in any::<bool>(),
        moves in prop::collection::vec(direction_strategy(), 1..20),
    ) {
        let (mut board, hero) = build(&cells, jammed);
        board.store_step();

        let mut hashes = vec![board.state_hash().unwrap()];
        for d in &moves {
            board.move_relative(hero, *d, None, MoveReason::UserInput).unwrap();
            board.store_step();
            hashes.push(board.state_hash().unwrap());
        }

        hashes.pop();
        while let Some(expected) = hashes.pop() {
            board.go_back().unwrap();
            prop_assert_eq!(board.state_hash().unwrap(), expected);
        }
        prop_assert!(!board.can_go_back());
    }

    #[test]
    fn collection_filters_commute(
        cells in room_strategy(),
        min_x in 0..SIDE,
        max_y in 0..SIDE,
    ) {
        let (board, _) = build(&cells, false);
        let all = EntityCollection::of(["fg", "low"]);
        let right = move |e: &Entity| e.position().x >= min_x;
        let high = move |e: &Entity| e.position().y <= max_y;

        let a = all.filter(right).filter(high).collect(&board);
        let b = all.filter(high).filter(right).collect(&board);
        prop_assert_eq!(a, b);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn sticky_blobs_move_as_one(
        width in 2i32..=7,
        height in 2i32..=7,
        d in direction_strategy(),
        pick in any::<prop::sample::Index>(),
        blocked in any::<bool>(),
    ) {
        let mut board = Board::new();
        let walls = board.new_layer(Some("walls"));
        let fg = board.new_layer(Some("fg"));
        let glue = Rc::new(
            EntityPhysics::new()
                .blocking(EntityCollection::of(["walls"]))
                .sticking(EntityCollection::of(["blob"])),
        );

        let mut blob = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let id = board
                    .spawn_entity(fg, Position::new(x + 2, y + 2), Rc::new(Blank), Some("blob"))
                    .unwrap();
                board.entity_mut(id).unwrap().set_physics(Rc::clone(&glue));
                blob.push(id);
            }
        }
        if blocked {
            // Right in front of the leading corner.
            let leading = if d.x > 0 || d.y > 0 { blob[blob.len() - 1] } else { blob[0] };
            let at = board.entity(leading).unwrap().position() + d;
            board.spawn_entity(walls, at, Rc::new(Blank), Some("wall")).unwrap();
        }

        let before = positions(&board);
        let hash = board.state_hash().unwrap();
        let mover = blob[pick.index(blob.len())];
        let moved = board.move_relative(mover, d, None, MoveReason::UserInput).unwrap();

        prop_assert_eq!(moved, !blocked);
        if moved {
            for id in &blob {
                prop_assert_eq!(board.entity(*id).unwrap().position(), before[id] + d);
            }
        } else {
            prop_assert_eq!(board.state_hash().unwrap(), hash);
        }
    }
}

#[test]
fn wall_layer_resolves_by_alias() {
    let (board, _) = build(&[(false, false); INTERIOR], false);
    assert_eq!(board.resolve_alias("walls").len(), (SIDE * 4 - 4) as usize);
    assert_eq!(board.resolve_alias("box").len(), 0);
}
