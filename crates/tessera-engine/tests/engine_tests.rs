//! End-to-end tests for the game driver.
//!
//! A small key-and-door game runs through the engine exactly as a host would
//! drive it: physical key names in, frames out.

use std::cell::Cell;
use std::rc::Rc;

use tessera_engine::prelude::*;

// ---------------------------------------------------------------------------
// Test game
// ---------------------------------------------------------------------------

const PLAYER: &str = "#0af";
const KEY: &str = "#f00";
const DOOR: &str = "#800";
const OPEN: &str = "#ccc";
const EXIT: &str = "#ff0";

/// Walk over the key to open the door, then reach the exit.
struct Vault {
    /// Ticks between blinks of the exit; zero disables blinking.
    blink_every: u64,
    blinks: Rc<Cell<u32>>,
}

impl Vault {
    fn new() -> Self {
        Self {
            blink_every: 0,
            blinks: Rc::new(Cell::new(0)),
        }
    }
}

fn vault_level(map: &[&str]) -> Level {
    let door = EntityTemplate::new(SolidTile::new(DOOR)).with_alias("door").build();
    let open = EntityTemplate::new(SolidTile::new(OPEN)).with_alias("open").build();
    let key = EntityTemplate::new(SolidTile::new(KEY)).with_alias("key").build();
    let exit = EntityTemplate::new(SolidTile::new(EXIT))
        .with_alias("exit")
        .with_animation("dim", SolidTile::new("#550"))
        .build();

    let door_for_handler = Rc::clone(&door);
    let player = EntityTemplate::new(SolidTile::new(PLAYER))
        .with_alias("player")
        .with_state("keys", 0)
        .unwrap()
        .with_physics(
            EntityPhysics::new()
                .blocking(EntityCollection::of(["walls", "doors"]))
                .handles_entering(EntityCollection::of(["key"])),
        )
        .with_handlers(EntityHandlers::new().on_enter(move |board, me, entered| {
            board.entity_mut(me)?.state.set("keys", 1)?;
            board.destroy(entered)?;
            let items = board.layer_id("items")?;
            door_for_handler.for_each_instance(board, |board, actor| {
                let at = actor.position(board)?;
                actor.destroy(board)?;
                open.create_entity(board, at, items).map(|_| ())
            })
        }))
        .build();

    Level::new(
        vec![
            LegendEntry::new('A', EntityTemplate::new(SolidTile::new("#444")).build(), "walls"),
            LegendEntry::new('K', key, "items"),
            LegendEntry::new('X', exit, "items"),
            LegendEntry::new('D', door, "doors"),
            LegendEntry::new('C', player, "fg"),
        ],
        map.iter().copied(),
    )
}

impl Game for Vault {
    fn define_levels(&mut self) -> Vec<Level> {
        vec![
            vault_level(&["AAAAAAA", "ACK.DXA", "AAAAAAA"]),
            vault_level(&["AAAAA", "ACXKA", "AAAAA"]),
        ]
    }

    fn define_key_mapping(&mut self, keys: &mut KeyMapping) {
        keys.define("action", "Action", "Undo", "Enter")
            .define("left", "Left", "Move left", "ArrowLeft")
            .define("right", "Right", "Move right", "ArrowRight");
    }

    fn on_init_level(&mut self, ctx: &mut GameContext<'_>) -> Result<(), EngineError> {
        ctx.board_mut().store_step();
        if self.blink_every > 0 {
            let blinks = Rc::clone(&self.blinks);
            ctx.scheduler_mut().schedule_every_ticks(self.blink_every, move |board, info| {
                let exit = board.find_entity("exit")?;
                let state = if info.tick % 2 == 0 { IDLE } else { "dim" };
                board.entity_mut(exit)?.set_animation_state(state);
                blinks.set(blinks.get() + 1);
                Ok(())
            })?;
        }
        Ok(())
    }

    fn on_input(&mut self, ctx: &mut GameContext<'_>, event: &InputEvent) -> Result<(), EngineError> {
        if event.keyname() == Some("action") {
            if ctx.board().can_go_back() {
                ctx.board_mut().go_back()?;
                ctx.request_redraw();
            }
            return Ok(());
        }
        let hero = ctx.find_entity("player")?;
        if ctx.board_mut().hook_to_movement(hero, event)? == Some(true) {
            ctx.board_mut().store_step();
            ctx.request_redraw();
        }
        Ok(())
    }

    fn check_level_win(&self, board: &Board) -> bool {
        let (Ok(hero), Ok(exit)) = (board.find_entity("player"), board.find_entity("exit")) else {
            return false;
        };
        match (board.entity(hero), board.entity(exit)) {
            (Ok(h), Ok(x)) => h.position().same_cell(x.position()),
            _ => false,
        }
    }
}

fn start(game: Vault) -> GameEngine<Vault, DrawList> {
    GameEngine::new(game, DrawList::new(), EngineConfig::default()).unwrap()
}

fn color(engine: &GameEngine<Vault, DrawList>, x: i32, y: i32) -> Option<String> {
    engine
        .renderer()
        .color_at(Position::new(x, y))
        .map(|c| c.as_str().to_owned())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn first_frame_shows_the_level() {
    let engine = start(Vault::new());
    assert_eq!(color(&engine, 1, 1).as_deref(), Some(PLAYER));
    assert_eq!(color(&engine, 2, 1).as_deref(), Some(KEY));
    assert_eq!(color(&engine, 4, 1).as_deref(), Some(DOOR));
}

#[test]
fn collecting_the_key_opens_the_door() {
    let mut engine = start(Vault::new());
    assert!(engine.handle_key("ArrowRight").unwrap());

    assert_eq!(color(&engine, 2, 1).as_deref(), Some(PLAYER));
    assert_eq!(color(&engine, 4, 1).as_deref(), Some(OPEN));
    let hero = engine.board().find_entity("player").unwrap();
    assert_eq!(
        engine.board().entity(hero).unwrap().state.get::<i32>("keys").unwrap(),
        Some(1)
    );
}

#[test]
fn the_closed_door_blocks_the_player() {
    let mut engine = start(Vault::new());
    engine.handle_key("ArrowRight").unwrap();
    engine.handle_key("Enter").unwrap();
    assert_eq!(color(&engine, 4, 1).as_deref(), Some(DOOR));
    assert_eq!(color(&engine, 2, 1).as_deref(), Some(KEY));

    // Step around the key is impossible in a corridor, so teleport past it.
    let hero = engine.board().find_entity("player").unwrap();
    engine
        .board_mut()
        .move_relative(hero, Position::new(2, 0), None, MoveReason::Internal)
        .unwrap();
    let frames = engine.frames_drawn();
    engine.handle_key("ArrowRight").unwrap();
    assert_eq!(engine.frames_drawn(), frames);
    assert_eq!(
        engine.board().entity(hero).unwrap().position(),
        Position::new(3, 1)
    );
}

#[test]
fn undo_without_history_is_harmless() {
    let mut engine = start(Vault::new());
    let before = engine.board().state_hash().unwrap();
    assert!(engine.handle_key("enter").unwrap());
    assert_eq!(engine.board().state_hash().unwrap(), before);
    assert_eq!(engine.frames_drawn(), 1);
}

#[test]
fn reaching_the_exit_advances_and_finishing_completes() {
    let mut engine = start(Vault::new());
    for _ in 0..4 {
        engine.handle_key("ArrowRight").unwrap();
    }
    assert_eq!(engine.level_index(), 1);
    assert!(!engine.is_complete());
    assert_eq!(color(&engine, 1, 1).as_deref(), Some(PLAYER));

    engine.handle_key("ArrowRight").unwrap();
    assert!(engine.is_complete());
}

#[test]
fn rebound_keys_drive_the_game() {
    let mut engine = start(Vault::new());
    engine.keys_mut().rebind("right", "d").unwrap();
    assert!(!engine.handle_key("ArrowRight").unwrap());
    assert!(engine.handle_key("D").unwrap());
    assert_eq!(color(&engine, 2, 1).as_deref(), Some(PLAYER));
}

#[test]
fn scheduled_blinks_redraw_and_reset_on_restart() {
    let mut game = Vault::new();
    game.blink_every = 3;
    let blinks = Rc::clone(&game.blinks);
    let mut engine = start(game);

    for _ in 0..3 {
        engine.tick().unwrap();
    }
    assert_eq!(blinks.get(), 1);
    assert_eq!(color(&engine, 5, 1).as_deref(), Some("#550"));
    assert_eq!(engine.frames_drawn(), 2);

    // Restarting registers a fresh handler on a fresh clock.
    engine.restart_level().unwrap();
    assert_eq!(engine.scheduler().scheduled_count(), 1);
    assert_eq!(engine.scheduler().current_tick(), 0);
    for _ in 0..6 {
        engine.tick().unwrap();
    }
    assert_eq!(blinks.get(), 3);
    assert_eq!(color(&engine, 5, 1).as_deref(), Some(EXIT));
}

#[test]
fn config_scale_reaches_the_renderer() {
    let config = EngineConfig::from_json(r#"{"gameProps": {"tileSize": 8, "pixelSize": 1}}"#).unwrap();
    let engine = GameEngine::new(Vault::new(), DrawList::new(), config).unwrap();
    assert!(engine
        .renderer()
        .commands()
        .iter()
        .all(|c| c.width == 8 && c.height == 8));
}
