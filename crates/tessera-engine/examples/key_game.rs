//! Key game -- collect colored keys to unlock doors of the same color.
//!
//! Run with:
//!   cargo run --example key_game -p tessera-engine
//!
//! Controls (type a line, then Enter):
//!   w/a/s/d -- move
//!   u -- undo the last move
//!   r -- restart the level
//!   q -- quit
//!
//! Set `RUST_LOG=tessera_grid=debug` to watch cascades resolve.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use tessera_engine::prelude::*;

// ---------------------------------------------------------------------------
// Terminal renderer
// ---------------------------------------------------------------------------

/// Draws one character per tile, picked by fill color.
struct Terminal {
    glyphs: HashMap<String, char>,
    cells: Vec<Vec<char>>,
}

impl Terminal {
    fn new(width: usize, height: usize) -> Self {
        let glyphs = [
            (FLOOR, ' '),
            (WALL, '#'),
            (PLAYER, '@'),
            (PLAYER_HAPPY, '@'),
            (RED, 'r'),
            (GREEN, 'g'),
            (BLUE, 'b'),
            (RED_DOOR, 'R'),
            (GREEN_DOOR, 'G'),
            (BLUE_DOOR, 'B'),
            (OPEN_DOOR, '/'),
        ]
        .into_iter()
        .map(|(color, glyph)| (color.to_owned(), glyph))
        .collect();
        Self {
            glyphs,
            cells: vec![vec![' '; width]; height],
        }
    }

    fn frame(&self) -> String {
        self.cells
            .iter()
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Renderer for Terminal {
    fn draw_box(&mut self, at: Position, _width: u32, _height: u32, color: &Color) {
        let (Ok(x), Ok(y)) = (usize::try_from(at.x), usize::try_from(at.y)) else {
            return;
        };
        if let Some(cell) = self.cells.get_mut(y).and_then(|row| row.get_mut(x)) {
            *cell = self.glyphs.get(color.as_str()).copied().unwrap_or('?');
        }
    }

    fn clear(&mut self) {
        for row in &mut self.cells {
            row.fill(' ');
        }
    }
}

// ---------------------------------------------------------------------------
// Game definition
// ---------------------------------------------------------------------------

const FLOOR: &str = "#111";
const WALL: &str = "#666";
const PLAYER: &str = "#0af";
const PLAYER_HAPPY: &str = "#0fa";
const RED: &str = "#f00";
const GREEN: &str = "#0f0";
const BLUE: &str = "#00f";
const RED_DOOR: &str = "#800";
const GREEN_DOOR: &str = "#080";
const BLUE_DOOR: &str = "#008";
const OPEN_DOOR: &str = "#ccc";

const MAP: [&str; 7] = [
    "AAAAAAAAAAAAAAA",
    "A....R.D.F..E.A",
    "A....G........A",
    "A....B........A",
    "A.....AAAAAAA.A",
    "A...C.AA......A",
    "AAAAAAAAAAAAAAA",
];

struct KeyGame;

/// The key of one color plus the doors it opens.
struct Lock {
    color: &'static str,
    key: Rc<EntityTemplate>,
    door: Rc<EntityTemplate>,
}

fn lock(color: &'static str, key: &'static str, door: &'static str) -> Lock {
    Lock {
        color,
        key: EntityTemplate::new(SolidTile::new(key))
            .with_alias(format!("key-{color}"))
            .build(),
        door: EntityTemplate::new(SolidTile::new(door))
            .with_alias(format!("door-{color}"))
            .build(),
    }
}

/// Collecting a key sets its flag, removes it, and swaps every door of its
/// color for an open one.
fn collect_key(locks: &[Lock], open_door: &Rc<EntityTemplate>) -> EntityHandlers {
    let doors: Vec<(String, &'static str, Rc<EntityTemplate>)> = locks
        .iter()
        .map(|l| (format!("key-{}", l.color), l.color, Rc::clone(&l.door)))
        .collect();
    let open_door = Rc::clone(open_door);

    EntityHandlers::new().on_enter(move |board, me, entered| {
        let alias = board.entity(entered)?.alias().map(str::to_owned);
        let Some((_, color, door)) = doors.iter().find(|(key, _, _)| Some(key) == alias.as_ref()) else {
            return Ok(());
        };

        let player = board.entity_mut(me)?;
        player.state.set(color, true)?;
        player.set_animation_state("happy");
        board.destroy(entered)?;

        let unlocked = board.layer_id("doorUnlocked")?;
        door.for_each_instance(board, |board, actor| {
            let at = actor.position(board)?;
            actor.destroy(board)?;
            open_door.create_entity(board, at, unlocked).map(|_| ())
        })
    })
}

impl Game for KeyGame {
    fn define_levels(&mut self) -> Vec<Level> {
        let locks = [
            lock("red", RED, RED_DOOR),
            lock("green", GREEN, GREEN_DOOR),
            lock("blue", BLUE, BLUE_DOOR),
        ];
        let open_door = EntityTemplate::new(SolidTile::new(OPEN_DOOR))
            .with_alias("door-open")
            .build();

        let player = EntityTemplate::new(SolidTile::new(PLAYER))
            .with_alias("player")
            .with_animation("happy", SolidTile::new(PLAYER_HAPPY))
            .with_physics(
                EntityPhysics::new()
                    .blocking(EntityCollection::of(["walls", "door"]))
                    .handles_entering(EntityCollection::of(["collectible"])),
            )
            .with_handlers(collect_key(&locks, &open_door))
            .build();

        let [red, green, blue] = locks;
        let legend = vec![
            LegendEntry::new('_', EntityTemplate::new(SolidTile::new(FLOOR)).build(), "bg").as_default(),
            LegendEntry::new('A', EntityTemplate::new(SolidTile::new(WALL)).build(), "walls"),
            LegendEntry::new('R', red.key, "collectible"),
            LegendEntry::new('G', green.key, "collectible"),
            LegendEntry::new('B', blue.key, "collectible"),
            LegendEntry::new('D', red.door, "door"),
            LegendEntry::new('F', green.door, "door"),
            LegendEntry::new('E', blue.door, "door"),
            LegendEntry::new('C', player, "fg"),
        ];
        vec![Level::new(legend, MAP)]
    }

    fn define_key_mapping(&mut self, keys: &mut KeyMapping) {
        keys.define("action", "Action", "Undo the last move", "Enter")
            .define("up", "Up", "Move up", "ArrowUp")
            .define("down", "Down", "Move down", "ArrowDown")
            .define("right", "Right", "Move right", "ArrowRight")
            .define("left", "Left", "Move left", "ArrowLeft");
    }

    fn on_init_level(&mut self, ctx: &mut GameContext<'_>) -> Result<(), EngineError> {
        ctx.board_mut().new_layer(Some("doorUnlocked"));
        let hero = ctx.find_entity("player")?;
        let state = &mut ctx.board_mut().entity_mut(hero)?.state;
        for color in ["red", "green", "blue"] {
            state.set(color, false)?;
        }
        ctx.board_mut().store_step();
        Ok(())
    }

    fn on_input(&mut self, ctx: &mut GameContext<'_>, event: &InputEvent) -> Result<(), EngineError> {
        if event.keyname() == Some("action") {
            match ctx.board_mut().go_back() {
                Ok(()) => ctx.request_redraw(),
                Err(GridError::Undo(_)) => tracing::debug!("nothing to undo"),
                Err(e) => return Err(e.into()),
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
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let terminal = Terminal::new(MAP[0].len(), MAP.len());
    let mut engine = GameEngine::new(KeyGame, terminal, EngineConfig::default())?;
    for (key_id, key) in [("up", "w"), ("left", "a"), ("down", "s"), ("right", "d"), ("action", "u")] {
        engine.keys_mut().rebind(key_id, key)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", engine.renderer().frame())?;

    let mut frames = engine.frames_drawn();
    for line in io::stdin().lock().lines() {
        for key in line?.split_whitespace() {
            match key {
                "q" => return Ok(()),
                "r" => engine.restart_level()?,
                _ => {
                    engine.handle_key(key)?;
                }
            }
        }
        if engine.frames_drawn() != frames {
            frames = engine.frames_drawn();
            writeln!(out, "\n{}", engine.renderer().frame())?;
        }
        out.flush()?;
    }
    Ok(())
}
