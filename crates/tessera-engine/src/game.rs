//! The game driver.
//!
//! A game implements [`Game`]: it declares its levels and logical keys, and
//! reacts to level initialization, input and ticks through hooks that receive
//! a [`GameContext`]. The [`GameEngine`] owns everything else: the level
//! list, the live [`Board`], the [`TickScheduler`] and the renderer.
//!
//! After every hook the engine settles the frame:
//!
//! 1. If the hook called [`GameContext::finish_level`] or
//!    [`Game::check_level_win`] reports a win, the next level loads (or the
//!    game is marked complete after the last one).
//! 2. Otherwise, if a redraw was requested, the board is redrawn.
//!
//! Loading a level always builds a fresh board, discards undo history, resets
//! the scheduler, runs [`Game::on_init_level`] and draws the first frame.

use tessera_grid::board::Board;
use tessera_grid::entity::EntityId;
use tessera_grid::input::InputEvent;
use tessera_grid::level::Level;
use tessera_grid::position::Position;
use tessera_grid::render::{RenderContext, Renderer};
use tessera_grid::GridError;
use tracing::{debug, info, trace};

use crate::config::EngineConfig;
use crate::keymap::KeyMapping;
use crate::tick::TickScheduler;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// Game-specific behaviour. Every hook defaults to doing nothing.
pub trait Game {
    /// The levels in play order. A game must define at least one.
    fn define_levels(&mut self) -> Vec<Level> {
        Vec::new()
    }

    fn define_key_mapping(&mut self, _keys: &mut KeyMapping) {}

    /// Runs once per level load, after the board is built.
    fn on_init_level(&mut self, _ctx: &mut GameContext<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    /// Runs for every mapped key press and every click.
    fn on_input(&mut self, _ctx: &mut GameContext<'_>, _event: &InputEvent) -> Result<(), EngineError> {
        Ok(())
    }

    /// Runs once per scheduler tick, after the scheduled handlers.
    fn on_tick(&mut self, _ctx: &mut GameContext<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    /// Polled after every hook.
    fn check_level_win(&self, _board: &Board) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// GameContext
// ---------------------------------------------------------------------------

/// What a hook may touch.
pub struct GameContext<'a> {
    board: &'a mut Board,
    scheduler: &'a mut TickScheduler,
    level_index: usize,
    redraw: bool,
    finished: bool,
}

impl<'a> GameContext<'a> {
    fn new(board: &'a mut Board, scheduler: &'a mut TickScheduler, level_index: usize) -> Self {
        Self {
            board,
            scheduler,
            level_index,
            redraw: false,
            finished: false,
        }
    }

    pub fn board(&self) -> &Board {
        self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        self.board
    }

    pub fn scheduler(&self) -> &TickScheduler {
        self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TickScheduler {
        self.scheduler
    }

    /// Zero-based index of the running level.
    pub fn level_index(&self) -> usize {
        self.level_index
    }

    /// The first attached entity carrying `alias`.
    pub fn find_entity(&self, alias: &str) -> Result<EntityId, GridError> {
        self.board.find_entity(alias)
    }

    /// Ask for the board to be redrawn once the hook returns.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    pub fn redraw_requested(&self) -> bool {
        self.redraw
    }

    /// End the current level once the hook returns.
    pub fn finish_level(&mut self) {
        self.finished = true;
    }

    fn outcome(&self) -> HookOutcome {
        HookOutcome {
            redraw: self.redraw,
            finished: self.finished,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct HookOutcome {
    redraw: bool,
    finished: bool,
}

// ---------------------------------------------------------------------------
// GameEngine
// ---------------------------------------------------------------------------

/// Drives a [`Game`] over its levels and draws into a [`Renderer`].
pub struct GameEngine<G, R> {
    game: G,
    renderer: R,
    config: EngineConfig,
    levels: Vec<Level>,
    level_index: usize,
    keys: KeyMapping,
    board: Board,
    scheduler: TickScheduler,
    frames_drawn: u64,
    complete: bool,
}

impl<G: Game, R: Renderer> GameEngine<G, R> {
    /// Collect the game's levels and keys, then load and draw level 0.
    pub fn new(mut game: G, renderer: R, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let levels = game.define_levels();
        if levels.is_empty() {
            return Err(EngineError::NoLevels);
        }
        let mut keys = KeyMapping::new();
        game.define_key_mapping(&mut keys);
        debug!(levels = levels.len(), keys = keys.len(), "game defined");

        let mut engine = Self {
            game,
            renderer,
            scheduler: TickScheduler::new(config.ticks_per_second)?,
            config,
            levels,
            level_index: 0,
            keys,
            board: Board::new(),
            frames_drawn: 0,
            complete: false,
        };
        engine.load_level(0)?;
        Ok(engine)
    }

    // -- accessors ----------------------------------------------------------

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn keys(&self) -> &KeyMapping {
        &self.keys
    }

    /// The key table, for rebinding.
    pub fn keys_mut(&mut self) -> &mut KeyMapping {
        &mut self.keys
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Whether the last level has been won.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of full redraws so far.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    // -- input --------------------------------------------------------------

    /// Resolve a physical key through the key table and deliver it.
    ///
    /// Returns `false` for keys with no binding; those never reach the game.
    pub fn handle_key(&mut self, physical_key: &str) -> Result<bool, EngineError> {
        let Some(key_id) = self.keys.resolve(physical_key) else {
            trace!(physical_key, "unbound key ignored");
            return Ok(false);
        };
        let event = InputEvent::key(key_id);
        self.handle_event(&event)?;
        Ok(true)
    }

    /// Deliver a click on `tile`, `x`/`y` pixels into it.
    pub fn handle_click(&mut self, tile: Position, x: i32, y: i32) -> Result<(), EngineError> {
        self.handle_event(&InputEvent::click(tile, x, y))
    }

    /// Deliver an already-resolved event.
    pub fn handle_event(&mut self, event: &InputEvent) -> Result<(), EngineError> {
        trace!(?event, "input");
        let outcome = self.run_hook(|game, ctx| game.on_input(ctx, event))?;
        self.settle(outcome)
    }

    // -- clock --------------------------------------------------------------

    /// Advance the scheduler one tick, then run [`Game::on_tick`].
    ///
    /// A tick on which any scheduled handler ran is redrawn.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        let fired = self.scheduler.advance(&mut self.board)?;
        let mut outcome = self.run_hook(|game, ctx| game.on_tick(ctx))?;
        outcome.redraw |= fired > 0;
        self.settle(outcome)
    }

    // -- levels -------------------------------------------------------------

    /// Rebuild the current level from its map.
    pub fn restart_level(&mut self) -> Result<(), EngineError> {
        self.load_level(self.level_index)
    }

    pub fn next_level(&mut self) -> Result<(), EngineError> {
        let next = self.level_index + 1;
        if next >= self.levels.len() {
            return Err(EngineError::NoMoreLevels {
                count: self.levels.len(),
            });
        }
        self.load_level(next)
    }

    fn load_level(&mut self, index: usize) -> Result<(), EngineError> {
        let level = &self.levels[index];
        self.board = level.create_board(|alias, layer| trace!(alias, ?layer, "layer created"))?;
        self.level_index = index;
        self.complete = false;
        self.scheduler.reset();
        info!(level = index, width = level.width(), height = level.height(), "level loaded");

        self.run_hook(|game, ctx| game.on_init_level(ctx))?;
        self.redraw()
    }

    // -- rendering ----------------------------------------------------------

    /// Clear the renderer and draw the whole board.
    pub fn redraw(&mut self) -> Result<(), EngineError> {
        self.renderer.clear();
        let mut ctx = RenderContext::new(&mut self.renderer, self.config.game_props);
        self.board.render(&mut ctx)?;
        self.frames_drawn += 1;
        Ok(())
    }

    /// Draw the board into some other renderer.
    pub fn render_to(&self, renderer: &mut dyn Renderer) -> Result<(), EngineError> {
        let mut ctx = RenderContext::new(renderer, self.config.game_props);
        self.board.render(&mut ctx)?;
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn run_hook<F>(&mut self, hook: F) -> Result<HookOutcome, EngineError>
    where
        F: FnOnce(&mut G, &mut GameContext<'_>) -> Result<(), EngineError>,
    {
        let mut ctx = GameContext::new(&mut self.board, &mut self.scheduler, self.level_index);
        hook(&mut self.game, &mut ctx)?;
        Ok(ctx.outcome())
    }

    fn settle(&mut self, outcome: HookOutcome) -> Result<(), EngineError> {
        if !self.complete && (outcome.finished || self.game.check_level_win(&self.board)) {
            if self.level_index + 1 < self.levels.len() {
                info!(level = self.level_index, "level won");
                return self.load_level(self.level_index + 1);
            }
            info!(level = self.level_index, "final level won");
            self.complete = true;
            return self.redraw();
        }
        if outcome.redraw {
            self.redraw()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
