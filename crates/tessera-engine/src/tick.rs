//! Periodic tick scheduling.
//!
//! The [`TickScheduler`] counts ticks and fires registered handlers on fixed
//! periods. Each call to [`TickScheduler::advance`]:
//!
//! 1. Increments the tick counter.
//! 2. Runs every handler whose period divides the new tick number, in
//!    registration order.
//!
//! The scheduler belongs to one [`GameEngine`](crate::game::GameEngine) and is
//! reset whenever a level is (re)loaded, so handlers never outlive the board
//! they were registered against.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use tessera_engine::tick::TickScheduler;
//! use tessera_grid::board::Board;
//!
//! let mut scheduler = TickScheduler::new(60).unwrap();
//! let fired = Rc::new(Cell::new(0));
//! let counter = Rc::clone(&fired);
//! scheduler
//!     .schedule_every_ticks(20, move |_board, _tick| {
//!         counter.set(counter.get() + 1);
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let mut board = Board::new();
//! for _ in 0..60 {
//!     scheduler.advance(&mut board).unwrap();
//! }
//! assert_eq!(scheduler.current_tick(), 60);
//! assert_eq!(fired.get(), 3);
//! ```

use std::fmt;

use tessera_grid::board::Board;
use tessera_grid::GridError;
use tracing::{debug, trace};

use crate::EngineError;

// ---------------------------------------------------------------------------
// TickInfo
// ---------------------------------------------------------------------------

/// Clock reading passed to every handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInfo {
    /// Tick number, starting at 1 for the first advance.
    pub tick: u64,
    /// Seconds of game time elapsed at this tick.
    pub second: f64,
}

// ---------------------------------------------------------------------------
// TickHandler
// ---------------------------------------------------------------------------

/// A periodic handler. It may mutate the board freely.
pub type TickHandler = Box<dyn FnMut(&mut Board, TickInfo) -> Result<(), GridError>>;

/// Identifies one registration for [`TickScheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

struct Scheduled {
    handle: ScheduleHandle,
    every: u64,
    handler: TickHandler,
}

// ---------------------------------------------------------------------------
// TickScheduler
// ---------------------------------------------------------------------------

pub struct TickScheduler {
    ticks_per_second: u32,
    current_tick: u64,
    next_handle: u64,
    scheduled: Vec<Scheduled>,
}

impl TickScheduler {
    /// Fails with [`EngineError::InvalidSchedule`] if `ticks_per_second` is
    /// zero.
    pub fn new(ticks_per_second: u32) -> Result<Self, EngineError> {
        if ticks_per_second == 0 {
            return Err(EngineError::InvalidSchedule {
                reason: "ticks per second must be positive".into(),
            });
        }
        Ok(Self::at_rate(ticks_per_second))
    }

    fn at_rate(ticks_per_second: u32) -> Self {
        Self {
            ticks_per_second,
            current_tick: 0,
            next_handle: 0,
            scheduled: Vec::new(),
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Game time at the current tick.
    pub fn elapsed_seconds(&self) -> f64 {
        self.current_tick as f64 / f64::from(self.ticks_per_second)
    }

    /// Number of live registrations.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.len()
    }

    // -- registration -------------------------------------------------------

    /// Run `handler` on every tick divisible by `ticks`.
    pub fn schedule_every_ticks<F>(&mut self, ticks: u64, handler: F) -> Result<ScheduleHandle, EngineError>
    where
        F: FnMut(&mut Board, TickInfo) -> Result<(), GridError> + 'static,
    {
        if ticks == 0 {
            return Err(EngineError::InvalidSchedule {
                reason: "period must be at least one tick".into(),
            });
        }
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;
        self.scheduled.push(Scheduled {
            handle,
            every: ticks,
            handler: Box::new(handler),
        });
        debug!(every = ticks, "tick handler scheduled");
        Ok(handle)
    }

    /// Run `handler` every `seconds` of game time, rounded to whole ticks.
    pub fn schedule_every_seconds<F>(&mut self, seconds: f64, handler: F) -> Result<ScheduleHandle, EngineError>
    where
        F: FnMut(&mut Board, TickInfo) -> Result<(), GridError> + 'static,
    {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(EngineError::InvalidSchedule {
                reason: format!("period of {seconds} seconds is not positive"),
            });
        }
        let ticks = (seconds * f64::from(self.ticks_per_second)).round();
        if ticks < 1.0 {
            return Err(EngineError::InvalidSchedule {
                reason: format!(
                    "{seconds} seconds is shorter than one tick at {} ticks per second",
                    self.ticks_per_second
                ),
            });
        }
        self.schedule_every_ticks(ticks as u64, handler)
    }

    /// Drop a registration. Returns whether it was still live.
    pub fn cancel(&mut self, handle: ScheduleHandle) -> bool {
        let before = self.scheduled.len();
        self.scheduled.retain(|s| s.handle != handle);
        before != self.scheduled.len()
    }

    /// Back to tick zero with no registrations.
    pub fn reset(&mut self) {
        self.current_tick = 0;
        self.scheduled.clear();
    }

    // -- execution ----------------------------------------------------------

    /// Advance one tick and run the handlers due on it.
    ///
    /// Returns how many handlers ran. The first handler error stops the
    /// tick; handlers after it do not run.
    pub fn advance(&mut self, board: &mut Board) -> Result<usize, EngineError> {
        self.current_tick += 1;
        let info = TickInfo {
            tick: self.current_tick,
            second: self.elapsed_seconds(),
        };

        let mut fired = 0;
        for scheduled in &mut self.scheduled {
            if info.tick % scheduled.every == 0 {
                (scheduled.handler)(board, info)?;
                fired += 1;
            }
        }
        trace!(tick = info.tick, fired, "tick advanced");
        Ok(fired)
    }
}

impl Default for TickScheduler {
    /// 60 ticks per second.
    fn default() -> Self {
        Self::at_rate(60)
    }
}

impl fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickScheduler")
            .field("ticks_per_second", &self.ticks_per_second)
            .field("current_tick", &self.current_tick)
            .field("scheduled", &self.scheduled.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
