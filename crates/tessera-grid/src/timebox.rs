//! Per-owner undo stacks.
//!
//! A [`TimeBox`] is an append-only stack of immutable snapshots. Owners push
//! a snapshot with [`TimeBox::store_step`] and travel back with
//! [`TimeBox::pop_step`], which discards the newest snapshot and hands back
//! the one below it.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UndoError
// ---------------------------------------------------------------------------

/// Errors produced when travelling back through a [`TimeBox`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UndoError {
    /// Going back needs the current step plus one earlier step to restore.
    #[error("cannot go back: {available} step(s) stored, at least 2 required")]
    InsufficientHistory {
        /// Number of steps stored when the pop was attempted.
        available: usize,
    },
    /// Restoring the current step of an empty stack.
    #[error("cannot restore: no step has been stored")]
    Empty,
}

// ---------------------------------------------------------------------------
// TimeBox
// ---------------------------------------------------------------------------

/// An append-only stack of snapshots of type `T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBox<T> {
    steps: Vec<T>,
}

impl<T> TimeBox<T> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Create a stack holding a single initial step.
    pub fn with_initial(step: T) -> Self {
        Self { steps: vec![step] }
    }

    /// Push a snapshot.
    pub fn store_step(&mut self, step: T) {
        self.steps.push(step);
    }

    /// Discard the newest snapshot and return the one that is now on top.
    ///
    /// With fewer than two stored steps there is nothing to go back to: the
    /// stack is left untouched and [`UndoError::InsufficientHistory`] is
    /// returned.
    pub fn pop_step(&mut self) -> Result<&T, UndoError> {
        if self.steps.len() < 2 {
            return Err(UndoError::InsufficientHistory {
                available: self.steps.len(),
            });
        }
        self.steps.pop();
        self.current().ok_or(UndoError::Empty)
    }

    /// Remove the newest snapshot without restoring anything.
    pub fn discard_step(&mut self) -> Option<T> {
        self.steps.pop()
    }

    /// The newest snapshot, if any.
    pub fn current(&self) -> Option<&T> {
        self.steps.last()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no snapshot has been stored.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether [`pop_step`](Self::pop_step) would succeed.
    pub fn can_go_back(&self) -> bool {
        self.steps.len() >= 2
    }

    /// Drop every stored snapshot.
    pub fn reset(&mut self) {
        self.steps.clear();
    }
}

impl<T> Default for TimeBox<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_returns_previous_step() {
        let mut tb = TimeBox::new();
        tb.store_step(1);
        tb.store_step(2);
        tb.store_step(3);

        assert_eq!(tb.pop_step(), Ok(&2));
        assert_eq!(tb.pop_step(), Ok(&1));
        assert_eq!(tb.len(), 1);
    }

    #[test]
    fn pop_with_single_step_fails_without_mutation() {
        let mut tb = TimeBox::with_initial("start");
        assert_eq!(
            tb.pop_step(),
            Err(UndoError::InsufficientHistory { available: 1 })
        );
        assert_eq!(tb.current(), Some(&"start"));
    }

    #[test]
    fn pop_on_empty_fails() {
        let mut tb: TimeBox<u8> = TimeBox::default();
        assert_eq!(
            tb.pop_step(),
            Err(UndoError::InsufficientHistory { available: 0 })
        );
        assert!(tb.is_empty());
    }

    #[test]
    fn discard_and_reset() {
        let mut tb = TimeBox::new();
        tb.store_step('a');
        tb.store_step('b');
        assert!(tb.can_go_back());
        assert_eq!(tb.discard_step(), Some('b'));
        assert!(!tb.can_go_back());
        tb.reset();
        assert!(tb.is_empty());
        assert_eq!(tb.discard_step(), None);
    }
}
