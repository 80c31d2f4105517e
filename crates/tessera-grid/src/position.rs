//! Tile-grid vector values.
//!
//! A [`Position`] names a tile cell `(x, y)` plus a sub-tile pixel
//! displacement `(x_offset, y_offset)`. The offsets accumulate independently
//! of the cell and never take part in collision: two entities collide when
//! their cells match, whatever their offsets.
//!
//! Positions are plain `Copy` values. Entities replace their position on
//! every move instead of mutating it, so a position captured in an undo step
//! can never be changed behind the step's back.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A tile coordinate with a sub-tile pixel offset.
///
/// Equality compares all four fields. Use [`Position::same_cell`] to compare
/// only the tile cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Tile column.
    pub x: i32,
    /// Tile row.
    pub y: i32,
    /// Horizontal pixel displacement inside the tile.
    #[serde(default)]
    pub x_offset: i32,
    /// Vertical pixel displacement inside the tile.
    #[serde(default)]
    pub y_offset: i32,
}

impl Position {
    /// One tile up.
    pub const UP: Position = Position::new(0, -1);
    /// One tile down.
    pub const DOWN: Position = Position::new(0, 1);
    /// One tile left.
    pub const LEFT: Position = Position::new(-1, 0);
    /// One tile right.
    pub const RIGHT: Position = Position::new(1, 0);
    /// The zero vector.
    pub const ZERO: Position = Position::new(0, 0);

    /// The four unit steps of the 4-neighbourhood, in Up, Down, Right, Left order.
    pub const NEIGHBOURS: [Position; 4] = [
        Position::UP,
        Position::DOWN,
        Position::RIGHT,
        Position::LEFT,
    ];

    /// A cell position with zero offsets.
    pub const fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            x_offset: 0,
            y_offset: 0,
        }
    }

    /// A cell position with explicit sub-tile offsets.
    pub const fn with_offset(x: i32, y: i32, x_offset: i32, y_offset: i32) -> Self {
        Self {
            x,
            y,
            x_offset,
            y_offset,
        }
    }

    /// Fold any number of positions into one accumulated vector.
    ///
    /// An empty input yields [`Position::ZERO`].
    pub fn from_sum<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Position>,
    {
        positions.into_iter().fold(Position::ZERO, |acc, p| acc + p)
    }

    /// The displacement that takes `from` to `to`.
    pub fn from_difference(to: Position, from: Position) -> Self {
        to - from
    }

    /// Whether `other` is exactly one unit step away in the 4-neighbourhood.
    ///
    /// All four fields take part in the comparison, so positions with
    /// different sub-tile offsets are never adjacent.
    pub fn is_adjacent(&self, other: Position) -> bool {
        Self::NEIGHBOURS
            .iter()
            .any(|step| other + *step == *self)
    }

    /// Collapse this displacement to a single-tile unit step.
    ///
    /// The x axis takes priority: `(3, -2)` becomes `(1, 0)`. A displacement
    /// with no cell component collapses to [`Position::ZERO`].
    pub fn push_vector(&self) -> Position {
        if self.x != 0 {
            Position::new(self.x.signum(), 0)
        } else if self.y != 0 {
            Position::new(0, self.y.signum())
        } else {
            Position::ZERO
        }
    }

    /// Whether both positions name the same tile cell (offsets ignored).
    pub fn same_cell(&self, other: Position) -> bool {
        self.x == other.x && self.y == other.y
    }

    /// This position with its offsets cleared.
    pub fn cell(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            x_offset: self.x_offset + rhs.x_offset,
            y_offset: self.y_offset + rhs.y_offset,
        }
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        *self = *self + rhs;
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        self + -rhs
    }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position {
        Position {
            x: -self.x,
            y: -self.y,
            x_offset: -self.x_offset,
            y_offset: -self.y_offset,
        }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Position::new(x, y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{};{}", self.x, self.y, self.x_offset, self.y_offset)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_sum_accumulates_all_fields() {
        let sum = Position::from_sum([
            Position::with_offset(1, 2, 3, 4),
            Position::with_offset(-1, 5, 1, 1),
            Position::RIGHT,
        ]);
        assert_eq!(sum, Position::with_offset(1, 7, 4, 5));
    }

    #[test]
    fn from_sum_of_nothing_is_zero() {
        assert_eq!(Position::from_sum(std::iter::empty()), Position::ZERO);
    }

    #[test]
    fn from_difference_inverts_sum() {
        let from = Position::new(4, 4);
        let to = Position::new(2, 7);
        let delta = Position::from_difference(to, from);
        assert_eq!(delta, Position::new(-2, 3));
        assert_eq!(from + delta, to);
    }

    #[test]
    fn adjacency_is_four_neighbourhood() {
        let centre = Position::new(5, 5);
        assert!(centre.is_adjacent(Position::new(5, 4)));
        assert!(centre.is_adjacent(Position::new(5, 6)));
        assert!(centre.is_adjacent(Position::new(4, 5)));
        assert!(centre.is_adjacent(Position::new(6, 5)));

        assert!(!centre.is_adjacent(centre));
        assert!(!centre.is_adjacent(Position::new(6, 6)));
        assert!(!centre.is_adjacent(Position::new(7, 5)));
    }

    #[test]
    fn adjacency_respects_offsets() {
        let a = Position::new(0, 0);
        let b = Position::with_offset(1, 0, 2, 0);
        assert!(!a.is_adjacent(b));
    }

    #[test]
    fn push_vector_prefers_x_axis() {
        assert_eq!(Position::new(3, -2).push_vector(), Position::RIGHT);
        assert_eq!(Position::new(-7, 0).push_vector(), Position::LEFT);
        assert_eq!(Position::new(0, 4).push_vector(), Position::DOWN);
        assert_eq!(Position::new(0, -1).push_vector(), Position::UP);
        assert_eq!(Position::with_offset(0, 0, 3, 3).push_vector(), Position::ZERO);
    }

    #[test]
    fn same_cell_ignores_offsets() {
        let a = Position::with_offset(2, 3, 1, 1);
        assert!(a.same_cell(Position::new(2, 3)));
        assert_ne!(a, Position::new(2, 3));
        assert_eq!(a.cell(), Position::new(2, 3));
    }

    #[test]
    fn display_lists_all_fields() {
        assert_eq!(Position::with_offset(1, -2, 3, 0).to_string(), "1;-2;3;0");
    }

    #[test]
    fn serde_uses_camel_case_and_default_offsets() {
        let p: Position = serde_json::from_str(r#"{"x": 3, "y": 4}"#).unwrap();
        assert_eq!(p, Position::new(3, 4));

        let json = serde_json::to_value(Position::with_offset(1, 2, 3, 4)).unwrap();
        assert_eq!(json["xOffset"], 3);
        assert_eq!(json["yOffset"], 4);
    }
}
