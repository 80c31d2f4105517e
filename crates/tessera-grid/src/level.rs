//! Level descriptions: a glyph legend plus an ASCII map.
//!
//! ```
//! use std::rc::Rc;
//! use tessera_grid::prelude::*;
//!
//! let wall = EntityTemplate::new(SolidTile::new("#444")).with_alias("wall").build();
//! let floor = EntityTemplate::new(SolidTile::new("#111")).build();
//! let level = Level::new(
//!     vec![
//!         LegendEntry::new('A', Rc::clone(&wall), "walls"),
//!         LegendEntry::new('_', floor, "bg").as_default(),
//!     ],
//!     ["AAA", "A.A"],
//! );
//!
//! let board = level.create_board(|_, _| {}).unwrap();
//! assert_eq!(wall.instances(&board).len(), 5);
//! assert_eq!(board.layer_id("bg").unwrap().index(), 1);
//! ```

use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

use crate::board::Board;
use crate::layer::LayerId;
use crate::position::Position;
use crate::template::EntityTemplate;
use crate::GridError;

/// Glyph meaning "nothing here".
pub const EMPTY_GLYPH: char = '.';

/// Malformed level data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("no legend entry for glyph '{glyph}' at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: i32, y: i32 },

    #[error("map row {row} has {found} cells, expected {expected}")]
    RaggedMap {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Binds a map glyph to a template and a target layer.
#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub glyph: char,
    pub template: Rc<EntityTemplate>,
    pub layer: String,
    /// Fill every cell of the map with this template.
    pub is_default: bool,
}

impl LegendEntry {
    pub fn new(glyph: char, template: Rc<EntityTemplate>, layer: impl Into<String>) -> Self {
        Self {
            glyph,
            template,
            layer: layer.into(),
            is_default: false,
        }
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// A legend and a rectangular map.
#[derive(Debug, Clone)]
pub struct Level {
    legend: Vec<LegendEntry>,
    map: Vec<String>,
}

impl Level {
    pub fn new<I, S>(legend: Vec<LegendEntry>, map: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legend,
            map: map.into_iter().map(Into::into).collect(),
        }
    }

    pub fn legend(&self) -> &[LegendEntry] {
        &self.legend
    }

    pub fn map(&self) -> &[String] {
        &self.map
    }

    /// Map width in tiles (length of the first row).
    pub fn width(&self) -> usize {
        self.map.first().map_or(0, |row| row.chars().count())
    }

    pub fn height(&self) -> usize {
        self.map.len()
    }

    /// Build a fresh board from this level.
    ///
    /// Layers are created in first-appearance order of their legend names
    /// and reported through `on_layer(alias, id)`. Map cells are spawned
    /// row-major, then the first default entry fills the whole rectangle.
    pub fn create_board(
        &self,
        mut on_layer: impl FnMut(&str, LayerId),
    ) -> Result<Board, GridError> {
        let width = self.width();
        for (row, line) in self.map.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(LevelError::RaggedMap {
                    row,
                    expected: width,
                    found,
                }
                .into());
            }
        }

        let mut board = Board::new();
        let mut layers: Vec<(&str, LayerId)> = Vec::new();
        for entry in &self.legend {
            if layers.iter().all(|(name, _)| *name != entry.layer) {
                let id = board.new_layer(Some(&entry.layer));
                on_layer(&entry.layer, id);
                layers.push((&entry.layer, id));
            }
        }
        let layer_of = |name: &str| {
            layers
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, id)| *id)
                .ok_or_else(|| GridError::UnknownLayer {
                    layer: name.to_owned(),
                })
        };

        for (y, line) in self.map.iter().enumerate() {
            for (x, glyph) in line.chars().enumerate() {
                if glyph == EMPTY_GLYPH {
                    continue;
                }
                let (x, y) = (x as i32, y as i32);
                let entry = self
                    .legend
                    .iter()
                    .find(|e| e.glyph == glyph)
                    .ok_or(LevelError::UnknownGlyph { glyph, x, y })?;
                entry
                    .template
                    .create_entity(&mut board, Position::new(x, y), layer_of(&entry.layer)?)?;
            }
        }

        if let Some(fill) = self.legend.iter().find(|e| e.is_default) {
            let layer = layer_of(&fill.layer)?;
            for x in 0..width as i32 {
                for y in 0..self.height() as i32 {
                    fill.template
                        .create_entity(&mut board, Position::new(x, y), layer)?;
                }
            }
        }

        debug!(
            width,
            height = self.height(),
            layers = board.layers().len(),
            entities = board.entity_count(),
            "board created from level"
        );
        Ok(board)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
