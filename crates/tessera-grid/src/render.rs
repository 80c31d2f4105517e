//! Render contract between the board and a drawing backend.
//!
//! The board never draws anything itself. It walks its layers in paint order
//! and asks every entity's current [`Renderable`] to paint into a
//! [`RenderContext`], which forwards translated primitives to a
//! [`Renderer`] supplied by the host.
//!
//! Coordinates passed to the renderer are [`Position`]s: the cell part is in
//! tiles and the offset part is in sprite pixels. Widths and heights are in
//! sprite pixels; a backend turns them into screen units with
//! [`GameProps::pixel_size`].
//!
//! [`DrawList`] is a recording renderer used by headless hosts and tests.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::composite::Footprint;
use crate::entity::EntityId;
use crate::position::Position;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while painting the board.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The entity's current animation-state name has no registered animation.
    #[error("entity {entity} cannot render animation '{animation}': it is not defined")]
    UnknownAnimation { entity: EntityId, animation: String },
}

// ---------------------------------------------------------------------------
// Basic types
// ---------------------------------------------------------------------------

/// An opaque color understood by the backend (e.g. `"#ff0000"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub String);

impl Color {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Tile and pixel scale of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProps {
    /// Sprite pixels per tile edge.
    pub tile_size: u32,
    /// Screen pixels per sprite pixel.
    pub pixel_size: u32,
}

impl Default for GameProps {
    fn default() -> Self {
        Self {
            tile_size: 5,
            pixel_size: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Renderer / RenderContext
// ---------------------------------------------------------------------------

/// A drawing backend.
pub trait Renderer {
    /// Fill a `width x height` sprite-pixel box whose top-left corner is `at`.
    fn draw_box(&mut self, at: Position, width: u32, height: u32, color: &Color);

    /// Fill a single sprite pixel.
    fn draw_pixel(&mut self, at: Position, color: &Color) {
        self.draw_box(at, 1, 1, color);
    }

    /// Wipe the previous frame. Called before every full redraw.
    fn clear(&mut self) {}
}

/// A renderer handle translated by an accumulated offset.
pub struct RenderContext<'r> {
    renderer: &'r mut dyn Renderer,
    props: GameProps,
    offset: Position,
}

impl<'r> RenderContext<'r> {
    /// A root context with no offset.
    pub fn new(renderer: &'r mut dyn Renderer, props: GameProps) -> Self {
        Self {
            renderer,
            props,
            offset: Position::ZERO,
        }
    }

    pub fn props(&self) -> GameProps {
        self.props
    }

    /// The accumulated translation of this context.
    pub fn offset(&self) -> Position {
        self.offset
    }

    /// A child context translated by `offset` on top of this one.
    pub fn with_offset(&mut self, offset: Position) -> RenderContext<'_> {
        RenderContext {
            renderer: &mut *self.renderer,
            props: self.props,
            offset: self.offset + offset,
        }
    }

    pub fn draw_pixel(&mut self, at: Position, color: &Color) {
        self.renderer.draw_pixel(self.offset + at, color);
    }

    pub fn draw_box(&mut self, at: Position, width: u32, height: u32, color: &Color) {
        self.renderer.draw_box(self.offset + at, width, height, color);
    }
}

impl fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("props", &self.props)
            .field("offset", &self.offset)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Renderable
// ---------------------------------------------------------------------------

/// Anything that can paint itself into a context.
pub trait Renderable {
    fn render(&self, ctx: &mut RenderContext<'_>);

    /// Split this image into one renderable per footprint cell, row-major.
    ///
    /// Returns `None` when the image has no per-tile representation.
    fn split(&self, _footprint: Footprint) -> Option<Vec<Rc<dyn Renderable>>> {
        None
    }
}

impl<F> Renderable for F
where
    F: Fn(&mut RenderContext<'_>),
{
    fn render(&self, ctx: &mut RenderContext<'_>) {
        self(ctx)
    }
}

/// Split `image` for a composite of the given footprint.
///
/// Images that cannot split themselves are painted whole by the origin piece
/// and every other piece gets [`Blank`].
pub fn split_renderable(image: &Rc<dyn Renderable>, footprint: Footprint) -> Vec<Rc<dyn Renderable>> {
    let cells = footprint.cell_count();
    match image.split(footprint) {
        Some(pieces) if pieces.len() == cells => pieces,
        _ => {
            let mut pieces: Vec<Rc<dyn Renderable>> = Vec::with_capacity(cells);
            pieces.push(Rc::clone(image));
            pieces.extend((1..cells).map(|_| Rc::new(Blank) as Rc<dyn Renderable>));
            pieces
        }
    }
}

/// Paints nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blank;

impl Renderable for Blank {
    fn render(&self, _ctx: &mut RenderContext<'_>) {}
}

/// Fills a whole tile with one color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidTile {
    pub color: Color,
}

impl SolidTile {
    pub fn new(color: impl Into<String>) -> Self {
        Self {
            color: Color::new(color),
        }
    }
}

impl Renderable for SolidTile {
    fn render(&self, ctx: &mut RenderContext<'_>) {
        let size = ctx.props().tile_size;
        ctx.draw_box(Position::ZERO, size, size, &self.color);
    }

    fn split(&self, footprint: Footprint) -> Option<Vec<Rc<dyn Renderable>>> {
        Some(
            (0..footprint.cell_count())
                .map(|_| Rc::new(self.clone()) as Rc<dyn Renderable>)
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// DrawList
// ---------------------------------------------------------------------------

/// One recorded primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawCommand {
    pub at: Position,
    pub width: u32,
    pub height: u32,
    pub color: Color,
}

/// A renderer that records every primitive instead of drawing it.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// The color of the topmost box covering the top-left pixel of a tile.
    pub fn color_at(&self, cell: Position) -> Option<&Color> {
        self.commands
            .iter()
            .rev()
            .find(|c| c.at.same_cell(cell) && c.at.x_offset == 0 && c.at.y_offset == 0)
            .map(|c| &c.color)
    }
}

impl Renderer for DrawList {
    fn draw_box(&mut self, at: Position, width: u32, height: u32, color: &Color) {
        self.commands.push(DrawCommand {
            at,
            width,
            height,
            color: color.clone(),
        });
    }

    fn clear(&mut self) {
        self.commands.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_accumulate_through_children() {
        let mut list = DrawList::new();
        let mut root = RenderContext::new(&mut list, GameProps::default());
        {
            let mut child = root.with_offset(Position::new(2, 3));
            let mut grandchild = child.with_offset(Position::with_offset(1, 0, 2, 1));
            grandchild.draw_pixel(Position::with_offset(0, 0, 1, 1), &Color::new("#123"));
        }
        root.draw_pixel(Position::ZERO, &Color::new("#456"));

        assert_eq!(
            list.commands()[0].at,
            Position::with_offset(3, 3, 3, 2)
        );
        assert_eq!(list.commands()[0].width, 1);
        assert_eq!(list.commands()[1].at, Position::ZERO);
    }

    #[test]
    fn closures_are_renderable() {
        let sprite = |ctx: &mut RenderContext<'_>| {
            ctx.draw_box(Position::ZERO, 2, 3, &Color::new("red"));
        };
        let mut list = DrawList::new();
        sprite.render(&mut RenderContext::new(&mut list, GameProps::default()));
        assert_eq!(list.commands().len(), 1);
        assert_eq!(list.commands()[0].height, 3);
    }

    #[test]
    fn split_falls_back_to_origin_piece() {
        let image: Rc<dyn Renderable> = Rc::new(|ctx: &mut RenderContext<'_>| {
            ctx.draw_pixel(Position::ZERO, &Color::new("x"));
        });
        let pieces = split_renderable(&image, Footprint::new(2, 2));
        assert_eq!(pieces.len(), 4);

        let mut list = DrawList::new();
        for piece in &pieces {
            piece.render(&mut RenderContext::new(&mut list, GameProps::default()));
        }
        assert_eq!(list.commands().len(), 1);
    }

    #[test]
    fn solid_tiles_split_into_solid_tiles() {
        let image: Rc<dyn Renderable> = Rc::new(SolidTile::new("#0f0"));
        let pieces = split_renderable(&image, Footprint::new(3, 1));

        let mut list = DrawList::new();
        for piece in &pieces {
            piece.render(&mut RenderContext::new(&mut list, GameProps::default()));
        }
        assert_eq!(list.commands().len(), 3);
        assert!(list.commands().iter().all(|c| c.color == Color::new("#0f0")));
    }

    #[test]
    fn color_at_reports_topmost_tile() {
        let mut list = DrawList::new();
        list.draw_box(Position::new(1, 1), 5, 5, &Color::new("floor"));
        list.draw_box(Position::new(1, 1), 5, 5, &Color::new("player"));
        list.draw_pixel(Position::with_offset(1, 1, 2, 2), &Color::new("eye"));

        assert_eq!(list.color_at(Position::new(1, 1)), Some(&Color::new("player")));
        assert_eq!(list.color_at(Position::new(0, 0)), None);
    }
}
