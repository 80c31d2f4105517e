//! Discrete input events delivered by the host.
//!
//! Key events carry a *logical* key name (`up`, `action`, ...) that the host
//! has already resolved from a physical key. Click events carry the clicked
//! tile plus the pixel offset inside it.
//!
//! The JSON form is tagged by `type`:
//!
//! ```json
//! {"type": "keypressed", "keyname": "up"}
//! {"type": "mouseclick", "tile": {"x": 1, "y": 2}, "x": 3, "y": 0}
//! ```

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// A logical key press.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyPress {
    pub keyname: String,
}

/// A click on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseClick {
    pub tile: Position,
    /// Pixel offset inside the clicked element.
    pub x: i32,
    pub y: i32,
}

/// Any event the host can deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputEvent {
    #[serde(rename = "keypressed")]
    KeyPressed(KeyPress),
    #[serde(rename = "mouseclick")]
    MouseClick(MouseClick),
}

impl InputEvent {
    /// A key press with the given logical name.
    pub fn key(keyname: impl Into<String>) -> Self {
        InputEvent::KeyPressed(KeyPress {
            keyname: keyname.into(),
        })
    }

    pub fn click(tile: Position, x: i32, y: i32) -> Self {
        InputEvent::MouseClick(MouseClick { tile, x, y })
    }

    /// The logical key name for key events.
    pub fn keyname(&self) -> Option<&str> {
        match self {
            InputEvent::KeyPressed(key) => Some(&key.keyname),
            InputEvent::MouseClick(_) => None,
        }
    }
}
