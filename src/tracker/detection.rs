//! Per-frame detector output.

use serde::{Deserialize, Serialize};

use crate::tracker::rect::Rect;

/// Coarse direction a detected bin appears to be facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    #[default]
    Unknown,
}

/// One raw bounding box from the detector, valid only for the frame it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box in pixel space
    pub rect: Rect,
    pub direction: Direction,
}

impl Detection {
    pub fn new(rect: Rect, direction: Direction) -> Self {
        Self { rect, direction }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self {
            rect,
            direction: Direction::Unknown,
        }
    }
}
