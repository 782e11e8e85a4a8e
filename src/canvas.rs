//! Geometry shared by every object placed on the map.
//!
//! Coordinates are integer centimetres on an unbounded canvas, so they may be
//! negative. Rotation and scale come straight from transform-end gestures.

use serde::{Deserialize, Serialize};

/// A position on the canvas (can be negative, the map has no fixed origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Width and height of an object's bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

/// Rotation (degrees) and scale applied on top of position and size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Transform {
    pub fn new(rotation: f32, scale_x: f32, scale_y: f32) -> Self {
        Self {
            rotation,
            scale_x,
            scale_y,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(0.0, 1.0, 1.0)
    }
}
