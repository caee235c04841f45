//! Small geometry value types shared by the window and display layers

use serde::{Deserialize, Serialize};

/// Window rectangle in root (screen) coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Usable area of the primary display (excludes panels/docks)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkArea {
    pub width: u32,
    pub height: u32,
}

impl WorkArea {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pointer position in root coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}
