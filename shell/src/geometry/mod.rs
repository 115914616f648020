//! Window geometry negotiation for the frameless host window.
//!
//! The host window has no OS-drawn frame. Resizing, dragging and the
//! maximize/snap transition are answered here from plain rectangles, so the
//! Win32 glue only has to translate message parameters in and out.

mod negotiator;
mod redraw;

pub use hit_test::{HitRegion, classify};
pub use negotiator::{GeometryNegotiator, MAX_DRAG_REGIONS, WindowGeometryState};
pub use redraw::{CalcSizeResult, WindowPosFlags, collapse_preserve_rects, suppress_pixel_copy};

use serde::{Deserialize, Serialize};

/// A point in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A rectangle with exclusive right/bottom edges, matching Win32 `RECT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub const fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right && p.y >= self.top && p.y < self.bottom
    }

    /// Shrinks the rectangle by `by` on every edge, never below zero size.
    pub fn inset(&self, by: i32) -> Rect {
        let width = (self.width() - 2 * by).max(0);
        let height = (self.height() - 2 * by).max(0);
        Rect::from_xywh(self.left + by, self.top + by, width, height)
    }

    /// Scales every coordinate, rounding outward so the scaled area covers the source.
    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::new(
            (self.left as f64 * factor).floor() as i32,
            (self.top as f64 * factor).floor() as i32,
            (self.right as f64 * factor).ceil() as i32,
            (self.bottom as f64 * factor).ceil() as i32,
        )
    }
}

#[cfg(test)]
mod tests;
