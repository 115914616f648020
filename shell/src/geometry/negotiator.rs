use tracing::debug;

use super::hit_test::{HitRegion, classify};
use super::redraw::{CalcSizeResult, WindowPosFlags, collapse_preserve_rects, suppress_pixel_copy};
use super::{Point, Rect};

/// Upper bound on drag regions kept from the surface.
pub const MAX_DRAG_REGIONS: usize = 16;

/// Geometry of the host window as last reported by the OS.
#[derive(Debug, Clone)]
pub struct WindowGeometryState {
    bounds: Rect,
    border_inset: i32,
    is_maximized_or_snapped: bool,
    drag_regions: [Rect; MAX_DRAG_REGIONS],
    drag_region_count: usize,
}

impl WindowGeometryState {
    fn new(border_width: i32) -> Self {
        Self {
            bounds: Rect::ZERO,
            border_inset: border_width,
            is_maximized_or_snapped: false,
            drag_regions: [Rect::ZERO; MAX_DRAG_REGIONS],
            drag_region_count: 0,
        }
    }

    /// Window rectangle in screen coordinates.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Zero exactly when the window is maximized or snapped.
    pub fn border_inset(&self) -> i32 {
        self.border_inset
    }

    pub fn is_maximized_or_snapped(&self) -> bool {
        self.is_maximized_or_snapped
    }

    /// Drag regions relative to the rendering surface origin.
    pub fn drag_regions(&self) -> &[Rect] {
        &self.drag_regions[..self.drag_region_count]
    }

    /// Rendering surface bounds relative to the window's client origin.
    pub fn surface_bounds(&self) -> Rect {
        Rect::from_xywh(0, 0, self.bounds.width(), self.bounds.height()).inset(self.border_inset)
    }
}

/// Answers the OS geometry queries for the frameless window.
///
/// Owned by the native window thread. All methods run inside the OS event
/// pump, so none of them block or allocate.
#[derive(Debug, Clone)]
pub struct GeometryNegotiator {
    border_width: i32,
    /// Minimum window size in logical pixels.
    min_size: (i32, i32),
    state: WindowGeometryState,
}

impl GeometryNegotiator {
    /// Creates a negotiator with the given resize border width (clamped to at least 1).
    pub fn new(border_width: i32) -> Self {
        let border_width = border_width.max(1);
        Self {
            border_width,
            min_size: (0, 0),
            state: WindowGeometryState::new(border_width),
        }
    }

    /// Sets the minimum window size in logical pixels.
    pub fn with_min_size(mut self, width: i32, height: i32) -> Self {
        self.min_size = (width.max(0), height.max(0));
        self
    }

    /// Minimum tracking size in physical pixels for the given DPI scale.
    pub fn min_track_size(&self, scale: f64) -> (i32, i32) {
        let (width, height) = self.min_size;
        (
            (width as f64 * scale).round() as i32,
            (height as f64 * scale).round() as i32,
        )
    }

    pub fn state(&self) -> &WindowGeometryState {
        &self.state
    }

    /// Records new window bounds and returns the surface bounds to apply.
    pub fn on_bounds_changed(&mut self, bounds: Rect, maximized_or_snapped: bool) -> Rect {
        if maximized_or_snapped != self.state.is_maximized_or_snapped {
            debug!(maximized_or_snapped, "window frame state changed");
        }
        self.state.bounds = bounds;
        self.state.is_maximized_or_snapped = maximized_or_snapped;
        self.state.border_inset = if maximized_or_snapped {
            0
        } else {
            self.border_width
        };
        self.state.surface_bounds()
    }

    /// Updates the border width after a DPI change and returns the new surface bounds.
    pub fn set_border_width(&mut self, border_width: i32) -> Rect {
        self.border_width = border_width.max(1);
        let bounds = self.state.bounds;
        let maximized = self.state.is_maximized_or_snapped;
        self.on_bounds_changed(bounds, maximized)
    }

    /// Replaces the drag regions reported by the surface.
    ///
    /// Regions are advisory and unioned; empty ones are skipped and anything
    /// past [`MAX_DRAG_REGIONS`] is dropped.
    pub fn set_drag_regions(&mut self, regions: &[Rect]) {
        let mut count = 0;
        for region in regions.iter().filter(|r| !r.is_empty()) {
            if count == MAX_DRAG_REGIONS {
                debug!(
                    reported = regions.len(),
                    kept = MAX_DRAG_REGIONS,
                    "dropping excess drag regions"
                );
                break;
            }
            self.state.drag_regions[count] = *region;
            count += 1;
        }
        self.state.drag_region_count = count;
    }

    pub fn hit_test(&self, point: Point) -> HitRegion {
        classify(point, &self.state)
    }

    /// Client-geometry recalculation: full-window client, no preserved pixels.
    pub fn on_calc_client(&self, proposed_window: Rect) -> CalcSizeResult {
        collapse_preserve_rects(proposed_window)
    }

    /// Position-changing notification: disable the pixel copy for this change.
    pub fn on_position_changing(&self, flags: WindowPosFlags) -> WindowPosFlags {
        suppress_pixel_copy(flags)
    }
}
