//! Suppression of the OS "preserve old pixels" copy during resizes.
//!
//! When a window is resized from its left or top edge, the OS copies the old
//! client pixels anchored at the top-left corner, which makes the content
//! visibly jump before the next frame is rendered. Both the client-geometry
//! recalculation and the position-changing notification are answered so that
//! no copy happens.

use bitflags::bitflags;

use super::Rect;

bitflags! {
    /// Window-position flags carried by a position-changing notification.
    ///
    /// Bit values match Win32 `SWP_*` so the glue can convert losslessly.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WindowPosFlags: u32 {
        const NO_SIZE = 0x0001;
        const NO_MOVE = 0x0002;
        const NO_Z_ORDER = 0x0004;
        const NO_REDRAW = 0x0008;
        const NO_ACTIVATE = 0x0010;
        const FRAME_CHANGED = 0x0020;
        const SHOW_WINDOW = 0x0040;
        const HIDE_WINDOW = 0x0080;
        const NO_COPY_BITS = 0x0100;
        const NO_OWNER_Z_ORDER = 0x0200;
        const NO_SEND_CHANGING = 0x0400;
    }
}

/// Answer to a client-geometry recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalcSizeResult {
    /// New client rectangle; always the full proposed window rectangle.
    pub client: Rect,
    /// Destination and source preserve rectangles, both zero-area.
    pub preserve: [Rect; 2],
    /// Set when `preserve` was filled in manually (Win32 `WVR_VALIDRECTS`).
    pub validated: bool,
}

/// Builds the client-geometry answer for a proposed window rectangle.
pub fn collapse_preserve_rects(proposed_window: Rect) -> CalcSizeResult {
    let anchor = Rect::new(
        proposed_window.left,
        proposed_window.top,
        proposed_window.left,
        proposed_window.top,
    );
    CalcSizeResult {
        client: proposed_window,
        preserve: [anchor, anchor],
        validated: true,
    }
}

/// Disables the pixel-preserving copy for the position change in progress.
pub fn suppress_pixel_copy(flags: WindowPosFlags) -> WindowPosFlags {
    flags | WindowPosFlags::NO_COPY_BITS
}
