//! Win32 platform abstractions.

pub mod clipboard;
pub mod file_picker;
pub mod handlers;
pub mod hotkey;
pub mod startup;
pub mod theme;
pub mod tray;
pub mod window;
