//! Keva Windows application.
//!
//! A borderless window hosting the WebView surface, with system tray
//! integration and a global hotkey. Everything that is not a Win32 call lives
//! in `keva_shell`.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(windows)]
mod app;
#[cfg(windows)]
mod platform;
#[cfg(windows)]
mod webview;

use tracing::Level;

#[cfg(windows)]
fn main() -> windows::core::Result<()> {
    keva_shell::logging::init(Level::INFO);
    platform::window::run()
}

#[cfg(not(windows))]
fn main() {
    keva_shell::logging::init(Level::INFO);
    tracing::error!("keva hosts a WebView2 window and only runs on Windows");
    std::process::exit(1);
}
