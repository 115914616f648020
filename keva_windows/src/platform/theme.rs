//! System theme detection and window size constants.

use keva_shell::config::Theme;
use tracing::warn;
use windows::UI::ViewManagement::{UIColorType, UISettings};
use windows::Win32::Foundation::COLORREF;

/// Initial window size in logical pixels.
pub const WINDOW_WIDTH: i32 = 800;
pub const WINDOW_HEIGHT: i32 = 600;

/// Resolves the configured preference to the theme the surface should use.
pub fn resolve(preference: Theme) -> Theme {
    match preference {
        Theme::System => detect_system(),
        explicit => explicit,
    }
}

/// Detects the system theme preference using UISettings.
/// Returns Dark if detection fails (safe default for dark backgrounds).
pub fn detect_system() -> Theme {
    let Ok(settings) = UISettings::new() else {
        warn!("UISettings unavailable, defaulting to dark theme");
        return Theme::Dark;
    };

    let Ok(foreground) = settings.GetColorValue(UIColorType::Foreground) else {
        warn!("foreground color unavailable, defaulting to dark theme");
        return Theme::Dark;
    };

    // https://learn.microsoft.com/en-us/windows/apps/desktop/modernize/ui/apply-windows-themes#know-when-dark-mode-is-enabled
    // Light foreground text means dark mode.
    let brightness = 5 * foreground.G as u32 + 2 * foreground.R as u32 + foreground.B as u32;
    if brightness > 8 * 128 {
        Theme::Dark
    } else {
        Theme::Light
    }
}

/// Background painted behind the WebView, matching the surface theme.
pub fn background(theme: Theme) -> COLORREF {
    match theme {
        Theme::Light => COLORREF(0x00ffffff),
        _ => COLORREF(0x001a1a1a),
    }
}
