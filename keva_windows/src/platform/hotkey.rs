//! Global hotkey registration using Win32 RegisterHotKey, plus matching of
//! the in-window copy shortcuts.
//!
//! Shortcut format: `[Ctrl+][Alt+][Shift+][Win+]<e.code>`
//! where `<e.code>` is the DOM KeyboardEvent.code value (e.g., "KeyA", "Digit1", "F12").
//!
//! Uses the `keycode` crate to convert DOM e.code to Windows scan codes,
//! then `MapVirtualKeyW` to convert scan codes to virtual key codes.

use keycode::{KeyMap, KeyMappingCode};
use tracing::{debug, warn};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyState, HOT_KEY_MODIFIERS, MAPVK_VSC_TO_VK, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT,
    MOD_SHIFT, MOD_WIN, MapVirtualKeyW, RegisterHotKey, UnregisterHotKey, VIRTUAL_KEY,
    VK_CONTROL, VK_LWIN, VK_MENU, VK_RWIN, VK_SHIFT,
};

/// Unique ID for our global hotkey registration.
pub const HOTKEY_ID: i32 = 1;

/// Represents a parsed keyboard shortcut with modifiers and virtual key code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutBinding {
    pub modifiers: HOT_KEY_MODIFIERS,
    pub vk_code: u32,
}

impl ShortcutBinding {
    /// Parses a shortcut string like "Ctrl+Alt+KeyK" into a ShortcutBinding.
    ///
    /// Format: `[Ctrl+][Alt+][Shift+][Win+]<e.code>`
    ///
    /// Returns `None` if the shortcut string is empty or invalid.
    pub fn parse(shortcut: &str) -> Option<Self> {
        let shortcut = shortcut.trim();
        if shortcut.is_empty() {
            return None;
        }

        let mut modifiers = HOT_KEY_MODIFIERS(0);
        let mut key_part: Option<&str> = None;

        for part in shortcut.split('+') {
            let part = part.trim();
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= MOD_CONTROL,
                "alt" => modifiers |= MOD_ALT,
                "shift" => modifiers |= MOD_SHIFT,
                "win" | "meta" | "super" => modifiers |= MOD_WIN,
                _ => {
                    if key_part.is_some() {
                        return None;
                    }
                    key_part = Some(part);
                }
            }
        }

        let key = key_part?;
        let vk_code = Self::code_to_vk(key)?;

        Some(Self { modifiers, vk_code })
    }

    /// True when `vk_code` was pressed with exactly this binding's modifiers held.
    pub fn is_pressed(&self, vk_code: u32, held: HOT_KEY_MODIFIERS) -> bool {
        self.vk_code == vk_code && self.modifiers == held
    }

    /// Converts a DOM e.code string to a Windows virtual key code.
    ///
    /// Uses `keycode` crate to parse e.code → scan code, then `MapVirtualKeyW` for scan → VK.
    fn code_to_vk(code: &str) -> Option<u32> {
        let key_code: KeyMappingCode = code.parse().ok()?;
        let key_map = KeyMap::from(key_code);
        let scan_code = key_map.win as u32;

        if scan_code == 0 {
            return None;
        }

        // Convert scan code to virtual key code
        let vk = unsafe { MapVirtualKeyW(scan_code, MAPVK_VSC_TO_VK) };
        if vk == 0 {
            return None;
        }

        Some(vk)
    }
}

/// The global show/hide hotkey registered against the main window.
pub struct GlobalHotkey {
    hwnd: HWND,
    /// Currently registered shortcut string (`None` if nothing is registered).
    current: Option<String>,
}

impl GlobalHotkey {
    pub fn new(hwnd: HWND) -> Self {
        Self { hwnd, current: None }
    }

    /// Registers the hotkey from the given shortcut string.
    ///
    /// Returns `true` if registration succeeded or the shortcut was empty (no registration needed).
    /// Returns `false` if registration failed (shortcut in use by another application).
    pub fn register(&mut self, shortcut: &str) -> bool {
        let shortcut = shortcut.trim();
        if shortcut.is_empty() {
            return true;
        }

        let Some(binding) = ShortcutBinding::parse(shortcut) else {
            warn!(shortcut, "failed to parse shortcut");
            return false;
        };

        // Require Ctrl or Alt (matches the settings panel validation)
        if (binding.modifiers & (MOD_CONTROL | MOD_ALT)).0 == 0 {
            warn!(shortcut, "global shortcut must include Ctrl or Alt");
            return false;
        }

        // MOD_NOREPEAT prevents repeated WM_HOTKEY while held
        let modifiers = binding.modifiers | MOD_NOREPEAT;
        match unsafe { RegisterHotKey(Some(self.hwnd), HOTKEY_ID, modifiers, binding.vk_code) } {
            Ok(()) => {
                debug!(shortcut, "global hotkey registered");
                self.current = Some(shortcut.to_string());
                true
            }
            Err(e) => {
                warn!(shortcut, error = %e, "RegisterHotKey failed");
                false
            }
        }
    }

    /// Unregisters the current hotkey, if any.
    pub fn unregister(&mut self) {
        if self.current.take().is_some()
            && let Err(e) = unsafe { UnregisterHotKey(Some(self.hwnd), HOTKEY_ID) }
        {
            warn!(error = %e, "UnregisterHotKey failed");
        }
    }

    /// Re-registers if the shortcut changed. Returns `false` if registration failed.
    pub fn update(&mut self, shortcut: &str) -> bool {
        if self.current.as_deref() == Some(shortcut.trim()) {
            return true;
        }
        self.unregister();
        self.register(shortcut)
    }
}

/// Modifier keys currently held, in `RegisterHotKey` terms.
pub fn held_modifiers() -> HOT_KEY_MODIFIERS {
    let held = |vk: VIRTUAL_KEY| unsafe { GetKeyState(vk.0 as i32) < 0 };
    let mut modifiers = HOT_KEY_MODIFIERS(0);
    if held(VK_CONTROL) {
        modifiers |= MOD_CONTROL;
    }
    if held(VK_MENU) {
        modifiers |= MOD_ALT;
    }
    if held(VK_SHIFT) {
        modifiers |= MOD_SHIFT;
    }
    if held(VK_LWIN) || held(VK_RWIN) {
        modifiers |= MOD_WIN;
    }
    modifiers
}
