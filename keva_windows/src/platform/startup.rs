//! Launch at Login via the per-user `Run` registry key.

use std::env;
use tracing::{info, warn};
use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_SAM_FLAGS, REG_SZ, RegCloseKey,
    RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};
use windows::core::{PCWSTR, w};

const RUN_KEY_PATH: PCWSTR = w!("SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run");

#[cfg(debug_assertions)]
const VALUE_NAME: PCWSTR = w!("Keva (Debug)");

#[cfg(not(debug_assertions))]
const VALUE_NAME: PCWSTR = w!("Keva");

/// Open handle to `HKCU\...\Run`, closed on drop.
struct RunKey(HKEY);

impl RunKey {
    fn open(access: REG_SAM_FLAGS) -> Option<Self> {
        let mut hkey = HKEY::default();
        let status =
            unsafe { RegOpenKeyExW(HKEY_CURRENT_USER, RUN_KEY_PATH, Some(0), access, &mut hkey) };
        status.is_ok().then_some(Self(hkey))
    }
}

impl Drop for RunKey {
    fn drop(&mut self) {
        unsafe {
            let _ = RegCloseKey(self.0);
        }
    }
}

/// Returns true if Keva is registered to launch at login.
pub fn is_launch_at_login_enabled() -> bool {
    let Some(key) = RunKey::open(KEY_READ) else {
        return false;
    };
    let mut data_size = 0u32;
    let status =
        unsafe { RegQueryValueExW(key.0, VALUE_NAME, None, None, None, Some(&mut data_size)) };
    status.is_ok() && data_size > 0
}

/// Adds or removes the registry entry. Returns `false` if the registry write failed.
pub fn set_launch_at_login(enabled: bool) -> bool {
    if enabled == is_launch_at_login_enabled() {
        return true;
    }
    let written = RunKey::open(KEY_WRITE).is_some_and(|key| {
        if enabled {
            register(&key)
        } else {
            unsafe { RegDeleteValueW(key.0, VALUE_NAME) }.is_ok()
        }
    });
    if written {
        info!(enabled, "launch at login updated");
    } else {
        warn!(enabled, "failed to update launch at login");
    }
    written
}

fn register(key: &RunKey) -> bool {
    let Ok(exe) = env::current_exe() else {
        return false;
    };
    // REG_SZ data: NUL-terminated UTF-16, as bytes
    let data: Vec<u8> = exe
        .to_string_lossy()
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect();
    unsafe { RegSetValueExW(key.0, VALUE_NAME, Some(0), REG_SZ, Some(&data)) }.is_ok()
}
