//! Notification-area icon and its context menu.

use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::UI::Shell::{
    NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW, Shell_NotifyIconW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, DestroyMenu, GetCursorPos, HMENU, IDI_APPLICATION, LoadIconW,
    MENU_ITEM_FLAGS, MF_CHECKED, MF_GRAYED, MF_SEPARATOR, MF_STRING, SetForegroundWindow,
    TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_RIGHTBUTTON, TrackPopupMenu, WM_USER,
};
use windows::core::{Error, PCWSTR, Result, w};

/// Callback message the icon posts to its window.
pub const WM_TRAYICON: u32 = WM_USER + 1;

const ICON_UID: u32 = 1;

/// Menu entries; the discriminant doubles as the `WM_COMMAND` id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TrayCommand {
    Show = 1001,
    Settings = 1002,
    LaunchAtLogin = 1003,
    Quit = 1004,
}

impl TrayCommand {
    pub fn from_id(id: u32) -> Option<Self> {
        [Self::Show, Self::Settings, Self::LaunchAtLogin, Self::Quit]
            .into_iter()
            .find(|command| *command as u32 == id)
    }

    fn label(self) -> PCWSTR {
        match self {
            Self::Show => w!("Show Keva"),
            Self::Settings => w!("Settings..."),
            Self::LaunchAtLogin => w!("Launch at Login"),
            Self::Quit => w!("Quit Keva"),
        }
    }
}

/// Installed icon; removed again on drop.
pub struct TrayIcon {
    hwnd: HWND,
}

impl TrayIcon {
    pub fn add(hwnd: HWND) -> Result<Self> {
        let mut data = icon_data(hwnd);
        data.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
        data.uCallbackMessage = WM_TRAYICON;
        data.hIcon = unsafe { LoadIconW(None, IDI_APPLICATION)? };
        // The buffer is zeroed, so a short tip stays terminated.
        let room = data.szTip.len() - 1;
        for (slot, unit) in data.szTip[..room].iter_mut().zip("Keva".encode_utf16()) {
            *slot = unit;
        }

        if unsafe { Shell_NotifyIconW(NIM_ADD, &data) }.as_bool() {
            Ok(Self { hwnd })
        } else {
            Err(Error::from_win32())
        }
    }
}

impl Drop for TrayIcon {
    fn drop(&mut self) {
        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &icon_data(self.hwnd));
        }
    }
}

fn icon_data(hwnd: HWND) -> NOTIFYICONDATAW {
    NOTIFYICONDATAW {
        cbSize: size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: ICON_UID,
        ..Default::default()
    }
}

/// Rows of the menu, top to bottom. `None` is a separator.
fn menu_rows(visible: bool, launch_at_login: bool) -> [Option<(TrayCommand, MENU_ITEM_FLAGS)>; 6] {
    let flag = |set: bool, extra: MENU_ITEM_FLAGS| if set { MF_STRING | extra } else { MF_STRING };
    [
        Some((TrayCommand::Show, flag(visible, MF_GRAYED))),
        Some((TrayCommand::Settings, MF_STRING)),
        None,
        Some((TrayCommand::LaunchAtLogin, flag(launch_at_login, MF_CHECKED))),
        None,
        Some((TrayCommand::Quit, MF_STRING)),
    ]
}

/// Pops the menu up at the cursor. The pick comes back as `WM_COMMAND`.
pub fn show_menu(hwnd: HWND, visible: bool, launch_at_login: bool) {
    let Ok(menu) = (unsafe { CreatePopupMenu() }) else {
        return;
    };
    fill(menu, visible, launch_at_login);

    unsafe {
        let mut cursor = POINT::default();
        let _ = GetCursorPos(&mut cursor);
        // Without this the menu would not close on an outside click.
        let _ = SetForegroundWindow(hwnd);
        let _ = TrackPopupMenu(
            menu,
            TPM_LEFTALIGN | TPM_BOTTOMALIGN | TPM_RIGHTBUTTON,
            cursor.x,
            cursor.y,
            None,
            hwnd,
            None,
        );
        let _ = DestroyMenu(menu);
    }
}

fn fill(menu: HMENU, visible: bool, launch_at_login: bool) {
    for row in menu_rows(visible, launch_at_login) {
        let _ = unsafe {
            match row {
                Some((command, flags)) => AppendMenuW(menu, flags, command as usize, command.label()),
                None => AppendMenuW(menu, MF_SEPARATOR, 0, None),
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_round_trip() {
        for command in [
            TrayCommand::Show,
            TrayCommand::Settings,
            TrayCommand::LaunchAtLogin,
            TrayCommand::Quit,
        ] {
            assert_eq!(TrayCommand::from_id(command as u32), Some(command));
        }
        assert_eq!(TrayCommand::from_id(0), None);
        assert_eq!(TrayCommand::from_id(1005), None);
    }

    #[test]
    fn show_is_grayed_while_visible_and_login_checked() {
        let rows = menu_rows(true, true);
        assert_eq!(rows[0], Some((TrayCommand::Show, MF_STRING | MF_GRAYED)));
        assert_eq!(rows[3], Some((TrayCommand::LaunchAtLogin, MF_STRING | MF_CHECKED)));

        let rows = menu_rows(false, false);
        assert_eq!(rows[0], Some((TrayCommand::Show, MF_STRING)));
        assert_eq!(rows[3], Some((TrayCommand::LaunchAtLogin, MF_STRING)));
        assert_eq!(rows.iter().filter(|row| row.is_none()).count(), 2);
    }
}
