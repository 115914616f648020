//! Window message handlers.
//!
//! Frame geometry (`WM_NCCALCSIZE`, `WM_WINDOWPOSCHANGING`, `WM_NCHITTEST`,
//! `WM_WINDOWPOSCHANGED`) is answered by the app's `GeometryNegotiator`; these
//! functions only convert Win32 structures to and from its rectangles.

use keva_shell::geometry::{Point, Rect, WindowPosFlags};
use windows::Win32::{
    Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM},
    Graphics::Dwm::{DWMWA_WINDOW_CORNER_PREFERENCE, DWMWCP_ROUND, DwmSetWindowAttribute},
    Graphics::Gdi::{
        BeginPaint, CreateSolidBrush, DeleteObject, EndPaint, FillRect, GetMonitorInfoW,
        MONITOR_DEFAULTTONEAREST, MONITORINFO, MonitorFromWindow, PAINTSTRUCT, RDW_INVALIDATE,
        RedrawWindow,
    },
    UI::{
        HiDpi::GetDpiForWindow,
        WindowsAndMessaging::{
            GetClientRect, GetWindowRect, IsWindowVisible, IsZoomed, MINMAXINFO, NCCALCSIZE_PARAMS, PostMessageW,
            SET_WINDOW_POS_FLAGS, SWP_FRAMECHANGED, SWP_NOMOVE, SWP_NOOWNERZORDER, SWP_NOSIZE,
            SWP_NOZORDER, SetWindowPos, USER_DEFAULT_SCREEN_DPI, WINDOWPOS, WM_CLOSE,
            WM_LBUTTONUP, WM_RBUTTONUP, WVR_VALIDRECTS,
        },
    },
};
use windows::core::PCWSTR;
use windows_strings::w;

use super::tray::{self, TrayCommand};
use super::window::with_app;
use super::{startup, theme};

pub fn scale_for_dpi(logical: i32, dpi: u32) -> i32 {
    (logical as i64 * dpi as i64 / USER_DEFAULT_SCREEN_DPI as i64) as i32
}

pub fn window_dpi(hwnd: HWND) -> u32 {
    match unsafe { GetDpiForWindow(hwnd) } {
        0 => USER_DEFAULT_SCREEN_DPI,
        dpi => dpi,
    }
}

pub fn invalidate(hwnd: HWND) {
    unsafe {
        let _ = RedrawWindow(Some(hwnd), None, None, RDW_INVALIDATE);
    }
}

fn to_rect(rect: RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right, rect.bottom)
}

fn to_win32(rect: Rect) -> RECT {
    RECT {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

/// Signed cursor coordinates packed into an LPARAM.
fn lparam_point(lparam: LPARAM) -> Point {
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;
    Point::new(x, y)
}

/// A window snapped to a screen half fills the work area vertically and
/// touches one side; it gets no resize inset, like a maximized one.
fn is_snapped(hwnd: HWND, rect: RECT) -> bool {
    unsafe {
        let monitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST);
        let mut info = MONITORINFO {
            cbSize: size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if !GetMonitorInfoW(monitor, &mut info).as_bool() {
            return false;
        }
        let work = info.rcWork;
        rect.top == work.top
            && rect.bottom == work.bottom
            && (rect.left == work.left || rect.right == work.right)
            && (rect.right - rect.left) < (work.right - work.left)
    }
}

/// WM_CREATE: Enable rounded corners and trigger frame recalculation.
pub fn on_create(hwnd: HWND) -> LRESULT {
    unsafe {
        // Windows 11 rounded corners
        let preference = DWMWCP_ROUND;
        let _ = DwmSetWindowAttribute(
            hwnd,
            DWMWA_WINDOW_CORNER_PREFERENCE,
            &preference as *const _ as *const _,
            size_of_val(&preference) as u32,
        );

        // SWP_FRAMECHANGED triggers WM_NCCALCSIZE to set up the borderless frame
        let _ = SetWindowPos(
            hwnd,
            None,
            0,
            0,
            0,
            0,
            SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOOWNERZORDER,
        );
    }
    LRESULT(0)
}

/// WM_GETMINMAXINFO: Enforce the DPI-scaled minimum window size.
pub fn on_getminmaxinfo(hwnd: HWND, lparam: LPARAM) -> LRESULT {
    let info = lparam.0 as *mut MINMAXINFO;
    if info.is_null() {
        return LRESULT(0);
    }
    let scale = window_dpi(hwnd) as f64 / USER_DEFAULT_SCREEN_DPI as f64;
    if let Some((width, height)) =
        with_app(hwnd, |app| app.with_geometry(|g| g.min_track_size(scale)))
    {
        unsafe {
            (*info).ptMinTrackSize.x = width;
            (*info).ptMinTrackSize.y = height;
        }
    }
    LRESULT(0)
}

/// WM_NCCALCSIZE: The whole window is client area and no old pixels are kept.
pub fn on_nccalcsize(hwnd: HWND, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    // wparam == 0: simple request, returning 0 removes the non-client area
    if wparam.0 == 0 {
        return LRESULT(0);
    }

    let params = lparam.0 as *mut NCCALCSIZE_PARAMS;
    if params.is_null() {
        return LRESULT(0);
    }
    unsafe {
        let proposed = to_rect((*params).rgrc[0]);
        let Some(answer) = with_app(hwnd, |app| app.with_geometry(|g| g.on_calc_client(proposed)))
        else {
            return LRESULT(0);
        };
        (*params).rgrc[0] = to_win32(answer.client);
        (*params).rgrc[1] = to_win32(answer.preserve[0]);
        (*params).rgrc[2] = to_win32(answer.preserve[1]);
        if answer.validated {
            LRESULT(WVR_VALIDRECTS as isize)
        } else {
            LRESULT(0)
        }
    }
}

/// WM_WINDOWPOSCHANGING: Disable the pixel copy for this move or resize.
pub fn on_windowposchanging(hwnd: HWND, lparam: LPARAM) {
    let pos = lparam.0 as *mut WINDOWPOS;
    if pos.is_null() {
        return;
    }
    unsafe {
        let flags = WindowPosFlags::from_bits_retain((*pos).flags.0);
        if let Some(flags) = with_app(hwnd, |app| app.with_geometry(|g| g.on_position_changing(flags)))
        {
            (*pos).flags = SET_WINDOW_POS_FLAGS(flags.bits());
        }
    }
}

/// WM_WINDOWPOSCHANGED: Record bounds in screen coordinates and resize the WebView.
pub fn on_windowposchanged(hwnd: HWND) {
    let mut rect = RECT::default();
    unsafe {
        if GetWindowRect(hwnd, &mut rect).is_err() {
            return;
        }
    }
    let maximized = unsafe { IsZoomed(hwnd).as_bool() } || is_snapped(hwnd, rect);
    with_app(hwnd, |app| app.on_bounds_changed(to_rect(rect), maximized));
}

/// WM_NCHITTEST: Resize bands, drag regions, client.
pub fn on_nchittest(hwnd: HWND, lparam: LPARAM) -> Option<LRESULT> {
    let point = lparam_point(lparam);
    with_app(hwnd, |app| LRESULT(app.hit_test(point) as isize))
}

/// WM_DPICHANGED: Rescale the border and move to the suggested rectangle.
pub fn on_dpichanged(hwnd: HWND, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let dpi = (wparam.0 & 0xFFFF) as u32;
    with_app(hwnd, |app| app.on_dpi_changed(dpi));

    let suggested = lparam.0 as *const RECT;
    if !suggested.is_null() {
        unsafe {
            let rect = *suggested;
            let _ = SetWindowPos(
                hwnd,
                None,
                rect.left,
                rect.top,
                rect.right - rect.left,
                rect.bottom - rect.top,
                SWP_NOZORDER | SWP_NOOWNERZORDER,
            );
        }
    }
    LRESULT(0)
}

/// WM_ACTIVATE: Track previously focused window to restore on hide.
pub fn on_activate(hwnd: HWND, wparam: WPARAM, lparam: LPARAM) {
    let activating = (wparam.0 & 0xFFFF) != 0;
    if activating {
        with_app(hwnd, |app| app.on_activate(lparam.0));
    }
}

/// WM_TRAYICON: Handle system tray icon clicks.
pub fn on_trayicon(hwnd: HWND, lparam: LPARAM) -> LRESULT {
    // Low word of lparam contains the mouse message
    let mouse_msg = (lparam.0 & 0xFFFF) as u32;
    if mouse_msg == WM_LBUTTONUP {
        with_app(hwnd, |app| app.toggle());
    } else if mouse_msg == WM_RBUTTONUP {
        // The menu loop is modal; no app borrow is held across it.
        let visible = unsafe { IsWindowVisible(hwnd).as_bool() };
        tray::show_menu(hwnd, visible, startup::is_launch_at_login_enabled());
    }
    LRESULT(0)
}

/// WM_COMMAND: Handle menu commands from tray context menu.
pub fn on_command(hwnd: HWND, wparam: WPARAM) -> LRESULT {
    let Some(command) = TrayCommand::from_id((wparam.0 & 0xFFFF) as u32) else {
        return LRESULT(0);
    };
    match command {
        TrayCommand::Show => {
            with_app(hwnd, |app| app.show());
        }
        TrayCommand::Settings => {
            with_app(hwnd, |app| app.open_settings());
        }
        TrayCommand::LaunchAtLogin => {
            startup::set_launch_at_login(!startup::is_launch_at_login_enabled());
        }
        TrayCommand::Quit => unsafe {
            let _ = PostMessageW(Some(hwnd), WM_CLOSE, WPARAM(0), LPARAM(0));
        },
    }
    LRESULT(0)
}

/// WM_PAINT: Paint the inset band around the WebView in the theme background.
pub fn on_paint(hwnd: HWND) -> LRESULT {
    let background = theme::background(with_app(hwnd, |app| app.theme()).unwrap_or_default());
    unsafe {
        let mut ps = PAINTSTRUCT::default();
        let hdc = BeginPaint(hwnd, &mut ps);
        let brush = CreateSolidBrush(background);

        let mut client_rect = RECT::default();
        let _ = GetClientRect(hwnd, &mut client_rect);
        FillRect(hdc, &client_rect, brush);

        let _ = DeleteObject(brush.into());
        let _ = EndPaint(hwnd, &ps);
    }
    LRESULT(0)
}

/// WM_SETTINGCHANGE: Follow system theme changes.
pub fn on_settingchange(hwnd: HWND, lparam: LPARAM) -> LRESULT {
    // lparam points to the setting name as a wide string
    if lparam.0 != 0 {
        let setting = PCWSTR::from_raw(lparam.0 as *const u16);

        // "ImmersiveColorSet" is broadcast when system theme changes
        if unsafe { setting.as_wide() == w!("ImmersiveColorSet").as_wide() } {
            with_app(hwnd, |app| app.on_system_theme_changed());
        }
    }
    LRESULT(0)
}
