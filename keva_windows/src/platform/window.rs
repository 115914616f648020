//! Window creation and message handling.

use keva_shell::config;
use keva_shell::host;
use tracing::{info, warn};
use windows::{
    Win32::{
        Foundation::{HWND, LPARAM, LRESULT, WPARAM},
        System::{
            Com::{COINIT_APARTMENTTHREADED, CoInitializeEx},
            LibraryLoader::GetModuleHandleW,
        },
        UI::{
            HiDpi::{
                DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, GetDpiForSystem,
                SetProcessDpiAwarenessContext,
            },
            WindowsAndMessaging::{
                CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GWLP_USERDATA,
                GetMessageW, GetSystemMetrics, GetWindowLongPtrW, IDC_ARROW, LoadCursorW, MSG,
                PostQuitMessage, RegisterClassW, SM_CXSCREEN, SM_CYSCREEN, SW_SHOW,
                SetForegroundWindow, SetWindowLongPtrW, ShowWindow, TranslateMessage,
                WM_ACTIVATE, WM_CLOSE, WM_COMMAND, WM_CREATE, WM_DESTROY, WM_DPICHANGED,
                WM_GETMINMAXINFO, WM_HOTKEY, WM_NCACTIVATE, WM_NCCALCSIZE, WM_NCHITTEST,
                WM_PAINT, WM_SETTINGCHANGE, WM_WINDOWPOSCHANGED, WM_WINDOWPOSCHANGING,
                WNDCLASSW, WS_CLIPCHILDREN, WS_EX_APPWINDOW, WS_EX_TOPMOST, WS_MAXIMIZEBOX,
                WS_MINIMIZEBOX, WS_POPUP, WS_SIZEBOX, WS_SYSMENU,
            },
        },
    },
    core::{Result, w},
};

use super::handlers::{self, scale_for_dpi};
use super::hotkey::HOTKEY_ID;
use super::theme::{WINDOW_HEIGHT, WINDOW_WIDTH};
use super::tray::WM_TRAYICON;
use crate::app::App;
use crate::webview::{init_webview, wm};

/// Runs the application until the window is destroyed.
pub fn run() -> Result<()> {
    let data_dir = config::data_dir().unwrap_or_else(|e| {
        let fallback = std::env::temp_dir().join("keva");
        warn!(error = %e, dir = %fallback.display(), "using fallback data directory");
        fallback
    });
    let app_config = host::load_config(&data_dir);
    info!(dir = %data_dir.display(), "starting keva");

    unsafe {
        CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok()?;
        let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);

        let instance = GetModuleHandleW(None)?;
        let class_name = w!("KevaWindowClass");

        let wc = WNDCLASSW {
            lpfnWndProc: Some(wndproc),
            hInstance: instance.into(),
            hCursor: LoadCursorW(None, IDC_ARROW)?,
            lpszClassName: class_name,
            ..Default::default()
        };

        let atom = RegisterClassW(&wc);
        debug_assert!(atom != 0);

        // Borderless window with resize capability
        let style =
            WS_POPUP | WS_SIZEBOX | WS_MINIMIZEBOX | WS_MAXIMIZEBOX | WS_SYSMENU | WS_CLIPCHILDREN;
        let ex_style = WS_EX_APPWINDOW | WS_EX_TOPMOST;

        // Center window on the primary screen
        let dpi = GetDpiForSystem();
        let width = scale_for_dpi(WINDOW_WIDTH, dpi);
        let height = scale_for_dpi(WINDOW_HEIGHT, dpi);
        let x = (GetSystemMetrics(SM_CXSCREEN) - width) / 2;
        let y = (GetSystemMetrics(SM_CYSCREEN) - height) / 2;

        let hwnd = CreateWindowExW(
            ex_style,
            class_name,
            w!("Keva"),
            style,
            x,
            y,
            width,
            height,
            None,
            None,
            Some(instance.into()),
            None,
        )?;

        let app = Box::new(App::new(hwnd, data_dir, app_config));
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, Box::into_raw(app) as isize);

        // Seed the geometry; WM_WINDOWPOSCHANGED during creation ran before the app existed
        handlers::on_windowposchanged(hwnd);

        if let Some((data_dir, theme)) =
            with_app(hwnd, |app| (app.data_dir().to_path_buf(), app.theme()))
        {
            init_webview(hwnd, data_dir, theme, move |wv| {
                with_app(hwnd, |app| app.attach_webview(wv));
            });
        }

        with_app(hwnd, |app| app.show_tray_icon(app.config().general.show_tray_icon));
        if with_app(hwnd, |app| app.register_hotkey()) == Some(false) {
            warn!("global hotkey unavailable");
        }

        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = SetForegroundWindow(hwnd);

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        Ok(())
    }
}

/// Runs `f` against the App stored in the window's user data.
///
/// `None` during window creation and after `WM_DESTROY`. `App` only hands out
/// `&self`, so nested calls from re-entered window procedures are fine.
pub fn with_app<T>(hwnd: HWND, f: impl FnOnce(&App) -> T) -> Option<T> {
    let ptr = unsafe { GetWindowLongPtrW(hwnd, GWLP_USERDATA) } as *const App;
    if ptr.is_null() {
        return None;
    }
    Some(f(unsafe { &*ptr }))
}

extern "system" fn wndproc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    unsafe {
        match msg {
            WM_CREATE => handlers::on_create(hwnd),
            WM_GETMINMAXINFO => handlers::on_getminmaxinfo(hwnd, lparam),
            WM_NCCALCSIZE => handlers::on_nccalcsize(hwnd, wparam, lparam),
            // Prevent default non-client painting (gray border)
            WM_NCACTIVATE => LRESULT(1),
            WM_NCHITTEST => handlers::on_nchittest(hwnd, lparam)
                .unwrap_or_else(|| DefWindowProcW(hwnd, msg, wparam, lparam)),
            WM_WINDOWPOSCHANGING => {
                handlers::on_windowposchanging(hwnd, lparam);
                DefWindowProcW(hwnd, msg, wparam, lparam)
            }
            WM_WINDOWPOSCHANGED => {
                handlers::on_windowposchanged(hwnd);
                DefWindowProcW(hwnd, msg, wparam, lparam)
            }
            WM_DPICHANGED => handlers::on_dpichanged(hwnd, wparam, lparam),
            WM_ACTIVATE => {
                handlers::on_activate(hwnd, wparam, lparam);
                DefWindowProcW(hwnd, msg, wparam, lparam)
            }
            WM_HOTKEY if wparam.0 as i32 == HOTKEY_ID => {
                with_app(hwnd, |app| app.toggle());
                LRESULT(0)
            }
            WM_TRAYICON => handlers::on_trayicon(hwnd, lparam),
            WM_COMMAND => handlers::on_command(hwnd, wparam),
            WM_PAINT => handlers::on_paint(hwnd),
            WM_SETTINGCHANGE => handlers::on_settingchange(hwnd, lparam),
            wm::WORKER_EVENT => {
                with_app(hwnd, |app| app.drain_worker_events());
                LRESULT(0)
            }
            wm::SHUTDOWN_COMPLETE => {
                let _ = DestroyWindow(hwnd);
                LRESULT(0)
            }
            wm::OPEN_FILE_PICKER => {
                let ptr = lparam.0 as *mut String;
                if !ptr.is_null() {
                    let key = *Box::from_raw(ptr);
                    with_app(hwnd, |app| app.open_file_picker(key));
                }
                LRESULT(0)
            }
            WM_CLOSE => {
                // The window is destroyed once the surface and worker have shut down
                with_app(hwnd, |app| app.request_quit());
                LRESULT(0)
            }
            WM_DESTROY => {
                let ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *mut App;
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                if !ptr.is_null() {
                    let app = Box::from_raw(ptr);
                    app.unregister_hotkey();
                    // Also removes the tray icon.
                    drop(app);
                }
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
