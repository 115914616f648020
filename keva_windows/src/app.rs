//! Per-window application context.
//!
//! Owned by the main window (`GWLP_USERDATA`) and only touched on the UI
//! thread. Every method takes `&self`: Win32 calls made from here can re-enter
//! the window procedure synchronously, so no borrow is held across them.

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, SystemTime};

use keva_shell::bridge::OutgoingMessage;
use keva_shell::bridge::messages::CopyAction;
use keva_shell::config::{AppConfig, Theme};
use keva_shell::geometry::{GeometryNegotiator, Point, Rect};
use keva_shell::host::{
    self, FsStore, HostAction, Outbound, Request, WindowCommand, WorkerEvent, WorkerHandle, worker,
};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{MOD_CONTROL, ReleaseCapture, VK_V};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, HTCAPTION, IsWindowVisible, PostMessageW, SW_HIDE,
    SW_SHOW, SetForegroundWindow, ShowWindow, WM_NCLBUTTONDOWN,
};

use crate::platform::hotkey::{GlobalHotkey, ShortcutBinding, held_modifiers};
use crate::platform::tray::TrayIcon;
use crate::platform::{clipboard, file_picker, handlers, startup, theme};
use crate::webview::{WebView, bridge, wm};

pub struct App {
    hwnd: HWND,
    data_dir: PathBuf,
    config: RefCell<AppConfig>,
    geometry: RefCell<GeometryNegotiator>,
    hotkey: RefCell<GlobalHotkey>,
    hotkey_suspended: Cell<bool>,
    worker: RefCell<Option<WorkerHandle>>,
    events: Receiver<WorkerEvent>,
    webview: RefCell<Option<WebView>>,
    theme: Cell<Theme>,
    tray: RefCell<Option<TrayIcon>>,
    /// Window that had focus before ours, restored on hide.
    prev_foreground: Cell<isize>,
    quitting: Cell<bool>,
}

impl App {
    /// Creates the context and starts the storage worker.
    pub fn new(hwnd: HWND, data_dir: PathBuf, config: AppConfig) -> Self {
        let dpi = handlers::window_dpi(hwnd);
        let geometry = GeometryNegotiator::new(handlers::scale_for_dpi(
            config.window.resize_border,
            dpi,
        ))
        .with_min_size(config.window.min_width, config.window.min_height);

        let (event_tx, events) = mpsc::channel();
        let target = hwnd.0 as isize;
        let wake: worker::Wake = Arc::new(move || unsafe {
            let _ = PostMessageW(
                Some(HWND(target as *mut _)),
                wm::WORKER_EVENT,
                WPARAM(0),
                LPARAM(0),
            );
        });

        let lifecycle = config.lifecycle.clone();
        let store_dir = data_dir.clone();
        let worker = worker::start(
            move || {
                let mut store = FsStore::open(&store_dir)?;
                let day = Duration::from_secs(24 * 60 * 60);
                store.maintenance(
                    SystemTime::now(),
                    day * lifecycle.trash_ttl_days,
                    day * lifecycle.purge_ttl_days,
                )?;
                Ok(store)
            },
            data_dir.clone(),
            event_tx,
            wake,
        );

        Self {
            hwnd,
            data_dir,
            theme: Cell::new(theme::resolve(config.general.theme)),
            config: RefCell::new(config),
            geometry: RefCell::new(geometry),
            hotkey: RefCell::new(GlobalHotkey::new(hwnd)),
            hotkey_suspended: Cell::new(false),
            worker: RefCell::new(Some(worker)),
            events,
            webview: RefCell::new(None),
            tray: RefCell::new(None),
            prev_foreground: Cell::new(0),
            quitting: Cell::new(false),
        }
    }

    /// Adds or removes the notification-area icon.
    pub fn show_tray_icon(&self, show: bool) {
        if show == self.tray.borrow().is_some() {
            return;
        }
        let icon = if show {
            match TrayIcon::add(self.hwnd) {
                Ok(icon) => Some(icon),
                Err(e) => {
                    warn!(error = %e, "tray icon unavailable");
                    return;
                }
            }
        } else {
            None
        };
        // Dropping the old icon removes it.
        drop(self.tray.replace(icon));
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn theme(&self) -> Theme {
        self.theme.get()
    }

    pub fn config(&self) -> AppConfig {
        self.config.borrow().clone()
    }

    /// Registers the configured global hotkey. Returns `false` if it is taken.
    pub fn register_hotkey(&self) -> bool {
        let shortcut = self.config.borrow().shortcuts.global_shortcut.clone();
        self.hotkey.borrow_mut().register(&shortcut)
    }

    pub fn unregister_hotkey(&self) {
        self.hotkey.borrow_mut().unregister();
    }

    // Geometry

    pub fn surface_bounds(&self) -> Rect {
        self.geometry.borrow().state().surface_bounds()
    }

    pub fn with_geometry<T>(&self, f: impl FnOnce(&mut GeometryNegotiator) -> T) -> T {
        f(&mut self.geometry.borrow_mut())
    }

    /// Records new window bounds and moves the WebView into the surface rectangle.
    pub fn on_bounds_changed(&self, bounds: Rect, maximized_or_snapped: bool) {
        let surface = self
            .geometry
            .borrow_mut()
            .on_bounds_changed(bounds, maximized_or_snapped);
        if let Some(wv) = self.webview() {
            wv.set_bounds(surface);
        }
    }

    pub fn on_dpi_changed(&self, dpi: u32) {
        let border = handlers::scale_for_dpi(self.config.borrow().window.resize_border, dpi);
        let surface = self.geometry.borrow_mut().set_border_width(border);
        if let Some(wv) = self.webview() {
            wv.set_bounds(surface);
        }
    }

    pub fn hit_test(&self, point: Point) -> u32 {
        self.geometry.borrow().hit_test(point).code()
    }

    // WebView

    fn webview(&self) -> Option<WebView> {
        self.webview.borrow().clone()
    }

    pub fn attach_webview(&self, wv: WebView) {
        wv.set_bounds(self.surface_bounds());
        *self.webview.borrow_mut() = Some(wv);
        debug!("webview attached");
    }

    pub fn post(&self, message: &OutgoingMessage) {
        self.post_outbound(Outbound {
            message: message.clone(),
            handle: None,
        });
    }

    fn post_outbound(&self, outbound: Outbound) {
        let Some(wv) = self.webview() else {
            debug!(message = ?outbound.message, "webview not ready, dropping message");
            return;
        };
        if let Err(e) = wv.post(&outbound) {
            warn!(error = %e, "failed to post message to webview");
        }
    }

    fn toast(&self, message: impl Into<String>) {
        self.post(&OutgoingMessage::Toast {
            message: message.into(),
        });
    }

    fn send_worker(&self, request: Request) {
        let sent = self
            .worker
            .borrow()
            .as_ref()
            .is_some_and(|worker| worker.send(request));
        if !sent {
            warn!("worker is not running, request dropped");
        }
    }

    // Surface → host

    /// Handles one JSON web message from the surface.
    pub fn on_web_message(&self, json: &str) {
        if let Some(action) = bridge::decode_web_message(json) {
            self.execute(action);
        }
    }

    fn execute(&self, action: HostAction) {
        match action {
            HostAction::Ready => {
                self.post(&OutgoingMessage::Theme {
                    theme: self.theme.get(),
                });
                // Worker answers with coreReady or coreInitFailed
                self.send_worker(Request::WebviewReady);
                if !self.config.borrow().general.welcome_shown {
                    self.post(&OutgoingMessage::ShowWelcome);
                }
            }
            HostAction::Worker(request) => self.send_worker(request),
            HostAction::Window(command) => self.window_command(command),
        }
    }

    fn window_command(&self, command: WindowCommand) {
        match command {
            WindowCommand::Hide => self.hide(),
            WindowCommand::ShutdownBlocked => {
                info!("surface blocked shutdown");
                self.quitting.set(false);
                self.show();
            }
            WindowCommand::OpenFilePicker { key } => {
                // The picker is modal; run it outside the WebView callback.
                let key = Box::new(key);
                unsafe {
                    let _ = PostMessageW(
                        Some(self.hwnd),
                        wm::OPEN_FILE_PICKER,
                        WPARAM(0),
                        LPARAM(Box::into_raw(key) as isize),
                    );
                }
            }
            WindowCommand::SaveSettings {
                config,
                launch_at_login,
            } => self.save_settings(config, launch_at_login),
            WindowCommand::SuspendHotkey => {
                self.hotkey_suspended.set(true);
                self.unregister_hotkey();
            }
            WindowCommand::ResumeHotkey => {
                self.hotkey_suspended.set(false);
                if !self.register_hotkey() {
                    self.toast("Global shortcut is in use by another application");
                }
            }
            WindowCommand::WelcomeResult { launch_at_login } => {
                startup::set_launch_at_login(launch_at_login);
                match host::mark_welcome_shown(&self.data_dir) {
                    Ok(saved) => *self.config.borrow_mut() = saved,
                    Err(e) => warn!(error = %e, "failed to record welcome"),
                }
            }
            WindowCommand::StartDrag => unsafe {
                let _ = ReleaseCapture();
                let _ = PostMessageW(
                    Some(self.hwnd),
                    WM_NCLBUTTONDOWN,
                    WPARAM(HTCAPTION as usize),
                    LPARAM(0),
                );
            },
            WindowCommand::DragRegions(regions) => {
                self.geometry.borrow_mut().set_drag_regions(&regions);
            }
        }
    }

    fn save_settings(&self, config: AppConfig, launch_at_login: bool) {
        let saved = match host::save_settings(&self.data_dir, &config) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "failed to save settings");
                self.toast(format!("Failed to save settings: {e}"));
                return;
            }
        };

        if !self.hotkey_suspended.get()
            && !self
                .hotkey
                .borrow_mut()
                .update(&saved.shortcuts.global_shortcut)
        {
            self.toast("Global shortcut is in use by another application");
        }
        if !startup::set_launch_at_login(launch_at_login) {
            self.toast("Failed to update Launch at Login");
        }

        let theme = theme::resolve(saved.general.theme);
        let border = saved.window.resize_border;
        let show_tray_icon = saved.general.show_tray_icon;
        *self.config.borrow_mut() = saved;
        self.show_tray_icon(show_tray_icon);
        self.on_dpi_changed(handlers::window_dpi(self.hwnd));
        debug!(border, "settings applied");
        self.set_theme(theme);
    }

    /// Picker result for a key; runs on the UI thread outside any callback.
    pub fn open_file_picker(&self, key: String) {
        let files = file_picker::open_file_picker(self.hwnd);
        if !files.is_empty() {
            self.send_worker(Request::FilesSelected { key, files });
        }
    }

    /// In-window shortcuts the surface cannot see on its own. Returns true if handled.
    pub fn on_accelerator(&self, vk_code: u32) -> bool {
        let held = held_modifiers();
        let (copy_markdown, copy_files) = {
            let config = self.config.borrow();
            (
                ShortcutBinding::parse(&config.shortcuts.copy_markdown),
                ShortcutBinding::parse(&config.shortcuts.copy_files),
            )
        };

        let action = if copy_markdown.is_some_and(|b| b.is_pressed(vk_code, held)) {
            Some(CopyAction::Markdown)
        } else if copy_files.is_some_and(|b| b.is_pressed(vk_code, held)) {
            Some(CopyAction::Files)
        } else {
            None
        };
        if let Some(action) = action {
            self.post(&OutgoingMessage::DoCopy { action });
            return true;
        }

        let paste = ShortcutBinding {
            modifiers: MOD_CONTROL,
            vk_code: VK_V.0 as u32,
        };
        if paste.is_pressed(vk_code, held) {
            // Text pastes fall through to the editor.
            let files = clipboard::read_files(self.hwnd);
            if !files.is_empty() {
                let files = files
                    .iter()
                    .map(|path| path.to_string_lossy().into_owned())
                    .collect();
                self.post(&OutgoingMessage::FilesPasted { files });
                return true;
            }
        }
        false
    }

    // Worker → host

    /// Drains every queued worker event. Runs on the wake message.
    pub fn drain_worker_events(&self) {
        loop {
            match self.events.try_recv() {
                Ok(WorkerEvent::Post(outbound)) => self.post_outbound(outbound),
                Ok(WorkerEvent::CopyToClipboard { paths }) => {
                    let success = clipboard::write_files(self.hwnd, &paths);
                    self.post(&OutgoingMessage::CopyResult { success });
                }
                Ok(WorkerEvent::ShutdownComplete) => {
                    self.finish_shutdown();
                    return;
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    warn!("worker event channel closed");
                    return;
                }
            }
        }
    }

    // Window lifecycle

    pub fn on_activate(&self, previous: isize) {
        if previous != 0 {
            self.prev_foreground.set(previous);
        }
    }

    pub fn show(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOW);
            let _ = SetForegroundWindow(self.hwnd);
        }
        self.post(&OutgoingMessage::FocusSearch);
    }

    /// Hides the window and gives focus back to whoever had it.
    pub fn hide(&self) {
        let prev = self.prev_foreground.get();
        unsafe {
            if prev != 0 {
                let _ = SetForegroundWindow(HWND(prev as *mut _));
            }
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }

    /// Global hotkey and tray click: show, or hide if already in front.
    pub fn toggle(&self) {
        let in_front = unsafe {
            IsWindowVisible(self.hwnd).as_bool() && GetForegroundWindow() == self.hwnd
        };
        if in_front { self.hide() } else { self.show() }
    }

    pub fn open_settings(&self) {
        self.show();
        self.post(&OutgoingMessage::OpenSettings {
            config: self.config(),
            launch_at_login: startup::is_launch_at_login_enabled(),
        });
    }

    pub fn on_system_theme_changed(&self) {
        if self.config.borrow().general.theme == Theme::System {
            self.set_theme(theme::detect_system());
        }
    }

    fn set_theme(&self, theme: Theme) {
        if self.theme.replace(theme) == theme {
            return;
        }
        info!(%theme, "theme changed");
        handlers::invalidate(self.hwnd);
        self.post(&OutgoingMessage::Theme { theme });
    }

    /// Asks the surface to flush and acknowledge before the worker stops.
    pub fn request_quit(&self) {
        if self.quitting.replace(true) {
            debug!("quit already in progress");
            return;
        }
        if self.webview.borrow().is_some() {
            info!("requesting surface shutdown");
            self.post(&OutgoingMessage::Shutdown);
        } else {
            self.send_worker(Request::Shutdown);
        }
    }

    fn finish_shutdown(&self) {
        if let Some(worker) = self.worker.borrow_mut().take() {
            worker.join();
        }
        info!("shutdown complete");
        unsafe {
            let _ = PostMessageW(
                Some(self.hwnd),
                wm::SHUTDOWN_COMPLETE,
                WPARAM(0),
                LPARAM(0),
            );
        }
    }
}
