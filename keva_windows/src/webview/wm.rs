//! Custom window messages (WM_APP + N).
use windows::Win32::UI::WindowsAndMessaging::WM_APP;

/// Posted by the worker's wake callback: drain the worker event channel.
pub const WORKER_EVENT: u32 = WM_APP + 1;

/// Posted by the bridge to open the file picker outside the WebView callback.
/// LPARAM contains a `Box<String>` pointer holding the target key.
pub const OPEN_FILE_PICKER: u32 = WM_APP + 2;

/// Posted once the worker has stopped; destroys the window outside any app borrow.
pub const SHUTDOWN_COMPLETE: u32 = WM_APP + 3;
