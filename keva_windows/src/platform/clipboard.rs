//! Win32 clipboard operations.

use std::ffi::OsString;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;
use tracing::{debug, warn};
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, GetClipboardData, OpenClipboard, SetClipboardData,
};
use windows::Win32::System::Memory::{GMEM_MOVEABLE, GlobalAlloc, GlobalLock, GlobalUnlock};
use windows::Win32::System::Ole::CF_HDROP;
use windows::Win32::UI::Shell::{DragQueryFileW, HDROP};

/// Reads file paths from the clipboard (CF_HDROP). Empty if there are none.
pub fn read_files(hwnd: HWND) -> Vec<PathBuf> {
    let mut files = Vec::new();

    unsafe {
        if OpenClipboard(Some(hwnd)).is_err() {
            return files;
        }

        if let Ok(handle) = GetClipboardData(CF_HDROP.0 as u32)
            && !handle.is_invalid()
        {
            let hdrop = HDROP(handle.0 as *mut _);
            let count = DragQueryFileW(hdrop, 0xFFFFFFFF, None);
            for i in 0..count {
                let len = DragQueryFileW(hdrop, i, None);
                if len == 0 {
                    continue;
                }
                let mut buf = vec![0u16; (len + 1) as usize];
                let actual_len = DragQueryFileW(hdrop, i, Some(&mut buf));
                if actual_len > 0 {
                    buf.truncate(actual_len as usize);
                    files.push(PathBuf::from(OsString::from_wide(&buf)));
                }
            }
        }

        let _ = CloseClipboard();
    }

    files
}

/// Size of the DROPFILES header that precedes the path list.
const DROPFILES_HEADER: u32 = 20;

/// Builds a CF_HDROP payload: DROPFILES header, then NUL-terminated UTF-16
/// paths, then a final NUL.
fn drop_files_payload(paths: &[PathBuf]) -> Vec<u8> {
    let mut data = Vec::with_capacity(DROPFILES_HEADER as usize);
    data.extend_from_slice(&DROPFILES_HEADER.to_le_bytes()); // pFiles
    data.extend_from_slice(&0i32.to_le_bytes()); // pt.x
    data.extend_from_slice(&0i32.to_le_bytes()); // pt.y
    data.extend_from_slice(&0u32.to_le_bytes()); // fNC
    data.extend_from_slice(&1u32.to_le_bytes()); // fWide

    let units = paths
        .iter()
        .flat_map(|path| path.as_os_str().encode_wide().chain(std::iter::once(0)))
        .chain(std::iter::once(0));
    for unit in units {
        data.extend_from_slice(&unit.to_le_bytes());
    }
    data
}

/// Puts files on the clipboard as CF_HDROP. Returns `false` on any failure.
pub fn write_files(hwnd: HWND, paths: &[PathBuf]) -> bool {
    if paths.is_empty() {
        return false;
    }
    let data = drop_files_payload(paths);

    unsafe {
        if OpenClipboard(Some(hwnd)).is_err() {
            warn!("clipboard is held by another window");
            return false;
        }
        let _ = EmptyClipboard();

        let written = match GlobalAlloc(GMEM_MOVEABLE, data.len()) {
            Ok(hglobal) => {
                let ptr = GlobalLock(hglobal);
                if ptr.is_null() {
                    false
                } else {
                    std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
                    let _ = GlobalUnlock(hglobal);
                    // The clipboard owns the memory once SetClipboardData succeeds.
                    SetClipboardData(CF_HDROP.0 as u32, Some(HANDLE(hglobal.0))).is_ok()
                }
            }
            Err(_) => false,
        };

        let _ = CloseClipboard();
        if written {
            debug!(count = paths.len(), "files copied to clipboard");
        }
        written
    }
}
