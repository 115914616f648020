//! Attachment picker built on IFileOpenDialog.

use std::path::PathBuf;
use tracing::{debug, warn};
use windows::Win32::Foundation::{ERROR_CANCELLED, HWND};
use windows::Win32::System::Com::{CLSCTX_INPROC_SERVER, CoCreateInstance, CoTaskMemFree};
use windows::Win32::UI::Shell::{
    FOS_ALLOWMULTISELECT, FOS_FILEMUSTEXIST, FOS_FORCEFILESYSTEM, FileOpenDialog,
    IFileOpenDialog, IShellItem, SIGDN_FILESYSPATH,
};
use windows::core::{HRESULT, Result, w};

/// Lets the user pick one or more existing files to attach.
/// Cancelling, like any failure, yields no files.
pub fn open_file_picker(parent: HWND) -> Vec<PathBuf> {
    match pick(parent) {
        Ok(paths) => {
            debug!(count = paths.len(), "files picked");
            paths
        }
        Err(e) if e.code() == HRESULT::from_win32(ERROR_CANCELLED.0) => Vec::new(),
        Err(e) => {
            warn!(error = %e, "file picker failed");
            Vec::new()
        }
    }
}

fn pick(parent: HWND) -> Result<Vec<PathBuf>> {
    unsafe {
        let dialog: IFileOpenDialog =
            CoCreateInstance(&FileOpenDialog, None, CLSCTX_INPROC_SERVER)?;
        let options = dialog.GetOptions()?;
        dialog
            .SetOptions(options | FOS_ALLOWMULTISELECT | FOS_FILEMUSTEXIST | FOS_FORCEFILESYSTEM)?;
        dialog.SetTitle(w!("Add Attachments"))?;
        dialog.Show(Some(parent))?;

        let results = dialog.GetResults()?;
        (0..results.GetCount()?)
            .map(|i| results.GetItemAt(i).and_then(|item| file_system_path(&item)))
            .collect()
    }
}

fn file_system_path(item: &IShellItem) -> Result<PathBuf> {
    unsafe {
        let name = item.GetDisplayName(SIGDN_FILESYSPATH)?;
        let path = name.to_string();
        CoTaskMemFree(Some(name.as_ptr() as *const _));
        Ok(PathBuf::from(path?))
    }
}
