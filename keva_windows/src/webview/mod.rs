//! WebView2 hosting: creation, posting messages and content handles.

pub mod bridge;
mod init;
pub mod wm;

pub use init::init_webview;

use keva_shell::bridge::ContentHandle;
use keva_shell::geometry::Rect;
use keva_shell::host::Outbound;
use webview2_com::Microsoft::Web::WebView2::Win32::{
    COREWEBVIEW2_FILE_SYSTEM_HANDLE_PERMISSION_READ_ONLY,
    COREWEBVIEW2_FILE_SYSTEM_HANDLE_PERMISSION_READ_WRITE, ICoreWebView2, ICoreWebView2_23,
    ICoreWebView2Controller, ICoreWebView2Environment, ICoreWebView2Environment14,
    ICoreWebView2ObjectCollection,
};
use windows::Win32::Foundation::{E_FAIL, RECT};
use windows::core::{IUnknown, Interface, PCWSTR, Result};

/// The hosted WebView. Cloning clones the COM references.
#[derive(Clone)]
pub struct WebView {
    pub controller: ICoreWebView2Controller,
    pub webview: ICoreWebView2,
    pub env: ICoreWebView2Environment,
}

impl WebView {
    /// Places the WebView at `bounds` within its parent's client area.
    pub fn set_bounds(&self, bounds: Rect) {
        let rect = RECT {
            left: bounds.left,
            top: bounds.top,
            right: bounds.right,
            bottom: bounds.bottom,
        };
        unsafe {
            let _ = self.controller.SetBounds(rect);
        }
    }

    /// Posts a message; a content handle travels as a file system handle object.
    pub fn post(&self, outbound: &Outbound) -> Result<()> {
        let json = bridge::encode(&outbound.message);
        match &outbound.handle {
            Some(handle) => self.post_with_handle(&json, handle),
            None => self.post_json(&json),
        }
    }

    fn post_json(&self, json: &str) -> Result<()> {
        // Keep the buffer alive until PostWebMessageAsJson returns
        let wide = bridge::wide(json);
        unsafe { self.webview.PostWebMessageAsJson(PCWSTR(wide.as_ptr())) }
    }

    fn post_with_handle(&self, json: &str, handle: &ContentHandle) -> Result<()> {
        let permission = if handle.read_only {
            COREWEBVIEW2_FILE_SYSTEM_HANDLE_PERMISSION_READ_ONLY
        } else {
            COREWEBVIEW2_FILE_SYSTEM_HANDLE_PERMISSION_READ_WRITE
        };
        let path = bridge::wide(&handle.path.to_string_lossy());
        let json = bridge::wide(json);

        unsafe {
            let env14 = self.env.cast::<ICoreWebView2Environment14>()?;
            let webview23 = self.webview.cast::<ICoreWebView2_23>()?;

            let file = env14.CreateWebFileSystemFileHandle(PCWSTR(path.as_ptr()), permission)?;
            let mut items = [Some(file.cast::<IUnknown>()?)];
            let mut collection: Option<ICoreWebView2ObjectCollection> = None;
            env14.CreateObjectCollection(1, items.as_mut_ptr(), &mut collection)?;
            let Some(objects) = collection else {
                return Err(E_FAIL.into());
            };

            webview23.PostWebMessageAsJsonWithAdditionalObjects(PCWSTR(json.as_ptr()), &*objects)
        }
    }
}
