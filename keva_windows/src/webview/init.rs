//! WebView2 initialization.

use std::ffi::c_void;
use std::path::{Path, PathBuf};

use keva_shell::config::Theme;
use keva_shell::host::store::DATA_HOST;
use tracing::{info, warn};
use webview2_com::Microsoft::Web::WebView2::Win32::{
    COREWEBVIEW2_COLOR, COREWEBVIEW2_HOST_RESOURCE_ACCESS_KIND_DENY_CORS,
    COREWEBVIEW2_KEY_EVENT_KIND, COREWEBVIEW2_KEY_EVENT_KIND_KEY_DOWN,
    CreateCoreWebView2Environment, ICoreWebView2, ICoreWebView2_3,
    ICoreWebView2AcceleratorKeyPressedEventArgs, ICoreWebView2Controller,
    ICoreWebView2Controller2, ICoreWebView2Environment, ICoreWebView2Settings9,
    ICoreWebView2WebMessageReceivedEventArgs,
};
use webview2_com::{
    AcceleratorKeyPressedEventHandler, CreateCoreWebView2ControllerCompletedHandler,
    CreateCoreWebView2EnvironmentCompletedHandler, WebMessageReceivedEventHandler,
};
use windows::Win32::Foundation::HWND;
use windows::Win32::System::Com::CoTaskMemFree;
use windows::core::{Interface, PCWSTR, PWSTR};

use super::WebView;
use super::bridge::{pwstr_to_string, wide};
use crate::platform::window::with_app;

/// Virtual host serving the surface's HTML, scripts and styles.
const UI_HOST: &str = "keva.local";

/// Directory holding the surface assets.
pub fn ui_root() -> PathBuf {
    #[cfg(feature = "dist")]
    {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("ui")))
            .unwrap_or_else(|| PathBuf::from("ui"))
    }
    #[cfg(not(feature = "dist"))]
    {
        PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/ui"))
    }
}

/// Creates the WebView2 for `hwnd` and hands it to `on_ready` once it exists.
/// Creation is async because the runtime may need to start or download.
pub fn init_webview(
    hwnd: HWND,
    data_dir: PathBuf,
    theme: Theme,
    on_ready: impl FnOnce(WebView) + 'static,
) {
    unsafe {
        let result = CreateCoreWebView2Environment(
            &CreateCoreWebView2EnvironmentCompletedHandler::create(Box::new(move |error, env| {
                if let Err(e) = error {
                    warn!(error = %e, "WebView2 environment creation failed");
                }
                let Some(env) = env else { return Ok(()) };
                create_controller(hwnd, env, data_dir, theme, on_ready);
                Ok(())
            })),
        );
        if let Err(e) = result {
            warn!(error = %e, "WebView2 runtime unavailable");
        }
    }
}

fn create_controller(
    hwnd: HWND,
    env: ICoreWebView2Environment,
    data_dir: PathBuf,
    theme: Theme,
    on_ready: impl FnOnce(WebView) + 'static,
) {
    let handler_env = env.clone();
    unsafe {
        let _ = env.CreateCoreWebView2Controller(
            hwnd,
            &CreateCoreWebView2ControllerCompletedHandler::create(Box::new(
                move |_error, controller| {
                    let Some(controller) = controller else {
                        warn!("WebView2 controller creation failed");
                        return Ok(());
                    };
                    let Some(webview) = setup_webview(&controller, hwnd, &data_dir) else {
                        return Ok(());
                    };

                    // Match the window background to avoid a flash during resize
                    if let Ok(controller2) = controller.cast::<ICoreWebView2Controller2>() {
                        let background = match theme {
                            Theme::Light => COREWEBVIEW2_COLOR { A: 255, R: 255, G: 255, B: 255 },
                            _ => COREWEBVIEW2_COLOR { A: 255, R: 26, G: 26, B: 26 },
                        };
                        let _ = controller2.SetDefaultBackgroundColor(background);
                    }
                    let _ = controller.SetIsVisible(true);

                    let url = wide(&format!("https://{UI_HOST}/index.html"));
                    let _ = webview.Navigate(PCWSTR(url.as_ptr()));
                    info!("webview created");

                    on_ready(WebView {
                        controller,
                        webview,
                        env: handler_env,
                    });
                    Ok(())
                },
            )),
        );
    }
}

fn setup_webview(
    controller: &ICoreWebView2Controller,
    hwnd: HWND,
    data_dir: &Path,
) -> Option<ICoreWebView2> {
    unsafe {
        let webview = controller.CoreWebView2().ok()?;

        // Enable CSS app-region: drag support for window dragging
        if let Ok(settings) = webview.Settings()
            && let Ok(settings9) = settings.cast::<ICoreWebView2Settings9>()
        {
            let _ = settings9.SetIsNonClientRegionSupportEnabled(true);
        }

        match webview.cast::<ICoreWebView2_3>() {
            Ok(webview3) => {
                for (host, folder) in [(UI_HOST, ui_root()), (DATA_HOST, data_dir.to_path_buf())] {
                    let host = wide(host);
                    let folder = wide(&folder.to_string_lossy());
                    let _ = webview3.SetVirtualHostNameToFolderMapping(
                        PCWSTR(host.as_ptr()),
                        PCWSTR(folder.as_ptr()),
                        COREWEBVIEW2_HOST_RESOURCE_ACCESS_KIND_DENY_CORS,
                    );
                }
            }
            Err(e) => warn!(error = %e, "virtual host mapping unavailable"),
        }

        let mut token = 0i64;
        let _ = webview.add_WebMessageReceived(
            &WebMessageReceivedEventHandler::create(Box::new(
                move |_webview, args: Option<ICoreWebView2WebMessageReceivedEventArgs>| {
                    let Some(args) = args else { return Ok(()) };
                    let mut message = PWSTR::null();
                    if args.TryGetWebMessageAsString(&mut message).is_err() || message.is_null() {
                        return Ok(());
                    }

                    let json = pwstr_to_string(message);
                    CoTaskMemFree(Some(message.as_ptr() as *const c_void));
                    with_app(hwnd, |app| app.on_web_message(&json));
                    Ok(())
                },
            )),
            &mut token,
        );

        let _ = controller.add_AcceleratorKeyPressed(
            &AcceleratorKeyPressedEventHandler::create(Box::new(
                move |_controller, args: Option<ICoreWebView2AcceleratorKeyPressedEventArgs>| {
                    let Some(args) = args else { return Ok(()) };
                    let mut kind = COREWEBVIEW2_KEY_EVENT_KIND::default();
                    args.KeyEventKind(&mut kind)?;
                    if kind != COREWEBVIEW2_KEY_EVENT_KIND_KEY_DOWN {
                        return Ok(());
                    }
                    let mut vk_code = 0u32;
                    args.VirtualKey(&mut vk_code)?;
                    if with_app(hwnd, |app| app.on_accelerator(vk_code)) == Some(true) {
                        args.SetHandled(true)?;
                    }
                    Ok(())
                },
            )),
            &mut token,
        );

        Some(webview)
    }
}
