//! WebView message bridge: JSON in and out of the page.

use keva_shell::bridge::{Decoded, IncomingMessage, OutgoingMessage, decode};
use keva_shell::host::{self, HostAction};
use tracing::{debug, trace, warn};
use windows::core::PWSTR;

/// Decodes a web message and routes it. `None` for anything the host ignores.
pub fn decode_web_message(json: &str) -> Option<HostAction> {
    match decode::<IncomingMessage>(json) {
        Decoded::Known { kind, message } => {
            trace!(%kind, "web message");
            host::route(message)
        }
        Decoded::Unknown { kind } => {
            debug!(%kind, "ignoring unknown web message");
            None
        }
        Decoded::Malformed(e) => {
            warn!(error = %e, "ignoring malformed web message");
            None
        }
    }
}

/// Serializes an outgoing message for `PostWebMessageAsJson`.
pub fn encode(message: &OutgoingMessage) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        warn!(error = %e, "failed to serialize message");
        String::from("{\"type\":\"unknown\"}")
    })
}

/// NUL-terminated UTF-16 for Win32 string parameters.
pub fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

pub fn pwstr_to_string(pwstr: PWSTR) -> String {
    if pwstr.is_null() {
        return String::new();
    }
    unsafe { pwstr.to_string().unwrap_or_default() }
}
