//! Ordered, typed message channel between the host and the rendering surface.
//!
//! Messages travel as JSON text with a `type` tag, exactly as the WebView
//! delivers them. Each direction is its own channel; order is preserved per
//! direction and nothing is dropped or duplicated. Receivers ignore types they
//! do not know so either side can be upgraded first.

mod channel;
pub mod dispatch;
pub mod messages;

pub use channel::{
    Accepted, BridgeReceiver, BridgeSender, ContentHandle, Decoded, Inbound, channel, decode,
};
pub use dispatch::{DispatchStats, Handler};
pub use messages::{IncomingMessage, Message, OutgoingMessage};

#[cfg(test)]
mod tests;
