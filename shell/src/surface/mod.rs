//! The rendering-surface side of the shell.
//!
//! [`Surface`] is the one context object that owns the state mirror, the save
//! coordinator and the shutdown sequencer. Host messages reach it through its
//! [`Handler`](crate::bridge::Handler) implementation; user input reaches it
//! through the methods in `input`. Everything runs on one thread inside a
//! `LocalSet`.

mod attachments;
mod handlers;
mod input;
mod io;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use crate::bridge::dispatch::{self, DispatchStats};
use crate::bridge::{BridgeReceiver, BridgeSender, ContentHandle, IncomingMessage, OutgoingMessage};
use crate::error::Result;
use crate::save::{ContentSink, SaveCoordinator, SaveTarget};
use crate::shutdown::ShutdownSequencer;
use crate::state::StateMirror;

pub use attachments::{finalize, plan_batch, unique_name};
pub use input::{Key, KeyRoute};
pub use io::{Clipboard, ContentSource, FileContent, TouchingSink};

/// Services the surface is built over.
pub struct SurfaceIo {
    pub content: Rc<dyn ContentSource>,
    pub sink: Rc<dyn ContentSink>,
    pub clipboard: Rc<dyn Clipboard>,
}

impl SurfaceIo {
    /// File-backed content with a touch sent after each write.
    pub fn files(outbound: BridgeSender<IncomingMessage>, clipboard: Rc<dyn Clipboard>) -> Self {
        Self {
            content: Rc::new(FileContent),
            sink: Rc::new(TouchingSink::new(FileContent, outbound)),
            clipboard,
        }
    }
}

pub struct Surface {
    mirror: StateMirror,
    save: SaveCoordinator,
    shutdown: ShutdownSequencer,
    outbound: BridgeSender<IncomingMessage>,
    content: Rc<dyn ContentSource>,
    clipboard: Rc<dyn Clipboard>,
    /// Content handle of the loaded key.
    handle: RefCell<Option<ContentHandle>>,
    /// Sequence number of the host message being handled.
    dispatching: Cell<Option<u64>>,
}

impl Surface {
    /// Builds the components first, then wires them into the context.
    pub fn new(outbound: BridgeSender<IncomingMessage>, io: SurfaceIo, save_delay: Duration) -> Self {
        let mirror = StateMirror::new();
        let save = SaveCoordinator::new(mirror.clone(), io.sink, save_delay);
        let shutdown = ShutdownSequencer::new(mirror.clone(), save.clone());

        Self {
            mirror,
            save,
            shutdown,
            outbound,
            content: io.content,
            clipboard: io.clipboard,
            handle: RefCell::new(None),
            dispatching: Cell::new(None),
        }
    }

    pub fn mirror(&self) -> &StateMirror {
        &self.mirror
    }

    pub fn save(&self) -> &SaveCoordinator {
        &self.save
    }

    pub fn shutdown(&self) -> &ShutdownSequencer {
        &self.shutdown
    }

    /// Handles host messages until the host side of the bridge closes.
    pub async fn run(&self, receiver: BridgeReceiver<OutgoingMessage>) -> DispatchStats {
        self.shutdown.track(receiver.accepted());
        dispatch::run(receiver, self).await
    }

    fn send(&self, message: IncomingMessage) -> Result<()> {
        self.outbound.send(&message)
    }

    fn is_selected(&self, key: &str) -> bool {
        self.mirror
            .read(|state| state.selected_key.as_deref() == Some(key))
    }

    /// Save target for the loaded key, if it accepts edits.
    fn save_target(&self) -> Option<SaveTarget> {
        let key = self.mirror.read(|state| {
            if state.read_only {
                return None;
            }
            state
                .loaded_key
                .clone()
                .filter(|loaded| state.selected_key.as_ref() == Some(loaded))
        })?;
        let handle = self.handle.borrow().clone()?;
        if handle.read_only {
            return None;
        }
        Some(SaveTarget { key, handle })
    }

    /// Flushes pending edits. On failure the banner is already showing.
    async fn flush_or_keep(&self, reason: &'static str) -> bool {
        match self.save.flush_until_clean().await {
            Ok(()) => true,
            Err(e) => {
                warn!(reason, error = %e, "flush failed, keeping current key");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests;
