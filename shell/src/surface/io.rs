//! I/O seams of the surface: content reads and writes, and the clipboard.

use std::io::ErrorKind;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

use crate::bridge::{BridgeSender, ContentHandle, IncomingMessage};
use crate::error::{Error, Result};
use crate::save::{ContentSink, SaveTarget};

/// Reads a key's content through its handle.
pub trait ContentSource {
    fn read<'a>(&'a self, handle: &'a ContentHandle) -> LocalBoxFuture<'a, Result<String>>;
}

/// Text clipboard available to the surface.
pub trait Clipboard {
    fn write_text<'a>(&'a self, text: &'a str) -> LocalBoxFuture<'a, Result<()>>;
}

/// Content handle backed by the file it names.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileContent;

impl ContentSource for FileContent {
    fn read<'a>(&'a self, handle: &'a ContentHandle) -> LocalBoxFuture<'a, Result<String>> {
        async move {
            match tokio::fs::read_to_string(&handle.path).await {
                Ok(content) => Ok(content),
                // A fresh key has no content file until its first save.
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(e.into()),
            }
        }
        .boxed_local()
    }
}

impl ContentSink for FileContent {
    fn write<'a>(&'a self, target: &'a SaveTarget, content: &'a str) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            if target.handle.read_only {
                return Err(Error::ContentWrite {
                    key: target.key.clone(),
                    reason: "content is read-only".to_string(),
                });
            }
            tokio::fs::write(&target.handle.path, content)
                .await
                .map_err(|e| Error::ContentWrite {
                    key: target.key.clone(),
                    reason: e.to_string(),
                })
        }
        .boxed_local()
    }
}

/// Wraps a sink and tells the host about every successful write, so it can
/// update the key's timestamp.
pub struct TouchingSink<S> {
    inner: S,
    outbound: BridgeSender<IncomingMessage>,
}

impl<S> TouchingSink<S> {
    pub fn new(inner: S, outbound: BridgeSender<IncomingMessage>) -> Self {
        Self { inner, outbound }
    }
}

impl<S: ContentSink> ContentSink for TouchingSink<S> {
    fn write<'a>(&'a self, target: &'a SaveTarget, content: &'a str) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            self.inner.write(target, content).await?;
            debug!(key = %target.key, "content written");
            if let Err(e) = self.outbound.send(&IncomingMessage::Touch {
                key: target.key.clone(),
            }) {
                // The content is on disk; a lost timestamp update is not a save failure.
                warn!(key = %target.key, error = %e, "touch not delivered");
            }
            Ok(())
        }
        .boxed_local()
    }
}
