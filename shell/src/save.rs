//! Debounced, serialized persistence of in-progress edits.
//!
//! Every mutation re-arms a single timer; only the content present when the
//! timer finally fires is written. At most one write runs at a time, and a
//! forced flush waits behind it. The dirty flag is tracked by revision: it is
//! cleared only when the persisted revision equals the latest mutation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bridge::ContentHandle;
use crate::error::Result;
use crate::state::StateMirror;

/// Where a key's content is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    pub key: String,
    pub handle: ContentHandle,
}

/// Writes content for a key. Implemented over the content handle in production.
pub trait ContentSink {
    fn write<'a>(&'a self, target: &'a SaveTarget, content: &'a str)
    -> LocalBoxFuture<'a, Result<()>>;
}

/// Result of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing newer than the last persisted revision.
    Clean,
    /// The latest revision is persisted.
    Persisted,
    /// A write succeeded but content changed while it ran.
    StillDirty,
}

struct Draft {
    target: SaveTarget,
    content: String,
    revision: u64,
}

struct Inner {
    mirror: StateMirror,
    sink: Rc<dyn ContentSink>,
    delay: Duration,
    draft: RefCell<Option<Draft>>,
    revision: Cell<u64>,
    persisted: Cell<u64>,
    timer: RefCell<Option<JoinHandle<()>>>,
    write_lock: Mutex<()>,
    writes: Cell<u64>,
}

/// Coalesces bursts of edits into single writes.
///
/// Timers are spawned with [`tokio::task::spawn_local`], so mutations must be
/// made from inside a `LocalSet`.
#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Rc<Inner>,
}

impl SaveCoordinator {
    pub fn new(mirror: StateMirror, sink: Rc<dyn ContentSink>, delay: Duration) -> Self {
        Self {
            inner: Rc::new(Inner {
                mirror,
                sink,
                delay,
                draft: RefCell::new(None),
                revision: Cell::new(0),
                persisted: Cell::new(0),
                timer: RefCell::new(None),
                write_lock: Mutex::new(()),
                writes: Cell::new(0),
            }),
        }
    }

    /// Records new content and re-arms the delayed write.
    pub fn mutate(&self, target: SaveTarget, content: String) {
        let inner = &self.inner;
        let revision = inner.revision.get() + 1;
        inner.revision.set(revision);

        {
            let mut draft = inner.draft.borrow_mut();
            if let Some(previous) = draft.as_ref()
                && previous.target.key != target.key
                && previous.revision > inner.persisted.get()
            {
                warn!(
                    previous = %previous.target.key,
                    next = %target.key,
                    "replacing unsaved draft of another key"
                );
            }
            *draft = Some(Draft {
                target,
                content,
                revision,
            });
        }

        inner.mirror.update(|state| state.is_dirty = true);
        self.arm();
    }

    fn arm(&self) {
        self.cancel_timer();
        let inner = self.inner.clone();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(inner.delay).await;
            // Past this point the write must not be aborted by a re-arm.
            inner.timer.borrow_mut().take();
            if let Err(e) = Inner::write_latest(&inner).await {
                debug!(error = %e, "debounced save failed");
            }
        });
        *self.inner.timer.borrow_mut() = Some(handle);
    }

    /// Cancels the pending delayed write, if any.
    pub fn cancel_timer(&self) {
        if let Some(timer) = self.inner.timer.borrow_mut().take() {
            timer.abort();
        }
    }

    pub fn has_pending_timer(&self) -> bool {
        self.inner.timer.borrow().is_some()
    }

    /// Writes now, bypassing the timer but waiting for any in-flight write.
    pub async fn flush(&self) -> Result<FlushOutcome> {
        self.cancel_timer();
        Inner::write_latest(&self.inner).await
    }

    /// Flushes until the latest revision is persisted.
    pub async fn flush_until_clean(&self) -> Result<()> {
        loop {
            match self.flush().await? {
                FlushOutcome::Clean | FlushOutcome::Persisted => return Ok(()),
                FlushOutcome::StillDirty => continue,
            }
        }
    }

    /// Retries a failed save with the target and content current at retry time.
    pub async fn retry(&self) -> Result<FlushOutcome> {
        self.flush().await
    }

    /// True if some mutation is not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.inner.revision.get() > self.inner.persisted.get()
    }

    /// Number of completed sink writes, successful or not.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.get()
    }
}

impl Inner {
    async fn write_latest(self: &Rc<Self>) -> Result<FlushOutcome> {
        let _guard = self.write_lock.lock().await;

        let snapshot = self
            .draft
            .borrow()
            .as_ref()
            .filter(|draft| draft.revision > self.persisted.get())
            .map(|draft| (draft.target.clone(), draft.content.clone(), draft.revision));
        let Some((target, content, revision)) = snapshot else {
            return Ok(FlushOutcome::Clean);
        };

        debug!(key = %target.key, revision, bytes = content.len(), "writing content");
        let written = self.sink.write(&target, &content).await;
        self.writes.set(self.writes.get() + 1);

        match written {
            Ok(()) => {
                self.persisted.set(self.persisted.get().max(revision));
                let clean = self.persisted.get() == self.revision.get();
                self.mirror.update(|state| {
                    if clean {
                        state.is_dirty = false;
                    }
                    if state.presentation.banner.as_ref().is_some_and(|b| b.retry) {
                        state.presentation.banner = None;
                    }
                });
                Ok(if clean {
                    FlushOutcome::Persisted
                } else {
                    FlushOutcome::StillDirty
                })
            }
            Err(e) => {
                warn!(key = %target.key, error = %e, "content write failed");
                self.mirror.update(|state| {
                    state.show_banner(format!("Couldn't save \"{}\": {e}", target.key), true);
                });
                Err(e)
            }
        }
    }
}
