//! Graceful close under in-flight save and copy operations.
//!
//! ```text
//! Running ──request──▶ ShuttingDown ──▶ AckSent   (host may terminate)
//!                          │
//!                          └─────────▶ Blocked   (copy in flight; retry later)
//! ```
//!
//! Leaving `Blocked` takes a new request from the host. Requests that were
//! already queued when the verdict went out get that verdict again.

use std::cell::{Cell, RefCell};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bridge::Accepted;

use crate::save::SaveCoordinator;
use crate::state::StateMirror;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    ShuttingDown,
    AckSent,
    Blocked,
}

/// Reply sent to the host for a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownVerdict {
    Ack,
    Blocked,
}

pub struct ShutdownSequencer {
    mirror: StateMirror,
    save: SaveCoordinator,
    phase: Cell<ShutdownPhase>,
    verdict: watch::Sender<Option<ShutdownVerdict>>,
    runs: Cell<u32>,
    /// Progress of the host-to-surface channel, when requests arrive through it.
    accepted: RefCell<Option<Accepted>>,
    /// Requests with a lower sequence number were queued before the last verdict.
    answered_below: Cell<Option<u64>>,
}

impl ShutdownSequencer {
    pub fn new(mirror: StateMirror, save: SaveCoordinator) -> Self {
        let (verdict, _rx) = watch::channel(None);
        Self {
            mirror,
            save,
            phase: Cell::new(ShutdownPhase::Running),
            verdict,
            runs: Cell::new(0),
            accepted: RefCell::new(None),
            answered_below: Cell::new(None),
        }
    }

    /// Follows the channel shutdown requests are delivered on.
    pub fn track(&self, accepted: Accepted) {
        *self.accepted.borrow_mut() = Some(accepted);
        // Sequence numbers restart with a new channel.
        self.answered_below.set(None);
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase.get()
    }

    /// Number of times the sequence actually ran.
    pub fn runs(&self) -> u32 {
        self.runs.get()
    }

    /// Handles the shutdown request delivered with sequence number `seq`.
    ///
    /// A request queued while the previous sequence ran is answered with that
    /// sequence's verdict rather than starting another one.
    pub async fn request_at(&self, seq: u64) -> ShutdownVerdict {
        if self.phase.get() == ShutdownPhase::Blocked
            && self.answered_below.get().is_some_and(|below| seq < below)
        {
            debug!(seq, "shutdown request predates the last verdict");
            return ShutdownVerdict::Blocked;
        }
        self.request().await
    }

    /// Handles one shutdown request from the host.
    ///
    /// Requests arriving while a sequence runs wait for its verdict instead of
    /// starting another; after `Ack` every request is answered `Ack`. A request
    /// after `Blocked` runs the sequence again.
    pub async fn request(&self) -> ShutdownVerdict {
        match self.phase.get() {
            ShutdownPhase::AckSent => ShutdownVerdict::Ack,
            ShutdownPhase::ShuttingDown => self.await_verdict().await,
            ShutdownPhase::Running | ShutdownPhase::Blocked => self.run().await,
        }
    }

    async fn await_verdict(&self) -> ShutdownVerdict {
        let mut rx = self.verdict.subscribe();
        loop {
            if let Some(verdict) = *rx.borrow_and_update() {
                return verdict;
            }
            if rx.changed().await.is_err() {
                return ShutdownVerdict::Blocked;
            }
        }
    }

    async fn run(&self) -> ShutdownVerdict {
        self.phase.set(ShutdownPhase::ShuttingDown);
        self.runs.set(self.runs.get() + 1);
        self.verdict.send_replace(None);
        self.mirror.update(|state| state.is_shutting_down = true);

        let flushed = self.save.flush_until_clean().await;
        if let Err(e) = &flushed {
            warn!(error = %e, "final save failed, refusing shutdown");
        }
        let copying = self.mirror.read(|state| state.is_copying());

        let verdict = if copying || flushed.is_err() {
            ShutdownVerdict::Blocked
        } else {
            ShutdownVerdict::Ack
        };
        info!(?verdict, copying, "shutdown sequence finished");

        self.phase.set(match verdict {
            ShutdownVerdict::Ack => ShutdownPhase::AckSent,
            ShutdownVerdict::Blocked => ShutdownPhase::Blocked,
        });
        if verdict == ShutdownVerdict::Blocked {
            self.mirror.update(|state| {
                state.is_shutting_down = false;
                if copying {
                    state.show_toast("Waiting for a copy to finish before quitting");
                }
            });
        }
        if let Some(accepted) = self.accepted.borrow().as_ref() {
            self.answered_below.set(Some(accepted.next_seq()));
        }
        self.verdict.send_replace(Some(verdict));
        verdict
    }
}
