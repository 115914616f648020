//! Dispatch loop for one direction of the bridge.
//!
//! The handler is an exhaustive `match` over the message enum, so every type
//! has exactly one handler. The loop awaits each handler future before taking
//! the next envelope: a suspended handler delays execution of later messages
//! but never their acceptance, since senders enqueue without waiting.

use futures::future::LocalBoxFuture;
use tracing::{Instrument, debug, debug_span, warn};

use super::channel::{BridgeReceiver, ContentHandle, Decoded, Inbound};
use super::messages::Message;
use crate::error::Result;

/// Receiver-side handler for one message direction.
pub trait Handler<M> {
    /// Called with the sequence number of a known message just before `handle`.
    fn begin(&self, _seq: u64) {}

    fn handle(&self, message: M, handle: Option<ContentHandle>) -> LocalBoxFuture<'_, Result<()>>;
}

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: u64,
    pub failed: u64,
    pub ignored: u64,
}

/// Runs until every sender of `receiver` has been dropped.
pub async fn run<M, H>(mut receiver: BridgeReceiver<M>, handler: &H) -> DispatchStats
where
    M: Message,
    H: Handler<M> + ?Sized,
{
    let mut stats = DispatchStats::default();
    while let Some(inbound) = receiver.recv().await {
        dispatch_one(inbound, handler, &mut stats).await;
    }
    debug!(?stats, "dispatch loop finished");
    stats
}

/// Dispatches a single envelope, containing any handler failure.
pub async fn dispatch_one<M, H>(inbound: Inbound<M>, handler: &H, stats: &mut DispatchStats)
where
    M: Message,
    H: Handler<M> + ?Sized,
{
    let Inbound {
        seq,
        decoded,
        handle,
    } = inbound;

    match decoded {
        Decoded::Known { kind, message } => {
            let span = debug_span!("dispatch", seq, kind = %kind);
            handler.begin(seq);
            match handler.handle(message, handle).instrument(span).await {
                Ok(()) => stats.handled += 1,
                Err(e) => {
                    warn!(seq, kind = %kind, error = %e, "message handler failed");
                    stats.failed += 1;
                }
            }
        }
        Decoded::Unknown { kind } => {
            debug!(seq, kind = %kind, "ignoring unknown message type");
            stats.ignored += 1;
        }
        Decoded::Malformed(e) => {
            warn!(seq, error = %e, "ignoring malformed message");
            stats.ignored += 1;
        }
    }
}
