use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

use super::messages::Message;
use crate::error::{Error, Result};

/// Handle to a key's content file, delivered alongside a `value` message.
///
/// The WebView passes this out-of-band (a file system handle object next to
/// the JSON payload); here it is just the path and access mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHandle {
    pub path: PathBuf,
    pub read_only: bool,
}

struct Envelope {
    seq: u64,
    json: String,
    handle: Option<ContentHandle>,
}

/// Result of decoding one JSON message.
#[derive(Debug)]
pub enum Decoded<M> {
    Known { kind: String, message: M },
    /// Well-formed envelope with a `type` this side does not handle.
    Unknown { kind: String },
    Malformed(serde_json::Error),
}

/// Decodes a JSON message, separating unknown types from malformed input.
pub fn decode<M: Message>(json: &str) -> Decoded<M> {
    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return Decoded::Malformed(e),
    };
    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => {
            return Decoded::Malformed(serde::de::Error::custom("missing string field `type`"));
        }
    };
    match serde_json::from_value::<M>(value) {
        Ok(message) if message.is_unknown() => Decoded::Unknown { kind },
        Ok(message) => Decoded::Known { kind, message },
        Err(e) => Decoded::Malformed(e),
    }
}

/// One received envelope.
#[derive(Debug)]
pub struct Inbound<M> {
    pub seq: u64,
    pub decoded: Decoded<M>,
    pub handle: Option<ContentHandle>,
}

/// Creates the channel for one direction of the bridge.
pub fn channel<M>(direction: &'static str) -> (BridgeSender<M>, BridgeReceiver<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let next_seq = Arc::new(Mutex::new(0));
    let sender = BridgeSender {
        shared: Arc::new(SenderShared {
            tx,
            next_seq: next_seq.clone(),
        }),
        direction,
        _marker: PhantomData,
    };
    let receiver = BridgeReceiver {
        rx,
        accepted: Accepted(next_seq),
        last_seq: None,
        direction,
        _marker: PhantomData,
    };
    (sender, receiver)
}

struct SenderShared {
    tx: UnboundedSender<Envelope>,
    /// Held while enqueueing so sequence order equals queue order across clones.
    next_seq: Arc<Mutex<u64>>,
}

/// Receiver-side view of how far the senders of a channel have got.
#[derive(Clone)]
pub struct Accepted(Arc<Mutex<u64>>);

impl Accepted {
    /// Sequence number of the next envelope; every lower one is already queued.
    pub fn next_seq(&self) -> u64 {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sending half. Cloneable; clones share one sequence counter.
pub struct BridgeSender<M> {
    shared: Arc<SenderShared>,
    direction: &'static str,
    _marker: PhantomData<fn(M)>,
}

impl<M> Clone for BridgeSender<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            direction: self.direction,
            _marker: PhantomData,
        }
    }
}

impl<M: Message> BridgeSender<M> {
    pub fn send(&self, message: &M) -> Result<()> {
        self.send_with(message, None)
    }

    /// Sends a message with an out-of-band content handle.
    pub fn send_with(&self, message: &M, handle: Option<ContentHandle>) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.send_json(json, handle)
    }

    /// Sends pre-encoded JSON, as received from a WebView callback.
    pub fn send_json(&self, json: String, handle: Option<ContentHandle>) -> Result<()> {
        let mut next_seq = self
            .shared
            .next_seq
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let seq = *next_seq;
        trace!(direction = self.direction, seq, %json, "bridge send");
        self.shared
            .tx
            .send(Envelope { seq, json, handle })
            .map_err(|_| Error::BridgeClosed(self.direction))?;
        *next_seq += 1;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.tx.is_closed()
    }
}

/// Receiving half, owned by the dispatch loop of one side.
pub struct BridgeReceiver<M> {
    rx: UnboundedReceiver<Envelope>,
    accepted: Accepted,
    last_seq: Option<u64>,
    direction: &'static str,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Message> BridgeReceiver<M> {
    pub fn accepted(&self) -> Accepted {
        self.accepted.clone()
    }

    /// Waits for the next envelope. Returns `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Inbound<M>> {
        let envelope = self.rx.recv().await?;
        Some(self.open(envelope))
    }

    /// Returns the next envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<Inbound<M>> {
        let envelope = self.rx.try_recv().ok()?;
        Some(self.open(envelope))
    }

    fn open(&mut self, envelope: Envelope) -> Inbound<M> {
        let expected = self.last_seq.map_or(0, |last| last + 1);
        if envelope.seq != expected {
            warn!(
                direction = self.direction,
                expected,
                got = envelope.seq,
                "bridge sequence gap"
            );
        }
        self.last_seq = Some(envelope.seq);
        Inbound {
            seq: envelope.seq,
            decoded: decode(&envelope.json),
            handle: envelope.handle,
        }
    }
}
