//! Outbound frame queues.
//!
//! Every session owns a [`FrameSink`]: an unbounded queue between the
//! state machines and the transport writer task. State transitions
//! (including timer fires) enqueue frames and never suspend; the
//! writer task drains [`SinkCommand`]s onto the socket at its own
//! pace.
//!
//! Writes to a sink whose stream is closing or closed are silently
//! skipped. Cascade notifications routinely race a disconnect, and a
//! frame enqueued for a peer that is already gone is a normal
//! occurrence, not an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// A command for the transport writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCommand {
    /// Send one encoded wire frame as a text message.
    Frame(String),
    /// Emit a close frame and stop the writer.
    Close,
}

/// Sending half of a session's outbound frame queue.
#[derive(Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
    closed: Arc<AtomicBool>,
}

impl FrameSink {
    /// Create a sink and the receiving end the transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// Encode `payload` under `method` and enqueue it.
    ///
    /// Skipped without error if the sink is closed or the receiver is
    /// gone.
    pub fn send(&self, method: &str, payload: &impl Serialize) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        match orion_proto::frame::encode(method, payload) {
            Ok(text) => {
                let _ = self.tx.send(SinkCommand::Frame(text));
            }
            Err(e) => debug!(method, error = %e, "dropping unencodable frame"),
        }
    }

    /// Enqueue an already-encoded wire frame.
    ///
    /// Used by fan-out paths that encode once and deliver to many
    /// sinks.
    pub fn send_encoded(&self, text: String) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(SinkCommand::Frame(text));
    }

    /// Mark the sink closed and ask the writer to emit a close frame.
    ///
    /// Idempotent; frames enqueued after this point are dropped.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(SinkCommand::Close);
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
