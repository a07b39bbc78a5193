//! Bounded per-session outbound queue.
//!
//! Producers (query tasks) never wait: [`OutboundQueue::push`] either accepts
//! the frame or reports the queue full so the caller can evict the session.
//! Closing the queue wakes the writer, which drains what is left and exits.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::protocol::OutboundFrame;

/// Why a frame was not accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The queue is at capacity.
    #[error("outbound queue full")]
    Full,
    /// The queue was closed.
    #[error("outbound queue closed")]
    Closed,
}

/// Producer half, shared by every task that delivers to one session.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<OutboundFrame>,
    closed: CancellationToken,
    dropped: Arc<AtomicU64>,
}

/// Consumer half, owned by the session's writer loop.
pub struct OutboundReceiver {
    rx: mpsc::Receiver<OutboundFrame>,
    closed: CancellationToken,
}

/// Create a queue holding at most `capacity` frames.
pub fn outbound_queue(capacity: usize) -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();
    (
        OutboundQueue {
            tx,
            closed: closed.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
        },
        OutboundReceiver { rx, closed },
    )
}

impl OutboundQueue {
    /// Enqueue a frame without waiting.
    pub fn push(&self, frame: OutboundFrame) -> Result<(), PushError> {
        if self.closed.is_cancelled() {
            return Err(PushError::Closed);
        }
        self.tx.try_send(frame).map_err(|e| {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => PushError::Full,
                mpsc::error::TrySendError::Closed(_) => PushError::Closed,
            }
        })
    }

    /// Signal the writer to drain and exit. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the queue is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Frames rejected because the queue was full or closed.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl OutboundReceiver {
    /// Next frame, or `None` once the queue is closed or every producer is gone.
    pub async fn next(&mut self) -> Option<OutboundFrame> {
        tokio::select! {
            biased;
            () = self.closed.cancelled() => None,
            frame = self.rx.recv() => frame,
        }
    }

    /// Take everything still buffered without waiting.
    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }
}
