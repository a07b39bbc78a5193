//! The session writer loop: sole owner of the socket's sink half.

use std::fmt::Display;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, warn};

use super::outbound::OutboundReceiver;
use super::protocol::OutboundFrame;

/// Why the writer stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriterExit {
    /// The outbound queue was closed; remaining frames were flushed.
    Closed,
    /// The transport rejected a write.
    WriteFailed,
    /// A write did not finish within the write deadline.
    WriteTimeout,
}

/// Flush queued frames to `sink` and ping every `ping_interval` until the
/// queue closes or a write fails.
///
/// Every write is bounded by `write_timeout`. On close the backlog and a
/// Close frame are sent under a single `write_timeout`.
pub async fn run_writer<S>(
    mut sink: S,
    mut outbound: OutboundReceiver,
    ping_interval: Duration,
    write_timeout: Duration,
) -> WriterExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.next() => {
                let Some(frame) = frame else {
                    close(&mut sink, &mut outbound, write_timeout).await;
                    return WriterExit::Closed;
                };
                let Some(message) = encode(&frame) else { continue };
                if let Err(exit) = write(&mut sink, message, write_timeout).await {
                    return exit;
                }
            }
            _ = ping.tick() => {
                if let Err(exit) = write(&mut sink, Message::Ping(Bytes::new()), write_timeout).await {
                    return exit;
                }
            }
        }
    }
}

fn encode(frame: &OutboundFrame) -> Option<Message> {
    match frame.to_json() {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound frame");
            None
        }
    }
}

async fn write<S>(sink: &mut S, message: Message, deadline: Duration) -> Result<(), WriterExit>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "websocket write failed");
            Err(WriterExit::WriteFailed)
        }
        Err(_) => {
            warn!(timeout_secs = deadline.as_secs(), "websocket write timed out");
            Err(WriterExit::WriteTimeout)
        }
    }
}

async fn close<S>(sink: &mut S, outbound: &mut OutboundReceiver, deadline: Duration)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let backlog = outbound.drain();
    let flushed = backlog.len();
    let drain = async {
        for message in backlog.iter().filter_map(encode) {
            sink.feed(message).await?;
        }
        sink.send(Message::Close(None)).await?;
        sink.close().await
    };
    match timeout(deadline, drain).await {
        Ok(Ok(())) => debug!(flushed, "writer closed cleanly"),
        Ok(Err(e)) => debug!(error = %e, "close handshake failed"),
        Err(_) => warn!(flushed, "close handshake timed out"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
