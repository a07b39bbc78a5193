//! The session reader loop.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::hub::Hub;
use super::protocol::{InboundFrame, OutboundFrame};
use super::session::{SessionHandle, SessionState};
use crate::pipeline::{Query, QueryPipeline};

/// Error frame sent when a session is at its in-flight query limit.
pub const TOO_MANY_QUERIES: &str = "too many queries in flight";

/// Why the reader stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderExit {
    /// The peer sent a Close frame.
    PeerClosed,
    /// The stream ended without a Close frame.
    StreamEnded,
    /// Nothing arrived within the read deadline.
    ReadTimeout,
    /// A frame could not be decoded.
    ProtocolError,
    /// The transport reported an error.
    TransportError,
    /// The session was closed from elsewhere (eviction, writer failure, shutdown).
    Closed,
}

/// Everything the reader needs besides the stream.
pub struct ReaderContext {
    /// This session.
    pub session: SessionHandle,
    /// Registry to leave on exit.
    pub hub: Hub,
    /// Where queries go.
    pub pipeline: Arc<QueryPipeline>,
    /// Peer silence that ends the session.
    pub read_timeout: Duration,
    /// Concurrent queries allowed.
    pub max_inflight: usize,
}

/// Read frames until the peer leaves, misbehaves, goes quiet, or the session
/// is closed. Always unregisters the session and aborts its query tasks
/// before returning.
pub async fn run_reader<S, E>(mut stream: S, ctx: ReaderContext) -> ReaderExit
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let ReaderContext {
        session,
        hub,
        pipeline,
        read_timeout,
        max_inflight,
    } = ctx;
    let permits = Arc::new(Semaphore::new(max_inflight.max(1)));
    let mut tasks = JoinSet::new();

    let deadline = tokio::time::sleep(read_timeout);
    tokio::pin!(deadline);

    let exit = loop {
        tokio::select! {
            () = session.closed() => break ReaderExit::Closed,
            () = &mut deadline => {
                warn!(timeout_secs = read_timeout.as_secs(), "read deadline expired");
                break ReaderExit::ReadTimeout;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        error!(error = %e, "query task panicked");
                    }
                }
            }
            item = stream.next() => {
                let message = match item {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read failed");
                        break ReaderExit::TransportError;
                    }
                    None => break ReaderExit::StreamEnded,
                };
                deadline.as_mut().reset(Instant::now() + read_timeout);

                let text = match message {
                    Message::Text(text) => text.as_str().to_owned(),
                    Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!(len = bytes.len(), "binary frame is not UTF-8");
                            break ReaderExit::ProtocolError;
                        }
                    },
                    Message::Ping(_) | Message::Pong(_) => continue,
                    Message::Close(_) => break ReaderExit::PeerClosed,
                };

                let frame = match InboundFrame::decode(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "invalid inbound frame");
                        break ReaderExit::ProtocolError;
                    }
                };
                if !frame.is_query() {
                    warn!(kind = %frame.kind, "ignoring unknown frame type");
                    continue;
                }

                if let Ok(permit) = permits.clone().try_acquire_owned() {
                    let query = Query {
                        text: frame.content,
                        document_id: session.document_id().clone(),
                        user_id: session.user_id().clone(),
                    };
                    let pipeline = pipeline.clone();
                    let session = session.clone();
                    let _ = tasks.spawn(async move {
                        let _permit = permit;
                        let _ = pipeline.process(query, &session).await;
                    });
                } else {
                    warn!(max_inflight, "query rejected, in-flight limit reached");
                    let _ = pipeline.deliver(&session, OutboundFrame::error(TOO_MANY_QUERIES));
                }
            }
        }
    };

    session.set_state(SessionState::Closing);
    hub.unregister(session.id());
    tasks.abort_all();
    debug!(?exit, "reader stopped");
    exit
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
