//! WebSocket session lifecycle: one admitted client from upgrade through
//! teardown.
//!
//! A session is two loops over one socket. The reader decodes frames and
//! dispatches queries; the writer owns the sink and flushes the outbound
//! queue. Either loop ending tears the whole session down.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use docchat_core::{ConnectionId, DocumentId, UserId};
use futures::{Sink, Stream, StreamExt};
use metrics::{counter, histogram};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::hub::Hub;
use super::outbound::{OutboundQueue, OutboundReceiver, PushError, outbound_queue};
use super::protocol::OutboundFrame;
use super::reader::{ReaderContext, ReaderExit, run_reader};
use super::writer::{WriterExit, run_writer};
use crate::config::SessionConfig;
use crate::metrics::{WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL, WS_SESSION_DURATION_SECONDS};
use crate::pipeline::QueryPipeline;

/// Who a session is: its connection plus the document/user it is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Unique per connection.
    pub connection_id: ConnectionId,
    /// Bound document.
    pub document_id: DocumentId,
    /// Bound user.
    pub user_id: UserId,
}

/// Lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded, not yet registered.
    Connecting,
    /// Registered and serving frames.
    Active,
    /// Reader has stopped; waiting on the writer.
    Closing,
    /// Both loops have exited.
    Closed,
}

/// Shared handle to a session: held by the registry, the loops and every
/// in-flight query task.
#[derive(Clone)]
pub struct SessionHandle {
    identity: Arc<SessionIdentity>,
    queue: OutboundQueue,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    /// Wrap an identity and the producer side of its outbound queue.
    pub fn new(identity: SessionIdentity, queue: OutboundQueue) -> Self {
        Self {
            identity: Arc::new(identity),
            queue,
            state: Arc::new(Mutex::new(SessionState::Connecting)),
        }
    }

    /// Connection ID.
    pub fn id(&self) -> &ConnectionId {
        &self.identity.connection_id
    }

    /// Full identity.
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Bound document.
    pub fn document_id(&self) -> &DocumentId {
        &self.identity.document_id
    }

    /// Bound user.
    pub fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }

    /// Enqueue a frame for the writer without waiting.
    pub fn push(&self, frame: OutboundFrame) -> Result<(), PushError> {
        self.queue.push(frame)
    }

    /// Close the outbound queue. Idempotent.
    pub fn close(&self) {
        self.queue.close();
    }

    /// Whether the outbound queue is closed.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Resolves once the outbound queue is closed.
    pub async fn closed(&self) {
        self.queue.closed().await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        let mut current = self.state.lock();
        if *current != state {
            debug!(connection_id = %self.identity.connection_id, from = ?*current, to = ?state, "session state");
            *current = state;
        }
    }
}

/// How both loops of a finished session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Reader exit.
    pub reader: ReaderExit,
    /// Writer exit; `None` if the writer task panicked.
    pub writer: Option<WriterExit>,
}

/// Run an admitted session until either loop ends.
///
/// 1. Registers with the hub (a stopped hub drops the socket)
/// 2. Spawns the writer over the sink half
/// 3. Runs the reader over the stream half on this task
/// 4. Tears down: the queue is closed, the writer drains and sends Close
#[instrument(skip_all, fields(
    connection_id = %identity.connection_id,
    document_id = %identity.document_id,
    user_id = %identity.user_id,
))]
pub async fn run_session(
    socket: WebSocket,
    identity: SessionIdentity,
    hub: Hub,
    pipeline: Arc<QueryPipeline>,
    config: SessionConfig,
) {
    let (sink, stream) = socket.split();
    let (queue, outbound) = outbound_queue(config.queue_capacity);
    let session = SessionHandle::new(identity, queue);
    let _ = drive_session(sink, stream, session, outbound, hub, pipeline, config).await;
}

/// Steps 1-4 of [`run_session`] over any message sink and stream.
///
/// Returns `None` when the registry has stopped and the session never
/// became active.
pub(crate) async fn drive_session<Si, St, E>(
    sink: Si,
    stream: St,
    session: SessionHandle,
    outbound: OutboundReceiver,
    hub: Hub,
    pipeline: Arc<QueryPipeline>,
    config: SessionConfig,
) -> Option<SessionOutcome>
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    if hub.register(session.clone()).is_err() {
        warn!("registry stopped, dropping connection");
        return None;
    }
    session.set_state(SessionState::Active);
    let started = Instant::now();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!("session active");

    let writer = {
        let session = session.clone();
        let hub = hub.clone();
        tokio::spawn(async move {
            let exit = run_writer(sink, outbound, config.ping_interval, config.write_timeout).await;
            if exit != WriterExit::Closed {
                hub.unregister(session.id());
                session.close();
            }
            exit
        })
    };

    let reader = run_reader(
        stream,
        ReaderContext {
            session: session.clone(),
            hub,
            pipeline,
            read_timeout: config.read_timeout,
            max_inflight: config.max_inflight,
        },
    )
    .await;

    // Covers a registry that stopped before our unregister landed.
    session.close();
    let writer = match writer.await {
        Ok(exit) => Some(exit),
        Err(e) => {
            warn!(error = %e, "writer task failed");
            None
        }
    };

    session.set_state(SessionState::Closed);
    histogram!(WS_SESSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    info!(?reader, ?writer, "session closed");
    Some(SessionOutcome { reader, writer })
}
