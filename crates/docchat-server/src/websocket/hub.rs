//! The Registry: a single actor that owns the live-session membership set.
//!
//! Every register/unregister is a message on one unbounded control channel,
//! consumed by one loop. Nothing else touches the map, so double-register and
//! double-close races cannot happen. Unregistering closes the session's
//! outbound queue, which is what tells the writer loop to finish.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use docchat_core::ConnectionId;
use metrics::gauge;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::SessionHandle;
use crate::metrics::WS_SESSIONS_ACTIVE;

/// The registry actor is no longer running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("session registry has stopped")]
pub struct HubStopped;

/// Control messages consumed by the registry loop.
enum HubCommand {
    Register(SessionHandle),
    Unregister(ConnectionId),
    Count(oneshot::Sender<usize>),
    Members(oneshot::Sender<Vec<ConnectionId>>),
    Contains(ConnectionId, oneshot::Sender<bool>),
}

/// Cheap, cloneable handle to the registry actor.
#[derive(Clone)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
    live: Arc<AtomicUsize>,
}

impl Hub {
    /// Spawn the registry loop. It stops when `shutdown` is cancelled,
    /// closing every member on the way out.
    pub fn spawn(shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicUsize::new(0));
        let actor = HubActor {
            members: HashMap::new(),
            live: live.clone(),
        };
        let handle = tokio::spawn(actor.run(rx, shutdown));
        (Self { tx, live }, handle)
    }

    /// Queue a session for admission.
    pub fn register(&self, session: SessionHandle) -> Result<(), HubStopped> {
        self.tx
            .send(HubCommand::Register(session))
            .map_err(|_| HubStopped)
    }

    /// Queue removal of a session. Absent IDs and a stopped registry are
    /// both no-ops.
    pub fn unregister(&self, id: &ConnectionId) {
        let _ = self.tx.send(HubCommand::Unregister(id.clone()));
    }

    /// Member count after every previously queued command has applied.
    pub async fn len(&self) -> usize {
        self.ask(HubCommand::Count).await.unwrap_or(0)
    }

    /// Whether the registry currently has no members.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// IDs of all members, sorted.
    pub async fn members(&self) -> Vec<ConnectionId> {
        let mut ids = self.ask(HubCommand::Members).await.unwrap_or_default();
        ids.sort();
        ids
    }

    /// Whether `id` is a member.
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        let id = id.clone();
        self.ask(|reply| HubCommand::Contains(id, reply))
            .await
            .unwrap_or(false)
    }

    /// Last member count published by the loop. Does not wait for pending
    /// commands.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    async fn ask<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).ok()?;
        rx.await.ok()
    }
}

struct HubActor {
    members: HashMap<ConnectionId, SessionHandle>,
    live: Arc<AtomicUsize>,
}

impl HubActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubCommand>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => break,
                },
            }
        }

        // Refuse new commands, then settle whatever was already queued.
        rx.close();
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                HubCommand::Register(session) => session.close(),
                other => self.apply(other),
            }
        }

        let sessions: Vec<SessionHandle> = self.members.drain().map(|(_, s)| s).collect();
        self.publish();
        for session in &sessions {
            session.close();
        }
        info!(closed = sessions.len(), "session registry stopped");
    }

    fn apply(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(session) => {
                let id = session.id().clone();
                if let Some(previous) = self.members.insert(id.clone(), session) {
                    previous.close();
                }
                self.publish();
                info!(connection_id = %id, active = self.members.len(), "session registered");
            }
            HubCommand::Unregister(id) => {
                if let Some(session) = self.members.remove(&id) {
                    session.close();
                    self.publish();
                    info!(connection_id = %id, active = self.members.len(), "session unregistered");
                } else {
                    debug!(connection_id = %id, "unregister for unknown session ignored");
                }
            }
            HubCommand::Count(reply) => {
                let _ = reply.send(self.members.len());
            }
            HubCommand::Members(reply) => {
                let _ = reply.send(self.members.keys().cloned().collect());
            }
            HubCommand::Contains(id, reply) => {
                let _ = reply.send(self.members.contains_key(&id));
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish(&self) {
        let count = self.members.len();
        self.live.store(count, Ordering::Relaxed);
        gauge!(WS_SESSIONS_ACTIVE).set(count as f64);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::websocket::outbound::outbound_queue;
    use crate::websocket::session::SessionIdentity;
    use proptest::prelude::*;

    fn session(id: &str) -> SessionHandle {
        let (queue, _rx) = outbound_queue(4);
        SessionHandle::new(
            SessionIdentity {
                connection_id: ConnectionId::from(id),
                document_id: "d1".into(),
                user_id: "u1".into(),
            },
            queue,
        )
    }

    #[tokio::test]
    async fn register_and_unregister() {
        let (hub, _task) = Hub::spawn(CancellationToken::new());
        let a = session("a");
        hub.register(a.clone()).unwrap();
        hub.register(session("b")).unwrap();

        assert_eq!(hub.len().await, 2);
        assert!(hub.contains(&ConnectionId::from("a")).await);
        assert_eq!(hub.live_count(), 2);

        hub.unregister(a.id());
        assert_eq!(hub.members().await, vec![ConnectionId::from("b")]);
        assert!(a.is_closed());
    }

    #[tokio::test]
    async fn double_unregister_is_noop() {
        let (hub, _task) = Hub::spawn(CancellationToken::new());
        let a = session("a");
        hub.register(a.clone()).unwrap();
        hub.unregister(a.id());
        hub.unregister(a.id());
        hub.unregister(&ConnectionId::from("never-registered"));
        assert!(hub.is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_closes_members_and_rejects_registration() {
        let token = CancellationToken::new();
        let (hub, task) = Hub::spawn(token.clone());
        let a = session("a");
        hub.register(a.clone()).unwrap();
        assert_eq!(hub.len().await, 1);

        token.cancel();
        task.await.unwrap();

        assert!(a.is_closed());
        assert_eq!(hub.live_count(), 0);
        assert!(hub.register(session("late")).is_err());
        assert_eq!(hub.len().await, 0);
        hub.unregister(a.id());
    }

    #[tokio::test]
    async fn reregistering_same_id_closes_previous_handle() {
        let (hub, _task) = Hub::spawn(CancellationToken::new());
        let first = session("a");
        let second = session("a");
        hub.register(first.clone()).unwrap();
        hub.register(second.clone()).unwrap();
        assert_eq!(hub.len().await, 1);
        assert!(first.is_closed());
        assert!(!second.is_closed());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Register(u8),
        Unregister(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Register),
            (0u8..8).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn membership_matches_model(ops in proptest::collection::vec(op(), 0..64)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (actual, expected) = rt.block_on(async {
                let (hub, _task) = Hub::spawn(CancellationToken::new());
                let mut model = BTreeSet::new();
                for op in &ops {
                    match op {
                        Op::Register(n) => {
                            hub.register(session(&n.to_string())).unwrap();
                            let _ = model.insert(n.to_string());
                        }
                        Op::Unregister(n) => {
                            hub.unregister(&ConnectionId::from(n.to_string()));
                            let _ = model.remove(&n.to_string());
                        }
                    }
                }
                let actual: Vec<String> =
                    hub.members().await.into_iter().map(ConnectionId::into_inner).collect();
                (actual, model.into_iter().collect::<Vec<_>>())
            });
            prop_assert_eq!(actual, expected);
        }
    }
}
