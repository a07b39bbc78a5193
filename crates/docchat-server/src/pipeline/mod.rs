//! The query pipeline: question in, answer (or error) frame out.
//!
//! Each dispatched query runs on its own task. It persists the question,
//! builds the document context, calls the answer service under a timeout,
//! persists the answer, and pushes one frame onto the originating session's
//! outbound queue. A full queue evicts the session through the registry.

pub mod context;

use std::sync::Arc;
use std::time::{Duration, Instant};

use docchat_core::{DocumentId, Exchange, Role, UserId};
use docchat_llm::{AnswerError, AnswerService};
use docchat_store::{DocumentBackend, StoreError};
use metrics::{counter, histogram};
use tracing::{debug, error, instrument, warn};

pub use context::{DocumentContext, build_context, compose_prompt, truncate_chars};

use crate::metrics::{
    ANSWER_DURATION_SECONDS, EXCHANGE_PERSIST_FAILURES_TOTAL, QUERIES_TOTAL, QUERY_ERRORS_TOTAL,
    WS_EVICTIONS_TOTAL,
};
use crate::websocket::hub::Hub;
use crate::websocket::outbound::PushError;
use crate::websocket::protocol::OutboundFrame;
use crate::websocket::session::SessionHandle;

/// Pipeline tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Maximum characters of document text embedded in a prompt.
    pub context_char_cap: usize,
    /// Deadline for one answer service call.
    pub answer_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            context_char_cap: 24_000,
            answer_timeout: Duration::from_secs(60),
        }
    }
}

/// One question from a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    /// Question text, passed through verbatim.
    pub text: String,
    /// Document the session is bound to.
    pub document_id: DocumentId,
    /// User the session is bound to.
    pub user_id: UserId,
}

/// Failures surfaced to the client as an `error` frame.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The document has no segments.
    #[error("No content found for this document")]
    NoContent,
    /// Segments could not be read.
    #[error("Failed to fetch document content")]
    Store(#[source] StoreError),
    /// The answer service failed or timed out.
    #[error("Failed to get response from AI: {0}")]
    Answer(#[from] AnswerError),
}

impl PipelineError {
    /// Metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoContent => "no_content",
            Self::Store(_) => "store",
            Self::Answer(AnswerError::Timeout { .. }) => "timeout",
            Self::Answer(_) => "answer",
        }
    }
}

/// Outcome of pushing a frame to a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The frame is queued for the writer.
    Delivered,
    /// The queue was full; the session has been evicted.
    Evicted,
    /// The session already closed; the frame was dropped.
    SessionGone,
}

/// Shared by every session; one instance per server.
pub struct QueryPipeline {
    backend: Arc<dyn DocumentBackend>,
    answers: Arc<dyn AnswerService>,
    hub: Hub,
    config: PipelineConfig,
}

impl QueryPipeline {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        answers: Arc<dyn AnswerService>,
        hub: Hub,
        config: PipelineConfig,
    ) -> Self {
        Self {
            backend,
            answers,
            hub,
            config,
        }
    }

    /// Storage collaborator.
    pub fn backend(&self) -> &Arc<dyn DocumentBackend> {
        &self.backend
    }

    /// Build the context for `document_id`, ask the answer service, return its text.
    ///
    /// Persists nothing. Used directly by `POST /ask`.
    pub async fn generate(
        &self,
        document_id: &DocumentId,
        question: &str,
    ) -> Result<String, PipelineError> {
        let segments = self
            .backend
            .segments(document_id)
            .await
            .map_err(PipelineError::Store)?;
        let context = build_context(&segments, self.config.context_char_cap)
            .ok_or(PipelineError::NoContent)?;
        if context.truncated {
            debug!(
                %document_id,
                segments = context.segment_count,
                cap = self.config.context_char_cap,
                "document context truncated"
            );
        }
        let prompt = compose_prompt(&context.text, question);

        let started = Instant::now();
        let result = tokio::time::timeout(self.config.answer_timeout, self.answers.answer(&prompt)).await;
        histogram!(ANSWER_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(answer) => Ok(answer?),
            Err(_) => Err(AnswerError::Timeout {
                after_ms: u64::try_from(self.config.answer_timeout.as_millis()).unwrap_or(u64::MAX),
            }
            .into()),
        }
    }

    /// Answer a query and record both sides of the exchange.
    ///
    /// Persistence is best-effort: failures are logged and counted, never
    /// returned.
    pub async fn answer(&self, query: &Query) -> Result<Exchange, PipelineError> {
        let question = Exchange::new(
            query.document_id.clone(),
            query.user_id.clone(),
            Role::User,
            query.text.clone(),
        );
        self.persist(&question).await;

        let text = self.generate(&query.document_id, &query.text).await?;

        let reply = Exchange::new(
            query.document_id.clone(),
            query.user_id.clone(),
            Role::Assistant,
            text,
        );
        self.persist(&reply).await;
        Ok(reply)
    }

    /// Run one query to completion and deliver its frame to `session`.
    #[instrument(skip_all, fields(connection_id = %session.id(), document_id = %query.document_id))]
    pub async fn process(&self, query: Query, session: &SessionHandle) -> Delivery {
        counter!(QUERIES_TOTAL).increment(1);
        let frame = match self.answer(&query).await {
            Ok(exchange) => OutboundFrame::response(&exchange),
            Err(err) => {
                counter!(QUERY_ERRORS_TOTAL, "kind" => err.kind()).increment(1);
                if matches!(err, PipelineError::Answer(_)) {
                    error!(kind = err.kind(), error = %err, "answer service failed");
                } else {
                    warn!(kind = err.kind(), error = %err, "query failed");
                }
                OutboundFrame::error(err.to_string())
            }
        };
        self.deliver(session, frame)
    }

    /// Push `frame` to `session` without waiting, evicting the session if
    /// its queue is full.
    pub fn deliver(&self, session: &SessionHandle, frame: OutboundFrame) -> Delivery {
        match session.push(frame) {
            Ok(()) => Delivery::Delivered,
            Err(PushError::Full) => {
                warn!(connection_id = %session.id(), "outbound queue full, evicting session");
                counter!(WS_EVICTIONS_TOTAL).increment(1);
                self.hub.unregister(session.id());
                Delivery::Evicted
            }
            Err(PushError::Closed) => {
                debug!(connection_id = %session.id(), "session closed before delivery");
                Delivery::SessionGone
            }
        }
    }

    async fn persist(&self, exchange: &Exchange) {
        if let Err(e) = self.backend.append_exchange(exchange).await {
            counter!(EXCHANGE_PERSIST_FAILURES_TOTAL).increment(1);
            warn!(
                exchange_id = %exchange.id,
                role = %exchange.role,
                error = %e,
                "failed to persist exchange"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test support
// ─────────────────────────────────────────────────────────────────────────────


// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::test_support::{MemoryBackend, Reply, StubAnswers};
    use super::*;
    use crate::websocket::outbound::{OutboundReceiver, outbound_queue};
    use crate::websocket::protocol::OutboundKind;
    use crate::websocket::session::SessionIdentity;
    use assert_matches::assert_matches;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        pipeline: QueryPipeline,
        backend: Arc<MemoryBackend>,
        answers: Arc<StubAnswers>,
        hub: Hub,
    }

    fn fixture(backend: MemoryBackend, reply: Reply, config: PipelineConfig) -> Fixture {
        let backend = Arc::new(backend);
        let answers = Arc::new(StubAnswers::new(reply));
        let (hub, _task) = Hub::spawn(CancellationToken::new());
        let pipeline = QueryPipeline::new(backend.clone(), answers.clone(), hub.clone(), config);
        Fixture {
            pipeline,
            backend,
            answers,
            hub,
        }
    }

    fn session(capacity: usize) -> (SessionHandle, OutboundReceiver) {
        let (queue, rx) = outbound_queue(capacity);
        let handle = SessionHandle::new(
            SessionIdentity {
                connection_id: "c1".into(),
                document_id: "d1".into(),
                user_id: "u1".into(),
            },
            queue,
        );
        (handle, rx)
    }

    fn query(text: &str) -> Query {
        Query {
            text: text.into(),
            document_id: "d1".into(),
            user_id: "u1".into(),
        }
    }

    #[tokio::test]
    async fn answers_and_persists_both_sides() {
        let fx = fixture(
            MemoryBackend::with_document("d1", &["Paris is the capital of France."]),
            Reply::Text("Paris."),
            PipelineConfig::default(),
        );
        let (handle, mut rx) = session(4);

        let delivery = fx.pipeline.process(query("What is the capital?"), &handle).await;
        assert_eq!(delivery, Delivery::Delivered);

        let frame = rx.next().await.unwrap();
        assert_eq!(frame.kind, OutboundKind::Response);
        assert_eq!(frame.content, "Paris.");

        let log = fx.backend.exchanges.lock().clone();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].role, Role::User);
        assert_eq!(log[0].content, "What is the capital?");
        assert_eq!(log[1].role, Role::Assistant);
        assert_eq!(frame.id, log[1].id.to_string());
        assert!(fx.answers.prompts.lock()[0].contains("User Question: What is the capital?"));
    }

    #[tokio::test]
    async fn no_segments_skips_answer_service() {
        let fx = fixture(
            MemoryBackend::with_document("d1", &[]),
            Reply::Text("unused"),
            PipelineConfig::default(),
        );
        let (handle, mut rx) = session(4);

        let _ = fx.pipeline.process(query("anything"), &handle).await;
        let frame = rx.next().await.unwrap();
        assert_eq!(frame.kind, OutboundKind::Error);
        assert_eq!(frame.content, "No content found for this document");
        assert_eq!(fx.answers.calls(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_error_frame() {
        let backend = MemoryBackend {
            fail_reads: true,
            ..MemoryBackend::default()
        };
        let fx = fixture(backend, Reply::Text("unused"), PipelineConfig::default());
        let err = fx.pipeline.answer(&query("q")).await.unwrap_err();
        assert_matches!(err, PipelineError::Store(_));
        assert_eq!(err.to_string(), "Failed to fetch document content");
    }

    #[tokio::test]
    async fn answer_failure_is_surfaced() {
        let fx = fixture(
            MemoryBackend::with_document("d1", &["text"]),
            Reply::Fail,
            PipelineConfig::default(),
        );
        let (handle, mut rx) = session(4);

        let _ = fx.pipeline.process(query("q"), &handle).await;
        let frame = rx.next().await.unwrap();
        assert_eq!(frame.kind, OutboundKind::Error);
        assert!(frame.content.starts_with("Failed to get response from AI"));
        assert!(frame.content.contains("model overloaded"));
        assert!(!handle.is_closed());
        // Only the question was recorded.
        assert_eq!(fx.backend.exchanges.lock().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_frame_omits_api_key() {
        let answers = docchat_llm::GeminiAnswerService::new(docchat_llm::GeminiConfig {
            base_url: "http://127.0.0.1:1".into(),
            api_key: Some("SECRETKEY123".into()),
            ..docchat_llm::GeminiConfig::default()
        })
        .unwrap();
        let (hub, _task) = Hub::spawn(CancellationToken::new());
        let pipeline = QueryPipeline::new(
            Arc::new(MemoryBackend::with_document("d1", &["text"])),
            Arc::new(answers),
            hub,
            PipelineConfig::default(),
        );
        let (handle, mut rx) = session(4);

        let _ = pipeline.process(query("q"), &handle).await;
        let frame = rx.next().await.unwrap();
        assert_eq!(frame.kind, OutboundKind::Error);
        assert!(frame.content.starts_with("Failed to get response from AI"));
        assert!(!frame.content.contains("SECRETKEY123"), "{}", frame.content);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_answer_times_out() {
        let fx = fixture(
            MemoryBackend::with_document("d1", &["text"]),
            Reply::Hang,
            PipelineConfig {
                answer_timeout: Duration::from_secs(5),
                ..PipelineConfig::default()
            },
        );
        let err = fx.pipeline.generate(&"d1".into(), "q").await.unwrap_err();
        assert_eq!(err.kind(), "timeout");
        assert_matches!(err, PipelineError::Answer(AnswerError::Timeout { after_ms: 5000 }));
    }

    #[tokio::test]
    async fn persistence_failure_still_delivers() {
        let mut backend = MemoryBackend::with_document("d1", &["text"]);
        backend.fail_writes = true;
        let fx = fixture(backend, Reply::Text("ok"), PipelineConfig::default());
        let (handle, mut rx) = session(4);

        assert_eq!(fx.pipeline.process(query("q"), &handle).await, Delivery::Delivered);
        assert_eq!(rx.next().await.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn context_is_cut_to_cap_before_answer_call() {
        let cap = 32;
        let fx = fixture(
            MemoryBackend::with_document("d1", &["x".repeat(cap + 1).as_str()]),
            Reply::Text("ok"),
            PipelineConfig {
                context_char_cap: cap,
                ..PipelineConfig::default()
            },
        );
        let _ = fx.pipeline.generate(&"d1".into(), "q").await.unwrap();
        let prompt = fx.answers.prompts.lock()[0].clone();
        assert_eq!(prompt, compose_prompt(&"x".repeat(cap), "q"));
    }

    #[tokio::test]
    async fn full_queue_evicts_through_registry() {
        let fx = fixture(
            MemoryBackend::with_document("d1", &["text"]),
            Reply::Text("ok"),
            PipelineConfig::default(),
        );
        let (handle, _rx) = session(1);
        fx.hub.register(handle.clone()).unwrap();
        assert!(fx.hub.contains(handle.id()).await);

        assert_eq!(
            fx.pipeline.deliver(&handle, OutboundFrame::error("first")),
            Delivery::Delivered
        );
        assert_eq!(
            fx.pipeline.deliver(&handle, OutboundFrame::error("second")),
            Delivery::Evicted
        );

        assert!(!fx.hub.contains(handle.id()).await);
        assert!(handle.is_closed());
        assert_eq!(
            fx.pipeline.deliver(&handle, OutboundFrame::error("third")),
            Delivery::SessionGone
        );
    }
}
