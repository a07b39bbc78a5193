//! Runtime configuration for the gateway, derived from [`DocchatSettings`].

use std::path::PathBuf;
use std::time::Duration;

use docchat_core::chunking::DEFAULT_CHUNK_SIZE;
use docchat_settings::DocchatSettings;

use crate::pipeline::PipelineConfig;

/// Liveness and backpressure knobs for one WebSocket session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Outbound queue capacity in frames.
    pub queue_capacity: usize,
    /// Peer silence that ends the session.
    pub read_timeout: Duration,
    /// Deadline for any single write.
    pub write_timeout: Duration,
    /// Keep-alive ping interval.
    pub ping_interval: Duration,
    /// Concurrent queries per session.
    pub max_inflight: usize,
    /// Largest accepted inbound frame.
    pub max_frame_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(54),
            max_inflight: 4,
            max_frame_bytes: 1024 * 1024,
        }
    }
}

/// Configuration for the gateway server.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// CORS origins.
    pub allowed_origins: Vec<String>,
    /// Where uploaded files are written.
    pub uploads_dir: PathBuf,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    /// Segment size used at ingestion.
    pub chunk_size: usize,
    /// Per-session settings.
    pub session: SessionConfig,
    /// Query pipeline settings.
    pub pipeline: PipelineConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            allowed_origins: vec!["http://localhost:3000".into()],
            uploads_dir: std::env::temp_dir().join("docchat-uploads"),
            max_upload_bytes: 20 * 1024 * 1024,
            chunk_size: DEFAULT_CHUNK_SIZE,
            session: SessionConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl From<&DocchatSettings> for GatewayConfig {
    fn from(settings: &DocchatSettings) -> Self {
        let server = &settings.server;
        let session = &settings.session;
        Self {
            host: server.host.clone(),
            port: server.port,
            allowed_origins: server.allowed_origins.clone(),
            uploads_dir: PathBuf::from(&server.uploads_dir),
            max_upload_bytes: server.max_upload_bytes,
            chunk_size: settings.pipeline.chunk_size,
            session: SessionConfig {
                queue_capacity: session.outbound_queue_capacity,
                read_timeout: session.read_timeout(),
                write_timeout: session.write_timeout(),
                ping_interval: session.ping_interval(),
                max_inflight: session.max_inflight_queries,
                max_frame_bytes: session.max_frame_bytes,
            },
            pipeline: PipelineConfig {
                context_char_cap: settings.pipeline.context_char_cap,
                answer_timeout: settings.pipeline.answer_timeout(),
            },
        }
    }
}
