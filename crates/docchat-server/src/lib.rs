//! # docchat-server
//!
//! Axum HTTP + `WebSocket` gateway for chatting with uploaded documents.
//!
//! - REST endpoints: upload, document lookup, chat history, one-shot `/ask`
//! - `WebSocket` gateway: admission, reader/writer loops, keep-alive
//! - Session registry as a single actor reached by message passing
//! - Query pipeline: document context, prompt, answer service, exchange log
//! - Backpressure: a full outbound queue evicts the session
//! - Graceful shutdown: signal wait, then a bounded drain of the registry and listener

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::{GatewayConfig, SessionConfig};
pub use pipeline::{PipelineConfig, QueryPipeline};
pub use server::{AppState, DocchatServer};
pub use shutdown::{DrainReport, GatewayTask, ShutdownCause, ShutdownCoordinator};
