//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may be partial; missing fields keep their compiled default.

mod pipeline;
mod server;
mod storage;

pub use pipeline::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the docchat gateway.
///
/// ```json
/// {
///   "server": { "port": 9090 },
///   "session": { "outboundQueueCapacity": 64 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocchatSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Per-session liveness and backpressure.
    pub session: SessionSettings,
    /// Query pipeline bounds.
    pub pipeline: PipelineSettings,
    /// Answer model client.
    pub answer: AnswerSettings,
    /// Database.
    pub storage: StorageSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl DocchatSettings {
    /// Reject combinations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.outbound_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "session.outboundQueueCapacity must be greater than 0".into(),
            ));
        }
        if session.max_inflight_queries == 0 {
            return Err(SettingsError::InvalidValue(
                "session.maxInflightQueries must be greater than 0".into(),
            ));
        }
        if session.ping_interval_ms == 0 || session.ping_interval_ms >= session.read_timeout_ms {
            return Err(SettingsError::InvalidValue(format!(
                "session.pingIntervalMs ({}) must be non-zero and below readTimeoutMs ({})",
                session.ping_interval_ms, session.read_timeout_ms
            )));
        }
        if session.write_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.writeTimeoutMs must be greater than 0".into(),
            ));
        }
        if self.pipeline.context_char_cap == 0 {
            return Err(SettingsError::InvalidValue(
                "pipeline.contextCharCap must be greater than 0".into(),
            ));
        }
        if self.storage.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "storage.poolSize must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
