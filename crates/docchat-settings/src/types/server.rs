//! HTTP listener and per-session channel settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP listener, CORS and upload settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Directory uploaded files are written to.
    pub uploads_dir: String,
    /// Largest accepted upload body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
                "http://localhost:8080".to_string(),
            ],
            uploads_dir: "uploads".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Liveness and backpressure settings for one WebSocket session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Capacity of each session's outbound queue, in frames.
    pub outbound_queue_capacity: usize,
    /// Silence from the peer longer than this ends the session.
    pub read_timeout_ms: u64,
    /// Deadline for a single frame write.
    pub write_timeout_ms: u64,
    /// Keep-alive ping interval. Must be shorter than the read timeout.
    pub ping_interval_ms: u64,
    /// Queries a single session may have in flight at once.
    pub max_inflight_queries: usize,
    /// Largest inbound frame accepted.
    pub max_frame_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 256,
            read_timeout_ms: 60_000,
            write_timeout_ms: 10_000,
            ping_interval_ms: 54_000,
            max_inflight_queries: 4,
            max_frame_bytes: 1024 * 1024,
        }
    }
}

impl SessionSettings {
    /// Read deadline as a [`Duration`].
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write deadline as a [`Duration`].
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Ping interval as a [`Duration`].
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults() {
        let s = SessionSettings::default();
        assert_eq!(s.outbound_queue_capacity, 256);
        assert_eq!(s.read_timeout(), Duration::from_secs(60));
        assert_eq!(s.write_timeout(), Duration::from_secs(10));
        assert_eq!(s.ping_interval(), Duration::from_secs(54));
        assert!(s.ping_interval() < s.read_timeout());
    }

    #[test]
    fn server_partial_json() {
        let s: ServerSettings = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(s.port, 9000);
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.allowed_origins.len(), 3);
    }

    #[test]
    fn camel_case_keys() {
        let json = serde_json::to_value(SessionSettings::default()).unwrap();
        assert!(json.get("outboundQueueCapacity").is_some());
        assert!(json.get("pingIntervalMs").is_some());
    }
}
