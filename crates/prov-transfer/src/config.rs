use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TransferError, TransferResult};

/// Runtime configuration for a transfer node.
///
/// Built once at startup and handed to every component that needs it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Prefix of every generated node id.
    pub graph_name: String,
    /// Candidates offered per transfer request.
    pub candidate_count: usize,
    /// Length of generated edge secrets.
    pub secret_length: usize,
    /// Where the responder listens.
    pub listen_addr: SocketAddr,
    /// Deadline applied to each inbound request and each event handled.
    pub request_timeout_ms: u64,
    /// Topic validated transfer requests are published on.
    pub request_topic: String,
    /// Topic received accept messages are published on.
    pub accept_topic: String,
    pub event_channel_capacity: usize,
    pub max_idle_connections_per_peer: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            graph_name: "prov".into(),
            candidate_count: 6,
            secret_length: 20,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            request_timeout_ms: 10_000,
            request_topic: "new_request_to_accept_asset_event".into(),
            accept_topic: "new_received_asset_accept_topic".into(),
            event_channel_capacity: 1024,
            max_idle_connections_per_peer: 4,
        }
    }
}

impl TransferConfig {
    pub const MIN_SECRET_LENGTH: usize = 8;

    pub fn from_toml_str(s: &str) -> TransferResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| TransferError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> TransferResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TransferError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> TransferResult<String> {
        toml::to_string_pretty(self).map_err(|e| TransferError::Config(e.to_string()))
    }

    pub fn validate(&self) -> TransferResult<()> {
        if self.graph_name.is_empty() || self.graph_name.contains(':') {
            return Err(TransferError::Config(
                "graph_name must be non-empty and must not contain ':'".into(),
            ));
        }
        if self.candidate_count == 0 {
            return Err(TransferError::Config("candidate_count must be at least 1".into()));
        }
        if self.secret_length < Self::MIN_SECRET_LENGTH {
            return Err(TransferError::Config(format!(
                "secret_length must be at least {}",
                Self::MIN_SECRET_LENGTH
            )));
        }
        if self.request_topic.is_empty() || self.accept_topic.is_empty() {
            return Err(TransferError::Config("event topics must be non-empty".into()));
        }
        if self.request_timeout_ms == 0 || self.event_channel_capacity == 0 {
            return Err(TransferError::Config(
                "request_timeout_ms and event_channel_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
