//! Relay configuration.

use std::path::Path;

use relaycast_dispatch::RelayPolicy;
use relaycast_transport::DEFAULT_READ_BUFFER_SIZE;
use serde::{Deserialize, Serialize};

use crate::RelayError;

/// Everything a relay needs to start.
///
/// Missing fields fall back to [`Default`], so a config file only has to
/// name what it changes:
///
/// ```json
/// { "bind_addr": "127.0.0.1:9000", "policy": { "strike_limit": 5 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the listener binds to.
    pub bind_addr: String,

    /// Bytes requested per read. Each read is relayed as one message.
    pub read_buffer_size: usize,

    /// Throttle and ban settings.
    pub policy: RelayPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            policy: RelayPolicy::default(),
        }
    }
}

impl RelayConfig {
    /// Parses a config from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, RelayError> {
        serde_json::from_str(json).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("{}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }
}
