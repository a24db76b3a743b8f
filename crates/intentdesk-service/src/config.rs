//! Daemon configuration file.
//!
//! ```toml
//! admin = "0x00000000000000000000000000000000000000ad"
//!
//! [protocol]
//! unbinding_cooldown = 300
//! fee_collector = "0x0000000000000000000000000000000000000fee"
//! ```

use intentdesk_core::{Address, ProtocolConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ServiceError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Bootstrap admin; the CLI flag takes precedence. Like `protocol`, it
    /// is only read when the journal has no genesis entry yet.
    #[serde(default)]
    pub admin: Option<Address>,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

impl DeskConfig {
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("read {}: {e}", path.display())))?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        toml::from_str(raw).map_err(|e| ServiceError::Config(e.to_string()))
    }
}
