//! Server settings

use serde::{Deserialize, Serialize};

/// Where the forecast server listens and what it reports about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Version string reported by `/health`
    pub api_version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_version: "1.0.0".to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port`, as handed to the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
