//! Persistence store configuration.

use serde::{Deserialize, Serialize};

/// SQLite store configuration.
///
/// The same file backs the persistence store and the durable queue state
/// (single-node deployment; the store serializes a single writer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_path")]
    pub path: String,
    /// Maximum connections on the reader pool.
    #[serde(default = "default_reader_connections")]
    pub reader_connections: u32,
    /// Busy timeout in milliseconds applied to every connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            reader_connections: default_reader_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_path() -> String {
    "data/redub.db".to_string()
}

fn default_reader_connections() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
