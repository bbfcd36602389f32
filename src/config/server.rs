// src/config/server.rs
// Server, database, and logging configuration.

use serde::{Deserialize, Serialize};

/// HTTP/WebSocket bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("FORGE_HOST", "0.0.0.0"),
            port: super::helpers::env_usize("FORGE_PORT", 3001) as u16,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Durable project-state database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("DATABASE_URL", "sqlite://forge.db"),
            max_connections: super::helpers::env_usize("FORGE_SQLITE_MAX_CONNECTIONS", 10) as u32,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: super::helpers::env_or("FORGE_LOG_LEVEL", "info"),
        }
    }
}
