//! Core configuration struct definitions.

use super::policy::PolicyConfig;
use super::security::SecurityConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity and listener addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name, used in log output.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Address for the public HTTP API.
    pub http_listen: SocketAddr,
    /// Address for the consumer WebSocket channel.
    pub consumer_listen: SocketAddr,
}

fn default_server_name() -> String {
    "tidebridge".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or ":memory:" for tests.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "tidebridge.db".to_string()
}

/// Account-linking configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Lifetime of a pairing code in seconds.
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,
    /// Command enqueued when a game account is unlinked, so the game server
    /// can drop cached state for the player. `{player}` is substituted with
    /// the unlinked player name. Empty disables the follow-up command.
    #[serde(default = "default_sync_command")]
    pub sync_command: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl(),
            sync_command: default_sync_command(),
        }
    }
}

fn default_code_ttl() -> u64 {
    15 * 60
}

fn default_sync_command() -> String {
    "sync {player}".to_string()
}

/// Identity resolution configuration.
///
/// The bridge does not own web accounts; in deployments the identity
/// provider sits in front of it. These static token blocks are the narrow
/// interface the bridge needs: bearer token -> resolved identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub tokens: Vec<TokenBlock>,
}

/// A static bearer-token identity block.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenBlock {
    /// The bearer credential presented in the Authorization header.
    pub token: String,
    /// Opaque web identity id.
    pub id: String,
    /// Public display name.
    pub display_name: String,
    /// Role name, matched case-insensitively against the policy hierarchy.
    pub role: String,
    /// Whether this account has a second factor enrolled. When true, the
    /// step-up gate applies on sensitive endpoints.
    #[serde(default)]
    pub second_factor_enabled: bool,
}
