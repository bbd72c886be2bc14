use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Wire / session constants — shared by the gateway and the room hubs.
pub const DEFAULT_PORT: u16 = 4850;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per frame
pub const SESSION_QUEUE_DEPTH: usize = 256; // outbound frames buffered per session
pub const HUB_MAILBOX_DEPTH: usize = 1_024; // inbound messages buffered per room hub
pub const CHAT_HISTORY_LIMIT: usize = 50; // entries returned by get-chat-history
pub const VERSION_RING: usize = 50; // file versions surfaced to readers
pub const STORE_ATTEMPT_TIMEOUT_MS: u64 = 5_000; // SQLite busy timeout per attempt
pub const STORE_BACKOFF_MS: [u64; 3] = [100, 400, 1_600];
pub const HUB_DRAIN_TIMEOUT_MS: u64 = 2_000; // inbound drain budget on shutdown
pub const VERSION_COALESCE_MS: i64 = 1_000; // min gap between version snapshots

/// Top-level config (syncroom.toml + SYNCROOM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncroomConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for SyncroomConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                port: DEFAULT_PORT,
                bind: DEFAULT_BIND.to_string(),
                frontend_origin: default_frontend_origin(),
                auth_secret: "change-me".to_string(),
            },
            database: DatabaseConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// CORS/origin allowlist for the WS upgrade handshake. "*" allows any.
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,
    /// HMAC key for the built-in bearer-token verifier.
    pub auth_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
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

/// Tunable bounds for sessions, logs, and ephemeral TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub store_retry_attempts: u32,
    #[serde(default = "default_op_log_window")]
    pub op_log_window: usize,
    #[serde(default = "default_presence_ttl")]
    pub presence_ttl_seconds: u64,
    #[serde(default = "default_op_log_ttl")]
    pub op_log_ttl_seconds: u64,
    #[serde(default = "default_chat_ring")]
    pub chat_ring_size: usize,
    #[serde(default = "default_chat_ttl")]
    pub chat_ttl_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            store_retry_attempts: default_retry_attempts(),
            op_log_window: default_op_log_window(),
            presence_ttl_seconds: default_presence_ttl(),
            op_log_ttl_seconds: default_op_log_ttl(),
            chat_ring_size: default_chat_ring(),
            chat_ttl_seconds: default_chat_ttl(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_frontend_origin() -> String {
    "*".to_string()
}
fn default_idle_timeout() -> u64 {
    60
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_op_log_window() -> usize {
    100
}
fn default_presence_ttl() -> u64 {
    3_600
}
fn default_op_log_ttl() -> u64 {
    300
}
fn default_chat_ring() -> usize {
    100
}
fn default_chat_ttl() -> u64 {
    86_400
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.syncroom/syncroom.db", home)
}

impl SyncroomConfig {
    /// Load config from a TOML file with SYNCROOM_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.syncroom/syncroom.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: SyncroomConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SYNCROOM_").split("_"))
            .extract()
            .map_err(|e| crate::error::SyncroomError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.syncroom/syncroom.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.idle_timeout_seconds, 60);
        assert_eq!(limits.store_retry_attempts, 3);
        assert_eq!(limits.op_log_window, 100);
        assert_eq!(limits.presence_ttl_seconds, 3_600);
        assert_eq!(limits.op_log_ttl_seconds, 300);
        assert_eq!(limits.chat_ring_size, 100);
        assert_eq!(limits.chat_ttl_seconds, 86_400);
    }

    #[test]
    fn config_deserializes_with_partial_toml() {
        let toml = r#"
            [gateway]
            auth_secret = "s3cret"
            port = 9000
        "#;
        let config: SyncroomConfig = figment::Figment::new()
            .merge(figment::providers::Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.bind, DEFAULT_BIND);
        assert_eq!(config.limits.op_log_window, 100);
    }
}
