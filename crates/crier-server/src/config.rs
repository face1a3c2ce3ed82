//! Bot configuration loading from file and environment variables.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crier_synth::RetryPolicy;
use crier_voice::{EngineConfig, LeavePolicy};
use serde::Deserialize;
use thiserror::Error;

/// Top-level bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP command surface settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Voice session engine settings.
    #[serde(default)]
    pub engine: EngineSection,

    /// Synthesis service settings.
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP command surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Voice session engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Maximum submitted text length in characters.
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,

    /// Seconds an idle session waits before leaving the channel.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Seconds shutdown waits per session for the in-flight item.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Whether a submit to an unjoined channel auto-joins it.
    #[serde(default = "default_auto_join")]
    pub auto_join: bool,

    /// What happens to a channel's queued items on leave.
    #[serde(default)]
    pub leave_policy: LeavePolicy,
}

/// Synthesis service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    /// HTTP endpoint of the synthesis service.
    #[serde(default = "default_synth_endpoint")]
    pub endpoint: String,

    /// Bearer token for the synthesis service, if it requires one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_synth_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum synthesis attempts per item.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base backoff delay between attempts, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff cap, in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "crier_voice=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3100
}

fn default_db_path() -> String {
    "crier.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_max_text_len() -> usize {
    500
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_auto_join() -> bool {
    true
}

fn default_synth_endpoint() -> String {
    "http://127.0.0.1:5002/api/tts".to_string()
}

fn default_synth_timeout_ms() -> u64 {
    30_000
}

fn default_retry_max_attempts() -> u32 {
    4
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    8_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_text_len: default_max_text_len(),
            idle_timeout_secs: default_idle_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            auto_join: default_auto_join(),
            leave_policy: LeavePolicy::default(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_synth_endpoint(),
            api_key: None,
            timeout_ms: default_synth_timeout_ms(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl EngineSection {
    /// Converts the file representation into the engine's runtime config.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_text_len: self.max_text_len,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            auto_join: self.auto_join,
            leave_policy: self.leave_policy,
        }
    }
}

impl SynthesisConfig {
    /// Builds the retry policy the synthesis client runs under.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// The per-call timeout for one synthesis request.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `CRIER_HOST` overrides `server.host`
/// - `CRIER_PORT` overrides `server.port`
/// - `CRIER_DB_PATH` overrides `database.path`
/// - `CRIER_SYNTH_ENDPOINT` overrides `synthesis.endpoint`
/// - `CRIER_SYNTH_API_KEY` overrides `synthesis.api_key`
/// - `CRIER_LOG_LEVEL` overrides `logging.level`
/// - `CRIER_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Ok(host) = std::env::var("CRIER_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("CRIER_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("CRIER_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(endpoint) = std::env::var("CRIER_SYNTH_ENDPOINT") {
        config.synthesis.endpoint = endpoint;
    }
    if let Ok(key) = std::env::var("CRIER_SYNTH_API_KEY") {
        config.synthesis.api_key = Some(key);
    }
    if let Ok(level) = std::env::var("CRIER_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("CRIER_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
