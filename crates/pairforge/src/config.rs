//! Server configuration, with defaults and environment overrides.

use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pairforge_room::ROOM_CAPACITY;
use serde::{Deserialize, Serialize};

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which transport the matchmaking listener speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited TCP.
    #[default]
    Tcp,
    /// WebSocket, one frame per line.
    WebSocket,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "websocket" | "ws" => Ok(Self::WebSocket),
            other => Err(format!("unknown transport {other:?}, expected tcp or websocket")),
        }
    }
}

/// Where and what the static asset server serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsConfig {
    pub bind_addr: String,
    pub dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            dir: PathBuf::from("web/dist"),
        }
    }
}

/// Full configuration for a Pairforge server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address of the matchmaking listener.
    pub bind_addr: String,

    pub transport: TransportKind,

    /// IP the per-room endpoints bind to, each on its own ephemeral port.
    pub room_host: IpAddr,

    /// Players per room.
    pub room_capacity: usize,

    /// Longest time a client may take to finish its handshake. After
    /// this the handshake is cut short and matchmaking proceeds.
    pub handshake_timeout: Duration,

    /// Most handshake lines read before the handshake is cut short.
    pub max_handshake_lines: usize,

    /// Static asset server; `None` disables it.
    pub assets: Option<AssetsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            transport: TransportKind::default(),
            room_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            room_capacity: ROOM_CAPACITY,
            handshake_timeout: Duration::from_secs(5),
            max_handshake_lines: 64,
            assets: None,
        }
    }
}

impl ServerConfig {
    /// Loads defaults overridden by `PAIRFORGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overridden by whatever `lookup` returns per key.
    ///
    /// Recognized keys: `PAIRFORGE_BIND`, `PAIRFORGE_TRANSPORT`,
    /// `PAIRFORGE_ROOM_HOST`, `PAIRFORGE_ROOM_CAPACITY`,
    /// `PAIRFORGE_HANDSHAKE_TIMEOUT_MS`, `PAIRFORGE_MAX_HANDSHAKE_LINES`,
    /// `PAIRFORGE_ASSETS_BIND`, `PAIRFORGE_ASSETS_DIR`. Setting either
    /// assets key enables the asset server.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(bind) = lookup("PAIRFORGE_BIND") {
            config.bind_addr = bind;
        }
        if let Some(value) = lookup("PAIRFORGE_TRANSPORT") {
            config.transport = parse("PAIRFORGE_TRANSPORT", value)?;
        }
        if let Some(value) = lookup("PAIRFORGE_ROOM_HOST") {
            config.room_host = parse("PAIRFORGE_ROOM_HOST", value)?;
        }
        if let Some(value) = lookup("PAIRFORGE_ROOM_CAPACITY") {
            config.room_capacity = parse("PAIRFORGE_ROOM_CAPACITY", value)?;
        }
        if let Some(value) = lookup("PAIRFORGE_HANDSHAKE_TIMEOUT_MS") {
            let millis: u64 = parse("PAIRFORGE_HANDSHAKE_TIMEOUT_MS", value)?;
            config.handshake_timeout = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("PAIRFORGE_MAX_HANDSHAKE_LINES") {
            config.max_handshake_lines = parse("PAIRFORGE_MAX_HANDSHAKE_LINES", value)?;
        }

        let assets_bind = lookup("PAIRFORGE_ASSETS_BIND");
        let assets_dir = lookup("PAIRFORGE_ASSETS_DIR");
        if assets_bind.is_some() || assets_dir.is_some() {
            let defaults = AssetsConfig::default();
            config.assets = Some(AssetsConfig {
                bind_addr: assets_bind.unwrap_or(defaults.bind_addr),
                dir: assets_dir.map(PathBuf::from).unwrap_or(defaults.dir),
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "room_capacity",
                value: self.room_capacity.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        if self.max_handshake_lines == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_handshake_lines",
                value: self.max_handshake_lines.to_string(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match value.parse() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
