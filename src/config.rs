//! Environment configuration

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_SESSIONS: usize = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Relay settings read once at startup
#[derive(Clone)]
pub struct RelayConfig {
    pub bot_token: String,
    pub operator_chat_id: String,
    pub host: IpAddr,
    pub port: u16,
    pub static_dir: PathBuf,
    pub pages_dir: PathBuf,
    /// `None` disables idle eviction
    pub idle_timeout: Option<Duration>,
    /// `None` means unbounded
    pub max_sessions: Option<usize>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bot_token =
            get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let operator_chat_id =
            get("ADMIN_CHAT_ID").ok_or(ConfigError::Missing("ADMIN_CHAT_ID"))?;
        if operator_chat_id.trim().parse::<i64>().is_err() {
            return Err(ConfigError::Invalid {
                name: "ADMIN_CHAT_ID",
                value: operator_chat_id,
            });
        }

        let host: IpAddr =
            parse_or("RELAY_HOST", get("RELAY_HOST"), || DEFAULT_HOST.parse().ok())?;
        let port: u16 = parse_or("RELAY_PORT", get("RELAY_PORT"), || Some(DEFAULT_PORT))?;
        let idle_secs: u64 =
            parse_or("RELAY_IDLE_TIMEOUT_SECS", get("RELAY_IDLE_TIMEOUT_SECS"), || Some(0))?;
        let max_sessions: usize =
            parse_or("RELAY_MAX_SESSIONS", get("RELAY_MAX_SESSIONS"), || {
                Some(DEFAULT_MAX_SESSIONS)
            })?;

        Ok(Self {
            bot_token,
            operator_chat_id: operator_chat_id.trim().to_string(),
            host,
            port,
            static_dir: get("RELAY_STATIC_DIR")
                .map_or_else(|| PathBuf::from("static"), PathBuf::from),
            pages_dir: get("RELAY_PAGES_DIR")
                .map_or_else(|| PathBuf::from("templates"), PathBuf::from),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            max_sessions: (max_sessions > 0).then_some(max_sessions),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: impl FnOnce() -> Option<T>,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => default().ok_or(ConfigError::Missing(name)),
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bot_token", &"<redacted>")
            .field("operator_chat_id", &self.operator_chat_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("static_dir", &self.static_dir)
            .field("pages_dir", &self.pages_dir)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}
