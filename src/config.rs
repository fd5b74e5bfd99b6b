//! Process configuration for the serving shell.
//!
//! Read once at startup from the environment:
//! - `PORT` (default 7860)
//! - `HFRISK_BIND` (default `0.0.0.0`)
//! - `HFRISK_ARTIFACTS_DIR` (default `artifacts`)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT {0:?}: expected an integer in 1..=65535")]
    Port(String),

    #[error("Invalid HFRISK_BIND {0:?}: expected an IP address")]
    Bind(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub artifacts_dir: PathBuf,
}

impl ServeConfig {
    /// # Errors
    /// Returns [`ConfigError`] if `PORT` or `HFRISK_BIND` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    ///
    /// # Errors
    /// Returns [`ConfigError`] if `PORT` or `HFRISK_BIND` is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|&p| p != 0)
                .ok_or(ConfigError::Port(raw))?,
            None => DEFAULT_PORT,
        };

        let bind_raw = lookup("HFRISK_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::Bind(bind_raw.clone()))?;

        let artifacts_dir = lookup("HFRISK_ARTIFACTS_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR), PathBuf::from);

        Ok(Self {
            bind,
            port,
            artifacts_dir,
        })
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}
