//! Server configuration: bind address and snapshot settings.
//!
//! Spec §6: "Environment variables. None required by the core; the
//! collaborator layer may read `SERVER`, port/host overrides." `SERVER`
//! is read as `host:port` in one shot; `MYWANT_HOST`/`MYWANT_PORT` each
//! override a single half.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerConfigError {
    #[error("invalid bind address '{0}': {1}")]
    InvalidAddr(String, std::net::AddrParseError),
    #[error("MYWANT_PORT must be a valid port number: {0}")]
    InvalidPort(std::num::ParseIntError),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub snapshot_path: PathBuf,
    pub snapshot_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().unwrap(),
            snapshot_path: PathBuf::from("mywant-snapshot.json"),
            snapshot_interval: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Build from the environment, falling back to [`Default::default`]
    /// for anything unset. `SERVER` (`host:port`) is read first; then
    /// `MYWANT_HOST`/`MYWANT_PORT` each override one half of it.
    pub fn from_env() -> Result<Self, ServerConfigError> {
        let mut config = Self::default();

        if let Ok(server) = std::env::var("SERVER") {
            config.bind_addr = server
                .parse()
                .map_err(|err| ServerConfigError::InvalidAddr(server.clone(), err))?;
        }

        let mut host = config.bind_addr.ip().to_string();
        let mut port = config.bind_addr.port();

        if let Ok(value) = std::env::var("MYWANT_HOST") {
            host = value;
        }
        if let Ok(value) = std::env::var("MYWANT_PORT") {
            port = value.parse().map_err(ServerConfigError::InvalidPort)?;
        }

        let addr = format!("{host}:{port}");
        config.bind_addr = addr
            .parse()
            .map_err(|err| ServerConfigError::InvalidAddr(addr, err))?;

        if let Ok(path) = std::env::var("MYWANT_SNAPSHOT_PATH") {
            config.snapshot_path = PathBuf::from(path);
        }

        Ok(config)
    }
}
