//! Configuration, read once at startup

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::utils::parse_var;

const DEFAULT_ADDRESS: &str = "0.0.0.0:6000";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set to something we can not use
    #[error("Invalid value for `{name}`: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Graceful shutdown settings
///
/// Immutable after startup, the coordinator keeps its own copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// Coordinate shutdown at all, when `false` the process stops abruptly
    pub enabled: bool,

    /// Total budget for in-flight work to finish
    pub timeout_seconds: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ShutdownConfig {
    /// Read `GRACEFUL_SHUTDOWN_ENABLED` and `GRACEFUL_SHUTDOWN_TIMEOUT`
    ///
    /// # Errors
    ///
    /// Will return `Err` when either variable is set to an unparsable value
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            enabled: parse_var(lookup, "GRACEFUL_SHUTDOWN_ENABLED")?.unwrap_or(defaults.enabled),
            timeout_seconds: parse_var(lookup, "GRACEFUL_SHUTDOWN_TIMEOUT")?
                .unwrap_or(defaults.timeout_seconds),
        })
    }

    /// The total drain budget
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Address to listen on
///
/// `ADDRESS` sets the full socket address, `PORT` optionally overrides just the port.
///
/// # Errors
///
/// Will return `Err` when `ADDRESS` or `PORT` can not be parsed
pub fn listen_address<L>(lookup: &L) -> Result<SocketAddr, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    let mut address = match parse_var::<SocketAddr, _>(lookup, "ADDRESS")? {
        Some(address) => address,
        None => DEFAULT_ADDRESS.parse().map_err(|err: std::net::AddrParseError| {
            ConfigError::Invalid {
                name: "ADDRESS",
                value: DEFAULT_ADDRESS.to_string(),
                reason: err.to_string(),
            }
        })?,
    };

    if let Some(port) = parse_var::<u16, _>(lookup, "PORT")? {
        address.set_port(port);
    }

    Ok(address)
}
