use std::fmt;
use std::path::PathBuf;

use crate::protocol::error::{Result, SupervisorError};

/// Where the supervisor's HTTP server listens.
///
/// Exactly one addressing mode is used per client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `[inet_http_server]`
    Tcp { host: String, port: u16 },
    /// `[unix_http_server]`
    Unix(PathBuf),
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Endpoint::Unix(path.into())
    }

    /// Parses `unix:///path/to.sock`, `http://host:port[/RPC2]` or `host:port`.
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(path) = url.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(SupervisorError::Connection(format!(
                    "Invalid address '{}': empty socket path",
                    url
                )));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        let authority = url.strip_prefix("http://").unwrap_or(url);
        let authority = authority.split('/').next().unwrap_or_default();

        let (host, port) = authority.rsplit_once(':').ok_or_else(|| {
            SupervisorError::Connection(format!("Invalid address '{}': missing port", url))
        })?;
        let port = port.parse::<u16>().map_err(|e| {
            SupervisorError::Connection(format!("Invalid address '{}': {}", url, e))
        })?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(SupervisorError::Connection(format!(
                "Invalid address '{}': missing host",
                url
            )));
        }

        Ok(Endpoint::tcp(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
