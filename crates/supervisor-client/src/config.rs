use std::path::PathBuf;
use std::time::Duration;

use supervisor_common::protocol::error::Result;
use supervisor_common::transport::http::HttpVersion;
use supervisor_common::transport::{Endpoint, DEFAULT_TIMEOUT};
use supervisor_common::Credentials;

/// How long a connection to the supervisor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPolicy {
    /// Open a fresh connection for every call and close it afterwards.
    ///
    /// Concurrent calls never share a socket.
    #[default]
    PerCall,
    /// Keep one connection open across calls.
    ///
    /// The connection is guarded by an async mutex, so concurrent calls on the
    /// same client are serialized. After any failure the connection is dropped
    /// and the next call reconnects.
    Persistent,
}

impl ConnectionPolicy {
    /// Request-line version matching the policy: HTTP/1.0 asks the server to
    /// close after replying, HTTP/1.1 keeps the connection alive.
    pub fn http_version(self) -> HttpVersion {
        match self {
            ConnectionPolicy::PerCall => HttpVersion::Http10,
            ConnectionPolicy::Persistent => HttpVersion::Http11,
        }
    }
}

/// Client configuration.
///
/// # Default Configuration
///
/// - `timeout`: 60 seconds, applied to connecting and to each exchange
/// - `credentials`: none (no `Authorization` header)
/// - `policy`: [`ConnectionPolicy::PerCall`]
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use supervisor_client::{ClientConfig, ConnectionPolicy};
///
/// let config = ClientConfig::tcp("127.0.0.1", 9001)
///     .with_timeout(Duration::from_secs(5))
///     .with_credentials("user", "123")
///     .with_connection_policy(ConnectionPolicy::Persistent);
/// assert_eq!(config.timeout, Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where the supervisor listens
    pub endpoint: Endpoint,
    /// Bound on connecting and on each request/response exchange
    pub timeout: Duration,
    /// Basic-auth credentials, if the server requires them
    pub credentials: Option<Credentials>,
    /// Connection lifetime
    pub policy: ConnectionPolicy,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            credentials: None,
            policy: ConnectionPolicy::default(),
        }
    }

    /// Targets an `[inet_http_server]`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Endpoint::tcp(host, port))
    }

    /// Targets a `[unix_http_server]` socket file.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::new(Endpoint::unix(path))
    }

    /// Parses `http://host:port`, `host:port` or `unix:///path`.
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(Endpoint::parse(url)?))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_connection_policy(mut self, policy: ConnectionPolicy) -> Self {
        self.policy = policy;
        self
    }
}
