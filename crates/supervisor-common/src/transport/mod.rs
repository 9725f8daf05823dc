//! Supervisor Transport Layer
//!
//! This module moves one HTTP request/response pair over a TCP or Unix domain
//! socket connection.
//!
//! # Components
//!
//! - **[`Endpoint`]**: Where the supervisor listens (`host:port` or a socket path)
//! - **[`SocketTransport`]**: Connects and runs a timeout-bounded exchange
//! - **[`Connection`]**: An open TCP or Unix stream
//! - **[`http`]**: Request envelope and incremental response framing
//!
//! # Wire Format
//!
//! ```text
//! POST /RPC2 HTTP/1.x\r\n
//! Content-Length: <n>\r\n
//! [Authorization: Basic <base64>\r\n]
//! \r\n
//! <XML-RPC payload>
//! ```

pub mod connection;
pub mod endpoint;
pub mod http;

pub use connection::{Connection, SocketTransport, DEFAULT_TIMEOUT};
pub use endpoint::Endpoint;
pub use http::{HttpResponse, HttpVersion, ResponseFramer};

use crate::protocol::error::SupervisorError;

/// Map IO errors to appropriate SupervisorError variants
///
/// - Socket-level timeouts/would block -> `Connection` ("timed out")
/// - Connection errors -> `Connection`
/// - Other IO errors -> `Io`
pub(crate) fn map_io_error(err: std::io::Error, context: &str) -> SupervisorError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            SupervisorError::Connection(format!("{}: timed out", context))
        }
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::UnexpectedEof => {
            SupervisorError::Connection(format!("{}: Connection lost", context))
        }
        _ => SupervisorError::Io(err),
    }
}
