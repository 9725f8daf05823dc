use std::time::Duration;

use thiserror::Error;

use super::fault::Fault;

/// Broad classification of a [`SupervisorError`].
///
/// Callers that only care whether a failure came from the transport, the
/// framing, the payload or the remote supervisor can match on this instead of
/// the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The peer could not be reached, or reading/writing the channel failed
    /// (including timeouts).
    Connection,
    /// The HTTP response was malformed.
    Protocol,
    /// The XML-RPC payload could not be serialized or deserialized.
    Encoding,
    /// The supervisor answered with a well-formed fault.
    Fault,
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Cannot open socket to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unexpected HTTP status: {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("RPC fault {}: {}", .0.code, .0.message)]
    Fault(Fault),
}

impl SupervisorError {
    /// Builds the timeout variant from the configured duration.
    pub fn timeout(after: Duration) -> Self {
        SupervisorError::Timeout(after.as_millis() as u64)
    }

    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SupervisorError::Connection(_)
            | SupervisorError::Connect { .. }
            | SupervisorError::Timeout(_)
            | SupervisorError::Io(_) => ErrorKind::Connection,
            SupervisorError::Protocol(_) | SupervisorError::HttpStatus { .. } => {
                ErrorKind::Protocol
            }
            SupervisorError::Encoding(_) => ErrorKind::Encoding,
            SupervisorError::Fault(_) => ErrorKind::Fault,
        }
    }

    /// Whether the failure happened on the way to or from the supervisor
    /// rather than being a rejection by it.
    ///
    /// The client never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Protocol)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SupervisorError::Timeout(_))
    }

    /// Returns the fault carried by this error, if it is one.
    pub fn as_fault(&self) -> Option<&Fault> {
        match self {
            SupervisorError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for SupervisorError {
    fn from(err: quick_xml::Error) -> Self {
        SupervisorError::Encoding(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for SupervisorError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        SupervisorError::Encoding(err.to_string())
    }
}

impl From<base64::DecodeError> for SupervisorError {
    fn from(err: base64::DecodeError) -> Self {
        SupervisorError::Encoding(format!("invalid base64: {}", err))
    }
}

impl From<Fault> for SupervisorError {
    fn from(fault: Fault) -> Self {
        SupervisorError::Fault(fault)
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(SupervisorError::Timeout(10).kind(), ErrorKind::Connection);
        assert_eq!(
            SupervisorError::Protocol("missing Content-Length".into()).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            SupervisorError::HttpStatus { status: 401, reason: "Unauthorized".into() }.kind(),
            ErrorKind::Protocol
        );
        assert_eq!(SupervisorError::Encoding("bad".into()).kind(), ErrorKind::Encoding);
        assert_eq!(
            SupervisorError::Fault(Fault::new(10, "BAD_NAME")).kind(),
            ErrorKind::Fault
        );
    }

    #[test]
    fn test_faults_are_not_retryable() {
        assert!(!SupervisorError::Fault(Fault::new(70, "NOT_RUNNING")).is_retryable());
        assert!(!SupervisorError::Encoding("bad".into()).is_retryable());
        assert!(SupervisorError::Connection("reset".into()).is_retryable());
        assert!(SupervisorError::Protocol("bad".into()).is_retryable());
    }

    #[test]
    fn test_timeout_from_duration() {
        let err = SupervisorError::timeout(Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Request timeout after 1500ms");
    }

    #[test]
    fn test_fault_display() {
        let err = SupervisorError::Fault(Fault::new(70, "BAD_NAME"));
        assert_eq!(err.to_string(), "RPC fault 70: BAD_NAME");
        assert_eq!(err.as_fault().map(|f| f.code), Some(70));
    }
}
