//! HTTP framing for XML-RPC calls
//!
//! Requests are a bare `POST /RPC2` with a `Content-Length` header (and an
//! optional `Authorization` header). Responses are read incrementally: bytes
//! accumulate until the header/body separator has been seen, the
//! `Content-Length` header has been found, and at least that many body bytes
//! are buffered. Only `Content-Length` is consulted; every other header is
//! ignored.
//!
//! # Example
//!
//! ```
//! use supervisor_common::transport::http::{HttpVersion, ResponseFramer, build_request};
//!
//! let request = build_request(b"<methodCall/>", None, HttpVersion::Http10);
//! assert!(request.starts_with(b"POST /RPC2 HTTP/1.0\r\nContent-Length: 13\r\n\r\n"));
//!
//! let mut framer = ResponseFramer::new();
//! assert!(!framer.push(b"HTTP/1.0 200 OK\r\nContent-Length: 4\r\n\r\ntr").unwrap());
//! assert!(framer.push(b"ue").unwrap());
//! assert_eq!(framer.into_response().unwrap().body, b"true");
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::auth::Credentials;
use crate::protocol::error::{Result, SupervisorError};
use crate::transport::map_io_error;

/// Path of the XML-RPC handler on the supervisor's HTTP server
pub const RPC_PATH: &str = "/RPC2";

/// Number of bytes requested from the socket per read
pub const CHUNK_SIZE: usize = 8192;

/// Maximum response size accepted (100 MB)
pub const MAX_RESPONSE_SIZE: usize = 100 * 1024 * 1024;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &str = "Content-Length";

/// HTTP version used on the request line.
///
/// HTTP/1.0 tells the server to close the connection after replying; HTTP/1.1
/// keeps it open for the next call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }
}

/// Wraps an XML-RPC body in an HTTP POST envelope.
pub fn build_request(body: &[u8], credentials: Option<&Credentials>, version: HttpVersion) -> Vec<u8> {
    let mut head = format!(
        "POST {} {}\r\n{}: {}\r\n",
        RPC_PATH,
        version.as_str(),
        CONTENT_LENGTH,
        body.len()
    );
    if let Some(credentials) = credentials {
        head.push_str("Authorization: ");
        head.push_str(&credentials.authorization_header());
        head.push_str("\r\n");
    }
    head.push_str("\r\n");

    let mut request = Vec::with_capacity(head.len() + body.len());
    request.extend_from_slice(head.as_bytes());
    request.extend_from_slice(body);
    request
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    /// Exactly `Content-Length` bytes
    pub body: Vec<u8>,
    /// The server leaves the connection open: an HTTP/1.1 status line and no
    /// `Connection: close` header.
    pub keep_alive: bool,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns non-2xx responses (e.g. 401 from a password-protected server)
    /// into an error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SupervisorError::HttpStatus {
                status: self.status,
                reason: self.reason,
            })
        }
    }
}

/// Accumulates response bytes until a complete HTTP response is buffered.
///
/// State lives for a single call and is discarded once the body is read.
#[derive(Debug)]
pub struct ResponseFramer {
    buffer: Vec<u8>,
    header_end: Option<usize>,
    content_length: Option<usize>,
    max_body: usize,
}

impl ResponseFramer {
    /// Creates a framer accepting bodies up to [`MAX_RESPONSE_SIZE`].
    pub fn new() -> Self {
        Self::with_max_body(MAX_RESPONSE_SIZE)
    }

    /// Creates a framer accepting bodies of at most `max_body` bytes.
    pub fn with_max_body(max_body: usize) -> Self {
        Self {
            buffer: Vec::new(),
            header_end: None,
            content_length: None,
            max_body,
        }
    }

    /// Appends a chunk and reports whether the response is now complete.
    ///
    /// The header block is inspected exactly once, as soon as the separator
    /// first appears; a missing `Content-Length` fails the call right there.
    pub fn push(&mut self, chunk: &[u8]) -> Result<bool> {
        let scan_from = self.buffer.len().saturating_sub(HEADER_SEPARATOR.len() - 1);
        self.buffer.extend_from_slice(chunk);

        if self.header_end.is_none() {
            if let Some(pos) = find(&self.buffer[scan_from..], HEADER_SEPARATOR) {
                let header_end = scan_from + pos;
                self.header_end = Some(header_end);
                let content_length = parse_content_length(&self.buffer[..header_end])?;
                if content_length > self.max_body {
                    return Err(SupervisorError::Protocol(format!(
                        "Response too large: {} bytes (max {} bytes)",
                        content_length, self.max_body
                    )));
                }
                self.content_length = Some(content_length);
            } else if self.buffer.len() > self.max_body {
                return Err(SupervisorError::Protocol(format!(
                    "Response headers exceed {} bytes",
                    self.max_body
                )));
            }
        }

        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        match (self.body_start(), self.content_length) {
            (Some(start), Some(length)) => self.buffer.len() - start >= length,
            _ => false,
        }
    }

    /// Bytes buffered past the header separator so far.
    pub fn body_len(&self) -> usize {
        self.body_start()
            .map(|start| self.buffer.len() - start)
            .unwrap_or_default()
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Splits the buffered bytes into status and body.
    ///
    /// Fails unless [`is_complete`](Self::is_complete) holds; the buffer is
    /// never interpreted before that.
    pub fn into_response(mut self) -> Result<HttpResponse> {
        let (start, length) = match (self.body_start(), self.content_length) {
            (Some(start), Some(length)) if self.buffer.len() - start >= length => (start, length),
            _ => {
                return Err(SupervisorError::Protocol(
                    "Response is incomplete".to_string(),
                ))
            }
        };

        let header_end = start - HEADER_SEPARATOR.len();
        let head = &self.buffer[..header_end];
        let (version, status, reason) = parse_status_line(head)?;
        let keep_alive = version == HttpVersion::Http11.as_str() && !connection_close(head);

        self.buffer.truncate(start + length);
        let body = self.buffer.split_off(start);

        Ok(HttpResponse {
            status,
            reason,
            body,
            keep_alive,
        })
    }

    fn body_start(&self) -> Option<usize> {
        self.header_end.map(|end| end + HEADER_SEPARATOR.len())
    }
}

impl Default for ResponseFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a fully framed request to the stream.
pub async fn send_message<W: AsyncWrite + Unpin>(stream: &mut W, data: &[u8]) -> Result<()> {
    stream
        .write_all(data)
        .await
        .map_err(|e| map_io_error(e, "writing request"))?;

    stream
        .flush()
        .await
        .map_err(|e| map_io_error(e, "flushing stream"))?;

    Ok(())
}

/// Reads from the stream in [`CHUNK_SIZE`] pieces until a complete response
/// is buffered.
///
/// A peer that closes the stream early produces a connection error; a
/// partial body is never returned.
pub async fn read_response<R: AsyncRead + Unpin>(stream: &mut R) -> Result<HttpResponse> {
    let mut framer = ResponseFramer::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| map_io_error(e, "reading response"))?;

        if n == 0 {
            return Err(SupervisorError::Connection(format!(
                "Connection closed after {} body bytes (expected {})",
                framer.body_len(),
                framer
                    .content_length()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "headers".to_string())
            )));
        }

        tracing::trace!(bytes = n, "read response chunk");

        if framer.push(&chunk[..n])? {
            break;
        }
    }

    framer.into_response()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// First value of header `name`, skipping the status line.
fn header_value(head: &[u8], name: &str) -> Option<String> {
    let head = String::from_utf8_lossy(head);

    head.split("\r\n").skip(1).find_map(|line| {
        let (key, value) = line.split_once(": ")?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

fn parse_content_length(head: &[u8]) -> Result<usize> {
    let value = header_value(head, CONTENT_LENGTH)
        .ok_or_else(|| SupervisorError::Protocol("missing Content-Length".to_string()))?;

    value
        .parse::<usize>()
        .map_err(|_| SupervisorError::Protocol(format!("Invalid Content-Length '{}'", value)))
}

fn connection_close(head: &[u8]) -> bool {
    header_value(head, "Connection").is_some_and(|value| {
        value
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("close"))
    })
}

fn parse_status_line(head: &[u8]) -> Result<(String, u16, String)> {
    let head = String::from_utf8_lossy(head);
    let line = head.split("\r\n").next().unwrap_or_default();

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    let status = parts.next().and_then(|s| s.parse::<u16>().ok());
    let reason = parts.next().unwrap_or_default().to_string();

    match status {
        Some(status) if version.starts_with("HTTP/") => Ok((version.to_string(), status, reason)),
        _ => Err(SupervisorError::Protocol(format!("Invalid status line '{}'", line))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &[u8] = b"HTTP/1.0 200 OK\r\nServer: Medusa/1.12\r\nContent-Length: 4\r\nContent-Type: text/xml\r\n\r\ntrue";

    #[test]
    fn test_build_request_without_credentials() {
        let request = build_request(b"hello", None, HttpVersion::Http10);
        assert_eq!(request, b"POST /RPC2 HTTP/1.0\r\nContent-Length: 5\r\n\r\nhello");
    }

    #[test]
    fn test_build_request_with_credentials() {
        let credentials = Credentials::new("user", "pass");
        let request = build_request(b"hello", Some(&credentials), HttpVersion::Http11);
        assert_eq!(
            request,
            b"POST /RPC2 HTTP/1.1\r\nContent-Length: 5\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\nhello"
        );
    }

    #[test]
    fn test_content_length_counts_bytes() {
        let body = "é".as_bytes();
        let request = build_request(body, None, HttpVersion::Http10);
        assert!(request.starts_with(b"POST /RPC2 HTTP/1.0\r\nContent-Length: 2\r\n"));
    }

    #[test]
    fn test_single_shot_response() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push(RESPONSE).unwrap());

        let response = framer.into_response().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.body, b"true");
    }

    #[test]
    fn test_byte_at_a_time_response() {
        let mut framer = ResponseFramer::new();
        let mut completed_at = None;
        for (i, byte) in RESPONSE.iter().enumerate() {
            if framer.push(std::slice::from_ref(byte)).unwrap() {
                completed_at = Some(i);
                break;
            }
        }

        assert_eq!(completed_at, Some(RESPONSE.len() - 1));
        assert_eq!(framer.into_response().unwrap().body, b"true");
    }

    #[test]
    fn test_separator_split_across_chunks() {
        let split = RESPONSE.len() - 6;
        let mut framer = ResponseFramer::new();
        assert!(!framer.push(&RESPONSE[..split]).unwrap());
        assert!(framer.content_length().is_none());
        assert!(framer.push(&RESPONSE[split..]).unwrap());
        assert_eq!(framer.content_length(), Some(4));
    }

    #[test]
    fn test_missing_content_length() {
        let mut framer = ResponseFramer::new();
        let result = framer.push(b"HTTP/1.0 200 OK\r\nContent-Type: text/xml\r\n\r\ntrue");
        match result {
            Err(SupervisorError::Protocol(msg)) => assert_eq!(msg, "missing Content-Length"),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_content_length_on_status_line_is_ignored() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push(b"Content-Length: 0\r\nX: y\r\n\r\n").is_err());
    }

    #[test]
    fn test_content_length_is_case_insensitive() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok").unwrap());
    }

    #[test]
    fn test_invalid_content_length() {
        let mut framer = ResponseFramer::new();
        assert!(matches!(
            framer.push(b"HTTP/1.0 200 OK\r\nContent-Length: lots\r\n\r\n"),
            Err(SupervisorError::Protocol(_))
        ));
    }

    #[test]
    fn test_extra_bytes_are_trimmed() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nokHTTP/1.1").unwrap());
        assert_eq!(framer.into_response().unwrap().body, b"ok");
    }

    #[test]
    fn test_incomplete_response_cannot_be_taken() {
        let mut framer = ResponseFramer::new();
        framer.push(b"HTTP/1.0 200 OK\r\nContent-Length: 10\r\n\r\nabc").unwrap();
        assert!(!framer.is_complete());
        assert_eq!(framer.body_len(), 3);
        assert!(framer.into_response().is_err());
    }

    #[test]
    fn test_zero_length_body() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push(b"HTTP/1.0 200 OK\r\nContent-Length: 0\r\n\r\n").unwrap());
        assert!(framer.into_response().unwrap().body.is_empty());
    }

    #[test]
    fn test_error_status() {
        let mut framer = ResponseFramer::new();
        framer
            .push(b"HTTP/1.0 401 Unauthorized\r\nContent-Length: 0\r\n\r\n")
            .unwrap();
        let response = framer.into_response().unwrap();
        assert!(!response.is_success());
        assert!(matches!(
            response.error_for_status(),
            Err(SupervisorError::HttpStatus { status: 401, .. })
        ));
    }

    #[test]
    fn test_invalid_status_line() {
        let mut framer = ResponseFramer::new();
        framer.push(b"garbage\r\nContent-Length: 0\r\n\r\n").unwrap();
        assert!(matches!(framer.into_response(), Err(SupervisorError::Protocol(_))));
    }

    #[test]
    fn test_keep_alive_follows_version_and_connection_header() {
        let keep_alive = |raw: &[u8]| {
            let mut framer = ResponseFramer::new();
            assert!(framer.push(raw).unwrap());
            framer.into_response().unwrap().keep_alive
        };

        assert!(keep_alive(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"));
        assert!(!keep_alive(b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok"));
        assert!(!keep_alive(b"HTTP/1.1 200 OK\r\nconnection: Close\r\nContent-Length: 2\r\n\r\nok"));
        assert!(!keep_alive(b"HTTP/1.1 200 OK\r\nConnection: foo, close\r\nContent-Length: 2\r\n\r\nok"));
        assert!(keep_alive(b"HTTP/1.1 200 OK\r\nConnection: keep-alive\r\nContent-Length: 2\r\n\r\nok"));
    }

    #[test]
    fn test_body_of_exactly_max_size_is_accepted() {
        let head = b"HTTP/1.0 200 OK\r\nServer: Medusa/1.12\r\nContent-Length: 8\r\n\r\n";
        let mut framer = ResponseFramer::with_max_body(8);
        assert!(!framer.push(head).unwrap());
        assert!(framer.push(b"12345678").unwrap());
        assert_eq!(framer.into_response().unwrap().body, b"12345678");
    }

    #[test]
    fn test_body_over_max_size_is_rejected() {
        let mut framer = ResponseFramer::with_max_body(8);
        assert!(matches!(
            framer.push(b"HTTP/1.0 200 OK\r\nContent-Length: 9\r\n\r\n"),
            Err(SupervisorError::Protocol(_))
        ));
    }

    #[test]
    fn test_endless_headers_are_rejected() {
        let mut framer = ResponseFramer::with_max_body(32);
        assert!(!framer.push(b"HTTP/1.0 200 OK\r\n").unwrap());
        assert!(matches!(
            framer.push(b"X-Padding: aaaaaaaaaaaaaaaa"),
            Err(SupervisorError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_response_from_stream() {
        let mut stream: &[u8] = RESPONSE;
        let response = read_response(&mut stream).await.unwrap();
        assert_eq!(response.body, b"true");
    }

    #[tokio::test]
    async fn test_read_response_early_close() {
        let mut stream: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Length: 40\r\n\r\ntrue";
        assert!(matches!(
            read_response(&mut stream).await,
            Err(SupervisorError::Connection(_))
        ));
    }
}
