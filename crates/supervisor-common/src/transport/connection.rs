use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::protocol::error::{Result, SupervisorError};
use crate::transport::endpoint::Endpoint;
use crate::transport::http::{read_response, send_message, HttpResponse};

/// Default timeout for connecting and for one request/response exchange
/// (60 seconds, the usual platform socket default)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// An open channel to the supervisor, over TCP or a Unix domain socket.
#[derive(Debug)]
pub enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Connection::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Socket transport for supervisor calls.
///
/// Opens connections to an [`Endpoint`] and runs one framed HTTP exchange over
/// them. Both phases are bounded by the configured timeout; when it expires
/// the call fails with [`SupervisorError::Timeout`] and whatever was read so
/// far is dropped.
///
/// # Example
///
/// ```no_run
/// use supervisor_common::transport::{Endpoint, SocketTransport};
/// use supervisor_common::transport::http::{build_request, HttpVersion};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = SocketTransport::new();
/// let mut conn = transport.connect(&Endpoint::tcp("127.0.0.1", 9001)).await?;
///
/// let request = build_request(b"<methodCall>...</methodCall>", None, HttpVersion::Http10);
/// let response = transport.round_trip(&mut conn, &request).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SocketTransport {
    timeout: Duration,
}

impl SocketTransport {
    /// Creates a transport with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Connects to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The endpoint refuses or cannot be resolved (`Connect`, carrying the OS error)
    /// - The connection is not established within the timeout (`Timeout`)
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<Connection> {
        let connecting = async {
            match endpoint {
                Endpoint::Tcp { host, port } => {
                    let stream = TcpStream::connect((host.as_str(), *port)).await?;
                    stream.set_nodelay(true)?;
                    Ok::<_, io::Error>(Connection::Tcp(stream))
                }
                #[cfg(unix)]
                Endpoint::Unix(path) => UnixStream::connect(path).await.map(Connection::Unix),
                #[cfg(not(unix))]
                Endpoint::Unix(_) => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix domain sockets are not supported on this platform",
                )),
            }
        };

        match tokio::time::timeout(self.timeout, connecting).await {
            Ok(Ok(connection)) => {
                tracing::debug!(%endpoint, "connected to supervisor");
                Ok(connection)
            }
            Ok(Err(source)) => Err(SupervisorError::Connect {
                target: endpoint.to_string(),
                source,
            }),
            Err(_) => Err(SupervisorError::timeout(self.timeout)),
        }
    }

    /// Sends a framed request and reads back the complete response.
    ///
    /// The write and the whole read loop share one timeout.
    pub async fn round_trip<S>(&self, stream: &mut S, request: &[u8]) -> Result<HttpResponse>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let exchange = async {
            send_message(stream, request).await?;
            tracing::debug!(bytes = request.len(), "request sent");
            read_response(stream).await
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| SupervisorError::timeout(self.timeout))??;

        tracing::debug!(
            status = response.status,
            bytes = response.body.len(),
            "response framed"
        );
        Ok(response)
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new()
    }
}
