use std::sync::Arc;

use supervisor_common::protocol::error::Result;
use supervisor_common::transport::{Connection, Endpoint, HttpResponse, SocketTransport};
use tokio::sync::Mutex;

/// A single long-lived connection shared by every call on a client.
///
/// The connection is opened lazily on first use. The async mutex is held for
/// the whole exchange, so at most one call is in flight on the socket and no
/// response bytes can interleave between calls. Clones share the same
/// connection.
///
/// # Failure Handling
///
/// Any error during connect, write or read discards the connection. The
/// failed call is not retried; the next call simply opens a new connection.
/// A response that does not keep the connection alive (HTTP/1.0, or
/// `Connection: close`) also discards it once the response is read.
#[derive(Debug, Clone, Default)]
pub struct PersistentConnection {
    slot: Arc<Mutex<Option<Connection>>>,
}

impl PersistentConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one exchange over the shared connection, connecting if needed.
    pub async fn round_trip(
        &self,
        transport: &SocketTransport,
        endpoint: &Endpoint,
        request: &[u8],
    ) -> Result<HttpResponse> {
        let mut slot = self.slot.lock().await;

        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => transport.connect(endpoint).await?,
        };

        match transport.round_trip(&mut connection, request).await {
            Ok(response) if response.keep_alive => {
                *slot = Some(connection);
                Ok(response)
            }
            Ok(response) => {
                tracing::debug!(%endpoint, "server closes connection after response");
                Ok(response)
            }
            Err(err) => {
                tracing::warn!(%endpoint, error = %err, "discarding persistent connection");
                Err(err)
            }
        }
    }

    /// Whether a connection is currently held open.
    pub async fn is_connected(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Closes the held connection, if any.
    pub async fn disconnect(&self) {
        self.slot.lock().await.take();
    }
}
