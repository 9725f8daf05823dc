use std::time::Duration;

use supervisor_common::protocol::error::Result;
use supervisor_common::transport::http::build_request;
use supervisor_common::transport::{Endpoint, HttpResponse, SocketTransport};
use supervisor_common::{Credentials, IntoParams, RpcRequest, Value, XmlRpcCodec};

use crate::config::{ClientConfig, ConnectionPolicy};
use crate::pool::PersistentConnection;

/// Client for supervisord's XML-RPC control API.
///
/// Every call is one HTTP exchange: the method and its arguments are encoded
/// as an XML-RPC `methodCall`, posted to `/RPC2`, and the response is decoded
/// into a [`Value`]. Faults reported by the supervisor come back as
/// [`SupervisorError::Fault`](supervisor_common::SupervisorError::Fault), never
/// as a successful value.
///
/// With the default [`ConnectionPolicy::PerCall`] each call opens its own
/// connection, so calls may run concurrently from many tasks. With
/// [`ConnectionPolicy::Persistent`] calls share one connection and run one at
/// a time.
///
/// Credentials and the timeout can only be changed through `&mut self`, which
/// means they cannot change under a call that is already in flight.
#[derive(Debug, Clone)]
pub struct SupervisorClient {
    endpoint: Endpoint,
    credentials: Option<Credentials>,
    transport: SocketTransport,
    policy: ConnectionPolicy,
    persistent: Option<PersistentConnection>,
}

impl SupervisorClient {
    pub fn new(config: ClientConfig) -> Self {
        let persistent = match config.policy {
            ConnectionPolicy::PerCall => None,
            ConnectionPolicy::Persistent => Some(PersistentConnection::new()),
        };

        Self {
            endpoint: config.endpoint,
            credentials: config.credentials,
            transport: SocketTransport::with_timeout(config.timeout),
            policy: config.policy,
            persistent,
        }
    }

    /// Client for `http://host:port`, `host:port` or `unix:///path` with
    /// default settings.
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(ClientConfig::from_url(url)?))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.credentials = Some(Credentials::new(username, password));
    }

    pub fn clear_credentials(&mut self) {
        self.credentials = None;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.transport = SocketTransport::with_timeout(timeout);
    }

    /// Calls `{namespace}.{method}` with the given arguments.
    ///
    /// A single scalar argument is sent as a one-element parameter list, so
    /// `call("supervisor", "getProcessInfo", "cat")` and
    /// `call("supervisor", "getProcessInfo", vec!["cat"])` are the same call.
    ///
    /// # Errors
    ///
    /// - `Connect`, `Connection`, `Io` or `Timeout` when the supervisor cannot
    ///   be reached or stops answering
    /// - `Protocol` or `HttpStatus` when the HTTP response is malformed or not 2xx
    /// - `Encoding` when the payload is not valid XML-RPC
    /// - `Fault` when the supervisor rejects the call
    ///
    /// # Example
    ///
    /// ```no_run
    /// use supervisor_client::SupervisorClient;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = SupervisorClient::from_url("http://127.0.0.1:9001")?;
    /// let info = client.call("supervisor", "getProcessInfo", "cat").await?;
    /// println!("{:?}", info.get("statename"));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call(
        &self,
        namespace: impl Into<String>,
        method: impl Into<String>,
        args: impl IntoParams,
    ) -> Result<Value> {
        let request = RpcRequest::new(namespace, method, args);
        let method_name = request.method_name();
        tracing::debug!(method = %method_name, params = request.params.len(), "calling supervisor");

        let payload = XmlRpcCodec::encode_request(&request)?;
        let message = build_request(
            &payload,
            self.credentials.as_ref(),
            self.policy.http_version(),
        );

        let response = self.exchange(&message).await?.error_for_status()?;

        let result = XmlRpcCodec::decode_response(&response.body)?.into_result();
        if let Err(err) = &result {
            tracing::debug!(method = %method_name, error = %err, "call failed");
        }
        result
    }

    async fn exchange(&self, message: &[u8]) -> Result<HttpResponse> {
        match &self.persistent {
            Some(persistent) => {
                persistent
                    .round_trip(&self.transport, &self.endpoint, message)
                    .await
            }
            None => {
                // Dropped at the end of the call, closing the socket.
                let mut connection = self.transport.connect(&self.endpoint).await?;
                self.transport.round_trip(&mut connection, message).await
            }
        }
    }

    /// Closes the held connection of a persistent client. No-op otherwise.
    pub async fn disconnect(&self) {
        if let Some(persistent) = &self.persistent {
            persistent.disconnect().await;
        }
    }
}
