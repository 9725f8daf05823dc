//! Async client for supervisord's XML-RPC control API.
//!
//! [`SupervisorClient`] sends one XML-RPC call per HTTP exchange to a
//! supervisord `[inet_http_server]` or `[unix_http_server]`. Besides the
//! generic [`SupervisorClient::call`] it exposes every method of the
//! `supervisor`, `system` and `twiddler` namespaces by name, plus typed views
//! ([`ProcessInfo`], [`LogTail`], ...) over the common return structs.
//!
//! # Example
//!
//! ```no_run
//! use supervisor_client::{ClientConfig, SupervisorClient};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SupervisorClient::new(
//!     ClientConfig::unix("/var/run/supervisor.sock").with_credentials("user", "123"),
//! );
//!
//! client.start_process("cat", true).await?;
//! for info in client.all_process_info().await? {
//!     println!("{} {}", info.full_name(), info.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod methods;
pub mod pool;
pub mod types;

pub use client::SupervisorClient;
pub use config::{ClientConfig, ConnectionPolicy};
pub use pool::PersistentConnection;
pub use types::{LogLevel, LogTail, ProcessInfo, ProcessState, SupervisorState, SupervisorStateInfo};

pub use supervisor_common::transport::Endpoint;
pub use supervisor_common::{Credentials, ErrorKind, Fault, FaultCode, Result, SupervisorError, Value};
