//! Supervisor Common Types and Transport
//!
//! This crate provides the protocol definitions and socket transport used to
//! talk to supervisord's remote control API.
//!
//! # Overview
//!
//! supervisord exposes process lifecycle operations (start/stop/restart,
//! status, logs, process groups) as XML-RPC methods served over HTTP, on
//! either a TCP port or a Unix domain socket. This crate contains:
//!
//! - **Protocol Layer**: the dynamic [`Value`] type, the XML-RPC codec, the
//!   fault model and the error taxonomy
//! - **Transport Layer**: endpoint addressing, TCP/Unix connections, HTTP
//!   request framing and incremental response reading
//! - **Auth**: HTTP Basic credentials
//!
//! # Architecture
//!
//! - **Transport**: TCP or Unix domain socket, one exchange per call
//! - **Envelope**: `POST /RPC2` with `Content-Length` (and optional `Authorization`)
//! - **Payload**: XML-RPC, UTF-8
//! - **Max Response Size**: 100 MB
//!
//! # Components
//!
//! - [`protocol`] - Values, requests, faults, errors and the XML-RPC codec
//! - [`transport`] - Endpoints, connections and HTTP framing
//! - [`auth`] - Basic authentication credentials
//!
//! # Example
//!
//! ```
//! use supervisor_common::{RpcRequest, Value, XmlRpcCodec};
//!
//! let request = RpcRequest::new("supervisor", "startProcess", ("cat", true));
//! assert_eq!(request.method_name(), "supervisor.startProcess");
//! assert_eq!(request.params, vec![Value::from("cat"), Value::Bool(true)]);
//!
//! let payload = XmlRpcCodec::encode_request(&request).unwrap();
//! ```

pub mod auth;
pub mod protocol;
pub mod transport;

pub use auth::Credentials;
pub use protocol::*;
