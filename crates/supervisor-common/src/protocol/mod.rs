pub mod error;
pub mod fault;
pub mod requests;
pub mod value;
pub mod xmlrpc;


pub use error::{ErrorKind, Result, SupervisorError};
pub use fault::{Fault, FaultCode};
pub use requests::{IntoParams, RpcRequest, SUPERVISOR_NAMESPACE, SYSTEM_NAMESPACE, TWIDDLER_NAMESPACE};
pub use value::Value;
pub use xmlrpc::{MethodResponse, XmlRpcCodec};
