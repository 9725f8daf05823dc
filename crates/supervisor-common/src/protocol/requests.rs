use std::collections::BTreeMap;

use super::value::Value;

/// Namespace of the supervisor's own process-control methods
pub const SUPERVISOR_NAMESPACE: &str = "supervisor";
/// Namespace of the XML-RPC introspection methods
pub const SYSTEM_NAMESPACE: &str = "system";
/// Namespace of the optional twiddler extension
pub const TWIDDLER_NAMESPACE: &str = "twiddler";

/// One remote call: `namespace.method(params...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub namespace: String,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(
        namespace: impl Into<String>,
        method: impl Into<String>,
        params: impl IntoParams,
    ) -> Self {
        RpcRequest {
            namespace: namespace.into(),
            method: method.into(),
            params: params.into_params(),
        }
    }

    /// The fully qualified method name sent on the wire.
    pub fn method_name(&self) -> String {
        format!("{}.{}", self.namespace, self.method)
    }
}

/// Conversion of call arguments into a positional parameter list.
///
/// Arrays (and `Vec`s) are taken as the parameter list itself; any other
/// single value becomes a one-element list, so `"cat"` and `vec!["cat"]`
/// produce identical requests.
pub trait IntoParams {
    fn into_params(self) -> Vec<Value>;
}

impl IntoParams for () {
    fn into_params(self) -> Vec<Value> {
        Vec::new()
    }
}

impl IntoParams for Value {
    fn into_params(self) -> Vec<Value> {
        match self {
            Value::Array(items) => items,
            other => vec![other],
        }
    }
}

impl<T: Into<Value>> IntoParams for Vec<T> {
    fn into_params(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl IntoParams for &str {
    fn into_params(self) -> Vec<Value> {
        vec![Value::from(self)]
    }
}

impl IntoParams for String {
    fn into_params(self) -> Vec<Value> {
        vec![Value::String(self)]
    }
}

impl IntoParams for bool {
    fn into_params(self) -> Vec<Value> {
        vec![Value::Bool(self)]
    }
}

impl IntoParams for i32 {
    fn into_params(self) -> Vec<Value> {
        vec![Value::from(self)]
    }
}

impl IntoParams for i64 {
    fn into_params(self) -> Vec<Value> {
        vec![Value::Int(self)]
    }
}

impl IntoParams for BTreeMap<String, Value> {
    fn into_params(self) -> Vec<Value> {
        vec![Value::Struct(self)]
    }
}

impl<A: Into<Value>, B: Into<Value>> IntoParams for (A, B) {
    fn into_params(self) -> Vec<Value> {
        vec![self.0.into(), self.1.into()]
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> IntoParams for (A, B, C) {
    fn into_params(self) -> Vec<Value> {
        vec![self.0.into(), self.1.into(), self.2.into()]
    }
}
