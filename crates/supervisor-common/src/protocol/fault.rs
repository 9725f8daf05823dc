//! Supervisor fault model
//!
//! A fault is the XML-RPC way of reporting a failed call: a struct with an
//! integer `faultCode` and a string `faultString`. The supervisor uses a fixed
//! table of codes, exposed here as [`FaultCode`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Struct key carrying the numeric fault code.
pub const FAULT_CODE_KEY: &str = "faultCode";
/// Struct key carrying the human-readable fault message.
pub const FAULT_STRING_KEY: &str = "faultString";

/// A well-formed failure reported by the remote supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Numeric fault code, preserved exactly as received
    pub code: i32,
    /// Message sent along with the code
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Fault {
            code,
            message: message.into(),
        }
    }

    /// Interprets a decoded value as a fault struct.
    ///
    /// Returns `None` unless the value is a struct holding exactly an integer
    /// `faultCode` and a string `faultString`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let members = value.as_struct()?;
        if members.len() != 2 {
            return None;
        }

        let code = members.get(FAULT_CODE_KEY)?.as_i64()?;
        let message = members.get(FAULT_STRING_KEY)?.as_str()?;

        Some(Fault {
            code: i32::try_from(code).ok()?,
            message: message.to_string(),
        })
    }

    /// Maps the numeric code onto the supervisor's documented table.
    pub fn known_code(&self) -> Option<FaultCode> {
        FaultCode::from_code(self.code)
    }

    /// Builds the struct representation used on the wire.
    pub fn to_value(&self) -> Value {
        Value::structure([
            (FAULT_CODE_KEY, Value::Int(self.code as i64)),
            (FAULT_STRING_KEY, Value::String(self.message.clone())),
        ])
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Fault codes raised by supervisord's XML-RPC interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    UnknownMethod,
    IncorrectParameters,
    BadArguments,
    SignatureUnsupported,
    ShutdownState,
    BadName,
    BadSignal,
    NoFile,
    NotExecutable,
    Failed,
    AbnormalTermination,
    SpawnError,
    AlreadyStarted,
    NotRunning,
    Success,
    AlreadyAdded,
    StillRunning,
    CantReread,
}

impl FaultCode {
    const TABLE: [(FaultCode, i32, &'static str); 18] = [
        (FaultCode::UnknownMethod, 1, "UNKNOWN_METHOD"),
        (FaultCode::IncorrectParameters, 2, "INCORRECT_PARAMETERS"),
        (FaultCode::BadArguments, 3, "BAD_ARGUMENTS"),
        (FaultCode::SignatureUnsupported, 4, "SIGNATURE_UNSUPPORTED"),
        (FaultCode::ShutdownState, 6, "SHUTDOWN_STATE"),
        (FaultCode::BadName, 10, "BAD_NAME"),
        (FaultCode::BadSignal, 11, "BAD_SIGNAL"),
        (FaultCode::NoFile, 20, "NO_FILE"),
        (FaultCode::NotExecutable, 21, "NOT_EXECUTABLE"),
        (FaultCode::Failed, 30, "FAILED"),
        (FaultCode::AbnormalTermination, 40, "ABNORMAL_TERMINATION"),
        (FaultCode::SpawnError, 50, "SPAWN_ERROR"),
        (FaultCode::AlreadyStarted, 60, "ALREADY_STARTED"),
        (FaultCode::NotRunning, 70, "NOT_RUNNING"),
        (FaultCode::Success, 80, "SUCCESS"),
        (FaultCode::AlreadyAdded, 90, "ALREADY_ADDED"),
        (FaultCode::StillRunning, 91, "STILL_RUNNING"),
        (FaultCode::CantReread, 92, "CANT_REREAD"),
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(kind, _, _)| *kind)
    }

    pub fn code(self) -> i32 {
        Self::TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, c, _)| *c)
            .unwrap_or_default()
    }

    /// The symbolic name the supervisor uses for this code.
    pub fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, _, name)| *name)
            .unwrap_or("UNKNOWN")
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
