//! Typed views over the structs the supervisor returns.
//!
//! The named operations hand back raw [`Value`]s. These types parse the most
//! common shapes; anything that does not match fails with
//! [`SupervisorError::Encoding`].

use std::fmt;

use serde::Serialize;
use supervisor_common::protocol::error::{Result, SupervisorError};
use supervisor_common::Value;

use crate::client::SupervisorClient;

/// Lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Backoff,
    Stopping,
    Exited,
    Fatal,
    Unknown,
}

impl ProcessState {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => ProcessState::Stopped,
            10 => ProcessState::Starting,
            20 => ProcessState::Running,
            30 => ProcessState::Backoff,
            40 => ProcessState::Stopping,
            100 => ProcessState::Exited,
            200 => ProcessState::Fatal,
            1000 => ProcessState::Unknown,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            ProcessState::Stopped => 0,
            ProcessState::Starting => 10,
            ProcessState::Running => 20,
            ProcessState::Backoff => 30,
            ProcessState::Stopping => 40,
            ProcessState::Exited => 100,
            ProcessState::Fatal => 200,
            ProcessState::Unknown => 1000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessState::Stopped => "STOPPED",
            ProcessState::Starting => "STARTING",
            ProcessState::Running => "RUNNING",
            ProcessState::Backoff => "BACKOFF",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Exited => "EXITED",
            ProcessState::Fatal => "FATAL",
            ProcessState::Unknown => "UNKNOWN",
        }
    }

    /// Whether the process has a live pid (STARTING, RUNNING or STOPPING, as
    /// supervisorctl counts them).
    pub fn is_running(self) -> bool {
        matches!(
            self,
            ProcessState::Starting | ProcessState::Running | ProcessState::Stopping
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of the supervisord daemon itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorState {
    Fatal,
    Running,
    Restarting,
    Shutdown,
}

impl SupervisorState {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            2 => SupervisorState::Fatal,
            1 => SupervisorState::Running,
            0 => SupervisorState::Restarting,
            -1 => SupervisorState::Shutdown,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            SupervisorState::Fatal => 2,
            SupervisorState::Running => 1,
            SupervisorState::Restarting => 0,
            SupervisorState::Shutdown => -1,
        }
    }
}

/// Result of `supervisor.getState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStateInfo {
    pub state: SupervisorState,
    pub statename: String,
}

impl TryFrom<&Value> for SupervisorStateInfo {
    type Error = SupervisorError;

    fn try_from(value: &Value) -> Result<Self> {
        let code = int_field(value, "statecode")?;
        let state = SupervisorState::from_code(code)
            .ok_or_else(|| SupervisorError::Encoding(format!("unknown supervisor state {}", code)))?;

        Ok(Self {
            state,
            statename: str_field(value, "statename")?,
        })
    }
}

/// One entry of `supervisor.getAllProcessInfo`, or the result of
/// `supervisor.getProcessInfo`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub name: String,
    pub group: String,
    pub description: String,
    /// UNIX timestamps; 0 when the event has not happened.
    pub start: i64,
    pub stop: i64,
    pub now: i64,
    pub state: ProcessState,
    pub statename: String,
    pub spawnerr: String,
    pub exitstatus: i64,
    pub stdout_logfile: String,
    pub stderr_logfile: String,
    /// 0 when not running.
    pub pid: i64,
}

impl ProcessInfo {
    /// `group:name`, the form the supervisor accepts for process names.
    pub fn full_name(&self) -> String {
        if self.group == self.name {
            self.name.clone()
        } else {
            format!("{}:{}", self.group, self.name)
        }
    }
}

impl TryFrom<&Value> for ProcessInfo {
    type Error = SupervisorError;

    fn try_from(value: &Value) -> Result<Self> {
        let code = int_field(value, "state")?;
        let state = ProcessState::from_code(code)
            .ok_or_else(|| SupervisorError::Encoding(format!("unknown process state {}", code)))?;

        // Older daemons only send `logfile`.
        let stdout_logfile = match value.get("stdout_logfile") {
            Some(_) => str_field(value, "stdout_logfile")?,
            None => optional_str_field(value, "logfile")?,
        };

        Ok(Self {
            name: str_field(value, "name")?,
            group: str_field(value, "group")?,
            description: optional_str_field(value, "description")?,
            start: optional_int_field(value, "start")?,
            stop: optional_int_field(value, "stop")?,
            now: optional_int_field(value, "now")?,
            state,
            statename: optional_str_field(value, "statename")?,
            spawnerr: optional_str_field(value, "spawnerr")?,
            exitstatus: optional_int_field(value, "exitstatus")?,
            stdout_logfile,
            stderr_logfile: optional_str_field(value, "stderr_logfile")?,
            pid: optional_int_field(value, "pid")?,
        })
    }
}

/// Result of `tailProcessStdoutLog` / `tailProcessStderrLog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogTail {
    pub bytes: String,
    /// Offset to pass to the next tail call.
    pub offset: i64,
    /// More than `length` bytes were written since the requested offset.
    pub overflow: bool,
}

impl TryFrom<&Value> for LogTail {
    type Error = SupervisorError;

    fn try_from(value: &Value) -> Result<Self> {
        match value.as_array() {
            Some([bytes, offset, overflow]) => Ok(Self {
                bytes: bytes
                    .as_str()
                    .ok_or_else(|| type_error("log tail bytes", "string", bytes))?
                    .to_string(),
                offset: offset
                    .as_i64()
                    .ok_or_else(|| type_error("log tail offset", "int", offset))?,
                overflow: overflow
                    .as_bool()
                    .ok_or_else(|| type_error("log tail overflow", "boolean", overflow))?,
            }),
            _ => Err(SupervisorError::Encoding(format!(
                "expected [bytes, offset, overflow], got {}",
                value.type_name()
            ))),
        }
    }
}

/// Message level accepted by `twiddler.log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Critical,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    Blather,
}

impl LogLevel {
    /// The supervisor's four-letter level name.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Critical => "CRIT",
            LogLevel::Error => "ERRO",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBG",
            LogLevel::Trace => "TRAC",
            LogLevel::Blather => "BLAT",
        }
    }
}

/// Typed wrappers over the named operations.
impl SupervisorClient {
    pub async fn process_info(&self, name: &str) -> Result<ProcessInfo> {
        ProcessInfo::try_from(&self.get_process_info(name).await?)
    }

    pub async fn all_process_info(&self) -> Result<Vec<ProcessInfo>> {
        let value = self.get_all_process_info().await?;
        value
            .as_array()
            .ok_or_else(|| type_error("getAllProcessInfo result", "array", &value))?
            .iter()
            .map(ProcessInfo::try_from)
            .collect()
    }

    pub async fn state_info(&self) -> Result<SupervisorStateInfo> {
        SupervisorStateInfo::try_from(&self.get_state().await?)
    }

    pub async fn tail_stdout(&self, name: &str, offset: i64, length: i64) -> Result<LogTail> {
        LogTail::try_from(&self.tail_process_stdout_log(name, offset, length).await?)
    }

    pub async fn tail_stderr(&self, name: &str, offset: i64, length: i64) -> Result<LogTail> {
        LogTail::try_from(&self.tail_process_stderr_log(name, offset, length).await?)
    }
}

fn type_error(what: &str, expected: &str, got: &Value) -> SupervisorError {
    SupervisorError::Encoding(format!("{} should be {}, got {}", what, expected, got.type_name()))
}

fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| SupervisorError::Encoding(format!("missing member '{}'", key)))
}

fn str_field(value: &Value, key: &str) -> Result<String> {
    let member = field(value, key)?;
    member
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| type_error(key, "string", member))
}

fn int_field(value: &Value, key: &str) -> Result<i64> {
    let member = field(value, key)?;
    member.as_i64().ok_or_else(|| type_error(key, "int", member))
}

fn optional_str_field(value: &Value, key: &str) -> Result<String> {
    match value.get(key) {
        Some(_) => str_field(value, key),
        None => Ok(String::new()),
    }
}

fn optional_int_field(value: &Value, key: &str) -> Result<i64> {
    match value.get(key) {
        Some(_) => int_field(value, key),
        None => Ok(0),
    }
}
