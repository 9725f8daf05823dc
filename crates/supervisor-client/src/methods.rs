//! Named remote operations.
//!
//! Each method forwards one fixed `namespace.method` and argument shape to
//! [`SupervisorClient::call`] and returns the decoded result unchanged. See
//! the supervisord XML-RPC API reference for what each method returns.

use std::collections::BTreeMap;

use supervisor_common::protocol::error::Result;
use supervisor_common::{RpcRequest, Value, SUPERVISOR_NAMESPACE, SYSTEM_NAMESPACE, TWIDDLER_NAMESPACE};

use crate::client::SupervisorClient;
use crate::types::LogLevel;

/// `supervisor.*`: daemon status and process control.
impl SupervisorClient {
    pub async fn get_api_version(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getAPIVersion", ()).await
    }

    pub async fn get_supervisor_version(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getSupervisorVersion", ()).await
    }

    /// The `identifier` from the supervisord config, to tell instances apart.
    pub async fn get_identification(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getIdentification", ()).await
    }

    /// `{statecode, statename}` of the daemon itself.
    pub async fn get_state(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getState", ()).await
    }

    pub async fn get_pid(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getPID", ()).await
    }

    /// Reads `length` bytes of the main log starting at `offset`. A `length`
    /// of 0 reads to the end; a negative `offset` counts from the end.
    pub async fn read_log(&self, offset: i64, length: i64) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "readLog", (offset, length)).await
    }

    pub async fn clear_log(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "clearLog", ()).await
    }

    pub async fn shutdown(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "shutdown", ()).await
    }

    pub async fn restart(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "restart", ()).await
    }

    /// `[[added, changed, removed]]` group names after rereading the config.
    pub async fn reload_config(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "reloadConfig", ()).await
    }

    pub async fn get_all_config_info(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getAllConfigInfo", ()).await
    }

    /// Accepts `name` or `group:name`.
    pub async fn get_process_info(&self, name: &str) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getProcessInfo", name).await
    }

    pub async fn get_all_process_info(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "getAllProcessInfo", ()).await
    }

    pub async fn start_all_processes(&self, wait: bool) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "startAllProcesses", wait).await
    }

    /// With `wait`, the supervisor replies only once the process is RUNNING.
    pub async fn start_process(&self, name: &str, wait: bool) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "startProcess", (name, wait)).await
    }

    pub async fn start_process_group(&self, group: &str, wait: bool) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "startProcessGroup", (group, wait)).await
    }

    pub async fn stop_all_processes(&self, wait: bool) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "stopAllProcesses", wait).await
    }

    pub async fn stop_process(&self, name: &str, wait: bool) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "stopProcess", (name, wait)).await
    }

    pub async fn stop_process_group(&self, group: &str, wait: bool) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "stopProcessGroup", (group, wait)).await
    }

    pub async fn send_process_stdin(&self, name: &str, chars: &str) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "sendProcessStdin", (name, chars)).await
    }

    pub async fn send_remote_comm_event(&self, event_type: &str, data: &str) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "sendRemoteCommEvent", (event_type, data)).await
    }

    /// Activates a group that was added to the config by `reload_config`.
    pub async fn add_process_group(&self, name: &str) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "addProcessGroup", name).await
    }

    pub async fn remove_process_group(&self, name: &str) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "removeProcessGroup", name).await
    }

    pub async fn read_process_stdout_log(&self, name: &str, offset: i64, length: i64) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "readProcessStdoutLog", (name, offset, length))
            .await
    }

    pub async fn read_process_stderr_log(&self, name: &str, offset: i64, length: i64) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "readProcessStderrLog", (name, offset, length))
            .await
    }

    /// `[bytes, offset, overflow]`; see [`LogTail`](crate::types::LogTail).
    pub async fn tail_process_stdout_log(&self, name: &str, offset: i64, length: i64) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "tailProcessStdoutLog", (name, offset, length))
            .await
    }

    pub async fn tail_process_stderr_log(&self, name: &str, offset: i64, length: i64) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "tailProcessStderrLog", (name, offset, length))
            .await
    }

    pub async fn clear_process_logs(&self, name: &str) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "clearProcessLogs", name).await
    }

    pub async fn clear_all_process_logs(&self) -> Result<Value> {
        self.call(SUPERVISOR_NAMESPACE, "clearAllProcessLogs", ()).await
    }
}

/// `system.*`: introspection.
impl SupervisorClient {
    pub async fn list_methods(&self) -> Result<Value> {
        self.call(SYSTEM_NAMESPACE, "listMethods", ()).await
    }

    pub async fn method_help(&self, method_name: &str) -> Result<Value> {
        self.call(SYSTEM_NAMESPACE, "methodHelp", method_name).await
    }

    pub async fn method_signature(&self, method_name: &str) -> Result<Value> {
        self.call(SYSTEM_NAMESPACE, "methodSignature", method_name).await
    }

    /// Runs several calls in one round trip.
    ///
    /// The calls travel as a single array of `{methodName, params}` structs.
    /// The result holds one entry per call: a one-element array on success or
    /// a fault struct on failure. Faults inside the batch are not raised as
    /// errors.
    pub async fn multicall(&self, calls: &[RpcRequest]) -> Result<Value> {
        let batch: Vec<Value> = calls
            .iter()
            .map(|request| {
                Value::structure([
                    ("methodName", Value::String(request.method_name())),
                    ("params", Value::Array(request.params.clone())),
                ])
            })
            .collect();

        self.call(SYSTEM_NAMESPACE, "multicall", vec![Value::Array(batch)])
            .await
    }

    /// Whether the server exposes `{namespace}.getAPIVersion`.
    pub async fn has_extension(&self, namespace: &str) -> Result<bool> {
        let probe = format!("{}.getAPIVersion", namespace);
        let methods = self.list_methods().await?;

        Ok(methods
            .as_array()
            .map(|names| names.iter().any(|name| name.as_str() == Some(probe.as_str())))
            .unwrap_or(false))
    }
}

/// `twiddler.*`: the optional supervisor_twiddler extension.
///
/// Check [`SupervisorClient::is_twiddler_available`] first; on servers
/// without the extension these fail with an `UNKNOWN_METHOD` fault.
impl SupervisorClient {
    pub async fn is_twiddler_available(&self) -> Result<bool> {
        self.has_extension(TWIDDLER_NAMESPACE).await
    }

    pub async fn get_twiddler_api_version(&self) -> Result<Value> {
        self.call(TWIDDLER_NAMESPACE, "getAPIVersion", ()).await
    }

    pub async fn get_group_names(&self) -> Result<Value> {
        self.call(TWIDDLER_NAMESPACE, "getGroupNames", ()).await
    }

    /// Adds `program` to an existing `group`, configured by `options`
    /// (the keys of a `[program:x]` section, e.g. `command`).
    pub async fn add_program_to_group(
        &self,
        group: &str,
        program: &str,
        options: BTreeMap<String, Value>,
    ) -> Result<Value> {
        self.call(
            TWIDDLER_NAMESPACE,
            "addProgramToGroup",
            (group, program, Value::Struct(options)),
        )
        .await
    }

    pub async fn remove_process_from_group(&self, group: &str, name: &str) -> Result<Value> {
        self.call(TWIDDLER_NAMESPACE, "removeProcessFromGroup", (group, name))
            .await
    }

    /// Writes `message` to the supervisord main log.
    pub async fn log_message(&self, message: &str, level: LogLevel) -> Result<Value> {
        self.call(TWIDDLER_NAMESPACE, "log", (message, level.as_str()))
            .await
    }
}
