//! Human-readable rendering of command results.

use supervisor_client::{FaultCode, LogTail, ProcessInfo, Value};

/// Width of the name column, as supervisorctl pads it.
const NAME_WIDTH: usize = 33;

/// One line per process: `name  STATE  description`.
pub fn status_table(infos: &[ProcessInfo]) -> String {
    let width = infos
        .iter()
        .map(|info| info.full_name().len() + 1)
        .max()
        .unwrap_or(0)
        .max(NAME_WIDTH);

    infos
        .iter()
        .map(|info| {
            format!(
                "{:<width$}{:<10}{}",
                info.full_name(),
                info.state.name(),
                info.description,
                width = width
            )
            .trim_end()
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a result as compact JSON, the same shape `call` prints.
pub fn json(value: Value) -> String {
    serde_json::Value::from(value).to_string()
}

/// Prints one entry per line when the result is a list of strings, JSON
/// otherwise.
pub fn lines(value: Value) -> String {
    match value.as_array() {
        Some(items) if items.iter().all(|item| item.as_str().is_some()) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => json(value),
    }
}

/// Renders the per-process results of a group or `all` start/stop.
///
/// Each entry is `{name, group, status, description}`. Succeeded entries print
/// `name: verb`, failed ones `name: ERROR (description)`. Returns the rendered
/// lines and how many entries failed.
pub fn batch_results(results: &[Value], verb: &str) -> (String, usize) {
    let mut failed = 0;

    let lines = results
        .iter()
        .map(|entry| {
            let field = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default();
            let (name, group) = (field("name"), field("group"));
            let name = if group.is_empty() || group == name {
                name.to_string()
            } else {
                format!("{}:{}", group, name)
            };

            let status = entry.get("status").and_then(Value::as_i64);
            if status == Some(i64::from(FaultCode::Success.code())) {
                format!("{}: {}", name, verb)
            } else {
                failed += 1;
                format!("{}: ERROR ({})", name, field("description"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    (lines, failed)
}

pub fn tail(tail: &LogTail) -> String {
    if tail.overflow {
        format!("(output truncated)\n{}", tail.bytes)
    } else {
        tail.bytes.clone()
    }
}
