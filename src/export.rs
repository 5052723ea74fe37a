use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{AnalyticsError, Result};
use crate::models::FitnessReport;

/// Render a report as `path=value` lines for a downloadable text file.
///
/// Nested keys are joined with `.`, list elements use their index
/// (`recommendations.0`), absent values produce no line. Backslashes,
/// newlines and carriage returns inside values are escaped so every entry
/// stays on one line.
pub fn to_key_value_text(report: &FitnessReport) -> Result<String> {
    let value = serde_json::to_value(report)
        .map_err(|e| AnalyticsError::Internal(format!("report serialization failed: {e}")))?;

    let mut lines = Vec::new();
    flatten("", &value, &mut lines);

    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

/// Read text produced by `to_key_value_text` back into its key/value pairs
pub fn parse_key_value_text(text: &str) -> Result<BTreeMap<String, String>> {
    let mut entries = BTreeMap::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| {
            AnalyticsError::invalid_input(format!("line {}: missing '='", line_no + 1))
        })?;
        entries.insert(key.to_string(), unescape(value));
    }
    Ok(entries)
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(&join(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                flatten(&join(prefix, &idx.to_string()), child, out);
            }
        }
        Value::String(s) => out.push(format!("{prefix}={}", escape(s))),
        Value::Bool(b) => out.push(format!("{prefix}={b}")),
        Value::Number(n) => out.push(format!("{prefix}={n}")),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
