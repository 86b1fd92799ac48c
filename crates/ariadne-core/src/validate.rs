//! Structural validation of parsed events
//!
//! Runs against the already-truncated JSON value and reports every violation
//! as a `{path, message}` pair. A batch reports the union of issues across
//! all of its events; the ingest path stores nothing unless the set is empty.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::{Map, Value};

/// A single validation failure, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Field path, e.g. `trace_id` or `batch[2].ended_at`
    pub path: String,

    /// Why the field was rejected
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate one event value. `prefix` is empty for a bare event and
/// `batch[i]` for a batch element; it is prepended to every issue path.
pub fn validate_event(event: &Value, prefix: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(obj) = event.as_object() else {
        let path = if prefix.is_empty() { "body" } else { prefix };
        issues.push(ValidationIssue::new(path, "event must be a JSON object"));
        return issues;
    };

    let event_type = match obj.get("type") {
        None => {
            issues.push(ValidationIssue::new(
                field_path(prefix, "type"),
                "missing event type",
            ));
            return issues;
        }
        Some(Value::String(s)) => s.as_str(),
        Some(_) => {
            issues.push(ValidationIssue::new(
                field_path(prefix, "type"),
                "type must be a string",
            ));
            return issues;
        }
    };

    match event_type {
        "trace" => validate_trace(obj, prefix, &mut issues),
        "span" => validate_span(obj, prefix, &mut issues),
        other => issues.push(ValidationIssue::new(
            field_path(prefix, "type"),
            format!("unknown event type \"{other}\""),
        )),
    }

    issues
}

fn validate_trace(obj: &Map<String, Value>, prefix: &str, issues: &mut Vec<ValidationIssue>) {
    require_id(obj, "trace_id", prefix, issues);
    optional_string(obj, "name", prefix, issues);
    optional_string(obj, "group_id", prefix, issues);
    check_timestamp_pair(obj, prefix, issues);

    match obj.get("metadata") {
        None => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                if !value.is_string() {
                    issues.push(ValidationIssue::new(
                        field_path(prefix, &format!("metadata.{key}")),
                        "metadata values must be strings",
                    ));
                }
            }
        }
        Some(_) => issues.push(ValidationIssue::new(
            field_path(prefix, "metadata"),
            "metadata must be an object",
        )),
    }
}

fn validate_span(obj: &Map<String, Value>, prefix: &str, issues: &mut Vec<ValidationIssue>) {
    require_id(obj, "trace_id", prefix, issues);
    require_id(obj, "span_id", prefix, issues);
    optional_string(obj, "parent_id", prefix, issues);
    optional_string(obj, "kind", prefix, issues);
    optional_string(obj, "name", prefix, issues);
    check_timestamp_pair(obj, prefix, issues);

    if let Some(data) = obj.get("data") {
        if !data.is_object() {
            issues.push(ValidationIssue::new(
                field_path(prefix, "data"),
                "data must be an object",
            ));
        }
    }

    match obj.get("status") {
        None => {}
        Some(Value::String(s)) if s == "ok" || s == "error" => {}
        Some(_) => issues.push(ValidationIssue::new(
            field_path(prefix, "status"),
            r#"status must be "ok" or "error""#,
        )),
    }
}

fn require_id(
    obj: &Map<String, Value>,
    field: &str,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    match obj.get(field) {
        None => issues.push(ValidationIssue::new(
            field_path(prefix, field),
            format!("{field} is required"),
        )),
        Some(Value::String(s)) if s.is_empty() => issues.push(ValidationIssue::new(
            field_path(prefix, field),
            format!("{field} must be non-empty"),
        )),
        Some(Value::String(_)) => {}
        Some(_) => issues.push(ValidationIssue::new(
            field_path(prefix, field),
            format!("{field} must be a string"),
        )),
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &str,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if let Some(value) = obj.get(field) {
        if !value.is_string() {
            issues.push(ValidationIssue::new(
                field_path(prefix, field),
                format!("{field} must be a string"),
            ));
        }
    }
}

fn check_timestamp_pair(
    obj: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let started = check_timestamp(obj, "started_at", prefix, issues);
    let ended = check_timestamp(obj, "ended_at", prefix, issues);

    if let (Some(started), Some(ended)) = (started, ended) {
        if ended < started {
            issues.push(ValidationIssue::new(
                field_path(prefix, "ended_at"),
                "ended_at must be >= started_at",
            ));
        }
    }
}

fn check_timestamp(
    obj: &Map<String, Value>,
    field: &str,
    prefix: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<DateTime<FixedOffset>> {
    match obj.get(field) {
        None => None,
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(ts) => Some(ts),
            Err(_) => {
                issues.push(ValidationIssue::new(
                    field_path(prefix, field),
                    format!("{field} must be an RFC 3339 timestamp"),
                ));
                None
            }
        },
        Some(_) => {
            issues.push(ValidationIssue::new(
                field_path(prefix, field),
                format!("{field} must be an RFC 3339 timestamp"),
            ));
            None
        }
    }
}

fn field_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_trace() {
        let event = json!({
            "type": "trace",
            "trace_id": "t1",
            "name": "demo",
            "started_at": "2025-01-01T00:00:00Z",
            "ended_at": "2025-01-01T00:00:01Z"
        });
        assert!(validate_event(&event, "").is_empty());
    }

    #[test]
    fn test_valid_span_minimal() {
        let event = json!({"type": "span", "trace_id": "t1", "span_id": "s1"});
        assert!(validate_event(&event, "").is_empty());
    }

    #[test]
    fn test_missing_type() {
        let issues = validate_event(&json!({"trace_id": "t"}), "");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "type");
        assert_eq!(issues[0].message, "missing event type");
    }

    #[test]
    fn test_unknown_type() {
        let issues = validate_event(&json!({"type": "metric", "trace_id": "t"}), "");
        assert_eq!(issues[0].message, "unknown event type \"metric\"");
    }

    #[test]
    fn test_empty_trace_id() {
        let issues = validate_event(&json!({"type": "trace", "trace_id": ""}), "");
        assert_eq!(issues[0].path, "trace_id");
        assert_eq!(issues[0].message, "trace_id must be non-empty");
    }

    #[test]
    fn test_missing_span_id() {
        let issues = validate_event(&json!({"type": "span", "trace_id": "t"}), "");
        assert_eq!(issues[0].path, "span_id");
        assert_eq!(issues[0].message, "span_id is required");
    }

    #[test]
    fn test_bad_timestamp() {
        let issues = validate_event(
            &json!({"type": "trace", "trace_id": "t", "started_at": "yesterday"}),
            "",
        );
        assert_eq!(issues[0].path, "started_at");
        assert_eq!(issues[0].message, "started_at must be an RFC 3339 timestamp");
    }

    #[test]
    fn test_date_only_timestamp_rejected() {
        let issues = validate_event(
            &json!({"type": "trace", "trace_id": "t", "started_at": "2025-01-01"}),
            "",
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_timestamp_ordering_violation() {
        let issues = validate_event(
            &json!({
                "type": "trace",
                "trace_id": "t3",
                "started_at": "2025-01-01T00:00:02Z",
                "ended_at": "2025-01-01T00:00:01Z"
            }),
            "",
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "ended_at");
        assert_eq!(issues[0].message, "ended_at must be >= started_at");
    }

    #[test]
    fn test_equal_timestamps_allowed() {
        let issues = validate_event(
            &json!({
                "type": "span",
                "trace_id": "t",
                "span_id": "s",
                "started_at": "2025-01-01T00:00:01Z",
                "ended_at": "2025-01-01T00:00:01Z"
            }),
            "",
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_ordering_across_offsets() {
        // 01:00+01:00 is the same instant as 00:00Z
        let issues = validate_event(
            &json!({
                "type": "span",
                "trace_id": "t",
                "span_id": "s",
                "started_at": "2025-01-01T01:00:00+01:00",
                "ended_at": "2025-01-01T00:00:00Z"
            }),
            "",
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_bad_status() {
        let issues = validate_event(
            &json!({"type": "span", "trace_id": "t", "span_id": "s", "status": "failed"}),
            "",
        );
        assert_eq!(issues[0].path, "status");
    }

    #[test]
    fn test_metadata_values_must_be_strings() {
        let issues = validate_event(
            &json!({"type": "trace", "trace_id": "t", "metadata": {"tokens": 42}}),
            "",
        );
        assert_eq!(issues[0].path, "metadata.tokens");
    }

    #[test]
    fn test_data_must_be_object() {
        let issues = validate_event(
            &json!({"type": "span", "trace_id": "t", "span_id": "s", "data": [1, 2]}),
            "",
        );
        assert_eq!(issues[0].path, "data");
    }

    #[test]
    fn test_unknown_fields_pass() {
        let issues = validate_event(
            &json!({"type": "span", "trace_id": "t", "span_id": "s", "timestamp": 99.5}),
            "",
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn test_batch_prefix_in_paths() {
        let issues = validate_event(&json!({"type": "span", "trace_id": "", "span_id": "s"}), "batch[1]");
        assert_eq!(issues[0].path, "batch[1].trace_id");
    }

    #[test]
    fn test_multiple_issues_reported_together() {
        let issues = validate_event(
            &json!({"type": "span", "trace_id": "", "span_id": "", "kind": 7}),
            "",
        );
        assert_eq!(issues.len(), 3);
    }
}
