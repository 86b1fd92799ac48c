//! Ariadne event types - the wire shape shared by producers and viewers
//!
//! Two event kinds share a common identity field (`trace_id`): a trace is a
//! workflow envelope, a span is one operation inside it. Events are immutable
//! once ingested; the store and the stream never modify them.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// All event types accepted on the ingest path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AriadneEvent {
    /// A workflow/session envelope
    Trace(TraceEvent),

    /// An operation within a trace
    Span(SpanEvent),
}

impl AriadneEvent {
    /// Get the event type string
    pub fn event_type(&self) -> &'static str {
        match self {
            AriadneEvent::Trace(_) => "trace",
            AriadneEvent::Span(_) => "span",
        }
    }

    /// Get the trace identity from any event
    pub fn trace_id(&self) -> &str {
        match self {
            AriadneEvent::Trace(e) => &e.trace_id,
            AriadneEvent::Span(e) => &e.trace_id,
        }
    }

    /// Get the span payload, if this is a span
    pub fn as_span(&self) -> Option<&SpanEvent> {
        match self {
            AriadneEvent::Trace(_) => None,
            AriadneEvent::Span(e) => Some(e),
        }
    }
}

/// A workflow/session envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Uniquely identifies a workflow instance
    pub trace_id: String,

    /// Display label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Logical grouping across traces (e.g., a conversation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    /// When the workflow started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<FixedOffset>>,

    /// When the workflow ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<FixedOffset>>,

    /// Trace-level metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// An operation within a trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanEvent {
    /// Ties the span to its trace
    pub trace_id: String,

    /// Identifies the span within the buffer's lifetime
    pub span_id: String,

    /// References another `span_id` in the same trace to form a tree.
    /// Advisory: the store does not check that it resolves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Free-form tag (e.g., "agent", "generation", "function", "custom")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Display label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the operation started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<FixedOffset>>,

    /// When the operation ended
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<FixedOffset>>,

    /// The span payload, carried through intact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,

    /// Outcome of the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpanStatus>,
}

/// Outcome of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_round_trip() {
        let raw = json!({
            "type": "trace",
            "trace_id": "t1",
            "name": "demo",
            "started_at": "2025-01-01T00:00:00Z",
            "ended_at": "2025-01-01T00:00:01Z",
            "metadata": {"model": "gpt"}
        });

        let event: AriadneEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type(), "trace");
        assert_eq!(event.trace_id(), "t1");
        assert!(event.as_span().is_none());

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["type"], "trace");
        assert_eq!(back["name"], "demo");
        // the instant survives the round trip
        let started = back["started_at"].as_str().unwrap();
        assert!(started.starts_with("2025-01-01T00:00:00"));
    }

    #[test]
    fn test_span_round_trip() {
        let raw = json!({
            "type": "span",
            "trace_id": "t1",
            "span_id": "s1",
            "parent_id": "s0",
            "kind": "generation",
            "status": "error",
            "data": {"output": "hello", "tokens": 12}
        });

        let event: AriadneEvent = serde_json::from_value(raw).unwrap();
        let span = event.as_span().unwrap();
        assert_eq!(span.span_id, "s1");
        assert_eq!(span.parent_id.as_deref(), Some("s0"));
        assert_eq!(span.status, Some(SpanStatus::Error));
        assert_eq!(span.data.as_ref().unwrap()["tokens"], json!(12));

        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["type"], "span");
        assert_eq!(back["status"], "error");
    }

    #[test]
    fn test_optional_fields_omitted_from_output() {
        let event: AriadneEvent =
            serde_json::from_value(json!({"type": "span", "trace_id": "t", "span_id": "s"}))
                .unwrap();
        let back = serde_json::to_value(&event).unwrap();
        let obj = back.as_object().unwrap();
        assert_eq!(obj.len(), 3); // type, trace_id, span_id
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let event: AriadneEvent = serde_json::from_value(json!({
            "type": "span",
            "trace_id": "t",
            "span_id": "s",
            "timestamp": 1234.5,
            "properties": {"a": 1}
        }))
        .unwrap();
        assert_eq!(event.trace_id(), "t");
    }
}
