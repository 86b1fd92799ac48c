//! In-memory event store - the ring buffer plus a per-trace index
//!
//! The ring bounds memory and answers "the last N events"; the index groups
//! events by `trace_id` for operational tooling. The index is append-only
//! for the lifetime of the session: ring eviction does not prune it. That
//! asymmetry is deliberate for a latest-N-events tool.

use crate::events::AriadneEvent;
use crate::ring::RingBuffer;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything known about one trace id
#[derive(Debug, Clone, Default)]
pub struct TraceEntry {
    /// The trace envelope, if a producer emitted one.
    /// A re-emitted envelope replaces the old one.
    pub trace: Option<Arc<AriadneEvent>>,

    /// Spans in arrival order
    pub spans: Vec<Arc<AriadneEvent>>,
}

/// Bounded event store with a secondary trace index
#[derive(Debug)]
pub struct EventStore {
    ring: RingBuffer<Arc<AriadneEvent>>,
    traces: HashMap<String, TraceEntry>,
}

impl EventStore {
    /// Create a store holding at most `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            traces: HashMap::new(),
        }
    }

    /// Append an event to the ring and index it under its trace id
    pub fn append(&mut self, event: Arc<AriadneEvent>) {
        self.ring.append(event.clone());

        let entry = self
            .traces
            .entry(event.trace_id().to_string())
            .or_default();

        match event.as_ref() {
            AriadneEvent::Trace(_) => entry.trace = Some(event),
            AriadneEvent::Span(_) => entry.spans.push(event),
        }
    }

    /// Snapshot of the buffered events in arrival order
    pub fn snapshot(&self) -> Vec<Arc<AriadneEvent>> {
        self.ring.snapshot()
    }

    /// Everything indexed for one trace id
    pub fn trace(&self, trace_id: &str) -> Option<&TraceEntry> {
        self.traces.get(trace_id)
    }

    /// Number of distinct trace ids seen this session
    pub fn trace_count(&self) -> usize {
        self.traces.len()
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Ring capacity
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Drop the buffer and the index
    pub fn clear(&mut self) {
        self.ring.clear();
        self.traces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trace(trace_id: &str, name: &str) -> Arc<AriadneEvent> {
        Arc::new(
            serde_json::from_value(json!({"type": "trace", "trace_id": trace_id, "name": name}))
                .unwrap(),
        )
    }

    fn span(trace_id: &str, span_id: &str) -> Arc<AriadneEvent> {
        Arc::new(
            serde_json::from_value(json!({"type": "span", "trace_id": trace_id, "span_id": span_id}))
                .unwrap(),
        )
    }

    #[test]
    fn test_append_ends_with_event() {
        let mut store = EventStore::new(10);
        let e = span("t1", "s1");
        store.append(e.clone());
        let all = store.snapshot();
        assert_eq!(all.len(), 1);
        assert_eq!(all.last().unwrap().as_span().unwrap().span_id, "s1");
    }

    #[test]
    fn test_spans_indexed_under_trace() {
        let mut store = EventStore::new(10);
        store.append(trace("t1", "first"));
        store.append(span("t1", "s1"));
        store.append(span("t1", "s2"));
        store.append(span("t2", "s3"));

        let entry = store.trace("t1").unwrap();
        assert!(entry.trace.is_some());
        assert_eq!(entry.spans.len(), 2);
        assert_eq!(store.trace_count(), 2);

        // t2 has spans but no envelope
        let orphan = store.trace("t2").unwrap();
        assert!(orphan.trace.is_none());
        assert_eq!(orphan.spans.len(), 1);
    }

    #[test]
    fn test_reemitted_envelope_replaces() {
        let mut store = EventStore::new(10);
        store.append(trace("t1", "first"));
        store.append(trace("t1", "second"));

        let entry = store.trace("t1").unwrap();
        match entry.trace.as_deref().unwrap() {
            AriadneEvent::Trace(t) => assert_eq!(t.name.as_deref(), Some("second")),
            AriadneEvent::Span(_) => panic!("expected trace envelope"),
        }
        // both appends still count against the ring
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_index_survives_ring_eviction() {
        let mut store = EventStore::new(2);
        store.append(span("t1", "s1"));
        store.append(span("t1", "s2"));
        store.append(span("t1", "s3"));

        assert_eq!(store.len(), 2);
        // index is append-only: evicted s1 is still there
        assert_eq!(store.trace("t1").unwrap().spans.len(), 3);
    }

    #[test]
    fn test_clear_truncates_both() {
        let mut store = EventStore::new(4);
        store.append(trace("t1", "x"));
        store.append(span("t1", "s1"));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.trace_count(), 0);
        assert_eq!(store.capacity(), 4);
    }
}
