//! SSE connection manager - per-subscriber queues, filters, heartbeats
//!
//! Every viewer on `GET /events` becomes a subscription: a bounded queue of
//! pending frames plus an optional filter. Broadcast is synchronous and never
//! blocks ingest; a slow subscriber loses its oldest queued events and is
//! told so with a comment frame. The response handler owns the writer side:
//! a pull stream drains the queue into the HTTP body, and dropping the body
//! (client close or shutdown) deregisters the subscription.

use crate::error::ApiError;
use crate::AppState;
use ariadne_core::events::AriadneEvent;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use futures::Stream;
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Heartbeat comment frame, byte-for-byte
const HEARTBEAT_FRAME: &str = ": heartbeat\n\n";

/// Backpressure comment frame, byte-for-byte (log-scrapers match on it)
const BACKPRESSURE_FRAME: &str = ":warning stream backpressure; events skipped\n\n";

/// Per-subscriber filter; all present parts are conjunctive
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Exact `trace_id` match
    pub trace_id: Option<String>,

    /// Span kinds to accept; trace events pass through unchanged
    pub kinds: Option<HashSet<String>>,

    /// Minimum `started_at` for spans; spans without one pass through
    pub since: Option<DateTime<FixedOffset>>,
}

impl EventFilter {
    pub fn matches(&self, event: &AriadneEvent) -> bool {
        if let Some(want) = &self.trace_id {
            if event.trace_id() != want {
                return false;
            }
        }

        let Some(span) = event.as_span() else {
            // kinds and since restrict spans only
            return true;
        };

        if let Some(kinds) = &self.kinds {
            match &span.kind {
                Some(kind) if kinds.contains(kind) => {}
                _ => return false,
            }
        }

        if let Some(since) = self.since {
            if let Some(started) = span.started_at {
                if started < since {
                    return false;
                }
            }
        }

        true
    }
}

/// Frames pending delivery to one subscriber
#[derive(Debug)]
struct SubQueue {
    /// Control frames (the initial `connected` frame)
    controls: VecDeque<String>,

    /// Event frames in arrival order; never longer than the queue capacity
    events: VecDeque<String>,

    /// A drop happened since the last flush; coalesced into one comment
    warn_pending: bool,

    /// An idle heartbeat is due; coalesced
    heartbeat_pending: bool,

    closed: bool,
}

/// One live viewer connection
pub struct Subscription {
    id: u64,
    filter: EventFilter,
    queue: Mutex<SubQueue>,
    notify: Notify,
    last_emit: Mutex<Instant>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue an event frame, dropping the oldest when full
    fn push_event(&self, frame: String, capacity: usize) {
        let mut q = self.queue.lock().unwrap();
        if q.closed {
            return;
        }
        if q.events.len() >= capacity {
            q.events.pop_front();
            if !q.warn_pending {
                q.warn_pending = true;
                warn!(subscriber = self.id, "stream backpressure; dropping oldest queued event");
            }
        }
        q.events.push_back(frame);
        drop(q);
        self.notify.notify_one();
    }

    /// Flag an idle heartbeat
    fn push_heartbeat(&self) {
        let mut q = self.queue.lock().unwrap();
        if q.closed {
            return;
        }
        q.heartbeat_pending = true;
        drop(q);
        *self.last_emit.lock().unwrap() = Instant::now();
        self.notify.notify_one();
    }

    /// Next frame to write: controls, then the backpressure warning (it
    /// belongs before the events that survived the drop), then events,
    /// then an idle heartbeat.
    fn pop_next(&self) -> Option<String> {
        let mut q = self.queue.lock().unwrap();
        if let Some(frame) = q.controls.pop_front() {
            return Some(frame);
        }
        if q.warn_pending {
            q.warn_pending = false;
            return Some(BACKPRESSURE_FRAME.to_string());
        }
        if let Some(frame) = q.events.pop_front() {
            return Some(frame);
        }
        if q.heartbeat_pending {
            q.heartbeat_pending = false;
            return Some(HEARTBEAT_FRAME.to_string());
        }
        None
    }

    fn mark_emitted(&self) {
        *self.last_emit.lock().unwrap() = Instant::now();
    }

    fn is_closed(&self) -> bool {
        self.queue.lock().unwrap().closed
    }

    fn close(&self) {
        self.queue.lock().unwrap().closed = true;
        self.notify.notify_one();
    }
}

/// Registry of live subscriptions and the broadcast fan-out
pub struct SseManager {
    subscriptions: Mutex<HashMap<u64, Arc<Subscription>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
    heartbeat_interval: Duration,
}

impl SseManager {
    pub fn new(queue_capacity: usize, heartbeat_interval: Duration) -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity,
            heartbeat_interval,
        }
    }

    /// Register a new subscriber; the first frame it receives is the
    /// `connected` control frame.
    pub fn subscribe(&self, filter: EventFilter) -> Arc<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let connected = serde_json::json!({
            "type": "connected",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        let mut controls = VecDeque::with_capacity(1);
        controls.push_back(format!("data: {connected}\n\n"));

        let subscription = Arc::new(Subscription {
            id,
            filter,
            queue: Mutex::new(SubQueue {
                controls,
                events: VecDeque::new(),
                warn_pending: false,
                heartbeat_pending: false,
                closed: false,
            }),
            notify: Notify::new(),
            last_emit: Mutex::new(Instant::now()),
        });

        self.subscriptions
            .lock()
            .unwrap()
            .insert(id, subscription.clone());
        debug!(subscriber = id, "sse subscriber connected");

        subscription
    }

    /// Deregister a subscriber and release its queue
    pub fn remove(&self, id: u64) {
        if let Some(subscription) = self.subscriptions.lock().unwrap().remove(&id) {
            subscription.close();
            debug!(subscriber = id, "sse subscriber disconnected");
        }
    }

    /// Fan an event out to every matching subscriber. Never blocks: a full
    /// queue loses its oldest entry instead.
    pub fn broadcast(&self, event: &AriadneEvent) {
        let frame = match serde_json::to_string(event) {
            // compact JSON is single-line by construction; newlines inside
            // values arrive escaped
            Ok(json) => format!("data: {json}\n\n"),
            Err(e) => {
                error!("Failed to serialize event for broadcast: {}", e);
                return;
            }
        };

        // Snapshot the registry, then release it before per-subscriber work
        let targets: Vec<Arc<Subscription>> = {
            let subs = self.subscriptions.lock().unwrap();
            subs.values().cloned().collect()
        };

        for subscription in targets {
            if subscription.filter.matches(event) {
                subscription.push_event(frame.clone(), self.queue_capacity);
            }
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// Close every subscription and empty the registry
    pub fn shutdown(&self) {
        let drained: Vec<Arc<Subscription>> = {
            let mut subs = self.subscriptions.lock().unwrap();
            subs.drain().map(|(_, s)| s).collect()
        };
        for subscription in &drained {
            subscription.close();
        }
        if !drained.is_empty() {
            debug!("closed {} sse subscriptions on shutdown", drained.len());
        }
    }

    /// One heartbeat scan: flag every subscription idle for a full interval
    fn heartbeat_pass(&self) {
        let targets: Vec<Arc<Subscription>> = {
            let subs = self.subscriptions.lock().unwrap();
            subs.values().cloned().collect()
        };

        for subscription in targets {
            let idle = subscription.last_emit.lock().unwrap().elapsed();
            if idle >= self.heartbeat_interval {
                subscription.push_heartbeat();
            }
        }
    }

    /// Start the background heartbeat ticker
    pub fn spawn_heartbeat(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately; nothing is idle yet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.heartbeat_pass();
            }
        })
    }
}

/// Query parameters accepted on `GET /events`
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(rename = "traceId")]
    pub trace_id: Option<String>,

    /// Comma-separated span kinds
    pub kinds: Option<String>,

    /// RFC 3339 lower bound on span `started_at`
    pub since: Option<String>,
}

pub(crate) fn parse_filter(query: &EventsQuery) -> Result<EventFilter, ApiError> {
    let since = match query.since.as_deref() {
        Some(raw) => {
            Some(DateTime::parse_from_rfc3339(raw).map_err(|_| ApiError::InvalidSince)?)
        }
        None => None,
    };

    let kinds = query.kinds.as_deref().and_then(|raw| {
        let set: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        if set.is_empty() {
            None
        } else {
            Some(set)
        }
    });

    Ok(EventFilter {
        trace_id: query.trace_id.clone(),
        kinds,
        since,
    })
}

/// `GET /events` - subscribe to the live stream
pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    let filter = parse_filter(&query)?;
    let subscription = state.sse.subscribe(filter);
    let stream = frame_stream(state.sse.clone(), subscription);

    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Deregisters the subscription when the response body is dropped,
/// whether by client close, write failure, or server shutdown.
struct StreamGuard {
    manager: Arc<SseManager>,
    id: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.manager.remove(self.id);
    }
}

/// Pull stream that drains a subscription's queue into SSE frames
fn frame_stream(
    manager: Arc<SseManager>,
    subscription: Arc<Subscription>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let guard = StreamGuard {
        manager,
        id: subscription.id(),
    };

    futures::stream::unfold((subscription, guard), |(subscription, guard)| async move {
        loop {
            match subscription.pop_next() {
                Some(frame) => {
                    subscription.mark_emitted();
                    return Some((Ok(Bytes::from(frame)), (subscription, guard)));
                }
                None => {
                    if subscription.is_closed() {
                        return None;
                    }
                    subscription.notify.notified().await;
                }
            }
        }
    })
}
