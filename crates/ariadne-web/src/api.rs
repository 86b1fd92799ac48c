//! JSON endpoints - ingest, health, index

use crate::error::ApiError;
use crate::AppState;
use ariadne_core::events::AriadneEvent;
use ariadne_core::truncate::truncate_event;
use ariadne_core::validate::validate_event;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::header;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Ingest bodies above this many bytes are rejected unread
pub const MAX_BODY_BYTES: usize = 262_144;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub events: StoreStats,
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub count: usize,
    pub capacity: usize,
}

/// `POST /ingest` - accept one event or a batch
///
/// The whole payload is truncated and validated before anything is stored;
/// a single bad event rejects the request and no subscriber sees any of it.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<IngestResponse>, ApiError> {
    if let Some(length) = content_length(&request) {
        if length > MAX_BODY_BYTES {
            return Err(ApiError::PayloadTooLarge);
        }
    }

    let bytes = to_bytes(request.into_body(), MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::PayloadTooLarge)?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::validation("body", format!("invalid JSON: {e}")))?;

    let (items, batched) = extract_events(value)?;

    let mut prepared = Vec::with_capacity(items.len());
    let mut issues = Vec::new();
    for (i, mut item) in items.into_iter().enumerate() {
        truncate_event(&mut item);
        let prefix = if batched {
            format!("batch[{i}]")
        } else {
            String::new()
        };
        issues.extend(validate_event(&item, &prefix));
        prepared.push(item);
    }
    if !issues.is_empty() {
        return Err(ApiError::Validation(issues));
    }

    // Single ingest lane: holding the write lock across append + broadcast
    // keeps every subscriber's view in store order.
    let mut store = state.store.write().await;
    let mut count = 0;
    for item in prepared {
        let event: AriadneEvent =
            serde_json::from_value(item).map_err(|e| ApiError::Internal(e.to_string()))?;
        let event = Arc::new(event);
        store.append(event.clone());
        state.sse.broadcast(&event);
        count += 1;
    }
    drop(store);

    debug!(count, "ingested events");
    Ok(Json(IngestResponse {
        success: true,
        count,
    }))
}

/// `GET /healthz` - liveness plus current store size
pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.store.read().await;
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        events: StoreStats {
            count: store.len(),
            capacity: store.capacity(),
        },
    })
}

/// `GET /` - self-describing index
pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "ariadne",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /ingest": "submit a trace/span event or {\"batch\": [...]}",
            "GET /events": "live SSE stream; query: traceId, kinds, since",
            "GET /healthz": "liveness and store size",
        },
    }))
}

fn content_length(request: &Request) -> Option<usize> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Split the request body into individual event values.
///
/// A wrapper object batches under `batch`; the legacy producer key `events`
/// is accepted as an alias. Anything else is treated as a single event.
fn extract_events(value: Value) -> Result<(Vec<Value>, bool), ApiError> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        other => return Ok((vec![other], false)),
    };

    if !obj.contains_key("type") {
        if let Some(batch) = obj.remove("batch").or_else(|| obj.remove("events")) {
            return match batch {
                Value::Array(items) => Ok((items, true)),
                _ => Err(ApiError::validation("batch", "batch must be an array")),
            };
        }
    }

    Ok((vec![Value::Object(obj)], false))
}
