//! Web backend for Ariadne
//!
//! Glues the event store and the SSE manager behind three endpoints:
//! `POST /ingest`, `GET /events`, and `GET /healthz`. Both collaborators are
//! long-lived values constructed at startup and passed through the handler
//! context; there is no module-level state.

pub mod api;
pub mod error;
pub mod sse;

use ariadne_core::config::AriadneConfig;
use ariadne_core::store::EventStore;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use sse::SseManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    /// Bounded event store; the ingest lane is the only writer
    pub store: Arc<RwLock<EventStore>>,

    /// Live stream fan-out
    pub sse: Arc<SseManager>,
}

impl AppState {
    /// Construct the store and stream manager from configuration
    pub fn from_config(config: &AriadneConfig) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(RwLock::new(EventStore::new(config.store.max_events))),
            sse: Arc::new(SseManager::new(
                config.stream.queue_capacity,
                Duration::from_secs(config.stream.heartbeat_secs),
            )),
        })
    }
}

/// Build the service router with CORS for the configured origin
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origin_values(cors_origin)))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(api::index))
        .route("/ingest", post(api::ingest))
        .route("/events", get(sse::events))
        .route("/healthz", get(api::healthz))
        .layer(cors)
        .with_state(state)
}

/// The configured origin plus its `localhost`/`127.0.0.1` alias, so the
/// viewer works from either form of the same address without config churn.
fn origin_values(origin: &str) -> Vec<HeaderValue> {
    let mut origins = vec![origin.to_string()];
    if origin.contains("//localhost") {
        origins.push(origin.replacen("//localhost", "//127.0.0.1", 1));
    } else if origin.contains("//127.0.0.1") {
        origins.push(origin.replacen("//127.0.0.1", "//localhost", 1));
    }

    origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring unusable CORS origin {}: {}", o, e);
                None
            }
        })
        .collect()
}

/// Start the web server; returns when the listener shuts down
pub async fn start_server(config: &AriadneConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = build_router(state.clone(), &config.cors.origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let heartbeat = state.sse.clone().spawn_heartbeat();

    info!(
        "Ariadne listening on http://{} (capacity {}, origin {})",
        addr, config.store.max_events, config.cors.origin
    );

    let sse = state.sse.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            sse.shutdown();
        })
        .await?;

    heartbeat.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_values_alias_localhost() {
        let values = origin_values("http://localhost:5173");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "http://localhost:5173");
        assert_eq!(values[1], "http://127.0.0.1:5173");
    }

    #[test]
    fn test_origin_values_alias_loopback_ip() {
        let values = origin_values("http://127.0.0.1:8080");
        assert_eq!(values[1], "http://localhost:8080");
    }

    #[test]
    fn test_origin_values_no_alias_for_other_hosts() {
        let values = origin_values("https://viewer.example.com");
        assert_eq!(values.len(), 1);
    }
}
