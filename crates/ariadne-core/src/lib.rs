//! Ariadne Core - Event model, validation, and bounded in-memory storage
//!
//! This crate provides the foundational pieces of the Ariadne trace backend:
//!
//! - **Events**: the `trace`/`span` wire types shared with producers and viewers
//! - **Validate**: structural validation with field-path error reporting
//! - **Truncate**: size caps applied to event payloads before validation
//! - **Ring**: fixed-capacity event buffer with silent eviction
//! - **Store**: ring buffer plus a per-trace secondary index
//! - **Config**: configuration loading and management

pub mod config;
pub mod events;
pub mod ring;
pub mod store;
pub mod truncate;
pub mod validate;

// Re-export commonly used types
pub use config::{
    AriadneConfig, ConfigError, ConfigLoader, ConfigResult, CorsSettings, ServerSettings,
    StoreSettings, StreamSettings,
};
pub use events::{AriadneEvent, SpanEvent, SpanStatus, TraceEvent};
pub use ring::RingBuffer;
pub use store::{EventStore, TraceEntry};
pub use truncate::{truncate_event, DATA_STRING_CAP, NAME_CAP, TRUNCATION_SUFFIX};
pub use validate::{validate_event, ValidationIssue};
