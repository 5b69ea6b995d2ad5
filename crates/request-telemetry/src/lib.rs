#![warn(missing_docs)]
//! # Request Telemetry
//!
//! Per-request structured telemetry for web services, with sensitive-field
//! masking applied before anything is written.
//!
//! ## Overview
//!
//! - **Three emission tiers**: ad-hoc events, a detailed trace per request
//!   and one terminal summary per request
//! - **Request-scoped masking**: rules installed by a handler only apply to
//!   its own request; `password`, `email`, `mobileNo` and `phone` are always
//!   masked
//! - **Exactly-once finishing**: a guard writes the summary on every exit
//!   path, including early returns, panics and cancelled futures
//! - **Pluggable sinks**: `tracing`, any `io::Write`, or memory for tests
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Routing layer                         │
//! │   RequestSnapshot ──► RequestScope ◄── ResponseSnapshot      │
//! └─────────────────────────────┬────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      RequestTelemetry                        │
//! │  ┌─────────────────────┐        ┌─────────────────────────┐  │
//! │  │ DetailRecorder      │        │ SummaryRecorder         │  │
//! │  │  RequestContext     │──data─►│  clock, snapshot        │  │
//! │  └──────────┬──────────┘        └────────────┬────────────┘  │
//! │             │ masked with the request's MaskRegistry         │
//! └─────────────┼────────────────────────────────┼───────────────┘
//!               ▼                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  EventEmitter ── built-in masking ── JSON line ──► EventSink │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use request_telemetry::{
//!     EventEmitter, MemorySink, RequestScope, RequestSnapshot, RequestTelemetry,
//!     ResponseSnapshot, TelemetryConfig,
//! };
//! use serde_json::json;
//!
//! let sink = MemorySink::new();
//! let emitter = EventEmitter::new(&TelemetryConfig::default(), sink.clone());
//!
//! let request = RequestSnapshot::new("POST", "/api/login")
//!     .with_header("x-transaction-id", "tx-42")
//!     .with_body(json!({"username": "somchai", "password": "hunter2"}));
//! let telemetry = RequestTelemetry::new(RequestScope::new(request), &emitter);
//!
//! let detail = telemetry.detail();
//! detail.set_sensitive_masking(["username"])?;
//! detail.add_response_success("login.rs", "login", "20000", &json!({"token": "abc"}))?;
//!
//! telemetry.record_response(ResponseSnapshot::new(200));
//! telemetry.complete();
//!
//! let summary = &sink.events_of_type("summary")[0];
//! assert_eq!(summary["session"]["id"], "tx-42");
//! assert_eq!(summary["request"]["body"]["username"], "****");
//! assert_eq!(summary["request"]["body"]["password"], "********");
//! assert_eq!(summary["response"]["data"]["token"], "abc");
//! # Ok::<(), request_telemetry::TelemetryError>(())
//! ```
//!
//! ## Async handlers
//!
//! ```rust
//! use request_telemetry::{
//!     EventEmitter, MemorySink, RequestSnapshot, RequestTelemetry, TelemetryConfig,
//! };
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), request_telemetry::TelemetryError> {
//! let emitter = EventEmitter::new(&TelemetryConfig::default(), MemorySink::new());
//! let telemetry = RequestTelemetry::from_request(RequestSnapshot::new("GET", "/todo"), &emitter);
//!
//! telemetry
//!     .instrument(|detail, summary| async move {
//!         detail.add_detail("todo.rs", "list", &json!({"count": 0}))?;
//!         summary.add_success_block("todo.rs", "list", "20000", "success")?;
//!         Ok::<_, request_telemetry::TelemetryError>(())
//!     })
//!     .await
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod detail;
pub mod emitter;
mod error;
mod error_info;
pub mod guard;
pub mod lifecycle;
pub mod masking;
pub mod redaction;
pub mod sink;
pub mod snapshot;
pub mod summary;
pub mod types;

#[cfg(test)]
mod tests;

// Public API
pub use config::TelemetryConfig;
pub use context::{RequestContext, RequestScope, RequestSection, ResponseSection};
pub use detail::DetailRecorder;
pub use emitter::EventEmitter;
pub use error::{TelemetryError, TelemetryResult};
pub use error_info::ErrorInfo;
pub use guard::RequestTelemetry;
pub use lifecycle::RecorderState;
pub use masking::{MaskAction, MaskRegistry, MaskRule};
pub use redaction::{Redactor, redact_value};
pub use sink::{EventSink, MemorySink, TracingSink, WriterSink};
pub use snapshot::{RequestSnapshot, ResponseSnapshot};
pub use summary::SummaryRecorder;
pub use types::{EventKind, LogEvent, LogLevel, ServiceInfo, SessionId, SessionInfo};

/// Prelude for convenient imports
///
/// ```rust
/// use request_telemetry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DetailRecorder, ErrorInfo, EventEmitter, EventSink, LogLevel, MaskRule, MemorySink,
        RequestScope, RequestSnapshot, RequestTelemetry, ResponseSnapshot, SessionId,
        SummaryRecorder, TelemetryConfig, TelemetryError, TelemetryResult, TracingSink,
        WriterSink,
    };
}
