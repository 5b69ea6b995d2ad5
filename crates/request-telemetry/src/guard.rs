//! Scoped ownership of a request's recorders.
//!
//! A [`RequestTelemetry`] owns one detail and one summary recorder. Whatever
//! way the request ends, dropping the guard finishes whichever recorder has
//! not written its final record yet:
//!
//! - [`complete`](RequestTelemetry::complete) finishes normally
//! - an early `?` return, a panic unwinding through the handler, or a
//!   cancelled future drops the guard without `complete`, and the summary is
//!   written with `aborted: true`
//!
//! # Example
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
//! let telemetry = RequestTelemetry::new(RequestScope::new(RequestSnapshot::new("GET", "/todo")), &emitter);
//! telemetry
//!     .detail()
//!     .add_response_success("handler.rs", "list", "20000", &json!([]))?;
//! telemetry.record_response(ResponseSnapshot::new(200));
//! telemetry.complete();
//!
//! assert_eq!(sink.events_of_type("summary").len(), 1);
//! # Ok::<(), request_telemetry::TelemetryError>(())
//! ```

use std::future::Future;

use crate::context::RequestScope;
use crate::detail::DetailRecorder;
use crate::emitter::EventEmitter;
use crate::snapshot::{RequestSnapshot, ResponseSnapshot};
use crate::summary::SummaryRecorder;

/// Guard finishing a request's recorders when it goes out of scope.
#[derive(Debug)]
pub struct RequestTelemetry {
    scope: RequestScope,
    detail: DetailRecorder,
    summary: SummaryRecorder,
    completed: bool,
}

impl RequestTelemetry {
    /// Creates both recorders for the request behind `scope`.
    pub fn new(scope: RequestScope, emitter: &EventEmitter) -> Self {
        let detail = DetailRecorder::new(&scope, emitter);
        let summary = SummaryRecorder::new(&scope, emitter);
        tracing::trace!(session = %scope.session(), "Request telemetry started");
        Self {
            scope,
            detail,
            summary,
            completed: false,
        }
    }

    /// Creates a scope with default settings for `request`, then the guard.
    pub fn from_request(request: RequestSnapshot, emitter: &EventEmitter) -> Self {
        Self::new(RequestScope::new(request), emitter)
    }

    /// The request scope.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// The detail recorder.
    pub fn detail(&self) -> &DetailRecorder {
        &self.detail
    }

    /// The summary recorder.
    pub fn summary(&self) -> &SummaryRecorder {
        &self.summary
    }

    /// Records the final response status and headers.
    pub fn record_response(&self, response: ResponseSnapshot) {
        self.scope.record_response(response);
    }

    /// Finishes the request normally: ends the detail recorder and flushes
    /// the summary unless either was already done by hand.
    pub fn complete(mut self) {
        self.completed = true;
    }

    /// Runs `handler` with clones of both recorders and completes the
    /// request when it returns.
    ///
    /// If the returned future is dropped before `handler` finishes, or
    /// `handler` panics, the summary is written as aborted.
    pub async fn instrument<F, Fut, T>(self, handler: F) -> T
    where
        F: FnOnce(DetailRecorder, SummaryRecorder) -> Fut,
        Fut: Future<Output = T>,
    {
        let output = handler(self.detail.clone(), self.summary.clone()).await;
        self.complete();
        output
    }
}

impl Drop for RequestTelemetry {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(session = %self.scope.session(), "Request ended without completing");
        }
        self.detail.finish_pending();
        self.summary.finish_pending(!self.completed);
    }
}
