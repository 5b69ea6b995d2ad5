//! Session-bound detailed trace of one request.
//!
//! A [`DetailRecorder`] accumulates labelled request and response data,
//! named details and a message, then writes them as one `detail` record on
//! [`end`](DetailRecorder::end), or as one `error` record on
//! [`add_response_error`](DetailRecorder::add_response_error). Either call
//! is terminal.
//!
//! # Example
//!
//! ```rust
//! use request_telemetry::{
//!     DetailRecorder, EventEmitter, MemorySink, RequestScope, RequestSnapshot, TelemetryConfig,
//! };
//! use serde_json::json;
//!
//! let sink = MemorySink::new();
//! let emitter = EventEmitter::new(&TelemetryConfig::default(), sink.clone());
//! let scope = RequestScope::new(RequestSnapshot::new("POST", "/todo"));
//!
//! let detail = DetailRecorder::new(&scope, &emitter);
//! detail
//!     .add_request_body("handler.rs", "todo", &json!({"title": "a"}))?
//!     .add_detail("handler.rs", "validate", &json!({"ok": true}))?;
//! detail.end()?;
//!
//! let record = &sink.events()[0];
//! assert_eq!(record["type"], "detail");
//! assert_eq!(record["request"]["body"]["todo"]["title"], "a");
//! # Ok::<(), request_telemetry::TelemetryError>(())
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

use crate::context::{RequestContext, RequestScope, RequestSection, ResponseSection, lock};
use crate::emitter::{EventEmitter, to_payload};
use crate::error::TelemetryResult;
use crate::error_info::ErrorInfo;
use crate::lifecycle::RecorderState;
use crate::masking::MaskRule;
use crate::types::{EventKind, LogEvent, LogLevel, SessionId};

const RECORDER: &str = "detail";

#[derive(Debug, Default)]
struct DetailInner {
    state: RecorderState,
    context: RequestContext,
}

/// Accumulates and emits the detailed trace of one request.
///
/// Cloning is cheap; clones share the same accumulator and state, and calls
/// from several clones take turns.
#[derive(Debug, Clone)]
pub struct DetailRecorder {
    scope: RequestScope,
    emitter: EventEmitter,
    inner: Arc<Mutex<DetailInner>>,
}

impl DetailRecorder {
    /// Binds a recorder to a request; its records carry the session id.
    pub fn new(scope: &RequestScope, emitter: &EventEmitter) -> Self {
        Self {
            scope: scope.clone(),
            emitter: emitter.child(scope.session().clone()),
            inner: Arc::new(Mutex::new(DetailInner::default())),
        }
    }

    /// The request's session id.
    pub fn session(&self) -> &SessionId {
        self.scope.session()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecorderState {
        lock(&self.inner).state
    }

    /// True once the final record has been written.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    fn accumulate<F>(&self, operation: &'static str, node: &str, f: F) -> TelemetryResult<&Self>
    where
        F: FnOnce(&mut RequestContext),
    {
        let mut inner = lock(&self.inner);
        inner
            .state
            .advance(RecorderState::Accumulating, RECORDER, operation)?;
        inner.context.set_node(node);
        f(&mut inner.context);
        Ok(self)
    }

    /// Records `details[cmd] = data`. Without data (`()` or `null`) the
    /// command is recorded as the message instead.
    pub fn add_detail<T>(&self, node: &str, cmd: &str, data: &T) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        let data = to_payload(data, cmd);
        self.accumulate("add_detail", node, |ctx| match data {
            Some(value) => ctx.add_detail(cmd, value),
            None => ctx.set_message(cmd),
        })
    }

    /// Records a bare message.
    pub fn add_message(&self, node: &str, message: &str) -> TelemetryResult<&Self> {
        self.accumulate("add_message", node, |ctx| ctx.set_message(message))
    }

    fn add_request<T>(
        &self,
        operation: &'static str,
        section: RequestSection,
        node: &str,
        label: &str,
        value: &T,
    ) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        let value = to_payload(value, label);
        self.accumulate(operation, node, |ctx| {
            if let Some(value) = value {
                ctx.merge_request(section, label, value);
            }
        })
    }

    fn add_response<T>(
        &self,
        operation: &'static str,
        section: ResponseSection,
        node: &str,
        label: &str,
        value: &T,
    ) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        let value = to_payload(value, label);
        self.accumulate(operation, node, |ctx| {
            if let Some(value) = value {
                ctx.merge_response(section, label, value);
            }
        })
    }

    /// Records `request.body.<label>`.
    pub fn add_request_body<T>(&self, node: &str, label: &str, body: &T) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        self.add_request("add_request_body", RequestSection::Body, node, label, body)
    }

    /// Records `request.query.<label>`.
    pub fn add_request_query<T>(&self, node: &str, label: &str, query: &T) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        self.add_request("add_request_query", RequestSection::Query, node, label, query)
    }

    /// Records `request.params.<label>`.
    pub fn add_request_params<T>(
        &self,
        node: &str,
        label: &str,
        params: &T,
    ) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        self.add_request("add_request_params", RequestSection::Params, node, label, params)
    }

    /// Records `request.headers.<label>`.
    pub fn add_request_headers<T>(
        &self,
        node: &str,
        label: &str,
        headers: &T,
    ) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        self.add_request("add_request_headers", RequestSection::Headers, node, label, headers)
    }

    /// Records `response.body.<label>`.
    pub fn add_response_body<T>(&self, node: &str, label: &str, body: &T) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        self.add_response("add_response_body", ResponseSection::Body, node, label, body)
    }

    /// Records `response.headers.<label>`.
    pub fn add_response_headers<T>(
        &self,
        node: &str,
        label: &str,
        headers: &T,
    ) -> TelemetryResult<&Self>
    where
        T: Serialize + ?Sized,
    {
        self.add_response("add_response_headers", ResponseSection::Headers, node, label, headers)
    }

    /// Records `response.message`.
    pub fn add_response_message(&self, node: &str, message: &str) -> TelemetryResult<&Self> {
        self.accumulate("add_response_message", node, |ctx| {
            ctx.set_response_field("message", Value::String(message.to_string()))
        })
    }

    /// Installs masking rules for this request. They apply to this
    /// recorder and to the request's summary recorder.
    pub fn set_sensitive_masking<I, R>(&self, rules: I) -> TelemetryResult<&Self>
    where
        I: IntoIterator<Item = R>,
        R: Into<MaskRule>,
    {
        {
            let mut inner = lock(&self.inner);
            inner.state.advance(
                RecorderState::Accumulating,
                RECORDER,
                "set_sensitive_masking",
            )?;
        }
        self.scope.set_masking_rules(rules);
        Ok(self)
    }

    /// Marks the request successful, hands `data` to the summary record and
    /// ends the recorder.
    pub fn add_response_success<T>(
        &self,
        node: &str,
        cmd: &str,
        result_code: &str,
        data: &T,
    ) -> TelemetryResult<()>
    where
        T: Serialize + ?Sized,
    {
        let data = to_payload(data, "data");
        let event = {
            let mut inner = lock(&self.inner);
            inner
                .state
                .advance(RecorderState::Emitted, RECORDER, "add_response_success")?;

            let mut context = inner.context.take();
            context.set_node(node);
            context.set_response_field("node", Value::String(node.to_string()));
            context.set_response_field("success", Value::Bool(true));
            if let Some(data) = &data {
                context.set_response_field("data", data.clone());
            }
            self.build(context, EventKind::Detail, LogLevel::Info)
                .with_cmd(cmd)
                .with_result(result_code, None)
        };

        if let Some(data) = data {
            self.scope.capture_payload(data);
        }
        tracing::trace!(session = %self.session(), cmd = %cmd, "Detail recorder succeeded");
        self.emitter.emit(event);
        self.scope.recorder_finished();
        Ok(())
    }

    /// Emits one `error` record describing `error` and ends the recorder.
    ///
    /// Anything convertible into [`ErrorInfo`] is accepted, including
    /// loosely shaped JSON; missing parts are recorded as empty strings.
    pub fn add_response_error<E>(&self, node: &str, cmd: &str, error: E) -> TelemetryResult<()>
    where
        E: Into<ErrorInfo>,
    {
        let info: ErrorInfo = error.into();
        let event = {
            let mut inner = lock(&self.inner);
            inner
                .state
                .advance(RecorderState::Emitted, RECORDER, "add_response_error")?;

            let mut context = inner.context.take();
            context.set_node(node);
            context.set_response_field("node", Value::String(node.to_string()));
            context.set_response_field("success", Value::Bool(false));
            self.build(context, EventKind::Error, LogLevel::Error)
                .with_message("error")
                .with_cmd(cmd)
                .with_error(info)
        };

        tracing::trace!(session = %self.session(), cmd = %cmd, "Detail recorder failed");
        self.emitter.emit(event);
        self.scope.recorder_finished();
        Ok(())
    }

    /// Applies the request's masking rules and emits the accumulated data
    /// as one `detail` record.
    pub fn end(&self) -> TelemetryResult<()> {
        let event = {
            let mut inner = lock(&self.inner);
            inner
                .state
                .advance(RecorderState::Emitted, RECORDER, "end")?;
            let context = inner.context.take();
            self.build(context, EventKind::Detail, LogLevel::Info)
        };
        self.emitter.emit(event);
        self.scope.recorder_finished();
        Ok(())
    }

    /// Ends the recorder unless it already emitted its final record.
    pub(crate) fn finish_pending(&self) {
        if self.is_finished() {
            return;
        }
        // Another clone may emit between the check and `end`.
        if let Err(e) = self.end() {
            tracing::trace!(session = %self.session(), error = %e, "Pending detail already finished");
        }
    }

    fn build(&self, context: RequestContext, kind: EventKind, level: LogLevel) -> LogEvent {
        let redactor = self.scope.redactor();
        let mut event = LogEvent::new(kind, level);

        if let Some(node) = context.node() {
            event = event.with_node(node);
        }
        if let Some(message) = context.message() {
            event = event.with_message(message);
        }
        if !context.request().is_empty() {
            event = event.with_request(Value::Object(redactor.redact_map(context.request())));
        }
        if !context.response().is_empty() {
            event = event.with_response(Value::Object(redactor.redact_map(context.response())));
        }
        let details: Map<String, Value> = redactor.redact_map(context.details());
        event.with_details(details)
    }
}
