//! Terminal outcome record of one request.
//!
//! The [`SummaryRecorder`] starts a monotonic clock when it is created and
//! writes exactly one full `summary` record when it is flushed: caller
//! identity, the request snapshot, the response status and headers, the
//! payload captured by the detail recorder, and the elapsed time.

use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::constants::ABORTED_RESULT_DESC;
use crate::context::{RequestScope, lock};
use crate::emitter::EventEmitter;
use crate::error::TelemetryResult;
use crate::lifecycle::RecorderState;
use crate::types::{EventKind, LogEvent, LogLevel, SessionId};

const RECORDER: &str = "summary";

/// Message of a summary whose response status is 200.
pub const SUCCESS_MESSAGE: &str = "Request Success";
/// Message of a summary with any other status.
pub const FAILURE_MESSAGE: &str = "Request Failed";

/// Emits the summary record of one request.
///
/// Cloning is cheap; clones share the clock and the state.
#[derive(Debug, Clone)]
pub struct SummaryRecorder {
    scope: RequestScope,
    emitter: EventEmitter,
    started: Instant,
    state: Arc<Mutex<RecorderState>>,
}

impl SummaryRecorder {
    /// Binds a recorder to a request and starts its clock.
    pub fn new(scope: &RequestScope, emitter: &EventEmitter) -> Self {
        Self {
            scope: scope.clone(),
            emitter: emitter.child(scope.session().clone()),
            started: Instant::now(),
            state: Arc::new(Mutex::new(RecorderState::default())),
        }
    }

    /// The request's session id.
    pub fn session(&self) -> &SessionId {
        self.scope.session()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecorderState {
        *lock(&self.state)
    }

    /// True once the summary has been written.
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Milliseconds since the recorder was created.
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Immediately emits a small `summary` record for one successful step.
    /// The recorder stays open.
    pub fn add_success_block(
        &self,
        node: &str,
        cmd: &str,
        result_code: &str,
        result_desc: &str,
    ) -> TelemetryResult<&Self> {
        lock(&self.state).advance(RecorderState::Accumulating, RECORDER, "add_success_block")?;

        let event = LogEvent::new(EventKind::Summary, LogLevel::Info)
            .with_node(node)
            .with_cmd(cmd)
            .with_result(result_code, Some(result_desc.to_string()));
        self.emitter.emit(event);
        Ok(self)
    }

    /// Emits the full summary record and takes the captured payload. The
    /// request's masking rules are cleared once the detail recorder has
    /// finished as well.
    pub fn flush(&self) -> TelemetryResult<()> {
        self.finish("flush", false)
    }

    /// Emits the summary of a request that never completed.
    pub(crate) fn abort(&self) -> TelemetryResult<()> {
        self.finish("abort", true)
    }

    /// Flushes as aborted unless the summary was already written.
    pub(crate) fn finish_pending(&self, aborted: bool) {
        if self.is_finished() {
            return;
        }
        let result = if aborted { self.abort() } else { self.flush() };
        if let Err(e) = result {
            tracing::trace!(session = %self.session(), error = %e, "Pending summary already finished");
        }
    }

    fn finish(&self, operation: &'static str, aborted: bool) -> TelemetryResult<()> {
        lock(&self.state).advance(RecorderState::Emitted, RECORDER, operation)?;

        let elapsed = round_ms(self.elapsed_ms());
        let request = self.scope.request();
        let response = self.scope.response();
        let data = self
            .scope
            .take_payload()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let redactor = self.scope.redactor();

        let request_section = json!({
            "path": request.path,
            "status": response.status_code,
            "duration_ms": elapsed,
            "headers": request.headers,
            "host": request.host(),
            "baseUrl": request.base_url,
            "url": request.url,
            "method": request.method,
            "body": request.body,
            "params": request.params,
            "query": request.query,
            "clientIp": request.client_ip(),
        });
        let response_section = json!({
            "headers": response.headers,
            "statusCode": response.status_code,
            "data": data,
        });
        let message = if response.is_ok() {
            SUCCESS_MESSAGE
        } else {
            FAILURE_MESSAGE
        };

        let mut event = LogEvent::new(EventKind::Summary, LogLevel::Info)
            .with_message(message)
            .with_session(request.session_info(self.session()))
            .with_request(redactor.redact(&request_section))
            .with_response(redactor.redact(&response_section))
            .with_duration_ms(elapsed);
        if aborted {
            event = event.with_aborted();
            event.result_desc = Some(ABORTED_RESULT_DESC.to_string());
        }

        self.scope.recorder_finished();
        tracing::debug!(
            session = %self.session(),
            status = response.status_code,
            duration_ms = elapsed,
            aborted,
            "Request summary emitted"
        );
        self.emitter.emit(event);
        Ok(())
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelemetryConfig;
    use crate::sink::MemorySink;
    use crate::snapshot::{RequestSnapshot, ResponseSnapshot};

    fn setup() -> (SummaryRecorder, RequestScope, MemorySink) {
        let sink = MemorySink::new();
        let emitter = EventEmitter::new(&TelemetryConfig::default(), sink.clone());
        let request = RequestSnapshot::new("POST", "/api/todo?x=1")
            .with_base_url("/api", "/todo?x=1")
            .with_header("Host", "localhost:3000")
            .with_header("x-transaction-id", "tx-2")
            .with_header("user-agent", "curl/8.0")
            .with_header("x-forwarded-for", "203.0.113.7")
            .with_ip("10.0.0.1")
            .with_body(json!({"title": "a", "password": "p"}))
            .with_query(json!({"x": "1"}));
        let scope = RequestScope::new(request);
        (SummaryRecorder::new(&scope, &emitter), scope, sink)
    }

    #[test]
    fn test_flush_record_shape() {
        let (summary, scope, sink) = setup();
        scope.capture_payload(json!({"id": 3}));
        scope.record_response(ResponseSnapshot::new(200).with_header("Content-Type", "json"));
        summary.flush().unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let record = &events[0];
        assert_eq!(record["type"], "summary");
        assert_eq!(record["message"], "Request Success");
        assert_eq!(record["session"]["id"], "tx-2");
        assert_eq!(record["session"]["ip"], "10.0.0.1");
        assert_eq!(record["session"]["device"], "curl/8.0");

        let request = &record["request"];
        assert_eq!(request["path"], "/api/todo?x=1");
        assert_eq!(request["baseUrl"], "/api");
        assert_eq!(request["url"], "/todo?x=1");
        assert_eq!(request["method"], "POST");
        assert_eq!(request["host"], "localhost:3000");
        assert_eq!(request["status"], 200);
        assert_eq!(request["clientIp"], "203.0.113.7");
        assert_eq!(request["query"]["x"], "1");
        assert_eq!(request["body"]["password"], "********");
        assert!(request["duration_ms"].is_number());

        let response = &record["response"];
        assert_eq!(response["statusCode"], 200);
        assert_eq!(response["headers"]["content-type"], "json");
        assert_eq!(response["data"]["id"], 3);
        assert!(record.get("aborted").is_none());
    }

    #[test]
    fn test_flush_without_payload_uses_empty_object() {
        let (summary, scope, sink) = setup();
        scope.record_response(ResponseSnapshot::new(500));
        summary.flush().unwrap();

        let record = &sink.events()[0];
        assert_eq!(record["message"], "Request Failed");
        assert_eq!(record["response"]["data"], json!({}));
    }

    #[test]
    fn test_flush_applies_rules_and_keeps_them_for_detail() {
        let (summary, scope, sink) = setup();
        scope.set_masking_rules(["title"]);
        summary.flush().unwrap();

        assert_eq!(sink.events()[0]["request"]["body"]["title"], "****");
        assert_eq!(scope.masking_rule_count(), 1);

        let emitter = EventEmitter::new(&TelemetryConfig::default(), MemorySink::new());
        crate::detail::DetailRecorder::new(&scope, &emitter).end().unwrap();
        assert_eq!(scope.masking_rule_count(), 0);
    }

    #[test]
    fn test_success_block_does_not_consume() {
        let (summary, _, sink) = setup();
        summary
            .add_success_block("h.rs", "create", "20000", "created")
            .unwrap();
        summary.flush().unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["cmd"], "create");
        assert_eq!(events[0]["resultCode"], "20000");
        assert_eq!(events[0]["resultDesc"], "created");
        assert!(events[0].get("request").is_none());
    }

    #[test]
    fn test_flush_only_once() {
        let (summary, _, sink) = setup();
        summary.flush().unwrap();
        assert!(summary.flush().unwrap_err().is_recorder_consumed());
        assert!(
            summary
                .add_success_block("h", "c", "1", "d")
                .err()
                .unwrap()
                .is_recorder_consumed()
        );
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_abort_marks_record() {
        let (summary, _, sink) = setup();
        summary.finish_pending(true);
        summary.finish_pending(true);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["aborted"], true);
        assert_eq!(events[0]["resultDesc"], "aborted");
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(1.23456), 1.23);
        assert_eq!(round_ms(10.0), 10.0);
    }
}
