use std::sync::Arc;

use crate::{
    DetailRecorder, ErrorInfo, EventEmitter, LogLevel, MemorySink, RecorderState, RequestScope,
    RequestSnapshot, RequestTelemetry, ResponseSnapshot, SummaryRecorder, TelemetryConfig,
    TelemetryError, WriterSink,
};

use serde_json::{Value, json};

fn emitter_with(config: &TelemetryConfig) -> (EventEmitter, MemorySink) {
    let sink = MemorySink::new();
    (EventEmitter::new(config, sink.clone()), sink)
}

fn todo_request() -> RequestSnapshot {
    RequestSnapshot::new("POST", "/api/todo")
        .with_base_url("/api", "/todo")
        .with_header("x-transaction-id", "tx-100")
        .with_header("host", "todo.local")
        .with_remote_addr("127.0.0.1")
        .with_body(json!({
            "title": "buy milk",
            "owner": {"email": "somchai@mail.com", "phone": "0891234567"}
        }))
}

#[test]
fn test_full_request_lifecycle() {
    let (emitter, sink) = emitter_with(&TelemetryConfig::default());
    let telemetry = RequestTelemetry::new(RequestScope::new(todo_request()), &emitter);

    let detail = telemetry.detail();
    detail
        .add_detail("todo.rs", "Create Todo", &())
        .unwrap()
        .add_request_body("todo.rs", "todo", &json!({"title": "buy milk"}))
        .unwrap()
        .add_request_params("todo.rs", "id", &"7")
        .unwrap();
    telemetry
        .summary()
        .add_success_block("todo.rs", "insert", "20000", "inserted")
        .unwrap();
    detail
        .add_response_success("todo.rs", "Create Todo", "20000", &json!({"id": 7}))
        .unwrap();
    telemetry.record_response(ResponseSnapshot::new(200));
    telemetry.complete();

    let events = sink.events();
    let kinds: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(kinds, vec!["summary", "detail", "summary"]);

    for event in &events {
        assert_eq!(event["session"]["id"], "tx-100");
        assert_eq!(event["service"]["name"], "Service-HTTP");
    }

    let detail_record = &events[1];
    assert_eq!(detail_record["message"], "Create Todo");
    assert_eq!(detail_record["request"]["params"]["id"], "7");

    let summary = &events[2];
    assert_eq!(summary["request"]["host"], "todo.local");
    assert_eq!(summary["request"]["clientIp"], "127.0.0.1");
    assert_eq!(summary["request"]["body"]["owner"]["email"], "somXXXX@mail.com");
    assert_eq!(summary["request"]["body"]["owner"]["phone"], "XXX-XXX-XX67");
    assert_eq!(summary["response"]["data"], json!({"id": 7}));
}

#[test]
fn test_rules_shared_between_detail_and_summary_only() {
    let (emitter, sink) = emitter_with(&TelemetryConfig::default());
    let scope = RequestScope::new(todo_request());
    let detail = DetailRecorder::new(&scope, &emitter);
    let summary = SummaryRecorder::new(&scope, &emitter);

    detail.set_sensitive_masking(["title"]).unwrap();
    detail
        .add_request_body("todo.rs", "todo", &json!({"title": "secret plan"}))
        .unwrap();
    detail.end().unwrap();
    summary.flush().unwrap();

    let events = sink.events();
    assert_eq!(events[0]["request"]["body"]["todo"]["title"], "****");
    assert_eq!(events[1]["request"]["body"]["title"], "****");
    assert_eq!(scope.masking_rule_count(), 0);
}

#[test]
fn test_config_driven_scope_and_emitter() {
    let config = TelemetryConfig::new()
        .with_service_name("todo-api")
        .with_service_version("2.0.0")
        .with_session_header("x-request-id")
        .with_mask_replacement("[masked]");
    let (emitter, sink) = emitter_with(&config);
    let request = RequestSnapshot::new("GET", "/todo").with_header("x-request-id", "rid-1");
    let scope = RequestScope::with_config(request, &config);

    let detail = DetailRecorder::new(&scope, &emitter);
    detail.set_sensitive_masking(["token"]).unwrap();
    detail
        .add_request_headers("todo.rs", "auth", &json!({"token": "abc"}))
        .unwrap();
    detail.end().unwrap();

    let record = &sink.events()[0];
    assert_eq!(record["session"]["id"], "rid-1");
    assert_eq!(record["service"]["name"], "todo-api");
    assert_eq!(record["service"]["version"], "2.0.0");
    assert_eq!(record["request"]["headers"]["auth"]["token"], "[masked]");
}

#[test]
fn test_default_meta_on_recorder_records() {
    let sink = MemorySink::new();
    let mut emitter = EventEmitter::new(&TelemetryConfig::default(), sink.clone());
    emitter.add_default_meta("env", "staging");

    let scope = RequestScope::new(RequestSnapshot::new("GET", "/"));
    DetailRecorder::new(&scope, &emitter).end().unwrap();
    SummaryRecorder::new(&scope, &emitter).flush().unwrap();

    for event in sink.events() {
        assert_eq!(event["env"], "staging");
    }
}

#[test]
fn test_level_filter_applies_to_recorders() {
    let config = TelemetryConfig::new().with_level(LogLevel::Error);
    let (emitter, sink) = emitter_with(&config);
    let scope = RequestScope::new(RequestSnapshot::new("GET", "/"));

    let detail = DetailRecorder::new(&scope, &emitter);
    detail.add_message("a.rs", "ignored").unwrap();
    detail
        .add_response_error("a.rs", "load", ErrorInfo::new("DbError", "timeout"))
        .unwrap();
    SummaryRecorder::new(&scope, &emitter).flush().unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert_eq!(events[0]["error"]["name"], "DbError");
    assert_eq!(events[0]["message"], "error");
}

#[test]
fn test_error_record_from_typed_error() {
    let (emitter, sink) = emitter_with(&TelemetryConfig::default());
    let scope = RequestScope::new(RequestSnapshot::new("GET", "/"));
    let detail = DetailRecorder::new(&scope, &emitter);

    let err = TelemetryError::config("bad level");
    detail.add_response_error("a.rs", "configure", &err).unwrap();

    let record = &sink.events()[0];
    assert_eq!(record["error"]["name"], "TelemetryError");
    assert_eq!(record["error"]["message"], "Configuration error: bad level");
    assert_eq!(record["error"]["stack"], "");
}

#[test]
fn test_state_transitions_visible() {
    let (emitter, _sink) = emitter_with(&TelemetryConfig::default());
    let scope = RequestScope::new(RequestSnapshot::new("GET", "/"));
    let detail = DetailRecorder::new(&scope, &emitter);

    assert_eq!(detail.state(), RecorderState::Created);
    detail.add_message("a.rs", "x").unwrap();
    assert_eq!(detail.state(), RecorderState::Accumulating);
    detail.end().unwrap();
    assert_eq!(detail.state(), RecorderState::Emitted);
}

#[test]
fn test_writer_sink_produces_json_lines() {
    let sink = Arc::new(WriterSink::new(Vec::<u8>::new()));
    let emitter = EventEmitter::from_shared(&TelemetryConfig::default(), sink.clone());
    emitter.info("one", &());
    emitter.warn("two", &json!({"password": "x"}));
    drop(emitter);

    let sink = Arc::try_unwrap(sink).ok().unwrap();
    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["message"], "one");
    assert_eq!(lines[1]["level"], "warn");
    assert_eq!(lines[1]["details"]["password"], "********");
}

#[test]
fn test_payload_isolated_per_scope() {
    let (emitter, sink) = emitter_with(&TelemetryConfig::default());
    let first = RequestScope::new(RequestSnapshot::new("GET", "/a"));
    let second = RequestScope::new(RequestSnapshot::new("GET", "/b"));

    DetailRecorder::new(&first, &emitter)
        .add_response_success("a.rs", "a", "20000", &json!({"from": "a"}))
        .unwrap();
    SummaryRecorder::new(&second, &emitter).flush().unwrap();
    SummaryRecorder::new(&first, &emitter).flush().unwrap();

    let summaries = sink.events_of_type("summary");
    assert_eq!(summaries[0]["response"]["data"], json!({}));
    assert_eq!(summaries[1]["response"]["data"], json!({"from": "a"}));
}

#[test]
fn test_summary_flushed_before_detail_keeps_rules() {
    let (emitter, sink) = emitter_with(&TelemetryConfig::default());
    let telemetry = RequestTelemetry::new(RequestScope::new(todo_request()), &emitter);

    telemetry
        .detail()
        .set_sensitive_masking([("citizenId", "[id]")])
        .unwrap()
        .add_request_body("todo.rs", "owner", &json!({"citizenId": "1234567890123"}))
        .unwrap();
    telemetry.summary().flush().unwrap();
    assert_eq!(telemetry.scope().masking_rule_count(), 1);

    telemetry.detail().end().unwrap();
    assert_eq!(telemetry.scope().masking_rule_count(), 0);
    telemetry.complete();

    let details = sink.events_of_type("detail");
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["request"]["body"]["owner"]["citizenId"], "[id]");
}
