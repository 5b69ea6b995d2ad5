//! The serialization choke point.
//!
//! Every record, whether it comes from a plain severity call or from a
//! recorder, goes through [`EventEmitter::emit`]: level filter, service and
//! session stamping, default metadata, a built-in masking pass over the
//! whole record, then one JSON line to the sink.
//!
//! # Example
//!
//! ```rust
//! use request_telemetry::{EventEmitter, MemorySink, SessionId, TelemetryConfig};
//! use serde_json::json;
//!
//! let sink = MemorySink::new();
//! let emitter = EventEmitter::new(&TelemetryConfig::default(), sink.clone());
//!
//! let child = emitter.child(SessionId::from("tx-1"));
//! child.info("user signed in", &json!({"email": "somchai@mail.com"}));
//!
//! let event = &sink.events()[0];
//! assert_eq!(event["session"]["id"], "tx-1");
//! assert_eq!(event["details"]["email"], "somXXXX@mail.com");
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};

use crate::config::TelemetryConfig;
use crate::redaction::Redactor;
use crate::sink::{EventSink, TracingSink};
use crate::types::{EventKind, LogEvent, LogLevel, ServiceInfo, SessionId, SessionInfo};

static BUILTIN_REDACTOR: LazyLock<Redactor> = LazyLock::new(Redactor::builtins);

/// Top-level record keys default metadata may not shadow.
const RESERVED_KEYS: &[&str] = &[
    "timestamp",
    "level",
    "type",
    "message",
    "service",
    "session",
    "node",
    "cmd",
    "resultCode",
    "resultDesc",
    "request",
    "response",
    "duration_ms",
    "error",
    "aborted",
    "details",
];

/// Serializes caller data, dropping it with a diagnostic when it cannot be
/// rendered. `null` counts as no data.
pub(crate) fn to_payload<T>(data: &T, field: &str) -> Option<Value>
where
    T: Serialize + ?Sized,
{
    match serde_json::to_value(data) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                field = %field,
                error = %e,
                "Failed to serialize telemetry field; field omitted"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
struct EmitterConfig {
    level: LogLevel,
    service: ServiceInfo,
    default_meta: Map<String, Value>,
}

/// Writes structured records to a sink.
///
/// Cloning is cheap. A [`child`](Self::child) shares the sink and starts
/// from the parent's settings; changing its level or metadata afterwards
/// copies the settings and leaves the parent untouched.
#[derive(Clone)]
pub struct EventEmitter {
    config: Arc<EmitterConfig>,
    sink: Arc<dyn EventSink>,
    session: Option<SessionId>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("level", &self.config.level)
            .field("service", &self.config.service)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter writing to `sink`.
    pub fn new<S>(config: &TelemetryConfig, sink: S) -> Self
    where
        S: EventSink + 'static,
    {
        Self::from_shared(config, Arc::new(sink))
    }

    /// Creates an emitter writing to an already shared sink.
    pub fn from_shared(config: &TelemetryConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config: Arc::new(EmitterConfig {
                level: config.level,
                service: config.service_info(),
                default_meta: Map::new(),
            }),
            sink,
            session: None,
        }
    }

    /// Creates an emitter forwarding records to `tracing`.
    pub fn tracing(config: &TelemetryConfig) -> Self {
        Self::new(config, TracingSink)
    }

    /// View of this emitter that tags every record with `session`.
    pub fn child(&self, session: SessionId) -> Self {
        Self {
            config: Arc::clone(&self.config),
            sink: Arc::clone(&self.sink),
            session: Some(session),
        }
    }

    /// The minimum emitted level.
    pub fn level(&self) -> LogLevel {
        self.config.level
    }

    /// Changes the minimum emitted level of this emitter only.
    pub fn set_level(&mut self, level: LogLevel) {
        Arc::make_mut(&mut self.config).level = level;
    }

    /// Adds a key/value stamped on every record of this emitter.
    ///
    /// Keys that collide with record fields and values that cannot be
    /// serialized are ignored with a diagnostic.
    pub fn add_default_meta<T>(&mut self, key: impl Into<String>, value: &T)
    where
        T: Serialize + ?Sized,
    {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Default metadata key collides with a record field; ignored");
            return;
        }
        if let Some(value) = to_payload(value, &key) {
            Arc::make_mut(&mut self.config)
                .default_meta
                .insert(key, value);
        }
    }

    /// Default metadata of this emitter.
    pub fn default_meta(&self) -> &Map<String, Value> {
        &self.config.default_meta
    }

    /// The service block stamped on records.
    pub fn service(&self) -> &ServiceInfo {
        &self.config.service
    }

    /// Session this emitter is bound to, if any.
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// True if records at `level` reach the sink.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.config.level.should_log(level)
    }

    /// Emits an ad-hoc `info` record.
    pub fn info<T: Serialize + ?Sized>(&self, message: &str, data: &T) {
        self.log(LogLevel::Info, message, data);
    }

    /// Emits an ad-hoc `warn` record.
    pub fn warn<T: Serialize + ?Sized>(&self, message: &str, data: &T) {
        self.log(LogLevel::Warn, message, data);
    }

    /// Emits an ad-hoc `error` record.
    pub fn error<T: Serialize + ?Sized>(&self, message: &str, data: &T) {
        self.log(LogLevel::Error, message, data);
    }

    /// Emits an ad-hoc `debug` record.
    pub fn debug<T: Serialize + ?Sized>(&self, message: &str, data: &T) {
        self.log(LogLevel::Debug, message, data);
    }

    /// Emits an ad-hoc record at `level`; `data` lands under `details`.
    ///
    /// Ad-hoc records are always `"type": "info"` whatever their level;
    /// `error` and `detail` types belong to the recorders.
    pub fn log<T: Serialize + ?Sized>(&self, level: LogLevel, message: &str, data: &T) {
        if !self.is_enabled(level) {
            return;
        }
        let mut event = LogEvent::new(EventKind::Info, level).with_message(message);
        match to_payload(data, "details") {
            Some(Value::Object(map)) => event = event.with_details(map),
            Some(other) => event.details = Some(other),
            None => {}
        }
        self.emit(event);
    }

    /// Writes one record to the sink.
    pub fn emit(&self, mut event: LogEvent) {
        let level = event.level;
        if !self.is_enabled(level) {
            return;
        }

        event.service = Some(self.config.service.clone());
        if event.session.is_none() {
            event.session = self.session.clone().map(SessionInfo::with_id);
        }
        for (key, value) in &self.config.default_meta {
            event
                .meta
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let record = match serde_json::to_value(&event) {
            Ok(record) => BUILTIN_REDACTOR.redact(&record),
            Err(e) => {
                tracing::warn!(error = %e, kind = ?event.kind, "Failed to serialize telemetry record");
                return;
            }
        };
        match serde_json::to_string(&record) {
            Ok(line) => self.sink.write(level, &line),
            Err(e) => {
                tracing::warn!(error = %e, kind = ?event.kind, "Failed to render telemetry record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde::ser::{Error as _, Serializer};
    use serde_json::json;

    fn emitter(level: LogLevel) -> (EventEmitter, MemorySink) {
        let sink = MemorySink::new();
        let config = TelemetryConfig::new()
            .with_level(level)
            .with_service_name("todo")
            .with_host("pod-1");
        (EventEmitter::new(&config, sink.clone()), sink)
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot render"))
        }
    }

    #[test]
    fn test_record_shape() {
        let (emitter, sink) = emitter(LogLevel::Debug);
        emitter.info("hello", &json!({"count": 2}));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event["type"], "info");
        assert_eq!(event["level"], "info");
        assert_eq!(event["message"], "hello");
        assert_eq!(event["service"]["name"], "todo");
        assert_eq!(event["service"]["version"], "1.0.0");
        assert_eq!(event["service"]["host"], "pod-1");
        assert_eq!(event["details"]["count"], 2);
        assert!(event.get("session").is_none());
    }

    #[test]
    fn test_level_filter() {
        let (emitter, sink) = emitter(LogLevel::Warn);
        emitter.debug("skipped", &());
        emitter.info("skipped", &());
        emitter.warn("kept", &());
        emitter.error("kept", &());
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.levels(), vec![LogLevel::Warn, LogLevel::Error]);
    }

    #[test]
    fn test_ad_hoc_records_typed_info_at_any_level() {
        let (emitter, sink) = emitter(LogLevel::Debug);
        emitter.debug("d", &());
        emitter.error("e", &());

        for event in sink.events() {
            assert_eq!(event["type"], "info");
        }
        assert_eq!(sink.events()[1]["level"], "error");
    }

    #[test]
    fn test_builtin_masking_applies_to_whole_record() {
        let (emitter, sink) = emitter(LogLevel::Debug);
        emitter.info(
            "login",
            &json!({"user": {"password": "p", "phone": "0812345678"}}),
        );
        let event = &sink.events()[0];
        assert_eq!(event["details"]["user"]["password"], "********");
        assert_eq!(event["details"]["user"]["phone"], "XXX-XXX-XX78");
    }

    #[test]
    fn test_unserializable_data_dropped() {
        let (emitter, sink) = emitter(LogLevel::Debug);
        emitter.info("still emitted", &Unserializable);
        let event = &sink.events()[0];
        assert_eq!(event["message"], "still emitted");
        assert!(event.get("details").is_none());
    }

    #[test]
    fn test_non_object_data_kept() {
        let (emitter, sink) = emitter(LogLevel::Debug);
        emitter.info("list", &[1, 2, 3]);
        assert_eq!(sink.events()[0]["details"], json!([1, 2, 3]));
    }

    #[test]
    fn test_child_tags_session_and_is_isolated() {
        let (parent, sink) = emitter(LogLevel::Info);
        let mut child = parent.child(SessionId::from("tx-1"));
        child.set_level(LogLevel::Error);
        child.add_default_meta("component", "worker");

        parent.info("parent", &());
        child.info("filtered", &());
        child.error("child", &());

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].get("session").is_none());
        assert!(events[0].get("component").is_none());
        assert_eq!(events[1]["session"]["id"], "tx-1");
        assert_eq!(events[1]["component"], "worker");
        assert_eq!(parent.level(), LogLevel::Info);
    }

    #[test]
    fn test_reserved_meta_keys_ignored() {
        let (mut emitter, sink) = emitter(LogLevel::Debug);
        emitter.add_default_meta("type", "bogus");
        emitter.add_default_meta("region", "ap-southeast-1");
        emitter.info("x", &());

        let event = &sink.events()[0];
        assert_eq!(event["type"], "info");
        assert_eq!(event["region"], "ap-southeast-1");
        assert_eq!(emitter.default_meta().len(), 1);
    }

    #[test]
    fn test_off_emits_nothing() {
        let (emitter, sink) = emitter(LogLevel::Off);
        emitter.error("nope", &());
        assert!(sink.is_empty());
    }
}
