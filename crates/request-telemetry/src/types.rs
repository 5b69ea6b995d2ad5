//! Core types for the telemetry pipeline.
//!
//! - SessionId: correlation identifier shared by every event of one request
//! - LogLevel: severity with ordering and filtering
//! - EventKind: the emission tier a record belongs to
//! - ServiceInfo / SessionInfo: identity blocks of a record
//! - LogEvent: one immutable emitted record

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::constants::TIMESTAMP_FORMAT;
use crate::error::TelemetryError;
use crate::error_info::ErrorInfo;

/// Correlation identifier for all events of one request.
///
/// Taken verbatim from the upstream session header when present, otherwise
/// generated once as a UUID v7 so generated ids sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh session id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)).to_string())
    }

    /// Uses the header value when it is present and non-blank, otherwise
    /// generates a new id.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Self(v.to_string()),
            _ => Self::new(),
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Severity of an emitted record.
///
/// Levels are ordered from most verbose (Trace) to least verbose (Off). An
/// emitter configured at one level emits records at that level or above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose level.
    Trace,
    /// Development detail; the default emitter level.
    #[default]
    Debug,
    /// Normal request records.
    Info,
    /// Suspicious but non-fatal situations.
    Warn,
    /// Failed requests.
    Error,
    /// Emission disabled.
    Off,
}

impl LogLevel {
    /// Returns true if an emitter at this level emits a record at `target`.
    pub fn should_log(&self, target: LogLevel) -> bool {
        match self {
            LogLevel::Off => false,
            LogLevel::Error => matches!(target, LogLevel::Error),
            LogLevel::Warn => matches!(target, LogLevel::Error | LogLevel::Warn),
            LogLevel::Info => matches!(target, LogLevel::Error | LogLevel::Warn | LogLevel::Info),
            LogLevel::Debug => !matches!(target, LogLevel::Trace | LogLevel::Off),
            LogLevel::Trace => target != LogLevel::Off,
        }
    }

    /// Returns the lowercase wire name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    /// Converts this level to a `tracing::Level`.
    ///
    /// Returns None for `Off` since tracing has no "off" level.
    pub fn to_tracing_level(&self) -> Option<tracing::Level> {
        match self {
            LogLevel::Trace => Some(tracing::Level::TRACE),
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Off => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "silent" => Ok(LogLevel::Off),
            other => Err(TelemetryError::config(format!(
                "invalid log level '{}'; expected one of trace, debug, info, warn, error, off",
                other
            ))),
        }
    }
}

/// The emission tier a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Ad-hoc event from a plain severity call.
    Info,
    /// Detailed trace flushed by a detail recorder.
    Detail,
    /// Terminal outcome record from a summary recorder.
    Summary,
    /// Failure record from a detail recorder.
    Error,
}

/// Identity of the emitting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
    /// Host the service runs on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Identity of the caller for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session id.
    pub id: SessionId,
    /// Caller address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Caller user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Caller location hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl SessionInfo {
    /// Session block carrying only the id.
    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// One structured record handed to the sink.
///
/// Built with the `with_*` methods and then moved into
/// [`EventEmitter::emit`](crate::EventEmitter::emit), which stamps the
/// service block and session and serializes it. Nothing can change a record
/// once it has been emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Local time the record was built.
    pub timestamp: String,
    /// Severity.
    pub level: LogLevel,
    /// Emission tier.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Free-text message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Emitting service, filled in by the emitter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
    /// Caller identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
    /// Code location that produced the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Command or step name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// Outcome code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    /// Outcome description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_desc: Option<String>,
    /// Request section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    /// Response section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Elapsed milliseconds.
    #[serde(rename = "duration_ms", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    /// Set when the request ended without reaching its normal completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<bool>,
    /// Named free-form fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Default metadata of the emitter.
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl LogEvent {
    /// Creates an empty record of the given tier, timestamped now.
    pub fn new(kind: EventKind, level: LogLevel) -> Self {
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            level,
            kind,
            message: None,
            service: None,
            session: None,
            node: None,
            cmd: None,
            result_code: None,
            result_desc: None,
            request: None,
            response: None,
            duration_ms: None,
            error: None,
            aborted: None,
            details: None,
            meta: Map::new(),
        }
    }

    /// Sets the message; an empty message is left out.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        if !message.is_empty() {
            self.message = Some(message);
        }
        self
    }

    /// Sets the session block.
    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(session);
        self
    }

    /// Sets the code location.
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Sets the command name.
    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = Some(cmd.into());
        self
    }

    /// Sets the outcome code and description.
    pub fn with_result(mut self, code: impl Into<String>, desc: Option<String>) -> Self {
        self.result_code = Some(code.into());
        self.result_desc = desc;
        self
    }

    /// Sets the request section.
    pub fn with_request(mut self, request: Value) -> Self {
        self.request = Some(request);
        self
    }

    /// Sets the response section.
    pub fn with_response(mut self, response: Value) -> Self {
        self.response = Some(response);
        self
    }

    /// Sets the elapsed time, rounded to two decimals.
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some((duration_ms * 100.0).round() / 100.0);
        self
    }

    /// Attaches a failure description.
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Marks the record as produced by an aborted request.
    pub fn with_aborted(mut self) -> Self {
        self.aborted = Some(true);
        self
    }

    /// Sets the named free-form fields; an empty map is left out.
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        if !details.is_empty() {
            self.details = Some(Value::Object(details));
        }
        self
    }
}
