//! Per-request state.
//!
//! - [`RequestContext`]: the accumulator one recorder fills between calls
//! - [`RequestScope`]: what the detail and summary recorders of one request
//!   share (session id, request snapshot, masking rules, captured payload,
//!   response snapshot)
//!
//! A scope is created by the routing layer for each request and dropped
//! with it. Nothing in it is visible to another request.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::TelemetryConfig;
use crate::constants::SESSION_HEADER;
use crate::masking::{MaskRegistry, MaskRule};
use crate::redaction::Redactor;
use crate::snapshot::{RequestSnapshot, ResponseSnapshot};
use crate::types::SessionId;

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Sections
// =============================================================================

/// Request sections a detail recorder can add labelled values to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSection {
    /// `request.body`
    Body,
    /// `request.query`
    Query,
    /// `request.params`
    Params,
    /// `request.headers`
    Headers,
}

impl RequestSection {
    /// Key of the section inside `request`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSection::Body => "body",
            RequestSection::Query => "query",
            RequestSection::Params => "params",
            RequestSection::Headers => "headers",
        }
    }
}

/// Response sections a detail recorder can add labelled values to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSection {
    /// `response.body`
    Body,
    /// `response.headers`
    Headers,
}

impl ResponseSection {
    /// Key of the section inside `response`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSection::Body => "body",
            ResponseSection::Headers => "headers",
        }
    }
}

// =============================================================================
// RequestContext
// =============================================================================

/// Accumulated, not yet emitted data of one recorder.
///
/// Every merge touches a single label inside a single section; everything
/// else already recorded is left as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    node: Option<String>,
    message: Option<String>,
    details: Map<String, Value>,
    request: Map<String, Value>,
    response: Map<String, Value>,
}

impl RequestContext {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the code location. The first node recorded is kept.
    pub fn set_node(&mut self, node: &str) {
        if self.node.is_none() {
            self.node = Some(node.to_string());
        }
    }

    /// Replaces the free-text message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Sets `details[cmd]`.
    pub fn add_detail(&mut self, cmd: &str, data: Value) {
        self.details.insert(cmd.to_string(), data);
    }

    /// Sets `request.<section>.<label>`.
    pub fn merge_request(&mut self, section: RequestSection, label: &str, value: Value) {
        merge_section(&mut self.request, section.as_str(), label, value);
    }

    /// Sets `response.<section>.<label>`.
    pub fn merge_response(&mut self, section: ResponseSection, label: &str, value: Value) {
        merge_section(&mut self.response, section.as_str(), label, value);
    }

    /// Sets a top-level `response.<key>` entry.
    pub fn set_response_field(&mut self, key: &str, value: Value) {
        self.response.insert(key.to_string(), value);
    }

    /// The recorded code location.
    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// The recorded message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Named free-form fields.
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// Request sections.
    pub fn request(&self) -> &Map<String, Value> {
        &self.request
    }

    /// Response sections.
    pub fn response(&self) -> &Map<String, Value> {
        &self.response
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.node.is_none()
            && self.message.is_none()
            && self.details.is_empty()
            && self.request.is_empty()
            && self.response.is_empty()
    }

    /// Moves the accumulated data out, leaving an empty accumulator.
    pub fn take(&mut self) -> RequestContext {
        std::mem::take(self)
    }
}

fn merge_section(target: &mut Map<String, Value>, section: &str, label: &str, value: Value) {
    let slot = target
        .entry(section.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(entries) = slot {
        entries.insert(label.to_string(), value);
    }
}

// =============================================================================
// RequestScope
// =============================================================================

#[derive(Debug)]
struct ScopeInner {
    session: SessionId,
    request: RequestSnapshot,
    masking: Mutex<MaskRegistry>,
    payload: Mutex<Option<Value>>,
    response: Mutex<Option<ResponseSnapshot>>,
    finished: AtomicUsize,
}

/// Recorders bound to one scope: one detail, one summary.
const RECORDERS_PER_SCOPE: usize = 2;

/// State shared by the recorders of one request.
///
/// Cloning is cheap and every clone refers to the same request.
#[derive(Debug, Clone)]
pub struct RequestScope {
    inner: Arc<ScopeInner>,
}

impl RequestScope {
    /// Scope with default settings; the session id is taken from the
    /// `x-transaction-id` header or generated.
    pub fn new(request: RequestSnapshot) -> Self {
        let session = SessionId::from_header(request.header(SESSION_HEADER));
        Self::build(session, request, MaskRegistry::new())
    }

    /// Scope honoring the configured session header and mask replacement.
    pub fn with_config(request: RequestSnapshot, config: &TelemetryConfig) -> Self {
        let session = SessionId::from_header(request.header(&config.session_header));
        let registry = MaskRegistry::with_default_replacement(config.mask_replacement.clone());
        Self::build(session, request, registry)
    }

    /// Scope with an explicit session id.
    pub fn with_session(session: SessionId, request: RequestSnapshot) -> Self {
        Self::build(session, request, MaskRegistry::new())
    }

    fn build(session: SessionId, request: RequestSnapshot, masking: MaskRegistry) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                session,
                request,
                masking: Mutex::new(masking),
                payload: Mutex::new(None),
                response: Mutex::new(None),
                finished: AtomicUsize::new(0),
            }),
        }
    }

    /// The request's session id.
    pub fn session(&self) -> &SessionId {
        &self.inner.session
    }

    /// The request snapshot.
    pub fn request(&self) -> &RequestSnapshot {
        &self.inner.request
    }

    /// Installs masking rules for this request only.
    pub fn set_masking_rules<I, R>(&self, rules: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<MaskRule>,
    {
        lock(&self.inner.masking).set_rules(rules);
    }

    /// Removes this request's masking rules.
    pub fn clear_masking(&self) {
        lock(&self.inner.masking).clear_all();
    }

    /// Marks one recorder as finished. The request's rules are cleared
    /// once both the detail and the summary recorder are done.
    pub(crate) fn recorder_finished(&self) {
        let finished = self.inner.finished.fetch_add(1, Ordering::AcqRel) + 1;
        if finished == RECORDERS_PER_SCOPE {
            tracing::trace!(session = %self.session(), "Both recorders finished; masking rules cleared");
            self.clear_masking();
        }
    }

    /// Number of rules installed for this request.
    pub fn masking_rule_count(&self) -> usize {
        lock(&self.inner.masking).len()
    }

    /// Snapshot of the current rules, ready to apply.
    pub fn redactor(&self) -> Redactor {
        Redactor::new(&lock(&self.inner.masking))
    }

    /// Stores the success payload for the summary record.
    pub fn capture_payload(&self, payload: Value) {
        *lock(&self.inner.payload) = Some(payload);
    }

    /// Removes and returns the captured payload.
    pub fn take_payload(&self) -> Option<Value> {
        lock(&self.inner.payload).take()
    }

    /// True when a success payload is waiting for the summary.
    pub fn has_payload(&self) -> bool {
        lock(&self.inner.payload).is_some()
    }

    /// Records the final response status and headers.
    pub fn record_response(&self, response: ResponseSnapshot) {
        *lock(&self.inner.response) = Some(response);
    }

    /// The recorded response, or a bare 200 when none was recorded.
    pub fn response(&self) -> ResponseSnapshot {
        lock(&self.inner.response).clone().unwrap_or_default()
    }
}
