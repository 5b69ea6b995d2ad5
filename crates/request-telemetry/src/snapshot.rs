//! Request and response snapshots handed in by the routing layer.
//!
//! The core never reads HTTP types directly. The routing layer copies what
//! the summary record needs into a [`RequestSnapshot`] before the handler
//! runs and into a [`ResponseSnapshot`] after it completes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{FORWARDED_FOR_HEADER, LOCATION_HEADER, USER_AGENT_HEADER};
use crate::types::{SessionId, SessionInfo};

/// What the routing layer knows about an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    /// HTTP method.
    pub method: String,
    /// Original URL including the mount point.
    pub path: String,
    /// URL relative to the mount point.
    pub url: String,
    /// Mount point of the router.
    pub base_url: String,
    /// Header map with lower-cased names.
    pub headers: Map<String, Value>,
    /// Parsed request body.
    pub body: Value,
    /// Route parameters.
    pub params: Value,
    /// Query string parameters.
    pub query: Value,
    /// Address the framework resolved for the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Socket peer address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<String>,
}

impl RequestSnapshot {
    /// Snapshot of a request with empty body, params and query.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method: method.into(),
            url: path.clone(),
            path,
            body: Value::Object(Map::new()),
            params: Value::Object(Map::new()),
            query: Value::Object(Map::new()),
            ..Self::default()
        }
    }

    /// Sets the mount point and the URL relative to it.
    pub fn with_base_url(mut self, base_url: impl Into<String>, url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.url = url.into();
        self
    }

    /// Adds a header; the name is lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), Value::String(value.into()));
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Sets the route parameters.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Sets the query parameters.
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    /// Sets the framework-resolved caller address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Sets the socket peer address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Looks a header up by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(Value::as_str)
    }

    /// The `host` header.
    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    /// Client address: the forwarded-for header, else the peer address.
    pub fn client_ip(&self) -> Option<&str> {
        self.header(FORWARDED_FOR_HEADER)
            .or(self.remote_addr.as_deref())
    }

    /// The caller's user agent.
    pub fn device(&self) -> Option<&str> {
        self.header(USER_AGENT_HEADER)
    }

    /// The caller's location hint.
    pub fn location(&self) -> Option<&str> {
        self.header(LOCATION_HEADER)
    }

    /// Session block for the summary record.
    pub fn session_info(&self, id: &SessionId) -> SessionInfo {
        SessionInfo {
            id: id.clone(),
            ip: self.ip.clone(),
            device: self.device().map(str::to_string),
            location: self.location().map(str::to_string),
        }
    }
}

/// Status and headers of the response the handler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSnapshot {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers.
    pub headers: Map<String, Value>,
}

impl Default for ResponseSnapshot {
    fn default() -> Self {
        Self::new(200)
    }
}

impl ResponseSnapshot {
    /// Response with the given status and no headers.
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: Map::new(),
        }
    }

    /// Adds a header; the name is lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), Value::String(value.into()));
        self
    }

    /// True for status 200.
    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RequestSnapshot {
        RequestSnapshot::new("POST", "/api/todo/1")
            .with_base_url("/api/todo", "/1")
            .with_header("Host", "localhost:3000")
            .with_header("User-Agent", "curl/8.0")
            .with_header("X-Location", "BKK")
            .with_ip("10.0.0.5")
            .with_remote_addr("127.0.0.1")
            .with_body(json!({"title": "write tests"}))
    }

    #[test]
    fn test_headers_lowercased() {
        let snapshot = sample();
        assert!(snapshot.headers.contains_key("user-agent"));
        assert_eq!(snapshot.header("USER-AGENT"), Some("curl/8.0"));
        assert_eq!(snapshot.host(), Some("localhost:3000"));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let snapshot = sample();
        assert_eq!(snapshot.client_ip(), Some("127.0.0.1"));

        let forwarded = snapshot.with_header("X-Forwarded-For", "203.0.113.7");
        assert_eq!(forwarded.client_ip(), Some("203.0.113.7"));
    }

    #[test]
    fn test_session_info() {
        let id = SessionId::from("tx-1");
        let info = sample().session_info(&id);
        assert_eq!(info.id.as_str(), "tx-1");
        assert_eq!(info.ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(info.device.as_deref(), Some("curl/8.0"));
        assert_eq!(info.location.as_deref(), Some("BKK"));
    }

    #[test]
    fn test_new_defaults_to_empty_objects() {
        let snapshot = RequestSnapshot::new("GET", "/");
        assert_eq!(snapshot.body, json!({}));
        assert_eq!(snapshot.params, json!({}));
        assert_eq!(snapshot.query, json!({}));
        assert_eq!(snapshot.url, "/");
    }

    #[test]
    fn test_response_snapshot() {
        let response = ResponseSnapshot::new(404).with_header("Content-Type", "application/json");
        assert!(!response.is_ok());
        assert_eq!(response.headers["content-type"], "application/json");
        assert!(ResponseSnapshot::default().is_ok());
    }
}
