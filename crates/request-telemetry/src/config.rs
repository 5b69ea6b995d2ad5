//! Configuration for the event emitter.
//!
//! Environment-level settings (verbosity, service identity) are read once at
//! process start with [`TelemetryConfig::from_env`] or assembled with the
//! builder methods, then handed to [`EventEmitter::new`](crate::EventEmitter::new).
//!
//! # Example
//! ```rust
//! use request_telemetry::{LogLevel, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_level(LogLevel::Info)
//!     .with_service_name("todo-service")
//!     .with_mask_replacement("[masked]");
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MASK_REPLACEMENT, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_VERSION, SESSION_HEADER,
};
use crate::error::{TelemetryError, TelemetryResult};
use crate::types::{LogLevel, ServiceInfo};

/// Environment variable holding the log level.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Environment variable holding the service name.
pub const ENV_SERVICE_NAME: &str = "SERVICE_NAME";
/// Environment variable holding the service version.
pub const ENV_SERVICE_VERSION: &str = "SERVICE_VERSION";
/// Environment variable holding the host name.
pub const ENV_HOSTNAME: &str = "HOSTNAME";

/// Emitter and recorder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Minimum level that reaches the sink.
    pub level: LogLevel,
    /// Service name stamped on every record.
    pub service_name: String,
    /// Service version stamped on every record.
    pub service_version: String,
    /// Host stamped on every record, if known.
    pub host: Option<String>,
    /// Replacement used by masking rules installed without a value.
    pub mask_replacement: String,
    /// Header carrying the upstream session id.
    pub session_header: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Debug,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
            host: None,
            mask_replacement: DEFAULT_MASK_REPLACEMENT.to_string(),
            session_header: SESSION_HEADER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the configuration from the process environment.
    ///
    /// Unset variables keep their defaults; an unparsable level is an error.
    pub fn from_env() -> TelemetryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> TelemetryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.level = level.parse()?;
        }
        if let Some(name) = lookup(ENV_SERVICE_NAME) {
            config.service_name = name;
        }
        if let Some(version) = lookup(ENV_SERVICE_VERSION) {
            config.service_version = version;
        }
        config.host = lookup(ENV_HOSTNAME).filter(|h| !h.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Sets the minimum emitted level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the service name.
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Sets the service version.
    pub fn with_service_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Sets the host name.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the default replacement for masking rules.
    pub fn with_mask_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.mask_replacement = replacement.into();
        self
    }

    /// Sets the header the session id is read from.
    pub fn with_session_header(mut self, header: impl Into<String>) -> Self {
        self.session_header = header.into();
        self
    }

    /// Checks the configuration for values the pipeline cannot work with.
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.service_name.trim().is_empty() {
            return Err(TelemetryError::config("service name must not be empty"));
        }
        if self.session_header.trim().is_empty() {
            return Err(TelemetryError::config("session header must not be empty"));
        }
        if self.mask_replacement.is_empty() {
            return Err(TelemetryError::config("mask replacement must not be empty"));
        }
        Ok(())
    }

    /// The service block stamped on records.
    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            name: self.service_name.clone(),
            version: self.service_version.clone(),
            host: self.host.clone(),
        }
    }
}
