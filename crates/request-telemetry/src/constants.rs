//! Constants and default values for the telemetry pipeline.
//!
//! Centralizes the wire-level constants (timestamp format, header names,
//! mask tokens) and configuration defaults so every module agrees on them.

/// Timestamp format of every emitted record (`YYYY-MM-DD HH:mm:ss`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header carrying the upstream session identifier.
pub const SESSION_HEADER: &str = "x-transaction-id";

/// Header carrying the caller's location hint.
pub const LOCATION_HEADER: &str = "x-location";

/// Header carrying the caller's user agent.
pub const USER_AGENT_HEADER: &str = "user-agent";

/// Header carrying the original client address behind proxies.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Service name used when none is configured.
pub const DEFAULT_SERVICE_NAME: &str = "Service-HTTP";

/// Service version used when none is configured.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0.0";

/// Replacement used by a masking rule installed without an explicit value.
pub const DEFAULT_MASK_REPLACEMENT: &str = "****";

/// Fixed token replacing any password value, regardless of its length.
pub const PASSWORD_MASK: &str = "********";

/// Prefix replacing all but the last two characters of a phone number.
pub const PHONE_MASK_PREFIX: &str = "XXX-XXX-XX";

/// Minimum length for a value to be treated as a maskable phone number.
pub const PHONE_MIN_LENGTH: usize = 10;

/// Number of trailing characters a masked phone number keeps.
pub const PHONE_VISIBLE_SUFFIX: usize = 2;

/// Characters of an email local part kept visible when it is long enough.
pub const EMAIL_VISIBLE_PREFIX: usize = 3;

/// Pattern an email must match before it is masked.
pub const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,4}$";

/// `tracing` target used by [`TracingSink`](crate::TracingSink).
pub const TRACING_TARGET: &str = "request_telemetry";

/// `resultDesc` stamped on a summary finished by a dropped guard.
pub const ABORTED_RESULT_DESC: &str = "aborted";
