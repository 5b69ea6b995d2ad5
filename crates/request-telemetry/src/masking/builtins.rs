//! Built-in maskers for common sensitive field names.
//!
//! These are the only process-wide masking rules. They are constants: no
//! request can add to, remove or change them.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::constants::{
    EMAIL_PATTERN, EMAIL_VISIBLE_PREFIX, PASSWORD_MASK, PHONE_MASK_PREFIX, PHONE_MIN_LENGTH,
    PHONE_VISIBLE_SUFFIX,
};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EMAIL_PATTERN).expect("email pattern is a valid regex"));

/// A fixed masking strategy bound to a well-known field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinMasker {
    /// Replaces the whole value with [`PASSWORD_MASK`].
    Password,
    /// Partially reveals the local part of an email address.
    Email,
    /// Keeps only the last two characters of a phone number.
    Phone,
}

/// Field names (lowercase) bound to their built-in masker.
pub const BUILTIN_RULES: &[(&str, BuiltinMasker)] = &[
    ("password", BuiltinMasker::Password),
    ("email", BuiltinMasker::Email),
    ("mobileno", BuiltinMasker::Phone),
    ("phone", BuiltinMasker::Phone),
];

impl BuiltinMasker {
    /// Finds the built-in masker for a field name, ignoring case.
    pub fn for_key(key: &str) -> Option<Self> {
        BUILTIN_RULES
            .iter()
            .find(|(name, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, masker)| *masker)
    }

    /// Masks one field value.
    ///
    /// Passwords are masked whatever their type. Email and phone masking
    /// only apply to strings; other values are returned unchanged.
    pub fn apply(&self, value: &Value) -> Value {
        match (self, value) {
            (BuiltinMasker::Password, _) => Value::String(mask_password()),
            (BuiltinMasker::Email, Value::String(s)) => Value::String(mask_email(s)),
            (BuiltinMasker::Phone, Value::String(s)) => Value::String(mask_number(s)),
            _ => value.clone(),
        }
    }
}

/// The fixed password mask.
pub fn mask_password() -> String {
    PASSWORD_MASK.to_string()
}

/// Masks an email address.
///
/// Invalid addresses are returned unchanged. A local part longer than two
/// characters keeps its first three; a shorter one keeps its first. Every
/// hidden character becomes `X`. The domain is never masked.
///
/// ```
/// use request_telemetry::masking::mask_email;
///
/// assert_eq!(mask_email("abcdef@x.com"), "abcXXX@x.com");
/// assert_eq!(mask_email("ab@x.com"), "aX@x.com");
/// assert_eq!(mask_email("not-an-email"), "not-an-email");
/// ```
pub fn mask_email(email: &str) -> String {
    if !EMAIL_RE.is_match(email) {
        return email.to_string();
    }
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };

    let visible = if local.len() > 2 {
        EMAIL_VISIBLE_PREFIX
    } else {
        1
    };
    let kept: String = local.chars().take(visible).collect();
    let hidden = local.chars().count().saturating_sub(visible);

    format!("{}{}@{}", kept, "X".repeat(hidden), domain)
}

/// Masks a phone number with the default `X` prefix.
///
/// ```
/// use request_telemetry::masking::mask_number;
///
/// assert_eq!(mask_number("0123456789"), "XXX-XXX-XX89");
/// assert_eq!(mask_number("12345"), "12345");
/// ```
pub fn mask_number(number: &str) -> String {
    mask_number_with(number, None)
}

/// Masks a phone number, optionally replacing the `X` of the prefix with
/// another mask string.
///
/// Only values starting with `+` or `0` and at least ten characters long are
/// masked; everything else is returned unchanged.
pub fn mask_number_with(number: &str, mask: Option<&str>) -> String {
    let maskable = (number.starts_with('+') || number.starts_with('0'))
        && number.chars().count() >= PHONE_MIN_LENGTH;
    if !maskable {
        return number.to_string();
    }

    let prefix = match mask {
        Some(m) => PHONE_MASK_PREFIX.replace('X', m),
        None => PHONE_MASK_PREFIX.to_string(),
    };
    let chars: Vec<char> = number.chars().collect();
    let suffix: String = chars[chars.len() - PHONE_VISIBLE_SUFFIX..].iter().collect();

    format!("{}{}", prefix, suffix)
}
