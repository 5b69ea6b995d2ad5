//! Masking rule table.
//!
//! A [`MaskRegistry`] is a plain value owned by one request's scope. Rules a
//! handler installs never reach another request, and clearing them only
//! clears that request's table. The built-in maskers are consulted after the
//! installed rules and cannot be removed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::builtins::{BUILTIN_RULES, BuiltinMasker};
use crate::constants::DEFAULT_MASK_REPLACEMENT;

/// A field-name → replacement pair supplied by handler code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskRule {
    /// Field name to match, case-insensitively.
    pub key: String,
    /// Replacement value; the registry default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl MaskRule {
    /// Rule using the registry's default replacement.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Rule with an explicit replacement.
    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

impl From<&str> for MaskRule {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<(&str, &str)> for MaskRule {
    fn from((key, value): (&str, &str)) -> Self {
        Self::with_value(key, value)
    }
}

/// What to do with the value of a matched field.
#[derive(Debug, Clone, PartialEq)]
pub enum MaskAction {
    /// Replace the value wholesale with this string.
    Replace(String),
    /// Run a built-in masker on the value.
    Builtin(BuiltinMasker),
}

impl MaskAction {
    /// Produces the masked value.
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            MaskAction::Replace(replacement) => Value::String(replacement.clone()),
            MaskAction::Builtin(masker) => masker.apply(value),
        }
    }
}

/// Field-name → replacement table plus the fixed built-in maskers.
#[derive(Debug, Clone)]
pub struct MaskRegistry {
    /// Installed rules keyed by lowercase field name.
    rules: HashMap<String, String>,
    /// Replacement used for rules installed without a value.
    default_replacement: String,
}

impl Default for MaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskRegistry {
    /// Empty registry with the default replacement.
    pub fn new() -> Self {
        Self::with_default_replacement(DEFAULT_MASK_REPLACEMENT)
    }

    /// Empty registry with a custom default replacement.
    pub fn with_default_replacement(replacement: impl Into<String>) -> Self {
        Self {
            rules: HashMap::new(),
            default_replacement: replacement.into(),
        }
    }

    /// Installs or replaces the rule for `field`.
    pub fn set_rule(&mut self, field: &str, replacement: Option<&str>) {
        let replacement = replacement
            .map(str::to_string)
            .unwrap_or_else(|| self.default_replacement.clone());
        self.rules.insert(field.to_lowercase(), replacement);
    }

    /// Installs several rules at once.
    pub fn set_rules<I, R>(&mut self, rules: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<MaskRule>,
    {
        for rule in rules {
            let rule = rule.into();
            self.set_rule(&rule.key, rule.value.as_deref());
        }
    }

    /// Removes every installed rule. Built-ins stay in effect.
    pub fn clear_all(&mut self) {
        self.rules.clear();
    }

    /// The fixed built-in rules.
    pub fn builtins() -> &'static [(&'static str, BuiltinMasker)] {
        BUILTIN_RULES
    }

    /// Resolves the action for a field name. Installed rules take precedence
    /// over built-ins; unknown names resolve to None.
    pub fn lookup(&self, key: &str) -> Option<MaskAction> {
        if let Some(replacement) = self.rules.get(&key.to_lowercase()) {
            return Some(MaskAction::Replace(replacement.clone()));
        }
        BuiltinMasker::for_key(key).map(MaskAction::Builtin)
    }

    /// Installed rules as (lowercase key, replacement) pairs.
    pub(crate) fn installed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of installed rules, built-ins excluded.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are installed.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
