//! Recursive masking of JSON payloads.
//!
//! The [`Redactor`] walks a borrowed value depth-first and builds a masked
//! copy. The input is never modified.
//!
//! - **Pre-computed lookups**: rule names are lowercased once at construction
//! - **Change tracking**: untouched subtrees are cloned as a whole instead of
//!   being rebuilt node by node
//! - **Wholesale replacement**: a matched key's value is masked as a unit and
//!   never descended into

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::masking::{BUILTIN_RULES, MaskAction, MaskRegistry};

/// Applies a snapshot of masking rules to payloads.
#[derive(Debug, Clone)]
pub struct Redactor {
    /// Lowercase field name → action, installed rules overriding built-ins.
    actions: HashMap<String, MaskAction>,
}

impl Redactor {
    /// Snapshots the registry's installed rules and the built-ins.
    pub fn new(registry: &MaskRegistry) -> Self {
        let mut actions: HashMap<String, MaskAction> = BUILTIN_RULES
            .iter()
            .map(|(name, masker)| (name.to_string(), MaskAction::Builtin(*masker)))
            .collect();
        for (key, replacement) in registry.installed() {
            actions.insert(key.to_string(), MaskAction::Replace(replacement.to_string()));
        }
        Self { actions }
    }

    /// Redactor that only knows the built-in maskers.
    pub fn builtins() -> Self {
        Self::new(&MaskRegistry::new())
    }

    /// Returns a masked copy of `value`.
    pub fn redact(&self, value: &Value) -> Value {
        self.redact_internal(value).unwrap_or_else(|| value.clone())
    }

    /// Masks an optional payload; an absent payload stays absent.
    pub fn redact_opt(&self, value: Option<&Value>) -> Option<Value> {
        value.map(|v| self.redact(v))
    }

    /// Returns a masked copy of a map.
    pub fn redact_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        match self.redact_object(map) {
            Some(Value::Object(redacted)) => redacted,
            _ => map.clone(),
        }
    }

    fn action_for(&self, key: &str) -> Option<&MaskAction> {
        if let Some(action) = self.actions.get(key) {
            return Some(action);
        }
        self.actions.get(&key.to_lowercase())
    }

    /// Returns None when nothing below `value` needed masking.
    fn redact_internal(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Object(map) => self.redact_object(map),
            Value::Array(items) => {
                let mut redacted = Vec::with_capacity(items.len());
                let mut any_changed = false;

                for item in items {
                    match self.redact_internal(item) {
                        Some(masked) => {
                            redacted.push(masked);
                            any_changed = true;
                        }
                        None => redacted.push(item.clone()),
                    }
                }

                any_changed.then_some(Value::Array(redacted))
            }
            _ => None,
        }
    }

    fn redact_object(&self, map: &Map<String, Value>) -> Option<Value> {
        let mut redacted = Map::with_capacity(map.len());
        let mut any_changed = false;

        for (key, val) in map {
            if let Some(action) = self.action_for(key) {
                let masked = action.apply(val);
                any_changed |= masked != *val;
                redacted.insert(key.clone(), masked);
                continue;
            }

            match self.redact_internal(val) {
                Some(masked) => {
                    redacted.insert(key.clone(), masked);
                    any_changed = true;
                }
                None => {
                    redacted.insert(key.clone(), val.clone());
                }
            }
        }

        any_changed.then_some(Value::Object(redacted))
    }
}

/// Masks `value` with the rules of `registry` plus the built-ins.
pub fn redact_value(value: &Value, registry: &MaskRegistry) -> Value {
    Redactor::new(registry).redact(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_applied_recursively() {
        let input = json!({
            "user": {
                "name": "somchai",
                "Email": "somchai@mail.com",
                "contact": {"mobileNo": "0812345678"}
            },
            "PASSWORD": "hunter2"
        });
        let redacted = Redactor::builtins().redact(&input);

        assert_eq!(redacted["user"]["name"], "somchai");
        assert_eq!(redacted["user"]["Email"], "somXXXX@mail.com");
        assert_eq!(redacted["user"]["contact"]["mobileNo"], "XXX-XXX-XX78");
        assert_eq!(redacted["PASSWORD"], "********");
    }

    #[test]
    fn test_installed_rule_replaces_wholesale() {
        let mut registry = MaskRegistry::new();
        registry.set_rule("address", Some("[hidden]"));
        let input = json!({"address": {"line1": "1 Main St", "password": "x"}});

        let redacted = redact_value(&input, &registry);
        assert_eq!(redacted["address"], "[hidden]");
    }

    #[test]
    fn test_arrays_mapped_element_wise() {
        let input = json!([
            {"password": "a"},
            "password",
            42,
            [{"phone": "+66812345678"}]
        ]);
        let redacted = Redactor::builtins().redact(&input);

        assert_eq!(redacted[0]["password"], "********");
        assert_eq!(redacted[1], "password");
        assert_eq!(redacted[2], 42);
        assert_eq!(redacted[3][0]["phone"], "XXX-XXX-XX78");
    }

    #[test]
    fn test_input_not_mutated() {
        let mut registry = MaskRegistry::new();
        registry.set_rule("secret", None);
        let input = json!({"secret": "s", "password": "p", "list": [{"email": "abcdef@x.com"}]});
        let saved = input.clone();

        let redacted = redact_value(&input, &registry);
        assert_eq!(input, saved);
        assert_ne!(redacted, saved);
    }

    #[test]
    fn test_absent_payload_passes_through() {
        assert_eq!(Redactor::builtins().redact_opt(None), None);
    }

    #[test]
    fn test_primitives_unchanged() {
        let redactor = Redactor::builtins();
        assert_eq!(redactor.redact(&json!(42)), json!(42));
        assert_eq!(redactor.redact(&json!("password")), json!("password"));
        assert_eq!(redactor.redact(&json!(null)), json!(null));
    }

    #[test]
    fn test_redact_map() {
        let mut map = Map::new();
        map.insert("Password".into(), json!("p"));
        map.insert("id".into(), json!(1));
        let redacted = Redactor::builtins().redact_map(&map);
        assert_eq!(redacted["Password"], "********");
        assert_eq!(redacted["id"], 1);
    }
}
