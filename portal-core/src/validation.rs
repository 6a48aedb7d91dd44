use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD: &str = "non_field_errors";

pub const DESCRIPTION_MAX_CHARS: usize = 2000;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("phone pattern"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// Field-scoped error messages, keyed by the wire name of the field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Drops the error of one field; returns whether there was one.
    pub fn clear(&mut self, field: &str) -> bool {
        self.0.remove(field).is_some()
    }

    pub fn clear_all(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Later messages win for the same field.
    pub fn merge(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    /// Reads a field-keyed rejection body. Values may be a string, a list of
    /// strings or a nested object; `detail` is folded into the non-field key.
    pub fn from_server_body(body: &serde_json::Value) -> Option<Self> {
        let obj = body.as_object()?;
        let mut out = Self::new();
        for (key, value) in obj {
            let Some(message) = flatten_message(value) else {
                continue;
            };
            let field = if key == "detail" { NON_FIELD } else { key.as_str() };
            out.insert(field, message);
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn flatten_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<String> = items.iter().filter_map(flatten_message).collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join(" "))
            }
        }
        serde_json::Value::Object(map) => {
            let msgs: Vec<String> = map.values().filter_map(flatten_message).collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join(" "))
            }
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Records `message` under `field` when `value` is blank.
pub fn require(errors: &mut FieldErrors, field: &str, value: &str, message: &str) {
    if is_blank(value) {
        errors.insert(field, message);
    }
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_body_lists_are_joined_and_detail_is_non_field() {
        let body = serde_json::json!({
            "email": ["notification email with this email already exists."],
            "detail": "Bad request",
            "ignored": null
        });
        let errors = FieldErrors::from_server_body(&body).expect("errors");
        assert_eq!(
            errors.get("email"),
            Some("notification email with this email already exists.")
        );
        assert_eq!(errors.get(NON_FIELD), Some("Bad request"));
        assert!(!errors.contains("ignored"));
    }

    #[test]
    fn server_body_that_is_not_an_object_is_not_field_errors() {
        assert!(FieldErrors::from_server_body(&serde_json::json!(["x"])).is_none());
        assert!(FieldErrors::from_server_body(&serde_json::json!({})).is_none());
    }

    #[test]
    fn phone_rule_matches_backend_pattern() {
        assert!(is_valid_phone("+919876543210"));
        assert!(is_valid_phone("123456789"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("98-7654-3210"));
    }

    #[test]
    fn email_rule_requires_domain_with_dot() {
        assert!(is_valid_email("safety@example.com"));
        assert!(!is_valid_email("safety@example"));
        assert!(!is_valid_email("with space@example.com"));
    }

    #[test]
    fn clearing_one_field_keeps_the_rest() {
        let mut errors = FieldErrors::new();
        errors.insert("name", "Name is required");
        errors.insert("address", "Address is required");
        assert!(errors.clear("name"));
        assert!(!errors.clear("name"));
        assert_eq!(errors.len(), 1);
    }
}
