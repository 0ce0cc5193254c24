use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::auth::StorageError;
use crate::validation::FormErrors;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Session expired, please log in again: {0}")]
    SessionExpired(#[source] Box<ApiError>),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 => ApiError::Validation(FieldErrors::from_body(body)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(Self::truncate_body(body)),
            404 => ApiError::NotFound(Self::truncate_body(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::truncate_body(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    /// Field errors carried by a validation failure, if this is one
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// True when the session was terminated and the user must log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

/// Field-keyed validation messages returned by the backend on HTTP 400.
///
/// The backend reports either an object of `field -> message | [messages]`
/// or a bare message/list for errors not tied to a field. Nested objects
/// are flattened with dotted keys (`profile.currency`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Key the backend uses for errors that belong to no single field
    pub const NON_FIELD: &'static str = "non_field_errors";

    /// Keys that carry a general message rather than a field error
    const GENERAL_KEYS: [&'static str; 3] = [Self::NON_FIELD, "detail", "error"];

    pub fn from_body(body: &str) -> Self {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::general(ApiError::truncate_body(trimmed)),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let mut errors = Self::default();
        match value {
            Value::Object(map) => {
                for (key, value) in map {
                    errors.collect(key, value);
                }
            }
            other => errors.collect(Self::NON_FIELD, other),
        }
        errors
    }

    /// Errors holding a single message not tied to any field
    pub fn general(message: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(Self::NON_FIELD.to_string(), vec![message.into()]);
        Self(map)
    }

    fn collect(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(message) => self.push(key, message.clone()),
            Value::Array(items) => {
                for item in items {
                    self.collect(key, item);
                }
            }
            Value::Object(map) => {
                for (child, value) in map {
                    self.collect(&format!("{}.{}", key, child), value);
                }
            }
            other => self.push(key, other.to_string()),
        }
    }

    fn push(&mut self, key: &str, message: String) {
        self.0.entry(key.to_string()).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First message reported for a field
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Map backend errors onto a form's fields.
    ///
    /// Keys naming one of `fields` become field errors. General keys, and
    /// failing those any other unmatched key, become the general message.
    /// When nothing at all could be mapped, `fallback` is used.
    pub fn for_form(&self, fields: &[&str], fallback: &str) -> FormErrors {
        let mut form = FormErrors::new();
        let mut unmatched = None;

        for (key, messages) in &self.0 {
            let Some(message) = messages.first() else {
                continue;
            };
            if fields.contains(&key.as_str()) {
                form.insert(key.as_str(), message.clone());
            } else if Self::GENERAL_KEYS.contains(&key.as_str()) {
                form.set_general(message.clone());
            } else if unmatched.is_none() {
                unmatched = Some(format!("{}: {}", key, message));
            }
        }

        if form.general().is_none() {
            if let Some(message) = unmatched {
                form.set_general(message);
            } else if form.is_empty() {
                form.set_general(fallback);
            }
        }
        form
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no details provided");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(key, messages)| {
                if key == Self::NON_FIELD {
                    messages.join(" ")
                } else {
                    format!("{}: {}", key, messages.join(" "))
                }
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, "gone"),
            ApiError::NotFound(body) if body == "gone"
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, "tea"),
            ApiError::InvalidResponse(msg) if msg.contains("418")
        ));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(truncated.contains("truncated, 520 total bytes"));
    }

    #[test]
    fn test_field_errors_from_drf_object() {
        let body = r#"{"email": ["user with this email already exists."], "password": "Too short.", "non_field_errors": ["Passwords do not match."]}"#;
        let errors = FieldErrors::from_body(body);
        assert_eq!(errors.first("email"), Some("user with this email already exists."));
        assert_eq!(errors.first("password"), Some("Too short."));
        assert_eq!(errors.first(FieldErrors::NON_FIELD), Some("Passwords do not match."));
    }

    #[test]
    fn test_field_errors_nested_and_bare() {
        let nested = FieldErrors::from_body(r#"{"profile": {"currency": ["Invalid."]}}"#);
        assert_eq!(nested.first("profile.currency"), Some("Invalid."));

        let bare = FieldErrors::from_body(r#"["Something went wrong."]"#);
        assert_eq!(bare.first(FieldErrors::NON_FIELD), Some("Something went wrong."));

        let text = FieldErrors::from_body("Bad Request");
        assert_eq!(text.first(FieldErrors::NON_FIELD), Some("Bad Request"));

        assert!(FieldErrors::from_body("  ").is_empty());
    }

    #[test]
    fn test_for_form_maps_known_fields() {
        let errors = FieldErrors::from_body(r#"{"title": ["Required."], "amount": ["Must be positive."]}"#);
        let form = errors.for_form(&["title", "amount", "date"], "Save failed.");
        assert_eq!(form.get("title"), Some("Required."));
        assert_eq!(form.get("amount"), Some("Must be positive."));
        assert_eq!(form.general(), None);
    }

    #[test]
    fn test_for_form_general_and_fallback() {
        let errors = FieldErrors::from_body(r#"{"error": "Both passwords are required."}"#);
        let form = errors.for_form(&["current_password"], "Save failed.");
        assert_eq!(form.general(), Some("Both passwords are required."));

        let unmatched = FieldErrors::from_body(r#"{"month": ["Unknown field."]}"#);
        let form = unmatched.for_form(&["amount"], "Save failed.");
        assert_eq!(form.general(), Some("month: Unknown field."));

        let form = FieldErrors::default().for_form(&["amount"], "Save failed.");
        assert_eq!(form.general(), Some("Save failed."));
    }

    #[test]
    fn test_field_errors_display() {
        let errors = FieldErrors::from_body(r#"{"non_field_errors": ["Invalid credentials."], "email": ["Bad."]}"#);
        assert_eq!(errors.to_string(), "email: Bad.; Invalid credentials.");
    }
}
