use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The signed-in user as the backend describes it.
///
/// The record is passed through untouched; accessors exist for display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(Value::as_i64)
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    pub fn username(&self) -> Option<&str> {
        self.str_field("username")
    }

    /// Currency preference from the nested profile, if any
    pub fn currency(&self) -> Option<&str> {
        self.0
            .get("profile")
            .and_then(|p| p.get("currency"))
            .and_then(Value::as_str)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// "First Last" when names are set, else the username, else the email.
    pub fn display_name(&self) -> String {
        let full: Vec<&str> = ["first_name", "last_name"]
            .iter()
            .filter_map(|k| self.str_field(k))
            .collect();
        if !full.is_empty() {
            return full.join(" ");
        }
        self.username()
            .or_else(|| self.email())
            .unwrap_or("unknown user")
            .to_string()
    }

    /// Overwrite the given top-level fields, keeping every other field.
    pub fn merge(&mut self, partial: &Map<String, Value>) {
        for (key, value) in partial {
            self.0.insert(key.clone(), value.clone());
        }
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Access + refresh token pair issued on login, register or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Response body of the login and register endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub user: UserRecord,
    pub access: String,
    pub refresh: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthPayload {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}
