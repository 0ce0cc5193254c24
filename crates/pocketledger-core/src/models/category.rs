use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EntryType;

/// Default color assigned by the backend when none is given
pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub transaction_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_color() -> String {
    DEFAULT_CATEGORY_COLOR.to_string()
}

/// Body for creating or replacing a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub icon: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    pub kind: Option<EntryType>,
}

impl CategoryFilter {
    pub fn of(kind: EntryType) -> Self {
        Self { kind: Some(kind) }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        self.kind
            .map(|k| vec![("type".to_string(), k.as_str().to_string())])
            .unwrap_or_default()
    }
}

/// Response of the "create default categories" call
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultCategories {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub categories: Vec<Category>,
}
