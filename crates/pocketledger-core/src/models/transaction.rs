use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amount;

/// Whether money came in or went out. Categories carry the same type and
/// a transaction's type must match its category's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Some(EntryType::Income),
            "expense" => Some(EntryType::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub title: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub category: i64,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub category_color: Option<String>,
    #[serde(default)]
    pub category_icon: Option<String>,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Amount with the sign implied by its type
    pub fn signed_amount(&self) -> f64 {
        match self.kind {
            EntryType::Income => self.amount,
            EntryType::Expense => -self.amount,
        }
    }
}

/// Body for creating or replacing a transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    pub title: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub category: i64,
    pub description: String,
    pub date: NaiveDate,
}

/// Query filters for the transaction list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub kind: Option<EntryType>,
    pub category: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub page_size: Option<u32>,
}

impl TransactionFilter {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(kind) = self.kind {
            query.push(("type".to_string(), kind.as_str().to_string()));
        }
        if let Some(category) = self.category {
            query.push(("category".to_string(), category.to_string()));
        }
        if let Some(start) = self.start_date {
            query.push(("start_date".to_string(), start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            query.push(("end_date".to_string(), end.format("%Y-%m-%d").to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query.push(("search".to_string(), search.to_string()));
        }
        if let Some(size) = self.page_size {
            query.push(("page_size".to_string(), size.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction() {
        let json = r##"{"id": 3, "title": "Lunch", "amount": "12000.00", "type": "expense", "category": 5, "category_name": "Food", "category_color": "#EF4444", "category_icon": "utensils", "description": "", "date": "2024-03-15", "created_at": "2024-03-15T12:00:00Z", "updated_at": "2024-03-15T12:00:00Z"}"##;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, EntryType::Expense);
        assert_eq!(tx.amount, 12000.0);
        assert_eq!(tx.signed_amount(), -12000.0);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(tx.category_name.as_deref(), Some("Food"));
    }

    #[test]
    fn test_new_transaction_serializes_type_key() {
        let tx = NewTransaction {
            title: "Salary".into(),
            amount: 3_000_000.0,
            kind: EntryType::Income,
            category: 1,
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2024, 4, 25).unwrap(),
        };
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "income");
        assert_eq!(value["date"], "2024-04-25");
    }

    #[test]
    fn test_filter_to_query() {
        let filter = TransactionFilter {
            kind: Some(EntryType::Expense),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            search: Some("  ".into()),
            page_size: Some(5),
            ..Default::default()
        };
        assert_eq!(
            filter.to_query(),
            vec![
                ("type".to_string(), "expense".to_string()),
                ("start_date".to_string(), "2024-01-01".to_string()),
                ("page_size".to_string(), "5".to_string()),
            ]
        );
        assert!(TransactionFilter::default().to_query().is_empty());
    }

    #[test]
    fn test_entry_type_parse() {
        assert_eq!(EntryType::parse("Income"), Some(EntryType::Income));
        assert_eq!(EntryType::parse(" expense "), Some(EntryType::Expense));
        assert_eq!(EntryType::parse("transfer"), None);
    }
}
