use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{amount, EntryType};

/// Totals for a date range as computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionStats {
    #[serde(deserialize_with = "amount::deserialize_or_zero")]
    pub total_income: f64,
    #[serde(deserialize_with = "amount::deserialize_or_zero")]
    pub total_expense: f64,
    #[serde(deserialize_with = "amount::deserialize_or_zero")]
    pub balance: f64,
    #[serde(default)]
    pub transaction_count: u32,
    #[serde(default)]
    pub category_stats: Vec<CategoryStat>,
    #[serde(default)]
    pub monthly_stats: Vec<MonthlyStat>,
}

/// Per-category total; the backend keeps its ORM-style key names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStat {
    #[serde(rename = "category__name")]
    pub name: String,
    #[serde(rename = "category__color", default)]
    pub color: Option<String>,
    #[serde(rename = "category__type")]
    pub kind: EntryType,
    #[serde(default, deserialize_with = "amount::deserialize_or_zero")]
    pub total: f64,
    #[serde(default)]
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStat {
    /// Month as "YYYY-MM"
    pub month: String,
    #[serde(default, deserialize_with = "amount::deserialize_or_zero")]
    pub income: f64,
    #[serde(default, deserialize_with = "amount::deserialize_or_zero")]
    pub expense: f64,
    #[serde(default, deserialize_with = "amount::deserialize_or_zero")]
    pub balance: f64,
}

/// Date range for the stats call. Without both bounds the backend
/// reports the current month to date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl StatsRange {
    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => vec![
                ("start_date".to_string(), start.format("%Y-%m-%d").to_string()),
                ("end_date".to_string(), end.format("%Y-%m-%d").to_string()),
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stats() {
        let json = r##"{
            "total_income": "3000000.00",
            "total_expense": "1250000.00",
            "balance": "1750000.00",
            "transaction_count": 14,
            "category_stats": [
                {"category__name": "Salary", "category__color": "#10B981", "category__type": "income", "total": "3000000.00", "count": 1},
                {"category__name": "Food", "category__color": "#EF4444", "category__type": "expense", "total": 450000, "count": 9}
            ],
            "monthly_stats": [
                {"month": "2024-03", "income": "3000000.00", "expense": 0, "balance": 3000000}
            ]
        }"##;
        let stats: TransactionStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_income, 3_000_000.0);
        assert_eq!(stats.balance, 1_750_000.0);
        assert_eq!(stats.category_stats.len(), 2);
        assert_eq!(stats.category_stats[1].kind, EntryType::Expense);
        assert_eq!(stats.category_stats[1].total, 450_000.0);
        assert_eq!(stats.monthly_stats[0].expense, 0.0);
    }

    #[test]
    fn test_stats_range_requires_both_bounds() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(StatsRange::between(start, end).to_query().len(), 2);

        let half = StatsRange {
            start_date: Some(start),
            end_date: None,
        };
        assert!(half.to_query().is_empty());
    }
}
