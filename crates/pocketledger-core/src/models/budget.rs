use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amount;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub name: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: f64,
    #[serde(default)]
    pub period: BudgetPeriod,
    /// Expense category the budget is limited to; `None` covers all expenses
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub category_color: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "amount::deserialize_or_zero")]
    pub spent_amount: f64,
    #[serde(default, deserialize_with = "amount::deserialize_or_zero")]
    pub remaining_amount: f64,
    #[serde(default)]
    pub usage_percentage: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Budget {
    pub fn is_over_budget(&self) -> bool {
        self.spent_amount > self.amount
    }

    /// How far spending exceeds the budget, if it does
    pub fn overspend(&self) -> Option<f64> {
        self.is_over_budget().then(|| self.spent_amount - self.amount)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Body for creating or replacing a budget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewBudget {
    pub name: String,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub category: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetFilter {
    pub is_active: Option<bool>,
}

impl BudgetFilter {
    pub fn active() -> Self {
        Self {
            is_active: Some(true),
        }
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        self.is_active
            .map(|a| vec![("is_active".to_string(), a.to_string())])
            .unwrap_or_default()
    }
}
