//! Dashboard and budget overview aggregation.
//!
//! The dashboard shows this month's totals, an expense breakdown by
//! category and the most recent transactions.

use tracing::debug;

use crate::api::{ApiClient, ApiError};
use crate::models::{Budget, EntryType, StatsRange, Transaction, TransactionFilter, TransactionStats};

/// Number of recent transactions shown on the dashboard
pub const RECENT_TRANSACTION_COUNT: usize = 5;

/// Maximum number of slices in the expense breakdown
pub const MAX_CHART_SLICES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    /// `None` when the backend has no statistics yet
    pub stats: Option<TransactionStats>,
    pub recent: Vec<Transaction>,
}

impl Dashboard {
    pub fn is_empty(&self) -> bool {
        self.stats.is_none() && self.recent.is_empty()
    }

    pub fn expense_breakdown(&self) -> Vec<ChartSlice> {
        self.stats
            .as_ref()
            .map(|s| expense_breakdown(s, MAX_CHART_SLICES))
            .unwrap_or_default()
    }
}

/// Fetch current-month statistics and the latest transactions concurrently.
/// A 404 from either call yields an empty section instead of an error.
pub async fn load_dashboard(api: &ApiClient) -> Result<Dashboard, ApiError> {
    let recent_filter = TransactionFilter {
        page_size: Some(RECENT_TRANSACTION_COUNT as u32),
        ..Default::default()
    };
    let range = StatsRange::default();

    let (stats, recent) = futures::join!(
        api.fetch_stats(&range),
        api.list_transactions(&recent_filter)
    );

    let stats = match stats {
        Ok(stats) => Some(stats),
        Err(err) if err.is_not_found() => {
            debug!("No statistics available yet");
            None
        }
        Err(err) => return Err(err),
    };
    let mut recent = match recent {
        Ok(recent) => recent,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err),
    };
    recent.truncate(RECENT_TRANSACTION_COUNT);

    Ok(Dashboard { stats, recent })
}

/// One slice of the expense pie chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlice {
    pub name: String,
    pub value: f64,
    pub color: Option<String>,
    /// Share of total expense, 0-100
    pub percentage: f64,
}

/// Expense categories with a positive total, largest first, at most `limit`.
pub fn expense_breakdown(stats: &TransactionStats, limit: usize) -> Vec<ChartSlice> {
    let mut slices: Vec<ChartSlice> = stats
        .category_stats
        .iter()
        .filter(|c| c.kind == EntryType::Expense && c.total > 0.0)
        .map(|c| ChartSlice {
            name: c.name.clone(),
            value: c.total,
            color: c.color.clone(),
            percentage: if stats.total_expense > 0.0 {
                c.total / stats.total_expense * 100.0
            } else {
                0.0
            },
        })
        .collect();

    slices.sort_by(|a, b| b.value.total_cmp(&a.value));
    slices.truncate(limit);
    slices
}

/// Totals across a set of budgets
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetOverview {
    pub total_budget: f64,
    pub total_spent: f64,
    pub over_budget_count: usize,
}

impl BudgetOverview {
    pub fn from_budgets(budgets: &[Budget]) -> Self {
        budgets.iter().fold(Self::default(), |mut acc, b| {
            acc.total_budget += b.amount;
            acc.total_spent += b.spent_amount;
            if b.is_over_budget() {
                acc.over_budget_count += 1;
            }
            acc
        })
    }

    pub fn remaining(&self) -> f64 {
        self.total_budget - self.total_spent
    }

    /// How far total spending exceeds the total budget, if it does
    pub fn overspend(&self) -> Option<f64> {
        (self.total_spent > self.total_budget).then(|| self.total_spent - self.total_budget)
    }

    pub fn usage_percentage(&self) -> f64 {
        if self.total_budget > 0.0 {
            self.total_spent / self.total_budget * 100.0
        } else {
            0.0
        }
    }
}
