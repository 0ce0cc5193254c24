//! Data models for pocketledger entities.
//!
//! This module contains the data structures exchanged with the backend:
//!
//! - `UserRecord`, `AuthPayload`, `TokenPair`: identity and credentials
//! - `Transaction`, `Category`: income/expense entries and their grouping
//! - `Budget`: spending limits over a date range
//! - `TransactionStats`: aggregate totals per category and month

pub mod budget;
pub mod category;
pub mod stats;
pub mod transaction;
pub mod user;

pub use budget::{Budget, BudgetFilter, BudgetPeriod, NewBudget};
pub use category::{Category, CategoryFilter, DefaultCategories, NewCategory};
pub use stats::{CategoryStat, MonthlyStat, StatsRange, TransactionStats};
pub use transaction::{EntryType, NewTransaction, Transaction, TransactionFilter};
pub use user::{AuthPayload, LoginRequest, PasswordChange, RegisterRequest, TokenPair, UserRecord};

use serde::{Deserialize, Deserializer};

/// List endpoints answer with either a bare array or a paginated envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ListResponse<T> {
    Paginated { results: Vec<T> },
    Plain(Vec<T>),
}

impl<T> ListResponse<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            ListResponse::Paginated { results } => results,
            ListResponse::Plain(items) => items,
        }
    }
}

/// Decimal amounts are serialized by the backend as strings ("1200.00")
/// but numbers are accepted too.
pub(crate) mod amount {
    use super::*;
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    fn parse<E: Error>(raw: Raw) -> Result<f64, E> {
        match raw {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid decimal amount: {:?}", s))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        parse(Raw::deserialize(d)?)
    }

    /// Null and missing amounts count as zero
    pub fn deserialize_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        match Option::<Raw>::deserialize(d)? {
            Some(raw) => parse(raw),
            None => Ok(0.0),
        }
    }
}
