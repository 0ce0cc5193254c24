//! Utility functions for formatting amounts, dates and labels.

pub mod format;

pub use format::{format_currency, format_percentage, format_short_date, group_thousands, truncate_string};
