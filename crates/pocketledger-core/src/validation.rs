//! Client-side form validation.
//!
//! Each form is checked before any network call. A valid form turns into
//! the request body the backend expects; an invalid one yields
//! `FormErrors` keyed by form field.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::models::{
    BudgetPeriod, EntryType, NewBudget, NewCategory, NewTransaction, PasswordChange,
    RegisterRequest,
};

const MIN_USERNAME_LEN: usize = 2;
const MIN_PASSWORD_LEN: usize = 8;
const MIN_CATEGORY_NAME_LEN: usize = 2;
const MAX_CATEGORY_NAME_LEN: usize = 50;
const MAX_CATEGORY_DESCRIPTION_LEN: usize = 200;
const MAX_BUDGET_AMOUNT: u64 = 999_999_999;

/// Per-field messages plus an optional message for the whole form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, String>,
    general: Option<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field error. The first message for a field wins.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn set_general(&mut self, message: impl Into<String>) {
        self.general = Some(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn general(&self) -> Option<&str> {
        self.general.as_deref()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.general.is_none()
    }

    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        if let Some(ref general) = self.general {
            parts.push(general.clone());
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for FormErrors {}

/// Loose email check: some text, an `@`, then a domain with an inner dot.
pub fn looks_like_email(email: &str) -> bool {
    email.split_whitespace().any(|word| {
        word.match_indices('@').any(|(at, _)| {
            let domain = &word[at + 1..];
            at > 0
                && domain
                    .match_indices('.')
                    .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
        })
    })
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse a "YYYY-MM-DD" date, ignoring surrounding whitespace
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Digits with optional `,`, `_` or whitespace grouping. Signs, decimals
/// and exponents are rejected.
fn parse_whole_amount(raw: &str) -> Option<u64> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// First and last day of a "YYYY-MM" month
pub fn month_bounds(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d").ok()?;
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

// ============================================================================
// Account forms
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.email.trim().is_empty() {
            errors.insert("email", "Please enter your email.");
        }
        if self.password.is_empty() {
            errors.insert("password", "Please enter your password.");
        }
        errors.finish(|| ())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<RegisterRequest, FormErrors> {
        let mut errors = FormErrors::new();

        if self.email.trim().is_empty() {
            errors.insert("email", "Please enter your email.");
        } else if !looks_like_email(&self.email) {
            errors.insert("email", "Please enter a valid email address.");
        }

        if self.username.trim().is_empty() {
            errors.insert("username", "Please enter a username.");
        } else if self.username.chars().count() < MIN_USERNAME_LEN {
            errors.insert("username", "Username must be at least 2 characters.");
        }

        if self.password.trim().is_empty() {
            errors.insert("password", "Please enter a password.");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert("password", "Password must be at least 8 characters.");
        }

        if self.password_confirm.trim().is_empty() {
            errors.insert("password_confirm", "Please confirm your password.");
        } else if self.password != self.password_confirm {
            errors.insert("password_confirm", "Passwords do not match.");
        }

        errors.finish(|| RegisterRequest {
            email: self.email.trim().to_string(),
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            password_confirm: self.password_confirm.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<PasswordChange, FormErrors> {
        let mut errors = FormErrors::new();

        if self.current_password.is_empty() {
            errors.insert("current_password", "Please enter your current password.");
        }
        if self.new_password.is_empty() {
            errors.insert("new_password", "Please enter a new password.");
        } else if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert("new_password", "New password must be at least 8 characters.");
        }
        if self.new_password != self.confirm_password {
            errors.insert("confirm_password", "New passwords do not match.");
        }

        errors.finish(|| PasswordChange {
            current_password: self.current_password.clone(),
            new_password: self.new_password.clone(),
        })
    }
}

// ============================================================================
// Finance forms
// ============================================================================

#[derive(Debug, Clone)]
pub struct TransactionForm {
    pub title: String,
    pub amount: String,
    pub kind: EntryType,
    pub category: Option<i64>,
    pub date: String,
    pub description: String,
}

impl TransactionForm {
    pub fn validate(&self) -> Result<NewTransaction, FormErrors> {
        let mut errors = FormErrors::new();

        if self.title.trim().is_empty() {
            errors.insert("title", "Please enter a title.");
        }

        let amount = self.amount.trim();
        let parsed_amount = amount.parse::<f64>().ok().filter(|a| a.is_finite());
        if amount.is_empty() {
            errors.insert("amount", "Please enter an amount.");
        } else if !parsed_amount.is_some_and(|a| a > 0.0) {
            errors.insert("amount", "Please enter a valid amount.");
        }

        if self.category.is_none() {
            errors.insert("category", "Please select a category.");
        }

        let date = parse_date(&self.date);
        if self.date.trim().is_empty() {
            errors.insert("date", "Please select a date.");
        } else if date.is_none() {
            errors.insert("date", "Dates must look like YYYY-MM-DD.");
        }

        match (errors.is_empty(), parsed_amount, self.category, date) {
            (true, Some(amount), Some(category), Some(date)) => Ok(NewTransaction {
                title: self.title.trim().to_string(),
                amount,
                kind: self.kind,
                category,
                description: self.description.trim().to_string(),
                date,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
    pub kind: Option<EntryType>,
    pub color: String,
    pub icon: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<NewCategory, FormErrors> {
        let mut errors = FormErrors::new();

        let name = self.name.trim();
        let name_len = name.chars().count();
        if name.is_empty() {
            errors.insert("name", "Please enter a category name.");
        } else if name_len < MIN_CATEGORY_NAME_LEN {
            errors.insert("name", "Category name must be at least 2 characters.");
        } else if name_len > MAX_CATEGORY_NAME_LEN {
            errors.insert("name", "Category name must be at most 50 characters.");
        }

        if self.description.chars().count() > MAX_CATEGORY_DESCRIPTION_LEN {
            errors.insert("description", "Description must be at most 200 characters.");
        }

        if self.kind.is_none() {
            errors.insert("type", "Please select a category type.");
        }

        if self.color.trim().is_empty() {
            errors.insert("color", "Please choose a color.");
        } else if !is_hex_color(self.color.trim()) {
            errors.insert("color", "Colors must look like #RRGGBB.");
        }

        match (errors.is_empty(), self.kind) {
            (true, Some(kind)) => Ok(NewCategory {
                name: name.to_string(),
                kind,
                color: self.color.trim().to_string(),
                icon: self.icon.trim().to_string(),
                description: self.description.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetForm {
    /// Optional label; defaults to "Budget YYYY-MM"
    pub name: String,
    pub category: Option<i64>,
    /// Whole amount; `,`, `_` and spaces may group digits ("1,000,000")
    pub amount: String,
    /// Month as "YYYY-MM"
    pub month: String,
}

impl BudgetForm {
    pub fn validate(&self) -> Result<NewBudget, FormErrors> {
        let mut errors = FormErrors::new();

        if self.category.is_none() {
            errors.insert("category", "Please select a category.");
        }

        let amount = parse_whole_amount(&self.amount);
        if self.amount.trim().is_empty() {
            errors.insert("amount", "Please enter a budget amount.");
        } else {
            match amount {
                None | Some(0) => errors.insert("amount", "Please enter a valid amount."),
                Some(a) if a > MAX_BUDGET_AMOUNT => {
                    errors.insert("amount", "Budget amount is too large.")
                }
                Some(_) => {}
            }
        }

        let bounds = month_bounds(&self.month);
        if self.month.trim().is_empty() {
            errors.insert("month", "Please select a budget month.");
        } else if bounds.is_none() {
            errors.insert("month", "Months must look like YYYY-MM.");
        }

        match (errors.is_empty(), amount, bounds) {
            (true, Some(amount), Some((start_date, end_date))) => {
                let name = match self.name.trim() {
                    "" => format!("Budget {}", self.month.trim()),
                    name => name.to_string(),
                };
                Ok(NewBudget {
                    name,
                    amount: amount as f64,
                    period: BudgetPeriod::Monthly,
                    category: self.category,
                    start_date,
                    end_date,
                    is_active: true,
                })
            }
            _ => Err(errors),
        }
    }
}
