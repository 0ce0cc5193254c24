//! pocketledger core library.
//!
//! Client-side plumbing for the pocketledger personal finance backend:
//!
//! - `api`: the authenticated request gateway (`ApiClient`) with
//!   refresh-once-on-401 recovery, plus typed finance and auth endpoints
//! - `auth`: the `SessionStore` and durable credential storage backends
//! - `models`: transactions, categories, budgets, statistics, user records
//! - `validation`: client-side form checks run before any network call
//! - `dashboard`: aggregation used by the dashboard and budget views
//! - `config`: persisted application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod utils;
pub mod validation;

pub use api::{ApiClient, ApiError, ApiRequest, FieldErrors};
pub use auth::{AuthState, CredentialStorage, Session, SessionStore, StorageKey};
pub use config::Config;
