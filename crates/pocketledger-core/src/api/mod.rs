//! REST API client module for the pocketledger backend.
//!
//! This module provides the `ApiClient` gateway for communicating with
//! the backend to manage accounts, transactions, categories and budgets.
//!
//! The API uses JWT bearer authentication: a short-lived access token on
//! every call, renewed transparently from a longer-lived refresh token.

pub mod auth;
pub mod client;
pub mod error;
pub mod finance;

pub use client::{
    ApiClient, ApiRequest, Attempt, AttemptNumber, SessionExpiredHook, DEFAULT_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, TOKEN_REFRESH_PATH,
};
pub use error::{ApiError, FieldErrors};
