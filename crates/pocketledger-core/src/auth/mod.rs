//! Authentication module for managing the user session and its credentials.
//!
//! This module provides:
//! - `SessionStore`: the observable login state, mirrored into durable storage
//! - `CredentialStorage`: where the access/refresh tokens and user live, with
//!   file, OS keychain and in-memory backends
//!
//! Token validity is never checked eagerly; an expired access token is only
//! discovered (and refreshed) by the gateway on the next API call.

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use session::{AuthState, Session, SessionStore};
pub use storage::{
    CredentialStorage, FileStorage, MemoryStorage, SharedStorage, StorageError, StorageKey,
};
