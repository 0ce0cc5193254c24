use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{AuthPayload, PasswordChange, RegisterRequest, UserRecord};

use super::storage::{self, SharedStorage, StorageError, StorageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Start-up check not done yet
    Loading,
    Authenticated,
    Anonymous,
}

/// Snapshot of who is logged in.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<UserRecord>,
    pub is_authenticated: bool,
    pub loading: bool,
}

impl Session {
    fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
        }
    }

    fn anonymous() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: false,
        }
    }

    fn authenticated(user: UserRecord) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            loading: false,
        }
    }

    pub fn state(&self) -> AuthState {
        if self.is_authenticated {
            AuthState::Authenticated
        } else if self.loading {
            AuthState::Loading
        } else {
            AuthState::Anonymous
        }
    }
}

/// Single source of truth for the logged-in user.
///
/// Every state change is mirrored into the credential storage, so a new
/// process re-derives the same session from `init_from_storage` without
/// logging in again. Observers get updates through `subscribe`.
pub struct SessionStore {
    api: ApiClient,
    storage: SharedStorage,
    state: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    /// Create a store in the `Loading` state.
    ///
    /// The store hooks into the gateway so that a failed token refresh,
    /// which already cleared the storage, also drops the observable session.
    pub fn new(api: ApiClient) -> Self {
        let storage = Arc::clone(api.storage());
        let (tx, _rx) = watch::channel(Session::loading());
        let state = Arc::new(tx);

        let expired = Arc::clone(&state);
        let api = api.with_session_expired_hook(Arc::new(move || {
            info!("Session expired, login required");
            expired.send_replace(Session::anonymous());
        }));

        Self {
            api,
            storage,
            state,
        }
    }

    /// Create a store and immediately run the start-up check
    pub fn restore(api: ApiClient) -> Self {
        let store = Self::new(api);
        store.init_from_storage();
        store
    }

    /// Start-up check: authenticated when both a user and an access token
    /// are stored. The token is not validated here.
    pub fn init_from_storage(&self) {
        let has_token = match self.storage.get(StorageKey::AccessToken) {
            Ok(token) => token.is_some(),
            Err(err) => {
                warn!(error = %err, "Failed to read stored access token");
                false
            }
        };
        let user = if has_token { self.stored_user() } else { None };

        match user {
            Some(user) => {
                debug!(user_id = ?user.id(), "Restored session from storage");
                self.state.send_replace(Session::authenticated(user));
            }
            None => {
                self.state.send_replace(Session::anonymous());
            }
        }
    }

    fn stored_user(&self) -> Option<UserRecord> {
        match storage::get_json(self.storage.as_ref(), StorageKey::User) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Ignoring unreadable stored user");
                None
            }
        }
    }

    /// The gateway this store is wired to. Use it for every API call so
    /// session expiry is reflected here.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().state()
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.state.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    fn set_loading(&self, loading: bool) {
        self.state.send_if_modified(|session| {
            let changed = session.loading != loading;
            session.loading = loading;
            changed
        });
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        self.set_loading(true);
        let result = self.api.login(email, password).await;
        self.complete_sign_in(result)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, ApiError> {
        self.set_loading(true);
        let result = self.api.register(request).await;
        self.complete_sign_in(result)
    }

    fn complete_sign_in(
        &self,
        result: Result<AuthPayload, ApiError>,
    ) -> Result<AuthPayload, ApiError> {
        match result.and_then(|payload| {
            self.persist(&payload)?;
            Ok(payload)
        }) {
            Ok(payload) => {
                info!(user_id = ?payload.user.id(), "Signed in");
                self.state
                    .send_replace(Session::authenticated(payload.user.clone()));
                Ok(payload)
            }
            Err(err) => {
                debug!(error = %err, "Sign-in failed");
                self.set_loading(false);
                Err(err)
            }
        }
    }

    fn persist(&self, payload: &AuthPayload) -> Result<(), StorageError> {
        self.storage.set(StorageKey::AccessToken, &payload.access)?;
        self.storage.set(StorageKey::RefreshToken, &payload.refresh)?;
        storage::set_json(self.storage.as_ref(), StorageKey::User, &payload.user)
    }

    /// Sign out. The backend call is best effort: the local session is
    /// always cleared and this never fails.
    pub async fn logout(&self) {
        let refresh = match self.storage.get(StorageKey::RefreshToken) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Failed to read refresh token for logout");
                None
            }
        };

        if let Some(refresh) = refresh {
            if let Err(err) = self.api.logout(&refresh).await {
                warn!(error = %err, "Backend logout failed, clearing local session anyway");
            }
        }

        self.teardown();
    }

    /// Drop the local session without contacting the backend
    pub fn teardown(&self) {
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "Failed to clear stored credentials");
        }
        self.state.send_replace(Session::anonymous());
        info!("Signed out");
    }

    /// Merge `partial` into the current user record and persist it.
    /// Authentication flags are untouched; without a user this is a no-op.
    pub fn update_user(&self, partial: &Map<String, Value>) -> Result<(), StorageError> {
        let mut updated = None;
        self.state.send_if_modified(|session| match session.user.as_mut() {
            Some(user) => {
                user.merge(partial);
                updated = Some(user.clone());
                true
            }
            None => false,
        });

        match updated {
            Some(user) => storage::set_json(self.storage.as_ref(), StorageKey::User, &user),
            None => {
                debug!("No user to update");
                Ok(())
            }
        }
    }

    /// Fetch the user from the backend and fold it into the session
    pub async fn fetch_profile(&self) -> Result<UserRecord, ApiError> {
        let user = self.api.fetch_user().await?;
        self.update_user(user.fields())?;
        Ok(user)
    }

    /// Update profile fields on the backend, then mirror the result locally
    pub async fn update_profile(&self, partial: &Map<String, Value>) -> Result<UserRecord, ApiError> {
        let user = self.api.update_user(partial).await?;
        self.update_user(user.fields())?;
        Ok(user)
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        self.api.change_password(change).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;
    use serde_json::json;

    fn store_with(storage: SharedStorage) -> SessionStore {
        let api = ApiClient::new("http://127.0.0.1:9/api", storage).unwrap();
        SessionStore::new(api)
    }

    fn user(value: Value) -> UserRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_starts_loading() {
        let store = store_with(MemoryStorage::shared());
        assert_eq!(store.state(), AuthState::Loading);
        assert!(store.is_loading());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_init_with_user_and_token() {
        let storage = MemoryStorage::shared();
        storage.set(StorageKey::AccessToken, "acc").unwrap();
        storage.set(StorageKey::User, r#"{"id": 1, "email": "a@b.com"}"#).unwrap();

        let store = store_with(storage);
        store.init_from_storage();
        assert_eq!(store.state(), AuthState::Authenticated);
        assert_eq!(store.current_user().unwrap().email(), Some("a@b.com"));
        assert!(!store.is_loading());
    }

    #[test]
    fn test_init_requires_both_user_and_token() {
        let only_user = MemoryStorage::shared();
        only_user.set(StorageKey::User, r#"{"id": 1}"#).unwrap();
        let store = store_with(only_user);
        store.init_from_storage();
        assert_eq!(store.state(), AuthState::Anonymous);

        let only_token = MemoryStorage::shared();
        only_token.set(StorageKey::AccessToken, "acc").unwrap();
        let store = store_with(only_token);
        store.init_from_storage();
        assert_eq!(store.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_init_with_corrupt_user_is_anonymous() {
        let storage = MemoryStorage::shared();
        storage.set(StorageKey::AccessToken, "acc").unwrap();
        storage.set(StorageKey::User, "{broken").unwrap();
        let store = store_with(storage);
        store.init_from_storage();
        assert_eq!(store.state(), AuthState::Anonymous);
    }

    #[test]
    fn test_update_user_merges_and_persists() {
        let storage = MemoryStorage::shared();
        storage.set(StorageKey::AccessToken, "acc").unwrap();
        storage
            .set(StorageKey::User, r#"{"id": 1, "email": "a@b.com", "first_name": "A"}"#)
            .unwrap();
        let store = store_with(Arc::clone(&storage));
        store.init_from_storage();

        let partial = json!({"first_name": "X"});
        store.update_user(partial.as_object().unwrap()).unwrap();

        let expected = user(json!({"id": 1, "email": "a@b.com", "first_name": "X"}));
        assert_eq!(store.current_user(), Some(expected.clone()));
        assert!(store.is_authenticated());

        let persisted: UserRecord = storage::get_json(storage.as_ref(), StorageKey::User)
            .unwrap()
            .unwrap();
        assert_eq!(persisted, expected);
    }

    #[test]
    fn test_update_user_without_user_is_noop() {
        let storage = MemoryStorage::shared();
        let store = store_with(Arc::clone(&storage));
        store.init_from_storage();

        store.update_user(json!({"first_name": "X"}).as_object().unwrap()).unwrap();
        assert!(store.current_user().is_none());
        assert!(storage.get(StorageKey::User).unwrap().is_none());
    }

    #[test]
    fn test_teardown_clears_everything() {
        let storage = MemoryStorage::shared();
        storage.set(StorageKey::AccessToken, "acc").unwrap();
        storage.set(StorageKey::RefreshToken, "ref").unwrap();
        storage.set(StorageKey::User, r#"{"id": 1}"#).unwrap();
        let store = store_with(Arc::clone(&storage));
        store.init_from_storage();
        let mut rx = store.subscribe();

        store.teardown();
        assert_eq!(store.state(), AuthState::Anonymous);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_authenticated);
        for key in StorageKey::ALL {
            assert!(storage.get(key).unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_logout_without_refresh_token_skips_backend() {
        // Port 9 (discard) is never contacted: no refresh token is stored.
        let storage = MemoryStorage::shared();
        storage.set(StorageKey::AccessToken, "acc").unwrap();
        storage.set(StorageKey::User, r#"{"id": 1}"#).unwrap();
        let store = store_with(Arc::clone(&storage));
        store.init_from_storage();

        store.logout().await;
        assert!(!store.is_authenticated());
        assert!(storage.get(StorageKey::AccessToken).unwrap().is_none());
    }
}
