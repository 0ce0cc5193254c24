//! Account endpoints: login, registration, logout and profile.
//!
//! These only talk to the backend. Persisting what they return is the
//! `SessionStore`'s job.

use serde_json::{Map, Value};

use crate::models::{AuthPayload, LoginRequest, PasswordChange, RegisterRequest, UserRecord};

use super::{ApiClient, ApiError, ApiRequest};

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        self.post("/auth/login/", &LoginRequest { email, password })
            .await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, ApiError> {
        self.post("/auth/register/", request).await
    }

    /// Blacklist the refresh token on the backend
    pub async fn logout(&self, refresh: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "refresh": refresh });
        self.send_empty(&ApiRequest::post("/auth/logout/").json(&body)?)
            .await
    }

    pub async fn fetch_user(&self) -> Result<UserRecord, ApiError> {
        self.get("/auth/user/", Vec::new()).await
    }

    /// Update some user fields and return the full updated record
    pub async fn update_user(&self, partial: &Map<String, Value>) -> Result<UserRecord, ApiError> {
        self.patch("/auth/user/", partial).await
    }

    pub async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        self.send_empty(&ApiRequest::post("/auth/change-password/").json(change)?)
            .await
    }
}
