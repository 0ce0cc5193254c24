//! Authenticated request gateway for the pocketledger REST API.
//!
//! Every call goes through `ApiClient::send`, which attaches the stored
//! access token and, when the backend answers 401, exchanges the refresh
//! token for a new access token and retries the call exactly once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{SharedStorage, StorageKey};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the backend API
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Refresh-token exchange endpoint. Called outside the retry machinery.
pub const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";

/// HTTP request timeout in seconds.
/// No client-side cancellation exists, so this bounds a hung call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Called after a failed refresh has cleared the stored session.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Description of one outbound call, kept so it can be re-issued on retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Which try of a logical request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptNumber {
    First,
    /// Re-issued once after a successful token refresh
    Retry,
}

/// A request paired with its attempt number.
///
/// The retry marker lives here rather than on the caller's `ApiRequest`,
/// so the same request value can be sent again as a fresh logical call.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    number: AttemptNumber,
    request: &'a ApiRequest,
}

impl<'a> Attempt<'a> {
    pub fn first(request: &'a ApiRequest) -> Self {
        Self {
            number: AttemptNumber::First,
            request,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            number: AttemptNumber::Retry,
            request: self.request,
        }
    }

    pub fn number(&self) -> AttemptNumber {
        self.number
    }

    pub fn request(&self) -> &'a ApiRequest {
        self.request
    }

    pub fn may_refresh(&self) -> bool {
        self.number == AttemptNumber::First
    }
}

/// API client for the pocketledger backend.
/// Clone is cheap - reqwest::Client and the storage are both shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    storage: SharedStorage,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new(base_url: &str, storage: SharedStorage) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            storage,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        storage: SharedStorage,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage,
            on_session_expired: None,
        })
    }

    /// Return a client sharing this one's connection pool and storage that
    /// calls `hook` whenever a failed refresh ends the session.
    pub fn with_session_expired_hook(&self, hook: SessionExpiredHook) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            storage: Arc::clone(&self.storage),
            on_session_expired: Some(hook),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.storage.get(StorageKey::AccessToken)? {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidRequest("stored access token is not a valid header value".into()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send a request, recovering once from an expired access token.
    ///
    /// On a 401 for the first attempt the refresh token is exchanged for a
    /// new access token and the request is re-issued. If no refresh token
    /// is stored the 401 is returned as is. If the exchange fails, the
    /// stored session is cleared, the session-expired hook fires and the
    /// refresh failure is returned as `ApiError::SessionExpired`.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let mut attempt = Attempt::first(request);

        loop {
            match self.dispatch(attempt).await {
                Err(ApiError::Unauthorized) if attempt.may_refresh() => {
                    attempt = attempt.retry();
                    self.recover_access_token().await?;
                }
                result => return result,
            }
        }
    }

    async fn dispatch(&self, attempt: Attempt<'_>) -> Result<Response, ApiError> {
        let request = attempt.request();
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(self.auth_headers()?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            attempt = ?attempt.number(),
            "Dispatching request"
        );
        let response = builder.send().await?;
        Self::check_response(response).await
    }

    async fn recover_access_token(&self) -> Result<(), ApiError> {
        let Some(refresh) = self.storage.get(StorageKey::RefreshToken)? else {
            debug!("Got 401 with no refresh token stored");
            return Err(ApiError::Unauthorized);
        };

        match self.exchange_refresh_token(&refresh).await {
            Ok(access) => {
                self.storage.set(StorageKey::AccessToken, &access)?;
                info!("Access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, ending session");
                self.terminate_session();
                Err(ApiError::SessionExpired(Box::new(err)))
            }
        }
    }

    async fn exchange_refresh_token(&self, refresh: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url(TOKEN_REFRESH_PATH))
            .json(&RefreshRequest { refresh })
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let body: RefreshResponse = Self::decode(response).await?;
        Ok(body.access)
    }

    fn terminate_session(&self) {
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "Failed to clear stored credentials");
        }
        if let Some(ref hook) = self.on_session_expired {
            hook();
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().path().to_string();
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", url, e)))
    }

    /// Send a request and parse its JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    /// Send a request whose response body is not needed
    pub async fn send_empty(&self, request: &ApiRequest) -> Result<(), ApiError> {
        self.send(request).await?;
        Ok(())
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::get(path).query(query)).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::post(path).json(body)?).await
    }

    pub(crate) async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::put(path).json(body)?).await
    }

    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::patch(path).json(body)?).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send_empty(&ApiRequest::delete(path)).await
    }
}
