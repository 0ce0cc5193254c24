use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pocketledger_core::auth::{MemoryStorage, SharedStorage, StorageKey};
use pocketledger_core::models::TransactionFilter;
use pocketledger_core::{ApiClient, ApiError, ApiRequest};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH: &str = "/api/auth/token/refresh/";

fn client(server: &MockServer, storage: &SharedStorage) -> ApiClient {
    ApiClient::new(&format!("{}/api", server.uri()), Arc::clone(storage)).unwrap()
}

fn storage_with(access: Option<&str>, refresh: Option<&str>) -> SharedStorage {
    let storage = MemoryStorage::shared();
    if let Some(access) = access {
        storage.set(StorageKey::AccessToken, access).unwrap();
    }
    if let Some(refresh) = refresh {
        storage.set(StorageKey::RefreshToken, refresh).unwrap();
    }
    storage.set(StorageKey::User, r#"{"id": 1}"#).unwrap();
    storage
}

async fn refresh_never_called(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "unused"})))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stored_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/transactions/"))
        .and(header("authorization", "Bearer acc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    refresh_never_called(&server).await;

    let storage = storage_with(Some("acc-1"), Some("ref-1"));
    let api = client(&server, &storage);

    let transactions = api.list_transactions(&TransactionFilter::default()).await.unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn test_anonymous_request_has_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 7, "email": "a@b.com"},
            "access": "acc",
            "refresh": "ref"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = MemoryStorage::shared();
    let api = client(&server, &storage);
    let payload = api.login("a@b.com", "secret").await.unwrap();
    assert_eq!(payload.user.id(), Some(7));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert_eq!(
        requests[0].body_json::<Value>().unwrap(),
        json!({"email": "a@b.com", "password": "secret"})
    );
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/user/"))
        .and(header("authorization", "Bearer old"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .and(body_json(json!({"refresh": "ref-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/user/"))
        .and(header("authorization", "Bearer new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "email": "a@b.com"})))
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_with(Some("old"), Some("ref-1"));
    let api = client(&server, &storage);

    let user = api.fetch_user().await.unwrap();
    assert_eq!(user.email(), Some("a@b.com"));
    assert_eq!(storage.get(StorageKey::AccessToken).unwrap().as_deref(), Some("new"));
    assert_eq!(storage.get(StorageKey::RefreshToken).unwrap().as_deref(), Some("ref-1"));

    let requests = server.received_requests().await.unwrap();
    let refresh = requests
        .iter()
        .find(|r| r.url.path() == REFRESH)
        .unwrap();
    assert!(refresh.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_retry_resends_the_same_body() {
    let server = MockServer::start().await;
    let body = json!({"name": "Food", "type": "expense", "color": "#FF0000"});
    Mock::given(method("POST"))
        .and(path("/api/categories/"))
        .and(header("authorization", "Bearer old"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/categories/"))
        .and(header("authorization", "Bearer new"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_with(Some("old"), Some("ref"));
    let api = client(&server, &storage);

    let request = ApiRequest::post("/categories/").json(&body).unwrap();
    let response: Value = api.send_json(&request).await.unwrap();
    assert_eq!(response, json!({"ok": true}));
}

#[tokio::test]
async fn test_second_unauthorized_is_not_refreshed_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "new"})))
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_with(Some("old"), Some("ref"));
    let api = client(&server, &storage);

    let err = api.fetch_stats(&Default::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized), "got {:?}", err);
    // The refresh itself succeeded, so the session is kept.
    assert_eq!(storage.get(StorageKey::AccessToken).unwrap().as_deref(), Some("new"));
    assert!(storage.get(StorageKey::RefreshToken).unwrap().is_some());
}

#[tokio::test]
async fn test_failed_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/budgets/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_with(Some("old"), Some("revoked"));
    let expired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&expired);
    let api = client(&server, &storage).with_session_expired_hook(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let err = api.list_budgets(&Default::default()).await.unwrap_err();
    assert!(err.is_session_expired(), "got {:?}", err);
    match err {
        ApiError::SessionExpired(cause) => assert!(matches!(*cause, ApiError::Unauthorized)),
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(expired.load(Ordering::SeqCst), 1);
    for key in StorageKey::ALL {
        assert!(storage.get(key).unwrap().is_none(), "{} not cleared", key.as_str());
    }
}

#[tokio::test]
async fn test_unparseable_refresh_response_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let storage = storage_with(Some("old"), Some("ref"));
    let api = client(&server, &storage);

    let err = api.list_categories(&Default::default()).await.unwrap_err();
    match err {
        ApiError::SessionExpired(cause) => {
            assert!(matches!(*cause, ApiError::InvalidResponse(_)), "got {:?}", cause)
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(storage.get(StorageKey::User).unwrap().is_none());
}

#[tokio::test]
async fn test_unauthorized_without_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/user/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    refresh_never_called(&server).await;

    let storage = storage_with(Some("old"), None);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let api = client(&server, &storage).with_session_expired_hook(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let err = api.fetch_user().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized), "got {:?}", err);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_other_errors_pass_through_without_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/transactions/42/"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/transactions/42/"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/budgets/1/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;
    refresh_never_called(&server).await;

    let storage = storage_with(Some("acc"), Some("ref"));
    let api = client(&server, &storage);

    assert!(api.fetch_transaction(42).await.unwrap_err().is_not_found());
    assert!(matches!(
        api.delete_transaction(42).await.unwrap_err(),
        ApiError::AccessDenied(_)
    ));
    assert!(matches!(
        api.fetch_budget(1).await.unwrap_err(),
        ApiError::ServerError(_)
    ));
}

#[tokio::test]
async fn test_validation_errors_are_keyed_by_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "email": ["user with this email already exists."],
            "password": ["This password is too short.", "This password is too common."],
            "non_field_errors": ["Passwords do not match."]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = MemoryStorage::shared();
    let api = client(&server, &storage);
    let request = pocketledger_core::models::RegisterRequest {
        email: "a@b.com".into(),
        username: "a".into(),
        password: "short".into(),
        password_confirm: "shorter".into(),
    };

    let err = api.register(&request).await.unwrap_err();
    let fields = err.field_errors().unwrap();
    assert_eq!(fields.first("email"), Some("user with this email already exists."));
    assert_eq!(fields.messages("password").len(), 2);

    let form = fields.for_form(&["email", "username", "password"], "Registration failed");
    assert_eq!(form.get("email"), Some("user with this email already exists."));
    assert_eq!(form.get("password"), Some("This password is too short."));
    assert_eq!(form.general(), Some("Passwords do not match."));
}

#[tokio::test]
async fn test_paginated_and_plain_lists() {
    let server = MockServer::start().await;
    let transaction = json!({
        "id": 3,
        "title": "Lunch",
        "amount": "12000.00",
        "type": "expense",
        "category": 2,
        "category_name": "Food",
        "description": "",
        "date": "2024-03-15"
    });
    Mock::given(method("GET"))
        .and(path("/api/transactions/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [transaction]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "name": "Food", "type": "expense", "color": "#EF4444"}
        ])))
        .mount(&server)
        .await;

    let storage = storage_with(Some("acc"), Some("ref"));
    let api = client(&server, &storage);

    let transactions = api.list_transactions(&TransactionFilter::default()).await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].amount, 12000.0);
    assert_eq!(transactions[0].signed_amount(), -12000.0);

    let categories = api.list_categories(&Default::default()).await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Food");
}
