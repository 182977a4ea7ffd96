//! API tests against an in-process router backed by the memory store

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use circulation_server::{
    api,
    models::{Book, Member, MemberClaims, MemberRole},
    repository::memory::MemoryStore,
    services::Services,
    AppConfig, AppState,
};

struct TestApp {
    router: Router,
    store: MemoryStore,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = AppConfig::default();
        let secret = config.auth.jwt_secret.clone();
        let store = MemoryStore::new(Duration::from_secs(5));
        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(Services::new(Arc::new(store.clone()))),
        };

        Self {
            router: api::router(state),
            store,
            secret,
        }
    }

    /// Register a member and return a bearer token for them
    async fn member(&self, role: MemberRole) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.store
            .insert_member(Member {
                id,
                name: "Test Member".to_string(),
                email: format!("{}@library.test", id),
                role,
            })
            .await
            .unwrap();

        let token = MemberClaims::new(id, role, chrono::Duration::hours(1))
            .create_token(&self.secret)
            .unwrap();
        (id, token)
    }

    async fn book(&self, stock: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .insert_book(Book {
                id,
                title: "Test Book".to_string(),
                author: "Test Author".to_string(),
                isbn: id.simple().to_string(),
                stock,
            })
            .await
            .unwrap();
        id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(body) => Body::from(serde_json::to_vec(&body).unwrap()),
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn borrow(&self, token: &str, book_id: Uuid) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/v1/loans/borrow",
            Some(token),
            Some(json!({ "book_id": book_id })),
        )
        .await
    }

    async fn return_loan(&self, token: &str, loan_id: &Value) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/v1/loans/return",
            Some(token),
            Some(json!({ "loan_id": loan_id })),
        )
        .await
    }

    async fn stock(&self, token: &str, book_id: Uuid) -> i64 {
        let (status, body) = self
            .send(Method::GET, &format!("/api/v1/books/{}", book_id), Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body["stock"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_borrow_requires_token() {
    let app = TestApp::new();
    let book = app.book(1).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/loans/borrow",
            None,
            Some(json!({ "book_id": book })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
async fn test_borrow_and_return() {
    let app = TestApp::new();
    let (member_id, token) = app.member(MemberRole::Member).await;
    let book = app.book(2).await;

    let (status, loan) = app.borrow(&token, book).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loan["status"], "BORROWED");
    assert_eq!(loan["book"]["id"], json!(book));
    assert_eq!(loan["member"]["id"], json!(member_id));
    assert_eq!(app.stock(&token, book).await, 1);

    let (status, returned) = app.return_loan(&token, &loan["id"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["status"], "RETURNED");
    assert!(returned["return_date"].is_string());
    assert_eq!(app.stock(&token, book).await, 2);
}

#[tokio::test]
async fn test_every_rule_violation_is_distinguishable() {
    let app = TestApp::new();
    let (_, alice) = app.member(MemberRole::Member).await;
    let (_, bob) = app.member(MemberRole::Member).await;

    let last_copy = app.book(1).await;
    let (_, loan) = app.borrow(&alice, last_copy).await;

    let mut seen = Vec::new();

    // Another member finds the shelf empty
    let (status, body) = app.borrow(&bob, last_copy).await;
    assert_eq!(status, StatusCode::CONFLICT);
    seen.push(body["code"].clone());

    // Alice already holds it
    let restocked = app.book(5).await;
    app.borrow(&alice, restocked).await;
    let (status, body) = app.borrow(&alice, restocked).await;
    assert_eq!(status, StatusCode::CONFLICT);
    seen.push(body["code"].clone());

    // Alice is at the cap
    let third = app.book(5).await;
    app.borrow(&alice, third).await;
    let (status, body) = app.borrow(&alice, app.book(5).await).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    seen.push(body["code"].clone());

    // Bob cannot return Alice's loan
    let (status, body) = app.return_loan(&bob, &loan["id"]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    seen.push(body["code"].clone());

    // Returned twice
    app.return_loan(&alice, &loan["id"]).await;
    let (status, body) = app.return_loan(&alice, &loan["id"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    seen.push(body["code"].clone());

    // Unknown book
    let (status, body) = app.borrow(&bob, Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    seen.push(body["code"].clone());

    let mut codes: Vec<u64> = seen.iter().map(|c| c.as_u64().unwrap()).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), 6, "error codes collided: {:?}", seen);
}

#[tokio::test]
async fn test_list_loans_requires_staff() {
    let app = TestApp::new();
    let (_, member) = app.member(MemberRole::Member).await;
    let (_, librarian) = app.member(MemberRole::Librarian).await;
    let book = app.book(3).await;
    app.borrow(&member, book).await;

    let (status, body) = app
        .send(Method::GET, "/api/v1/loans", Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, body) = app
        .send(
            Method::GET,
            "/api/v1/loans?status=BORROWED&page=1&limit=5",
            Some(&librarian),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 5);
    assert_eq!(body["total_pages"], 1);
    assert!(body["items"].is_array());
}

#[tokio::test]
async fn test_my_loans_pagination() {
    let app = TestApp::new();
    let (member_id, token) = app.member(MemberRole::Member).await;
    for _ in 0..3 {
        let book = app.book(1).await;
        app.borrow(&token, book).await;
    }

    let (status, body) = app
        .send(Method::GET, "/api/v1/loans/my?page=2&limit=2", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["member"]["id"], json!(member_id));

    let (status, body) = app
        .send(Method::GET, "/api/v1/loans/my?limit=0", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_create_book_is_staff_only() {
    let app = TestApp::new();
    let (_, member) = app.member(MemberRole::Member).await;
    let (_, admin) = app.member(MemberRole::Admin).await;
    let book = json!({
        "title": "Parable of the Sower",
        "author": "Octavia E. Butler",
        "isbn": "9781538732182",
        "stock": 4
    });

    let (status, _) = app
        .send(Method::POST, "/api/v1/books", Some(&member), Some(book.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app
        .send(Method::POST, "/api/v1/books", Some(&admin), Some(book))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["stock"], 4);
}

#[tokio::test]
async fn test_malformed_requests_use_error_body() {
    let app = TestApp::new();
    let (_, token) = app.member(MemberRole::Librarian).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/loans/borrow",
            Some(&token),
            Some(json!({ "book_id": "not-a-uuid" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 11);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = app
        .send(Method::GET, "/api/v1/loans?status=FOO", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 11);

    let (status, body) = app
        .send(Method::GET, "/api/v1/books/42", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 11);
}

#[tokio::test]
async fn test_huge_page_is_a_bad_value() {
    let app = TestApp::new();
    let (_, token) = app.member(MemberRole::Member).await;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/v1/loans/my?page=9223372036854775807",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 11);
}
