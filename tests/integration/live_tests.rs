//! Tests against a running server and a real PostgreSQL database
//!
//! Run with: cargo test --test live_tests -- --ignored
//! Needs DATABASE_URL for the database tests and a server on
//! localhost:8080 sharing JWT_SECRET for the HTTP tests.

use std::{sync::Arc, time::Duration};

use reqwest::Client;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use circulation_server::{
    models::{LoanStatus, MemberClaims, MemberRole, PageQuery},
    repository::{LoanStore, Repository},
    services::Services,
    AppConfig, AppError,
};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| AppConfig::default().auth.jwt_secret)
}

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(30)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn seed_member(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO members (id, name, email, role) VALUES ($1, $2, $3, 'MEMBER')")
        .bind(id)
        .bind("Live Member")
        .bind(format!("{}@library.test", id))
        .execute(pool)
        .await
        .expect("Failed to insert member");
    id
}

async fn seed_book(pool: &PgPool, stock: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO books (id, title, author, isbn, stock) VALUES ($1, $2, $3, $4, $5)")
        .bind(id)
        .bind("Live Book")
        .bind("Live Author")
        .bind(id.simple().to_string())
        .bind(stock)
        .execute(pool)
        .await
        .expect("Failed to insert book");
    id
}

async fn stock(pool: &PgPool, book_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT stock FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read stock")
}

fn services(pool: &PgPool) -> Services {
    let store: Arc<dyn LoanStore> = Arc::new(Repository::new(pool.clone(), Duration::from_secs(3)));
    Services::new(store)
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_borrow_unknown_book() {
    let client = Client::new();
    let token = MemberClaims::new(Uuid::new_v4(), MemberRole::Member, chrono::Duration::hours(1))
        .create_token(&jwt_secret())
        .expect("Failed to sign token");

    let response = client
        .post(format!("{}/loans/borrow", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "book_id": Uuid::new_v4() }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["code"], 4);
}

#[tokio::test]
#[ignore]
async fn test_list_loans_rejects_members() {
    let client = Client::new();
    let token = MemberClaims::new(Uuid::new_v4(), MemberRole::Member, chrono::Duration::hours(1))
        .create_token(&jwt_secret())
        .expect("Failed to sign token");

    let response = client
        .get(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_pg_last_copy_goes_to_one_borrower() {
    let pool = pool().await;
    let services = Arc::new(services(&pool));
    let book = seed_book(&pool, 1).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let member = seed_member(&pool).await;
        let services = services.clone();
        handles.push(tokio::spawn(async move { services.loans.borrow(member, book).await }));
    }

    let mut borrowed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => borrowed += 1,
            Err(AppError::OutOfStock(_)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(borrowed, 1);
    assert_eq!(stock(&pool, book).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_pg_member_cap_holds_under_concurrency() {
    let pool = pool().await;
    let services = Arc::new(services(&pool));
    let member = seed_member(&pool).await;

    let mut books = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let book = seed_book(&pool, 2).await;
        books.push(book);
        let services = services.clone();
        handles.push(tokio::spawn(async move { services.loans.borrow(member, book).await }));
    }

    let mut borrowed = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => borrowed += 1,
            Err(AppError::LimitExceeded(_)) => refused += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!((borrowed, refused), (3, 3));

    // Refused borrows leave stock untouched
    let mut total = 0;
    for book in books {
        total += stock(&pool, book).await;
    }
    assert_eq!(total, 12 - 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_returns_restock_once() {
    let pool = pool().await;
    let services = Arc::new(services(&pool));
    let member = seed_member(&pool).await;
    let book = seed_book(&pool, 1).await;
    let loan = services.loans.borrow(member, book).await.unwrap();

    let first = {
        let services = services.clone();
        tokio::spawn(async move { services.loans.return_book(loan.id, member).await })
    };
    let second = {
        let services = services.clone();
        tokio::spawn(async move { services.loans.return_book(loan.id, member).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let returned = outcomes.iter().filter(|r| r.is_ok()).count();
    let already = outcomes
        .iter()
        .filter(|r| matches!(r, Err(AppError::AlreadyReturned(_))))
        .count();

    assert_eq!((returned, already), (1, 1));
    assert_eq!(stock(&pool, book).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_pg_duplicate_index_backstop() {
    let pool = pool().await;
    let member = seed_member(&pool).await;
    let book = seed_book(&pool, 5).await;

    let insert = "INSERT INTO loans (id, member_id, book_id, status) VALUES ($1, $2, $3, 'BORROWED')";
    sqlx::query(insert)
        .bind(Uuid::new_v4())
        .bind(member)
        .bind(book)
        .execute(&pool)
        .await
        .unwrap();
    let err = sqlx::query(insert)
        .bind(Uuid::new_v4())
        .bind(member)
        .bind(book)
        .execute(&pool)
        .await
        .unwrap_err();

    assert!(matches!(AppError::from(err), AppError::DuplicateActive(_)));
}

#[tokio::test]
#[ignore]
async fn test_pg_unregistered_member_rolls_back() {
    let pool = pool().await;
    let services = services(&pool);
    let book = seed_book(&pool, 1).await;

    let err = services.loans.borrow(Uuid::new_v4(), book).await.unwrap_err();

    assert!(matches!(err, AppError::Consistency(_)));
    assert_eq!(stock(&pool, book).await, 1);
}

#[tokio::test]
#[ignore]
async fn test_pg_listing_newest_first() {
    let pool = pool().await;
    let services = services(&pool);
    let member = seed_member(&pool).await;

    let older = services.loans.borrow(member, seed_book(&pool, 1).await).await.unwrap();
    let newer = services.loans.borrow(member, seed_book(&pool, 1).await).await.unwrap();
    services.loans.return_book(older.id, member).await.unwrap();

    let (items, total) = services
        .loans
        .list_member_loans(member, &PageQuery::new(1, 10))
        .await
        .unwrap();

    assert_eq!(total, 2);
    assert_eq!(items[0].id, newer.id);
    assert_eq!(items[1].status, LoanStatus::Returned);
}
