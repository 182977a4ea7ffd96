//! Repository layer: persistence seam for books and loans
//!
//! Services never talk to a database directly. They receive an
//! `Arc<dyn LoanStore>` and run every borrow or return inside one
//! [`UnitOfWork`]. Dropping a unit of work without calling
//! [`UnitOfWork::commit`] discards everything it did.
//!
//! Two stores exist: [`Repository`] on PostgreSQL and
//! [`memory::MemoryStore`] for tests and embedding.

pub mod books;
pub mod loans;
pub mod memory;
pub mod transaction;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Book, CreateBook, Loan, LoanDetails, LoanStatus, PageQuery},
};

/// Outcome of trying to take one copy of a book off the shelf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// One copy taken; `remaining` copies left
    Reserved { remaining: i32 },
    OutOfStock,
    Missing,
}

/// One atomic borrow or return.
///
/// Every read made through a unit of work sees the effects of its own
/// earlier writes, and none of those writes are visible to anyone else
/// until `commit` succeeds.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Serialize against every other unit of work touching this member's loans
    async fn lock_member(&mut self, member_id: Uuid) -> AppResult<()>;

    /// Decrement stock by one if any copy is left
    async fn reserve_stock(&mut self, book_id: Uuid) -> AppResult<Reservation>;

    /// Increment stock by one. Returns false if the book does not exist.
    async fn restock(&mut self, book_id: Uuid) -> AppResult<bool>;

    async fn count_active_loans(&mut self, member_id: Uuid) -> AppResult<i64>;

    async fn has_active_loan(&mut self, member_id: Uuid, book_id: Uuid) -> AppResult<bool>;

    async fn insert_loan(
        &mut self,
        member_id: Uuid,
        book_id: Uuid,
        loan_date: DateTime<Utc>,
    ) -> AppResult<Loan>;

    /// Load a loan and hold it until the unit of work ends
    async fn lock_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>>;

    async fn mark_returned(&mut self, loan_id: Uuid, return_date: DateTime<Utc>) -> AppResult<Loan>;

    async fn loan_details(&mut self, loan_id: Uuid) -> AppResult<LoanDetails>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Handle to the persisted books and loans
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoanStore: Send + Sync {
    /// Open a unit of work. Waiting is bounded; running out of time is a
    /// transient error.
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    async fn list_loans(
        &self,
        status: Option<LoanStatus>,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)>;

    async fn list_member_loans(
        &self,
        member_id: Uuid,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)>;

    async fn get_book(&self, book_id: Uuid) -> AppResult<Book>;

    async fn create_book(&self, book: CreateBook) -> AppResult<Book>;
}

/// PostgreSQL-backed store holding the connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    lock_timeout: Duration,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>, lock_timeout: Duration) -> Self {
        Self {
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            pool,
            lock_timeout,
        }
    }
}

#[async_trait]
impl LoanStore for Repository {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let unit = transaction::PgUnitOfWork::begin(&self.pool, self.lock_timeout).await?;
        Ok(Box::new(unit))
    }

    async fn list_loans(
        &self,
        status: Option<LoanStatus>,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.loans.list(status, &page).await
    }

    async fn list_member_loans(
        &self,
        member_id: Uuid,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.loans.list_for_member(member_id, &page).await
    }

    async fn get_book(&self, book_id: Uuid) -> AppResult<Book> {
        self.books.get_by_id(book_id).await
    }

    async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        self.books.create(&book).await
    }
}
