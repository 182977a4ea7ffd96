//! PostgreSQL unit of work

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Loan, LoanDetails},
};

use super::{books::BooksRepository, loans::LoansRepository, Reservation, UnitOfWork};

/// A READ COMMITTED transaction with a bounded lock wait.
///
/// Rolled back on drop unless committed.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    pub async fn begin(pool: &Pool<Postgres>, lock_timeout: Duration) -> AppResult<Self> {
        let mut tx = pool.begin().await?;

        // SET LOCAL takes no bind parameters; the value is an integer we own.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await?;

        Ok(Self { tx })
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_member(&mut self, member_id: Uuid) -> AppResult<()> {
        LoansRepository::lock_member(&mut self.tx, member_id).await
    }

    async fn reserve_stock(&mut self, book_id: Uuid) -> AppResult<Reservation> {
        BooksRepository::reserve(&mut self.tx, book_id).await
    }

    async fn restock(&mut self, book_id: Uuid) -> AppResult<bool> {
        BooksRepository::restock(&mut self.tx, book_id).await
    }

    async fn count_active_loans(&mut self, member_id: Uuid) -> AppResult<i64> {
        LoansRepository::count_active(&mut self.tx, member_id).await
    }

    async fn has_active_loan(&mut self, member_id: Uuid, book_id: Uuid) -> AppResult<bool> {
        LoansRepository::has_active(&mut self.tx, member_id, book_id).await
    }

    async fn insert_loan(
        &mut self,
        member_id: Uuid,
        book_id: Uuid,
        loan_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        LoansRepository::insert(&mut self.tx, member_id, book_id, loan_date).await
    }

    async fn lock_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        LoansRepository::lock(&mut self.tx, loan_id).await
    }

    async fn mark_returned(&mut self, loan_id: Uuid, return_date: DateTime<Utc>) -> AppResult<Loan> {
        LoansRepository::mark_returned(&mut self.tx, loan_id, return_date).await
    }

    async fn loan_details(&mut self, loan_id: Uuid) -> AppResult<LoanDetails> {
        LoansRepository::details(&mut self.tx, loan_id).await
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
