//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::LoanDetailsRow,
        Loan, LoanDetails, LoanStatus, PageQuery,
    },
};

const LOAN_COLUMNS: &str = "id, member_id, book_id, status, loan_date, return_date";

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.member_id, l.book_id, l.status, l.loan_date, l.return_date,
           b.title AS book_title, b.author AS book_author, b.isbn AS book_isbn,
           m.name AS member_name, m.email AS member_email
    FROM loans l
    JOIN books b ON b.id = l.book_id
    JOIN members m ON m.id = l.member_id
"#;

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all loans, newest first, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<LoanStatus>,
        page: &PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE ($1::loan_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, LoanDetailsRow>(&format!(
            "{} WHERE ($1::loan_status IS NULL OR l.status = $1) \
             ORDER BY l.loan_date DESC, l.id LIMIT $2 OFFSET $3",
            DETAILS_SELECT
        ))
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(LoanDetails::from).collect(), total))
    }

    /// List one member's loan history, newest first
    pub async fn list_for_member(
        &self,
        member_id: Uuid,
        page: &PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE member_id = $1")
            .bind(member_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, LoanDetailsRow>(&format!(
            "{} WHERE l.member_id = $1 ORDER BY l.loan_date DESC, l.id LIMIT $2 OFFSET $3",
            DETAILS_SELECT
        ))
        .bind(member_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(LoanDetails::from).collect(), total))
    }

    // =========================================================================
    // TRANSACTIONAL OPERATIONS
    // =========================================================================

    /// Transaction-scoped advisory lock keyed on the member.
    ///
    /// Held until commit or rollback; serializes the count-then-insert of
    /// concurrent borrows by the same member.
    pub async fn lock_member(conn: &mut PgConnection, member_id: Uuid) -> AppResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(member_id.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn count_active(conn: &mut PgConnection, member_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE member_id = $1 AND status IN ('BORROWED', 'LATE')",
        )
        .bind(member_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    pub async fn has_active(conn: &mut PgConnection, member_id: Uuid, book_id: Uuid) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE member_id = $1 AND book_id = $2 AND status IN ('BORROWED', 'LATE')
            )
            "#,
        )
        .bind(member_id)
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    pub async fn insert(
        conn: &mut PgConnection,
        member_id: Uuid,
        book_id: Uuid,
        loan_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "INSERT INTO loans (id, member_id, book_id, status, loan_date) \
             VALUES ($1, $2, $3, 'BORROWED', $4) RETURNING {}",
            LOAN_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(member_id)
        .bind(book_id)
        .bind(loan_date)
        .fetch_one(&mut *conn)
        .await?;
        Ok(loan)
    }

    /// Load a loan with a row lock held until the transaction ends
    pub async fn lock(conn: &mut PgConnection, loan_id: Uuid) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(loan)
    }

    pub async fn mark_returned(
        conn: &mut PgConnection,
        loan_id: Uuid,
        return_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET status = 'RETURNED', return_date = $2 WHERE id = $1 RETURNING {}",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .bind(return_date)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }

    pub async fn details(conn: &mut PgConnection, loan_id: Uuid) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetailsRow>(&format!("{} WHERE l.id = $1", DETAILS_SELECT))
            .bind(loan_id)
            .fetch_optional(&mut *conn)
            .await?
            .map(LoanDetails::from)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
    }
}
