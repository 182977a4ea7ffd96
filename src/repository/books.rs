//! Books repository: catalog reads and the stock counter

use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, CreateBook},
};

use super::Reservation;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT id, title, author, isbn, stock FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Create a catalog entry with its initial stock
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, isbn, stock)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, author, isbn, stock
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.stock)
        .fetch_one(&self.pool)
        .await?;

        Ok(book)
    }

    /// Take one copy if any is left.
    ///
    /// A single conditional update: concurrent callers queue on the row lock
    /// and each re-evaluates `stock > 0` against the committed value, so the
    /// counter can never go below zero whatever the isolation level.
    pub async fn reserve(conn: &mut PgConnection, book_id: Uuid) -> AppResult<Reservation> {
        let remaining: Option<i32> = sqlx::query_scalar(
            "UPDATE books SET stock = stock - 1 WHERE id = $1 AND stock > 0 RETURNING stock",
        )
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(Reservation::Reserved { remaining });
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(if exists {
            Reservation::OutOfStock
        } else {
            Reservation::Missing
        })
    }

    /// Put one copy back. Returns false when no such book exists.
    pub async fn restock(conn: &mut PgConnection, book_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("UPDATE books SET stock = stock + 1 WHERE id = $1")
            .bind(book_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
