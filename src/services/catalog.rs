//! Catalog access needed around lending: book lookup and creation

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Book, CreateBook},
    repository::LoanStore,
};

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LoanStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self { store }
    }

    /// Get a book with its current stock
    pub async fn get_book(&self, book_id: Uuid) -> AppResult<Book> {
        self.store.get_book(book_id).await
    }

    /// Add a book to the catalog with its initial stock
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let book = self.store.create_book(book).await?;
        tracing::info!(book_id = %book.id, stock = book.stock, "Book added to catalog");
        Ok(book)
    }
}
