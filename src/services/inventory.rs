//! Inventory ledger: the only writer of book stock

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    repository::{Reservation, UnitOfWork},
};

/// Reserve and release copies inside a caller's unit of work
#[derive(Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Take one copy of the book, or fail with `NotFound` / `OutOfStock`
    /// leaving stock untouched.
    pub async fn try_reserve(&self, unit: &mut dyn UnitOfWork, book_id: Uuid) -> AppResult<i32> {
        match unit.reserve_stock(book_id).await? {
            Reservation::Reserved { remaining } => Ok(remaining),
            Reservation::OutOfStock => Err(AppError::OutOfStock("Book is out of stock".to_string())),
            Reservation::Missing => Err(AppError::NotFound(format!(
                "Book with id {} not found",
                book_id
            ))),
        }
    }

    /// Put back the copy held by a loan being returned.
    ///
    /// Loans only ever reference books that existed when they were
    /// borrowed, so a missing book here means the catalog was corrupted.
    pub async fn release(&self, unit: &mut dyn UnitOfWork, book_id: Uuid) -> AppResult<()> {
        if unit.restock(book_id).await? {
            return Ok(());
        }

        tracing::error!(%book_id, "Release for a book that no longer exists");
        Err(AppError::Consistency(format!(
            "Loan references missing book {}",
            book_id
        )))
    }
}
