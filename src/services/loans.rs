//! Loan lifecycle: borrow, return and loan listings

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{LoanDetails, LoanQuery, PageQuery, MAX_ACTIVE_LOANS},
    repository::LoanStore,
};

use super::inventory::InventoryLedger;

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LoanStore>,
    ledger: InventoryLedger,
}

impl LoansService {
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self {
            store,
            ledger: InventoryLedger,
        }
    }

    /// Borrow a book.
    ///
    /// Checks run in a fixed order and the first failure wins: missing book,
    /// no stock left, member at the loan cap, member already holding this
    /// book. The stock decrement and the new loan commit together or not at
    /// all. Transient failures are returned as-is; the whole call is safe to
    /// retry.
    #[tracing::instrument(skip(self))]
    pub async fn borrow(&self, member_id: Uuid, book_id: Uuid) -> AppResult<LoanDetails> {
        let mut unit = self.store.begin().await?;
        unit.lock_member(member_id).await?;

        let remaining = self
            .ledger
            .try_reserve(unit.as_mut(), book_id)
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "Borrow rejected"))?;

        let active = unit.count_active_loans(member_id).await?;
        if active >= MAX_ACTIVE_LOANS {
            tracing::debug!(active, "Borrow rejected, loan limit reached");
            return Err(AppError::LimitExceeded(format!(
                "You cannot borrow more than {} books at a time",
                MAX_ACTIVE_LOANS
            )));
        }

        if unit.has_active_loan(member_id, book_id).await? {
            tracing::debug!("Borrow rejected, book already on loan to member");
            return Err(AppError::DuplicateActive(
                "You already have an active loan for this book".to_string(),
            ));
        }

        let loan = unit.insert_loan(member_id, book_id, Utc::now()).await?;
        let details = unit.loan_details(loan.id).await?;
        unit.commit().await?;

        tracing::info!(loan_id = %loan.id, remaining, "Book borrowed");
        Ok(details)
    }

    /// Return a borrowed book. Only the borrower may return it, and only once.
    #[tracing::instrument(skip(self))]
    pub async fn return_book(&self, loan_id: Uuid, member_id: Uuid) -> AppResult<LoanDetails> {
        let mut unit = self.store.begin().await?;

        let loan = unit
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        if loan.member_id != member_id {
            tracing::debug!(owner = %loan.member_id, "Return rejected, not the borrower");
            return Err(AppError::Forbidden(
                "You can only return your own loans".to_string(),
            ));
        }

        if !loan.status.is_active() {
            tracing::debug!(status = ?loan.status, "Return rejected, loan not active");
            return Err(AppError::AlreadyReturned(
                "This loan has already been returned".to_string(),
            ));
        }

        unit.mark_returned(loan.id, Utc::now()).await?;
        self.ledger.release(unit.as_mut(), loan.book_id).await?;
        let details = unit.loan_details(loan.id).await?;
        unit.commit().await?;

        tracing::info!(book_id = %loan.book_id, "Book returned");
        Ok(details)
    }

    /// List all loans, newest first
    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        query
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.store.list_loans(query.status, query.page_query()).await
    }

    /// List one member's loans, newest first
    pub async fn list_member_loans(
        &self,
        member_id: Uuid,
        page: &PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        page.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        self.store.list_member_loans(member_id, *page).await
    }
}
