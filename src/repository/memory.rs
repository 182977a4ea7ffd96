//! In-memory store
//!
//! One async mutex guards the whole state, so units of work run strictly
//! one after another. Each unit of work edits a staged copy that replaces
//! the shared state only on commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookShort, CreateBook, Loan, LoanDetails, LoanStatus, Member, MemberShort, PageQuery},
};

use super::{LoanStore, Reservation, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: HashMap<Uuid, Book>,
    members: HashMap<Uuid, Member>,
    loans: HashMap<Uuid, Loan>,
}

impl MemoryState {
    fn details(&self, loan: &Loan) -> AppResult<LoanDetails> {
        let book = self.books.get(&loan.book_id).ok_or_else(|| {
            AppError::Consistency(format!("Loan {} references missing book {}", loan.id, loan.book_id))
        })?;
        let member = self
            .members
            .get(&loan.member_id)
            .ok_or_else(|| {
                AppError::Consistency(format!(
                    "Loan {} references unregistered member {}",
                    loan.id, loan.member_id
                ))
            })?;

        Ok(LoanDetails::new(loan, BookShort::from(book), MemberShort::from(member)))
    }

    /// Newest first, then paged
    fn page<'a>(
        &self,
        loans: impl Iterator<Item = &'a Loan>,
        page: &PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let mut loans: Vec<&Loan> = loans.collect();
        loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(a.id.cmp(&b.id)));

        let total = loans.len() as i64;
        let items = loans
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|loan| self.details(loan))
            .collect::<AppResult<Vec<_>>>()?;

        Ok((items, total))
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    async fn lock(&self) -> AppResult<MutexGuard<'_, MemoryState>> {
        tokio::time::timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| AppError::Transient("Timed out waiting for the store lock".to_string()))
    }

    /// Register a member, as the identity layer would
    pub async fn insert_member(&self, member: Member) -> AppResult<()> {
        self.lock().await?.members.insert(member.id, member);
        Ok(())
    }

    /// Put a book with a known id on the shelf
    pub async fn insert_book(&self, book: Book) -> AppResult<()> {
        self.lock().await?.books.insert(book.id, book);
        Ok(())
    }

    /// Seed a loan record directly, bypassing the borrow rules
    pub async fn insert_loan(&self, loan: Loan) -> AppResult<()> {
        self.lock().await?.loans.insert(loan.id, loan);
        Ok(())
    }

    /// Remove a book from the catalog, leaving its loans dangling
    pub async fn remove_book(&self, book_id: Uuid) -> AppResult<Option<Book>> {
        Ok(self.lock().await?.books.remove(&book_id))
    }
}

#[async_trait]
impl LoanStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| AppError::Transient("Timed out waiting for the store lock".to_string()))?;
        let staged = (*guard).clone();

        Ok(Box::new(MemoryUnitOfWork { guard, staged }))
    }

    async fn list_loans(
        &self,
        status: Option<LoanStatus>,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let state = self.lock().await?;
        state.page(
            state
                .loans
                .values()
                .filter(|loan| status.map_or(true, |s| loan.status == s)),
            &page,
        )
    }

    async fn list_member_loans(
        &self,
        member_id: Uuid,
        page: PageQuery,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let state = self.lock().await?;
        state.page(
            state.loans.values().filter(|loan| loan.member_id == member_id),
            &page,
        )
    }

    async fn get_book(&self, book_id: Uuid) -> AppResult<Book> {
        self.lock()
            .await?
            .books
            .get(&book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        let book = Book {
            id: Uuid::new_v4(),
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            stock: book.stock,
        };
        self.lock().await?.books.insert(book.id, book.clone());
        Ok(book)
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_member(&mut self, _member_id: Uuid) -> AppResult<()> {
        // The whole store is already held.
        Ok(())
    }

    async fn reserve_stock(&mut self, book_id: Uuid) -> AppResult<Reservation> {
        Ok(match self.staged.books.get_mut(&book_id) {
            None => Reservation::Missing,
            Some(book) if book.stock <= 0 => Reservation::OutOfStock,
            Some(book) => {
                book.stock -= 1;
                Reservation::Reserved { remaining: book.stock }
            }
        })
    }

    async fn restock(&mut self, book_id: Uuid) -> AppResult<bool> {
        Ok(match self.staged.books.get_mut(&book_id) {
            Some(book) => {
                book.stock += 1;
                true
            }
            None => false,
        })
    }

    async fn count_active_loans(&mut self, member_id: Uuid) -> AppResult<i64> {
        Ok(self
            .staged
            .loans
            .values()
            .filter(|loan| loan.member_id == member_id && loan.status.is_active())
            .count() as i64)
    }

    async fn has_active_loan(&mut self, member_id: Uuid, book_id: Uuid) -> AppResult<bool> {
        Ok(self.staged.loans.values().any(|loan| {
            loan.member_id == member_id && loan.book_id == book_id && loan.status.is_active()
        }))
    }

    async fn insert_loan(
        &mut self,
        member_id: Uuid,
        book_id: Uuid,
        loan_date: DateTime<Utc>,
    ) -> AppResult<Loan> {
        let loan = Loan {
            id: Uuid::new_v4(),
            member_id,
            book_id,
            status: LoanStatus::Borrowed,
            loan_date,
            return_date: None,
        };
        self.staged.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    async fn lock_loan(&mut self, loan_id: Uuid) -> AppResult<Option<Loan>> {
        Ok(self.staged.loans.get(&loan_id).cloned())
    }

    async fn mark_returned(&mut self, loan_id: Uuid, return_date: DateTime<Utc>) -> AppResult<Loan> {
        let loan = self
            .staged
            .loans
            .get_mut(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        loan.status = LoanStatus::Returned;
        loan.return_date = Some(return_date);
        Ok(loan.clone())
    }

    async fn loan_details(&mut self, loan_id: Uuid) -> AppResult<LoanDetails> {
        let loan = self
            .staged
            .loans
            .get(&loan_id)
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;
        self.staged.details(loan)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
