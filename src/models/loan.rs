//! Loan model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::{book::BookShort, member::MemberShort};

/// Maximum number of active (BORROWED or LATE) loans a member may hold
pub const MAX_ACTIVE_LOANS: i64 = 3;

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
/// Highest page number a listing accepts
pub const MAX_PAGE: i64 = 1_000_000;

pub const MAX_PAGE_LIMIT: i64 = 100;

/// Loan lifecycle status.
///
/// `Late` is never assigned by the server itself; it behaves exactly like
/// `Borrowed` for limits, duplicates and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "loan_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LoanStatus {
    Borrowed,
    Returned,
    Late,
}

impl LoanStatus {
    /// Active loans count against the member limit and block duplicates
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::Borrowed | LoanStatus::Late)
    }
}

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub member_id: Uuid,
    pub book_id: Uuid,
    pub status: LoanStatus,
    pub loan_date: DateTime<Utc>,
    /// Set iff status is RETURNED
    pub return_date: Option<DateTime<Utc>>,
}

/// Loan with book and member for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: Uuid,
    pub status: LoanStatus,
    pub loan_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub book: BookShort,
    pub member: MemberShort,
}

impl LoanDetails {
    pub fn new(loan: &Loan, book: BookShort, member: MemberShort) -> Self {
        Self {
            id: loan.id,
            status: loan.status,
            loan_date: loan.loan_date,
            return_date: loan.return_date,
            book,
            member,
        }
    }
}

/// Flat row produced by the loan/book/member join
#[derive(Debug, Clone, FromRow)]
pub struct LoanDetailsRow {
    id: Uuid,
    member_id: Uuid,
    book_id: Uuid,
    status: LoanStatus,
    loan_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    book_title: String,
    book_author: String,
    book_isbn: String,
    member_name: String,
    member_email: String,
}

impl From<LoanDetailsRow> for LoanDetails {
    fn from(row: LoanDetailsRow) -> Self {
        LoanDetails {
            id: row.id,
            status: row.status,
            loan_date: row.loan_date,
            return_date: row.return_date,
            book: BookShort {
                id: row.book_id,
                title: row.book_title,
                author: row.book_author,
                isbn: row.book_isbn,
            },
            member: MemberShort {
                id: row.member_id,
                name: row.member_name,
                email: row.member_email,
            },
        }
    }
}

/// Page selection shared by the loan listings
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, starting at 1 (default: 1)
    #[validate(range(min = 1, max = 1_000_000))]
    pub page: Option<i64>,
    /// Loans per page (default: 10, max: 100)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit() - 1) / self.limit()
    }
}

/// Query parameters for listing all loans
#[derive(Debug, Clone, Copy, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    /// Only loans in this status
    pub status: Option<LoanStatus>,
    #[validate(range(min = 1, max = 1_000_000))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl LoanQuery {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}
