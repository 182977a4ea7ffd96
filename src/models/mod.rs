//! Data models for the circulation server

pub mod book;
pub mod loan;
pub mod member;

// Re-export commonly used types
pub use book::{Book, BookShort, CreateBook};
pub use loan::{Loan, LoanDetails, LoanQuery, LoanStatus, PageQuery, MAX_ACTIVE_LOANS};
pub use member::{Member, MemberClaims, MemberRole, MemberShort};
