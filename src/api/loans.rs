//! Loan endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{LoanDetails, LoanQuery, PageQuery},
};

use super::{AppJson, AppQuery, AuthenticatedMember, LoanPage, PaginatedResponse};

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    /// Book to borrow
    pub book_id: Uuid,
}

/// Return request
#[derive(Deserialize, ToSchema)]
pub struct ReturnRequest {
    /// Loan to close
    pub loan_id: Uuid,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = LoanDetails),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Out of stock, or book already on loan to this member"),
        (status = 422, description = "Maximum active loans reached"),
        (status = 503, description = "Transient failure, safe to retry")
    )
)]
pub async fn borrow(
    State(state): State<crate::AppState>,
    AuthenticatedMember(claims): AuthenticatedMember,
    AppJson(request): AppJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loan = state
        .services
        .loans
        .borrow(claims.member_id(), request.book_id)
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = LoanDetails),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Loan belongs to another member"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned"),
        (status = 503, description = "Transient failure, safe to retry")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedMember(claims): AuthenticatedMember,
    AppJson(request): AppJson<ReturnRequest>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state
        .services
        .loans
        .return_book(request.loan_id, claims.member_id())
        .await?;

    Ok(Json(loan))
}

/// List all loans (ADMIN/LIBRARIAN)
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans, newest first", body = LoanPage),
        (status = 400, description = "Invalid pagination"),
        (status = 403, description = "Requires ADMIN or LIBRARIAN role")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedMember(claims): AuthenticatedMember,
    AppQuery(query): AppQuery<LoanQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    claims.require_staff()?;

    let (items, total) = state.services.loans.list_loans(&query).await?;
    let page = query.page_query();

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: page.page(),
        limit: page.limit(),
        total_pages: page.total_pages(total),
    }))
}

/// List the caller's own loans
#[utoipa::path(
    get,
    path = "/loans/my",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Your loans, newest first", body = LoanPage),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedMember(claims): AuthenticatedMember,
    AppQuery(page): AppQuery<PageQuery>,
) -> AppResult<Json<PaginatedResponse<LoanDetails>>> {
    let (items, total) = state
        .services
        .loans
        .list_member_loans(claims.member_id(), &page)
        .await?;

    Ok(Json(PaginatedResponse {
        items,
        total,
        page: page.page(),
        limit: page.limit(),
        total_pages: page.total_pages(total),
    }))
}
