//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "0.1.0",
        description = "Book lending and inventory REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        health::health_check,
        // Loans
        loans::borrow,
        loans::return_book,
        loans::list_loans,
        loans::my_loans,
        // Books
        books::get_book,
        books::create_book,
    ),
    components(
        schemas(
            // Loans
            loans::BorrowRequest,
            loans::ReturnRequest,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            crate::api::LoanPage,
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::CreateBook,
            // Members
            crate::models::member::MemberShort,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Borrowing and returning books"),
        (name = "books", description = "Catalog entries and stock")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
