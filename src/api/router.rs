use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Creates the API router with all endpoints
///
/// Lending engine (Write operations):
/// - POST /api/borrow/:book_id/patron/:patron_id - Borrow a book
/// - PUT  /api/return/:book_id/patron/:patron_id - Return a book
///
/// Management endpoints:
/// - /api/books and /api/patrons - CRUD with pagination
/// - /api/loans - audit trail listing and administrative delete
///   (loan state transitions only ever happen through the engine)
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Lending engine
        .route(
            "/api/borrow/:book_id/patron/:patron_id",
            post(handlers::borrow_book),
        )
        .route(
            "/api/return/:book_id/patron/:patron_id",
            put(handlers::return_book),
        )
        // Catalog management
        .route(
            "/api/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route(
            "/api/books/:id",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        // Patron management
        .route(
            "/api/patrons",
            get(handlers::list_patrons).post(handlers::create_patron),
        )
        .route(
            "/api/patrons/:id",
            get(handlers::get_patron)
                .put(handlers::update_patron)
                .delete(handlers::delete_patron),
        )
        // Loan audit trail
        .route("/api/loans", get(handlers::list_loans))
        .route(
            "/api/loans/:id",
            get(handlers::get_loan).delete(handlers::delete_loan),
        )
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
