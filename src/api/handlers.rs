use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::directory::Directory;
use crate::application::lending::LendingService;
use crate::domain::book::Book;
use crate::domain::loan::Loan;
use crate::domain::patron::Patron;
use crate::domain::value_objects::{BookId, LoanId, PatronId};

use super::error::ApiError;
use super::types::{
    BookRequest, BookResponse, LoanResponse, PageQuery, PageResponse, PatronRequest,
    PatronResponse,
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
pub struct AppState {
    pub lending: LendingService,
    pub books: Directory<Book>,
    pub patrons: Directory<Patron>,
    pub loans: Directory<Loan>,
}

// ============================================================================
// Lending（貸出エンジン）
// ============================================================================

/// POST /api/borrow/:book_id/patron/:patron_id - 書籍を貸し出す
///
/// 同一書籍への並行リクエストはエンジン側で直列化され、勝者は1件だけ。
/// 敗者は409（already_borrowed）を受け取る。
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Path((book_id, patron_id)): Path<(i32, i32)>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state
        .lending
        .borrow_book(BookId::new(book_id), PatronId::new(patron_id))
        .await?;
    Ok(Json(LoanResponse::from(loan)))
}

/// PUT /api/return/:book_id/patron/:patron_id - 書籍を返却する
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Path((book_id, patron_id)): Path<(i32, i32)>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state
        .lending
        .return_book(BookId::new(book_id), PatronId::new(patron_id))
        .await?;
    Ok(Json(LoanResponse::from(loan)))
}

// ============================================================================
// Books（カタログ管理）
// ============================================================================

/// GET /api/books - 書籍一覧（ページング、unpaged=trueで全件）
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    if query.unpaged {
        let books = state.books.find_all().await?;
        let body: Vec<BookResponse> = books.into_iter().map(BookResponse::from).collect();
        return Ok(Json(body).into_response());
    }

    let page = state.books.find_page(query.to_page_request()).await?;
    Ok(Json(PageResponse::from_page(page, BookResponse::from)).into_response())
}

/// GET /api/books/:id - 書籍詳細
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = state.books.find_by_id(BookId::new(id)).await?;
    Ok(Json(BookResponse::from(book)))
}

/// POST /api/books - 書籍を登録
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let draft = request.to_draft()?;
    let book = state.books.create(draft).await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// PUT /api/books/:id - 書籍を更新（ISBNは変更不可）
pub async fn update_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<BookRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let draft = request.to_draft()?;
    let book = state.books.update(BookId::new(id), draft).await?;
    Ok(Json(BookResponse::from(book)))
}

/// DELETE /api/books/:id - 書籍を削除
pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.books.delete(BookId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Patrons（利用者管理）
// ============================================================================

/// GET /api/patrons - 利用者一覧（ページング、unpaged=trueで全件）
pub async fn list_patrons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    if query.unpaged {
        let patrons = state.patrons.find_all().await?;
        let body: Vec<PatronResponse> = patrons.into_iter().map(PatronResponse::from).collect();
        return Ok(Json(body).into_response());
    }

    let page = state.patrons.find_page(query.to_page_request()).await?;
    Ok(Json(PageResponse::from_page(page, PatronResponse::from)).into_response())
}

/// GET /api/patrons/:id - 利用者詳細
pub async fn get_patron(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<PatronResponse>, ApiError> {
    let patron = state.patrons.find_by_id(PatronId::new(id)).await?;
    Ok(Json(PatronResponse::from(patron)))
}

/// POST /api/patrons - 利用者を登録
pub async fn create_patron(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PatronRequest>,
) -> Result<(StatusCode, Json<PatronResponse>), ApiError> {
    let draft = request.to_draft()?;
    let patron = state.patrons.create(draft).await?;
    Ok((StatusCode::CREATED, Json(PatronResponse::from(patron))))
}

/// PUT /api/patrons/:id - 利用者を更新（メールアドレスは変更不可）
pub async fn update_patron(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(request): Json<PatronRequest>,
) -> Result<Json<PatronResponse>, ApiError> {
    let draft = request.to_draft()?;
    let patron = state.patrons.update(PatronId::new(id), draft).await?;
    Ok(Json(PatronResponse::from(patron)))
}

/// DELETE /api/patrons/:id - 利用者を削除
pub async fn delete_patron(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.patrons.delete(PatronId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Loans（監査証跡の参照・管理用削除）
// ============================================================================

/// GET /api/loans - 貸出記録一覧（ページング、unpaged=trueで全件）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    if query.unpaged {
        let loans = state.loans.find_all().await?;
        let body: Vec<LoanResponse> = loans.into_iter().map(LoanResponse::from).collect();
        return Ok(Json(body).into_response());
    }

    let page = state.loans.find_page(query.to_page_request()).await?;
    Ok(Json(PageResponse::from_page(page, LoanResponse::from)).into_response())
}

/// GET /api/loans/:id - 貸出記録の詳細
pub async fn get_loan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<LoanResponse>, ApiError> {
    let loan = state.loans.find_by_id(LoanId::new(id)).await?;
    Ok(Json(LoanResponse::from(loan)))
}

/// DELETE /api/loans/:id - 貸出記録を削除（管理用の例外操作）
///
/// エンジンは記録を削除しない。これは監査証跡に対する管理者向けの
/// 上書き手段であり、通常経路では使われない。
pub async fn delete_loan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.loans.delete(LoanId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
