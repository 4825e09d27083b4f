use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use library_lending::adapters::memory::MemoryDb;
use library_lending::api::{handlers::AppState, router::create_router};
use library_lending::application::{directory::Directory, lending::LendingService};
use library_lending::domain::book::Book;
use library_lending::domain::loan::Loan;
use library_lending::domain::patron::Patron;
use serde_json::{Value, json};
use tower::ServiceExt;

// ============================================================================
// テスト用ヘルパー
// ============================================================================

/// インメモリアダプタでアプリケーションを組み立てる
fn build_app() -> Router {
    let db = MemoryDb::new();
    let state = AppState {
        lending: LendingService::new(Arc::new(db.lending_store())),
        books: Directory::with_cache(Arc::new(db.repository::<Book>())),
        patrons: Directory::with_cache(Arc::new(db.repository::<Patron>())),
        loans: Directory::new(Arc::new(db.repository::<Loan>())),
    };
    create_router(Arc::new(state))
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(value) => builder.body(Body::from(value.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn book_body(isbn: &str) -> Value {
    json!({
        "isbn": isbn,
        "title": "The Dispossessed",
        "author": "Ursula K. Le Guin",
        "publication_year": 1974
    })
}

fn patron_body(email: &str) -> Value {
    json!({
        "name": "Ada Lovelace",
        "address": "12 Analytical Row",
        "post_no": "11833",
        "city": "London",
        "email": email,
        "phone_no": "+1 555-867-5309"
    })
}

async fn seed_book(app: &Router, isbn: &str) -> i64 {
    let (status, body) = send_json(app, "POST", "/api/books", Some(book_body(isbn))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

async fn seed_patron(app: &Router, email: &str) -> i64 {
    let (status, body) = send_json(app, "POST", "/api/patrons", Some(patron_body(email))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

// ============================================================================
// E2E: 貸出フロー
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = build_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_full_borrow_and_return_flow() {
    // Arrange
    let app = build_app();
    let book_id = seed_book(&app, "9783161484100").await;
    let patron_id = seed_patron(&app, "ada@example.com").await;
    let rival_id = seed_patron(&app, "grace@example.com").await;

    // Act & Assert: 貸出
    let (status, loan) = send_json(
        &app,
        "POST",
        &format!("/api/borrow/{book_id}/patron/{patron_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["book_id"].as_i64().unwrap(), book_id);
    assert!(loan["returned_at"].is_null());

    // 貸出中の二重borrowは409
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/borrow/{book_id}/patron/{rival_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_borrowed");

    // 返却でreturned_atが設定される
    let (status, returned) = send_json(
        &app,
        "PUT",
        &format!("/api/return/{book_id}/patron/{patron_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(returned["id"], loan["id"]);
    assert!(!returned["returned_at"].is_null());

    // 二度目の返却は404（貸出中の記録がない）
    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/api/return/{book_id}/patron/{patron_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    // 返却後は別の利用者が借りられる
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/api/borrow/{book_id}/patron/{rival_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_borrow_unknown_book_returns_not_found() {
    let app = build_app();
    let patron_id = seed_patron(&app, "ada@example.com").await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/api/borrow/999/patron/{patron_id}"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    // 失敗したborrowは記録を残さない
    let (status, loans) = send_json(&app, "GET", "/api/loans?unpaged=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans.as_array().unwrap().len(), 0);
}

// ============================================================================
// バリデーションとエラーマッピング
// ============================================================================

#[tokio::test]
async fn test_create_book_with_invalid_isbn_returns_bad_request() {
    let app = build_app();

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/books",
        Some(book_body("not-an-isbn")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_duplicate_isbn_returns_conflict() {
    let app = build_app();
    seed_book(&app, "9783161484100").await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/books",
        Some(book_body("9783161484100")),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_key");
}

#[tokio::test]
async fn test_changing_isbn_on_update_returns_bad_request() {
    let app = build_app();
    let book_id = seed_book(&app, "9783161484100").await;

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/api/books/{book_id}"),
        Some(book_body("9780306406157")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "immutable_key");
}

#[tokio::test]
async fn test_get_missing_book_returns_not_found() {
    let app = build_app();

    let (status, body) = send_json(&app, "GET", "/api/books/123", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

// ============================================================================
// 一覧とページング
// ============================================================================

#[tokio::test]
async fn test_loans_listing_exposes_audit_trail() {
    // Arrange: 1回の貸出と返却
    let app = build_app();
    let book_id = seed_book(&app, "9783161484100").await;
    let patron_id = seed_patron(&app, "ada@example.com").await;
    send_json(
        &app,
        "POST",
        &format!("/api/borrow/{book_id}/patron/{patron_id}"),
        None,
    )
    .await;
    send_json(
        &app,
        "PUT",
        &format!("/api/return/{book_id}/patron/{patron_id}"),
        None,
    )
    .await;

    // Act
    let (status, loans) = send_json(&app, "GET", "/api/loans?unpaged=true", None).await;

    // Assert: 返却済みの記録が監査証跡として残る
    assert_eq!(status, StatusCode::OK);
    let items = loans.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(!items[0]["returned_at"].is_null());
}

#[tokio::test]
async fn test_book_listing_is_paged() {
    let app = build_app();
    for n in 0..5u32 {
        seed_book(&app, &format!("978{n:010}")).await;
    }

    let (status, page) = send_json(&app, "GET", "/api/books?page=0&size=2", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
    assert_eq!(page["total_elements"].as_u64().unwrap(), 5);
    assert_eq!(page["total_pages"].as_u64().unwrap(), 3);
}
