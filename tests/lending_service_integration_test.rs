use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use library_lending::adapters::memory::MemoryDb;
use library_lending::application::lending::{LendingError, LendingService};
use library_lending::domain::book::{Book, NewBook};
use library_lending::domain::loan::Loan;
use library_lending::domain::patron::{NewPatron, Patron};
use library_lending::domain::value_objects::{BookId, PatronId};
use library_lending::ports::lending_store::LendingStore;
use library_lending::ports::repository::Repository;

// ============================================================================
// テスト用ヘルパー
// ============================================================================

fn isbn(n: u32) -> String {
    format!("978{n:010}")
}

fn sample_book(n: u32) -> NewBook {
    NewBook::new(&isbn(n), &format!("Book {n}"), "Test Author", None, 2001).unwrap()
}

fn sample_patron(n: u32) -> NewPatron {
    NewPatron::new(
        &format!("Patron {n}"),
        "1 Test Street",
        "12345",
        "Testville",
        &format!("patron{n}@example.com"),
        "+1 555-867-5309",
    )
    .unwrap()
}

fn setup() -> (MemoryDb, LendingService) {
    let db = MemoryDb::new();
    let service = LendingService::new(Arc::new(db.lending_store()));
    (db, service)
}

async fn seed_book(db: &MemoryDb, n: u32) -> BookId {
    db.repository::<Book>()
        .insert(sample_book(n))
        .await
        .unwrap()
        .id
}

async fn seed_patron(db: &MemoryDb, n: u32) -> PatronId {
    db.repository::<Patron>()
        .insert(sample_patron(n))
        .await
        .unwrap()
        .id
}

async fn all_loans(db: &MemoryDb) -> Vec<Loan> {
    db.repository::<Loan>().find_all().await.unwrap()
}

// ============================================================================
// 貸出プロトコルのシナリオ
// ============================================================================

#[tokio::test]
async fn test_borrow_creates_active_loan() {
    // Arrange
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let patron_id = seed_patron(&db, 42).await;

    // Act
    let loan = service.borrow_book(book_id, patron_id).await.unwrap();

    // Assert
    assert_eq!(loan.book_id, book_id);
    assert_eq!(loan.patron_id, patron_id);
    assert!(loan.is_active());
}

#[tokio::test]
async fn test_borrow_fails_when_already_borrowed() {
    // Arrange: 書籍1は利用者42が貸出中
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let first = seed_patron(&db, 42).await;
    let second = seed_patron(&db, 99).await;
    service.borrow_book(book_id, first).await.unwrap();

    // Act
    let result = service.borrow_book(book_id, second).await;

    // Assert: 競合として報告され、新しい記録は作られない
    assert!(matches!(result, Err(LendingError::AlreadyBorrowed(id)) if id == book_id));
    assert_eq!(all_loans(&db).await.len(), 1);
}

#[tokio::test]
async fn test_borrow_fails_for_unknown_book() {
    // Arrange
    let (db, service) = setup();
    let patron_id = seed_patron(&db, 42).await;

    // Act
    let result = service.borrow_book(BookId::new(999), patron_id).await;

    // Assert: 記録は一切作られない
    assert!(matches!(result, Err(LendingError::BookNotFound(id)) if id == BookId::new(999)));
    assert!(all_loans(&db).await.is_empty());
}

#[tokio::test]
async fn test_borrow_fails_for_unknown_patron() {
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;

    let result = service.borrow_book(book_id, PatronId::new(999)).await;

    assert!(matches!(result, Err(LendingError::PatronNotFound(_))));
    assert!(all_loans(&db).await.is_empty());
}

#[tokio::test]
async fn test_return_without_active_loan_fails() {
    // Arrange: 貸出記録なし
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let patron_id = seed_patron(&db, 42).await;

    // Act
    let result = service.return_book(book_id, patron_id).await;

    // Assert
    assert!(matches!(
        result,
        Err(LendingError::ActiveLoanNotFound { .. })
    ));
}

#[tokio::test]
async fn test_return_by_wrong_patron_fails() {
    // Arrange: 借りたのは利用者42
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let borrower = seed_patron(&db, 42).await;
    let other = seed_patron(&db, 99).await;
    service.borrow_book(book_id, borrower).await.unwrap();

    // Act: 別の利用者が返却を試みる
    let result = service.return_book(book_id, other).await;

    // Assert: 未貸出と同じ1つの結果にまとめられる
    assert!(matches!(
        result,
        Err(LendingError::ActiveLoanNotFound { .. })
    ));
}

#[tokio::test]
async fn test_round_trip_releases_book() {
    // Arrange
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let first = seed_patron(&db, 42).await;
    let second = seed_patron(&db, 77).await;

    // Act: 貸出→返却→別の利用者が貸出
    let borrowed = service.borrow_book(book_id, first).await.unwrap();
    let returned = service.return_book(book_id, first).await.unwrap();
    let reborrowed = service.borrow_book(book_id, second).await.unwrap();

    // Assert: 返却時刻は貸出時刻より後で、書籍は再び貸出可能
    assert_eq!(returned.id, borrowed.id);
    assert!(returned.returned_at.unwrap() >= returned.borrowed_at);
    assert!(reborrowed.is_active());
    assert_ne!(reborrowed.id, borrowed.id);
}

#[tokio::test]
async fn test_second_return_fails_and_keeps_record() {
    // Arrange: 返却済みの貸出
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let patron_id = seed_patron(&db, 42).await;
    service.borrow_book(book_id, patron_id).await.unwrap();
    let returned = service.return_book(book_id, patron_id).await.unwrap();

    // Act: もう一度返却
    let result = service.return_book(book_id, patron_id).await;

    // Assert: 貸出中の記録は残っておらず、既存の記録は変化しない
    assert!(matches!(
        result,
        Err(LendingError::ActiveLoanNotFound { .. })
    ));
    let stored = db
        .repository::<Loan>()
        .find_by_id(returned.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.returned_at, returned.returned_at);
}

// ============================================================================
// 並行性（相互排他と不変条件）
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_have_single_winner() {
    // Arrange: 1冊の書籍に8人の利用者が同時にborrow
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let mut patron_ids = Vec::new();
    for n in 0..8 {
        patron_ids.push(seed_patron(&db, n).await);
    }
    let service = Arc::new(service);

    // Act
    let handles = patron_ids.into_iter().map(|patron_id| {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.borrow_book(book_id, patron_id).await })
    });
    let results = join_all(handles).await;

    // Assert: 勝者はちょうど1人、残りは全員AlreadyBorrowed
    let mut winners = 0;
    let mut conflicts = 0;
    for result in results {
        match result.unwrap() {
            Ok(loan) => {
                assert!(loan.is_active());
                winners += 1;
            }
            Err(LendingError::AlreadyBorrowed(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);

    // 不変条件: 貸出中の記録は高々1件
    let active = all_loans(&db)
        .await
        .iter()
        .filter(|loan| loan.is_active())
        .count();
    assert_eq!(active, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_different_books_both_succeed() {
    // Arrange: 書籍2冊、利用者2人
    let (db, service) = setup();
    let first_book = seed_book(&db, 1).await;
    let second_book = seed_book(&db, 2).await;
    let first_patron = seed_patron(&db, 42).await;
    let second_patron = seed_patron(&db, 99).await;
    let service = Arc::new(service);

    // Act: 別々の書籍へ同時にborrow
    let a = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.borrow_book(first_book, first_patron).await })
    };
    let b = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.borrow_book(second_book, second_patron).await })
    };

    // Assert: ロックは書籍単位なので両方成功する
    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_invariant_holds_across_borrow_return_cycles() {
    // Arrange
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let patron_id = seed_patron(&db, 42).await;

    // Act: 貸出と返却を繰り返す
    for _ in 0..5 {
        service.borrow_book(book_id, patron_id).await.unwrap();
        service.return_book(book_id, patron_id).await.unwrap();
    }

    // Assert: 監査証跡は追記のみで、貸出中の記録は残らない
    let loans = all_loans(&db).await;
    assert_eq!(loans.len(), 5);
    assert!(loans.iter().all(|loan| !loan.is_active()));
}

// ============================================================================
// ストア境界（更新の競合検出）
// ============================================================================

#[tokio::test]
async fn test_mark_returned_reports_lost_race() {
    // Arrange: 返却済みの貸出に対してストアを直接使う
    let (db, service) = setup();
    let book_id = seed_book(&db, 1).await;
    let patron_id = seed_patron(&db, 42).await;
    let loan = service.borrow_book(book_id, patron_id).await.unwrap();
    service.return_book(book_id, patron_id).await.unwrap();

    // Act: 貸出中でない行への返却マーク
    let store = db.lending_store();
    let mut tx = store.begin().await.unwrap();
    let outcome = tx.mark_returned(loan.id, Utc::now()).await.unwrap();
    tx.rollback().await.unwrap();

    // Assert: 対象行がないことがNoneで報告される
    assert!(outcome.is_none());
}
