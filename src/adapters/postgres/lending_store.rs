use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::book::Book;
use crate::domain::loan::{Loan, NewLoan};
use crate::domain::patron::Patron;
use crate::domain::value_objects::{BookId, LoanId, PatronId};
use crate::ports::lending_store::{
    LendingStore as LendingStoreTrait, LendingTx as LendingTxTrait, StoreError,
};
use crate::ports::repository::RepositoryError;

use super::book_repository::map_book_row;
use super::loan_repository::map_loan_row;
use super::patron_repository::map_patron_row;
use super::{is_lock_timeout, is_unique_violation};

/// LendingStoreのPostgreSQL実装
///
/// borrow/return 1回分を`sqlx::Transaction`で表現する。コミットも
/// ロールバックもされずにドロップされたトランザクションは、sqlx側で
/// ロールバックされる（パニック経路を含む）。
pub struct LendingStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl LendingStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl LendingStoreTrait for LendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTxTrait>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        // SET LOCALの効果はこのトランザクションの間だけ
        let timeout_ms = self.lock_timeout.as_millis().max(1);
        sqlx::query(&format!("SET LOCAL lock_timeout = '{timeout_ms}ms'"))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;

        Ok(Box::new(LendingTx { tx }))
    }
}

/// 1回のborrow/returnに対応するPostgreSQLトランザクション
pub struct LendingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LendingTxTrait for LendingTx {
    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query(
            "SELECT id, isbn, title, author, description, publication_year \
             FROM books WHERE id = $1",
        )
        .bind(id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        row.as_ref()
            .map(map_book_row)
            .transpose()
            .map_err(row_error)
    }

    async fn find_patron(&mut self, id: PatronId) -> Result<Option<Patron>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, address, post_no, city, email, phone_no \
             FROM patrons WHERE id = $1",
        )
        .bind(id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        row.as_ref()
            .map(map_patron_row)
            .transpose()
            .map_err(row_error)
    }

    /// 書籍行をロックしてから貸出中レコードを調べる
    ///
    /// 貸出中レコードが存在しない場合、loansへのFOR UPDATEは行を
    /// ロックできず並行挿入を排除できない。そのためロックの土台は
    /// 必ず存在する書籍行に置く。ロックは書籍単位なので、別の書籍への
    /// borrowと競合することはない。
    async fn find_active_loan_by_book(
        &mut self,
        book_id: BookId,
    ) -> Result<Option<Loan>, StoreError> {
        sqlx::query("SELECT id FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(store_error)?;

        let row = sqlx::query(
            "SELECT id, book_id, patron_id, borrowed_at, returned_at \
             FROM loans WHERE book_id = $1 AND returned_at IS NULL FOR UPDATE",
        )
        .bind(book_id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        row.as_ref()
            .map(map_loan_row)
            .transpose()
            .map_err(row_error)
    }

    async fn find_active_loan(
        &mut self,
        book_id: BookId,
        patron_id: PatronId,
    ) -> Result<Option<Loan>, StoreError> {
        let row = sqlx::query(
            "SELECT id, book_id, patron_id, borrowed_at, returned_at \
             FROM loans \
             WHERE book_id = $1 AND patron_id = $2 AND returned_at IS NULL",
        )
        .bind(book_id.value())
        .bind(patron_id.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        row.as_ref()
            .map(map_loan_row)
            .transpose()
            .map_err(row_error)
    }

    async fn insert_loan(&mut self, draft: NewLoan) -> Result<Loan, StoreError> {
        // loans_active_book_idx（部分一意インデックス）違反はConflict
        let row = sqlx::query(
            "INSERT INTO loans (book_id, patron_id, borrowed_at) \
             VALUES ($1, $2, $3) \
             RETURNING id, book_id, patron_id, borrowed_at, returned_at",
        )
        .bind(draft.book_id.value())
        .bind(draft.patron_id.value())
        .bind(draft.borrowed_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(store_error)?;

        map_loan_row(&row).map_err(row_error)
    }

    async fn mark_returned(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Loan>, StoreError> {
        let row = sqlx::query(
            "UPDATE loans SET returned_at = $2 \
             WHERE id = $1 AND returned_at IS NULL \
             RETURNING id, book_id, patron_id, borrowed_at, returned_at",
        )
        .bind(loan_id.value())
        .bind(returned_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(store_error)?;

        row.as_ref()
            .map(map_loan_row)
            .transpose()
            .map_err(row_error)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(store_error)
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    if is_lock_timeout(&err) {
        return StoreError::LockTimeout;
    }
    if is_unique_violation(&err) {
        return StoreError::Conflict;
    }
    StoreError::Backend(Box::new(err))
}

fn row_error(err: RepositoryError) -> StoreError {
    StoreError::Backend(Box::new(err))
}
