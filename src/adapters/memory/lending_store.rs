use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::domain::book::Book;
use crate::domain::loan::{Loan, NewLoan};
use crate::domain::patron::Patron;
use crate::domain::value_objects::{BookId, LoanId, PatronId};
use crate::ports::lending_store::{LendingStore as LendingStoreTrait, LendingTx, StoreError};
use crate::ports::repository::Entity;

use super::db::{MemoryDb, MemoryState};

/// LendingStoreのインメモリ実装
///
/// データベース状態全体のロックをトランザクションの間保持することで
/// 直列化する。PostgreSQL実装の書籍行ロックより粒度は粗いが、
/// 貸出プロトコルの直列化要件はそのまま再現される。
pub struct MemoryLendingStore {
    db: MemoryDb,
}

impl MemoryLendingStore {
    pub(super) fn new(db: MemoryDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LendingStoreTrait for MemoryLendingStore {
    async fn begin(&self) -> Result<Box<dyn LendingTx>, StoreError> {
        let guard = self.db.state.clone().lock_owned().await;
        let snapshot = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard,
            snapshot: Some(snapshot),
            finished: false,
        }))
    }
}

/// ロックを保持したままのトランザクション
///
/// commitもrollbackもされずにドロップされた場合は、begin時点の
/// スナップショットへ巻き戻す。
struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
    finished: bool,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(snapshot) = self.snapshot.take() {
                *self.guard = snapshot;
            }
        }
    }
}

#[async_trait]
impl LendingTx for MemoryTx {
    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>, StoreError> {
        Ok(self.guard.books.rows.get(&id).cloned())
    }

    async fn find_patron(&mut self, id: PatronId) -> Result<Option<Patron>, StoreError> {
        Ok(self.guard.patrons.rows.get(&id).cloned())
    }

    async fn find_active_loan_by_book(
        &mut self,
        book_id: BookId,
    ) -> Result<Option<Loan>, StoreError> {
        // 状態全体のロックを保持しているため、この読み取り自体が排他
        Ok(self
            .guard
            .loans
            .rows
            .values()
            .find(|loan| loan.book_id == book_id && loan.is_active())
            .cloned())
    }

    async fn find_active_loan(
        &mut self,
        book_id: BookId,
        patron_id: PatronId,
    ) -> Result<Option<Loan>, StoreError> {
        Ok(self
            .guard
            .loans
            .rows
            .values()
            .find(|loan| {
                loan.book_id == book_id && loan.patron_id == patron_id && loan.is_active()
            })
            .cloned())
    }

    async fn insert_loan(&mut self, draft: NewLoan) -> Result<Loan, StoreError> {
        // 部分一意インデックス相当の検査
        let duplicate = self
            .guard
            .loans
            .rows
            .values()
            .any(|loan| loan.book_id == draft.book_id && loan.is_active());
        if duplicate {
            return Err(StoreError::Conflict);
        }

        let id = self.guard.loans.allocate_id();
        let loan = Loan::from_draft(id, draft);
        self.guard.loans.rows.insert(id, loan.clone());
        Ok(loan)
    }

    async fn mark_returned(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Loan>, StoreError> {
        match self.guard.loans.rows.get_mut(&loan_id) {
            Some(loan) if loan.is_active() => {
                loan.returned_at = Some(returned_at);
                Ok(Some(loan.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        tx.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        if let Some(snapshot) = tx.snapshot.take() {
            *tx.guard = snapshot;
        }
        tx.finished = true;
        Ok(())
    }
}
