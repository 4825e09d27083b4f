use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::loan::{self, Loan};
use crate::domain::value_objects::{BookId, PatronId};
use crate::ports::lending_store::{LendingStore, LendingTx, StoreError};

use super::errors::{LendingError, Result};

/// 貸出エンジン
///
/// 排他的な貸出の付与と解除を担う。呼び出し間で状態を持たず、共有可変
/// 状態はすべてストア側にある。直列化はストアのトランザクション分離と
/// 排他ロック読み取りに委ね、プロセス内ミューテックスは使わない。
/// Loanの状態遷移を書き込むのはこのサービスだけ。
pub struct LendingService {
    store: Arc<dyn LendingStore>,
}

impl LendingService {
    pub fn new(store: Arc<dyn LendingStore>) -> Self {
        Self { store }
    }

    /// 書籍を貸し出す
    ///
    /// 1. 書籍と利用者を同一トランザクション内で解決する
    /// 2. 排他ロック付きで貸出中レコードの有無を確認する。同一書籍への
    ///    並行borrowはここで直列化され、後続は先行のコミット後に
    ///    再評価される
    /// 3. 貸出中ならAlreadyBorrowed（何も書き込まない）
    /// 4. 新しい貸出記録を挿入してコミットする
    pub async fn borrow_book(&self, book_id: BookId, patron_id: PatronId) -> Result<Loan> {
        let mut tx = self.store.begin().await.map_err(store_failure)?;
        let outcome = borrow_in_tx(&mut *tx, book_id, patron_id).await;
        let loan = finish_tx(tx, outcome).await?;

        info!(
            loan_id = %loan.id,
            book_id = %loan.book_id,
            patron_id = %loan.patron_id,
            "book borrowed"
        );
        Ok(loan)
    }

    /// 書籍を返却する
    ///
    /// 1. 書籍・利用者の両方に一致する貸出中レコードを取得する。
    ///    なければActiveLoanNotFound
    /// 2. returned_atを設定する。更新は貸出中の行だけを対象とし、競合する
    ///    書き込みが先にコミットしていればConcurrentModification
    pub async fn return_book(&self, book_id: BookId, patron_id: PatronId) -> Result<Loan> {
        let mut tx = self.store.begin().await.map_err(store_failure)?;
        let outcome = return_in_tx(&mut *tx, book_id, patron_id).await;
        let loan = finish_tx(tx, outcome).await?;

        info!(
            loan_id = %loan.id,
            book_id = %loan.book_id,
            patron_id = %loan.patron_id,
            "book returned"
        );
        Ok(loan)
    }
}

async fn borrow_in_tx(
    tx: &mut dyn LendingTx,
    book_id: BookId,
    patron_id: PatronId,
) -> Result<Loan> {
    tx.find_book(book_id)
        .await
        .map_err(store_failure)?
        .ok_or(LendingError::BookNotFound(book_id))?;
    tx.find_patron(patron_id)
        .await
        .map_err(store_failure)?
        .ok_or(LendingError::PatronNotFound(patron_id))?;

    if let Some(active) = tx
        .find_active_loan_by_book(book_id)
        .await
        .map_err(store_failure)?
    {
        return Err(LendingError::AlreadyBorrowed(active.book_id));
    }

    let draft = loan::open_loan(book_id, patron_id, Utc::now());
    match tx.insert_loan(draft).await {
        Ok(created) => Ok(created),
        // 一意制約側で検出された二重貸出もロック経路と同じ結果に畳む
        Err(StoreError::Conflict) => Err(LendingError::AlreadyBorrowed(book_id)),
        Err(err) => Err(store_failure(err)),
    }
}

async fn return_in_tx(
    tx: &mut dyn LendingTx,
    book_id: BookId,
    patron_id: PatronId,
) -> Result<Loan> {
    let active = tx
        .find_active_loan(book_id, patron_id)
        .await
        .map_err(store_failure)?
        .ok_or(LendingError::ActiveLoanNotFound { book_id, patron_id })?;

    let returned_at = Utc::now();
    let closed = loan::close_loan(&active, returned_at)
        .map_err(|_| LendingError::ConcurrentModification)?;

    tx.mark_returned(closed.id, returned_at)
        .await
        .map_err(store_failure)?
        .ok_or(LendingError::ConcurrentModification)
}

/// スコープ付きトランザクションの終端処理
///
/// 成功はコミット、失敗はロールバックと、すべての出口でトランザクションを
/// 閉じる。パニック経路はストア実装のドロップ時ロールバックが受け持つ。
async fn finish_tx<T>(tx: Box<dyn LendingTx>, outcome: Result<T>) -> Result<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await.map_err(store_failure)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

fn store_failure(err: StoreError) -> LendingError {
    match err {
        StoreError::LockTimeout => LendingError::LockTimeout,
        StoreError::Conflict => LendingError::ConcurrentModification,
        StoreError::Backend(cause) => LendingError::Store(cause),
    }
}
