use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::book::Book;
use crate::domain::loan::{Loan, NewLoan};
use crate::domain::patron::Patron;
use crate::domain::value_objects::{BookId, LoanId, PatronId};

use super::repository::BoxError;

/// 貸出ストアのエラー
#[derive(Debug, Error)]
pub enum StoreError {
    /// ロック待ちが上限時間に達した
    #[error("lock wait timed out")]
    LockTimeout,

    /// コミット済みの並行書き込みと衝突した（一意制約違反・更新対象の消失）
    #[error("conflicting concurrent update")]
    Conflict,

    /// ストア側の障害
    #[error("storage error")]
    Backend(#[source] BoxError),
}

/// 貸出エンジン専用のトランザクション境界ポート
///
/// Loanの状態遷移はすべてこのポートを通って書き込まれる。`begin`が返す
/// トランザクションの効果は、コミットまで他の呼び出しからは見えない。
#[async_trait]
pub trait LendingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LendingTx>, StoreError>;
}

/// 1回のborrow/returnに対応するトランザクション
///
/// 書籍・利用者の解決は読み取りキャッシュを経由せず、このトランザクション
/// 内の読み取りで行う。削除直後の書籍に対して貸出が成立することはない。
#[async_trait]
pub trait LendingTx: Send {
    /// トランザクション内で書籍を解決する
    async fn find_book(&mut self, id: BookId) -> Result<Option<Book>, StoreError>;

    /// トランザクション内で利用者を解決する
    async fn find_patron(&mut self, id: PatronId) -> Result<Option<Patron>, StoreError>;

    /// 対象書籍の貸出中レコードを排他ロック付きで取得する
    ///
    /// 同一書籍に対する並行borrowを直列化する唯一の仕組み。先行トランザク
    /// ションがロックを保持している間、この呼び出しはブロックし、解放後に
    /// 先行側の効果が見える状態で再評価される。ロック待ちが上限に達した
    /// 場合は`LockTimeout`。
    async fn find_active_loan_by_book(
        &mut self,
        book_id: BookId,
    ) -> Result<Option<Loan>, StoreError>;

    /// 書籍と利用者の両方に一致する貸出中レコードを取得する（通常読み取り）
    async fn find_active_loan(
        &mut self,
        book_id: BookId,
        patron_id: PatronId,
    ) -> Result<Option<Loan>, StoreError>;

    /// 新しい貸出記録を挿入する
    ///
    /// 貸出中の一意性を破る挿入は`Conflict`になる。
    async fn insert_loan(&mut self, draft: NewLoan) -> Result<Loan, StoreError>;

    /// 貸出記録に返却時刻を設定する（貸出中の行だけが対象）
    ///
    /// 競合する返却が先にコミットしていた場合は`None`を返す。
    async fn mark_returned(
        &mut self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Loan>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
