use thiserror::Error;

use crate::domain::value_objects::{BookId, PatronId};
use crate::ports::repository::BoxError;

/// 貸出エンジンのエラー
///
/// いずれもエンジン内で再試行されることはなく、そのまま呼び出し側へ
/// 報告される。再試行するかどうかは呼び出し側のポリシー。
#[derive(Debug, Error)]
pub enum LendingError {
    /// 書籍が存在しない
    #[error("book {0} does not exist")]
    BookNotFound(BookId),

    /// 利用者が存在しない
    #[error("patron {0} does not exist")]
    PatronNotFound(PatronId),

    /// 対象書籍は貸出中
    #[error("book {0} is already borrowed")]
    AlreadyBorrowed(BookId),

    /// 貸出中レコードが見つからない
    ///
    /// 「未貸出」「返却済み」「別の利用者が借りている」は呼び出し側には
    /// 区別されず、この1つの結果にまとめられる。
    #[error("no active loan found for book {book_id} and patron {patron_id}")]
    ActiveLoanNotFound {
        book_id: BookId,
        patron_id: PatronId,
    },

    /// コミット済みの並行書き込みに負けた（呼び出し側の再送が必要）
    #[error("loan record was modified concurrently")]
    ConcurrentModification,

    /// 貸出ロックの待機が上限時間に達した
    #[error("timed out waiting for the lending lock")]
    LockTimeout,

    /// その他の永続化障害
    #[error("lending store error")]
    Store(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, LendingError>;
