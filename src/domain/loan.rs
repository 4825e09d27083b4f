use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::CloseLoanError;
use super::value_objects::{BookId, LoanId, PatronId};

/// 貸出記録 - 1冊の書籍の1回の貸出エピソード
///
/// `returned_at`が未設定の間だけ「貸出中」。設定は返却時の一度きりで、
/// それ以降この記録は監査証跡として不変。書籍・利用者への参照はIDのみ
/// 保持し、作成後に変更されない。
///
/// 排他の不変条件：ある書籍について、貸出中の記録は常に高々1件。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub patron_id: PatronId,
    pub borrowed_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// 貸出中か（返却時刻が未設定か）
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// 貸出記録の作成内容（ID採番前）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewLoan {
    pub book_id: BookId,
    pub patron_id: PatronId,
    pub borrowed_at: DateTime<Utc>,
}

/// 純粋関数：貸出を開始する
///
/// 副作用なし。貸出中（returned_at未設定）の新しい記録内容を返す。
pub fn open_loan(book_id: BookId, patron_id: PatronId, borrowed_at: DateTime<Utc>) -> NewLoan {
    NewLoan {
        book_id,
        patron_id,
        borrowed_at,
    }
}

/// 純粋関数：貸出を返却済みにする
///
/// 副作用なし。returned_atを設定した新しいLoanを返す。
/// 既に返却済みの記録には適用できない。
pub fn close_loan(loan: &Loan, returned_at: DateTime<Utc>) -> Result<Loan, CloseLoanError> {
    if loan.returned_at.is_some() {
        return Err(CloseLoanError::AlreadyReturned);
    }

    Ok(Loan {
        returned_at: Some(returned_at),
        ..loan.clone()
    })
}
