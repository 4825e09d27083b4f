pub mod book_repository;
pub mod lending_store;
pub mod loan_repository;
pub mod patron_repository;

pub use book_repository::BookRepository as PostgresBookRepository;
pub use lending_store::LendingStore as PostgresLendingStore;
pub use loan_repository::LoanRepository as PostgresLoanRepository;
pub use patron_repository::PatronRepository as PostgresPatronRepository;

use crate::domain::errors::ValidationError;
use crate::ports::repository::{Entity, RepositoryError};

/// PostgreSQLの一意制約違反（SQLSTATE 23505）か
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// PostgreSQLの外部キー制約違反（SQLSTATE 23503）か
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}

/// PostgreSQLのロック待ちタイムアウト（SQLSTATE 55P03）か
pub(crate) fn is_lock_timeout(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("55P03"))
}

pub(crate) fn backend(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(Box::new(err))
}

/// 保存済みの行が値オブジェクトの検証を通らなかった場合のエラー
pub(crate) fn corrupt_row(err: ValidationError) -> RepositoryError {
    RepositoryError::Backend(Box::new(err))
}

/// 挿入エラーの変換：一意制約違反はDuplicateKeyとして報告する
pub(crate) fn insert_error<E: Entity>(err: sqlx::Error, key_value: Option<&str>) -> RepositoryError {
    if is_unique_violation(&err) {
        if let (Some(key), Some(value)) = (E::NATURAL_KEY, key_value) {
            return RepositoryError::DuplicateKey {
                entity: E::NAME,
                key,
                value: value.to_string(),
            };
        }
    }
    backend(err)
}
