use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::loan::{Loan, NewLoan};
use crate::domain::value_objects::{BookId, LoanId, PatronId};
use crate::ports::repository::{Entity, Page, PageRequest, Repository, RepositoryError};

use super::{backend, insert_error};

const LOAN_COLUMNS: &str = "id, book_id, patron_id, borrowed_at, returned_at";

/// PostgreSQLの行データをLoanに変換する
pub(super) fn map_loan_row(row: &PgRow) -> Result<Loan, RepositoryError> {
    Ok(Loan {
        id: LoanId::new(row.get("id")),
        book_id: BookId::new(row.get("book_id")),
        patron_id: PatronId::new(row.get("patron_id")),
        borrowed_at: row.get("borrowed_at"),
        returned_at: row.get("returned_at"),
    })
}

/// Repository<Loan> のPostgreSQL実装
///
/// 監査証跡の参照と管理用削除のための汎用実装。貸出状態の遷移
/// （作成・返却）は貸出エンジンがLendingStore経由でのみ行う。
pub struct LoanRepository {
    pool: PgPool,
}

impl LoanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Loan> for LoanRepository {
    async fn insert(&self, draft: NewLoan) -> Result<Loan, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO loans (book_id, patron_id, borrowed_at)
            VALUES ($1, $2, $3)
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(draft.book_id.value())
        .bind(draft.patron_id.value())
        .bind(draft.borrowed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| insert_error::<Loan>(err, None))?;

        map_loan_row(&row)
    }

    async fn update(&self, id: LoanId, draft: NewLoan) -> Result<Loan, RepositoryError> {
        // returned_atはここでは触らない
        let row = sqlx::query(&format!(
            r#"
            UPDATE loans
            SET book_id = $2, patron_id = $3, borrowed_at = $4
            WHERE id = $1
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(id.value())
        .bind(draft.book_id.value())
        .bind(draft.patron_id.value())
        .bind(draft.borrowed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(RepositoryError::NotFound {
            entity: Loan::NAME,
            id: id.to_string(),
        })?;

        map_loan_row(&row)
    }

    async fn find_by_id(&self, id: LoanId) -> Result<Option<Loan>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(map_loan_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Loan>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {LOAN_COLUMNS} FROM loans ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(map_loan_row).collect()
    }

    async fn find_page(&self, request: PageRequest) -> Result<Page<Loan>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let rows = sqlx::query(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Page {
            items: rows.iter().map(map_loan_row).collect::<Result<_, _>>()?,
            page: request.page,
            size: request.size,
            total_elements: total as u64,
        })
    }

    async fn delete_by_id(&self, id: LoanId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: Loan::NAME,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
