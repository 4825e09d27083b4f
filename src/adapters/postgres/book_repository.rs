use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::book::{Book, NewBook};
use crate::domain::value_objects::{BookId, Isbn, PublicationYear};
use crate::ports::repository::{Entity, Page, PageRequest, Repository, RepositoryError};

use super::{backend, corrupt_row, insert_error};

const BOOK_COLUMNS: &str = "id, isbn, title, author, description, publication_year";

/// PostgreSQLの行データをBookに変換する
///
/// 保存済みの値も値オブジェクトの検証を通して復元する。検証を通らない
/// 行は不正データとして報告される。
pub(super) fn map_book_row(row: &PgRow) -> Result<Book, RepositoryError> {
    let isbn_raw: String = row.get("isbn");
    let isbn = Isbn::new(&isbn_raw).map_err(corrupt_row)?;
    let publication_year =
        PublicationYear::new(row.get("publication_year")).map_err(corrupt_row)?;

    Ok(Book {
        id: BookId::new(row.get("id")),
        isbn,
        title: row.get("title"),
        author: row.get("author"),
        description: row.get("description"),
        publication_year,
    })
}

/// Repository<Book> のPostgreSQL実装
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Book> for BookRepository {
    async fn insert(&self, draft: NewBook) -> Result<Book, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO books (isbn, title, author, description, publication_year)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(draft.isbn.as_str())
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(&draft.description)
        .bind(draft.publication_year.value())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| insert_error::<Book>(err, Some(draft.isbn.as_str())))?;

        map_book_row(&row)
    }

    async fn update(&self, id: BookId, draft: NewBook) -> Result<Book, RepositoryError> {
        let existing = self.find_by_id(id).await?.ok_or(RepositoryError::NotFound {
            entity: Book::NAME,
            id: id.to_string(),
        })?;
        if existing.isbn != draft.isbn {
            return Err(RepositoryError::KeyImmutable {
                entity: Book::NAME,
                key: "isbn",
            });
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE books
            SET title = $2, author = $3, description = $4, publication_year = $5
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id.value())
        .bind(&draft.title)
        .bind(&draft.author)
        .bind(&draft.description)
        .bind(draft.publication_year.value())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        map_book_row(&row)
    }

    async fn find_by_id(&self, id: BookId) -> Result<Option<Book>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(map_book_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Book>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(map_book_row).collect()
    }

    async fn find_page(&self, request: PageRequest) -> Result<Page<Book>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let rows = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Page {
            items: rows.iter().map(map_book_row).collect::<Result<_, _>>()?,
            page: request.page,
            size: request.size,
            total_elements: total as u64,
        })
    }

    async fn delete_by_id(&self, id: BookId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if super::is_foreign_key_violation(&err) {
                    RepositoryError::Referenced {
                        entity: Book::NAME,
                        id: id.to_string(),
                    }
                } else {
                    backend(err)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: Book::NAME,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
