use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::patron::{NewPatron, Patron};
use crate::domain::value_objects::{Email, PatronId, PhoneNumber};
use crate::ports::repository::{Entity, Page, PageRequest, Repository, RepositoryError};

use super::{backend, corrupt_row, insert_error};

const PATRON_COLUMNS: &str = "id, name, address, post_no, city, email, phone_no";

/// PostgreSQLの行データをPatronに変換する
pub(super) fn map_patron_row(row: &PgRow) -> Result<Patron, RepositoryError> {
    let email_raw: String = row.get("email");
    let email = Email::new(&email_raw).map_err(corrupt_row)?;
    let phone_raw: String = row.get("phone_no");
    let phone_no = PhoneNumber::new(&phone_raw).map_err(corrupt_row)?;

    Ok(Patron {
        id: PatronId::new(row.get("id")),
        name: row.get("name"),
        address: row.get("address"),
        post_no: row.get("post_no"),
        city: row.get("city"),
        email,
        phone_no,
    })
}

/// Repository<Patron> のPostgreSQL実装
pub struct PatronRepository {
    pool: PgPool,
}

impl PatronRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Patron> for PatronRepository {
    async fn insert(&self, draft: NewPatron) -> Result<Patron, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO patrons (name, address, post_no, city, email, phone_no)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PATRON_COLUMNS}
            "#
        ))
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.post_no)
        .bind(&draft.city)
        .bind(draft.email.as_str())
        .bind(draft.phone_no.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|err| insert_error::<Patron>(err, Some(draft.email.as_str())))?;

        map_patron_row(&row)
    }

    async fn update(&self, id: PatronId, draft: NewPatron) -> Result<Patron, RepositoryError> {
        let existing = self.find_by_id(id).await?.ok_or(RepositoryError::NotFound {
            entity: Patron::NAME,
            id: id.to_string(),
        })?;
        if existing.email != draft.email {
            return Err(RepositoryError::KeyImmutable {
                entity: Patron::NAME,
                key: "email",
            });
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE patrons
            SET name = $2, address = $3, post_no = $4, city = $5, phone_no = $6
            WHERE id = $1
            RETURNING {PATRON_COLUMNS}
            "#
        ))
        .bind(id.value())
        .bind(&draft.name)
        .bind(&draft.address)
        .bind(&draft.post_no)
        .bind(&draft.city)
        .bind(draft.phone_no.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        map_patron_row(&row)
    }

    async fn find_by_id(&self, id: PatronId) -> Result<Option<Patron>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PATRON_COLUMNS} FROM patrons WHERE id = $1"
        ))
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(map_patron_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Patron>, RepositoryError> {
        let rows = sqlx::query(&format!("SELECT {PATRON_COLUMNS} FROM patrons ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter().map(map_patron_row).collect()
    }

    async fn find_page(&self, request: PageRequest) -> Result<Page<Patron>, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patrons")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        let rows = sqlx::query(&format!(
            "SELECT {PATRON_COLUMNS} FROM patrons ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Page {
            items: rows.iter().map(map_patron_row).collect::<Result<_, _>>()?,
            page: request.page,
            size: request.size,
            total_elements: total as u64,
        })
    }

    async fn delete_by_id(&self, id: PatronId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM patrons WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if super::is_foreign_key_violation(&err) {
                    RepositoryError::Referenced {
                        entity: Patron::NAME,
                        id: id.to_string(),
                    }
                } else {
                    backend(err)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: Patron::NAME,
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
