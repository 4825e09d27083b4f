use std::marker::PhantomData;

use async_trait::async_trait;

use crate::ports::repository::{Entity, Page, PageRequest, Repository, RepositoryError};

use super::db::{HasTable, MemoryDb, MemoryState, Table};

/// Repositoryのインメモリ実装
///
/// 同一の`MemoryDb`を共有するエンティティ別のビューとして動作する。
/// 自然キーの一意性・不変性はPostgreSQL実装と同じ契約で検査する。
pub struct MemoryRepository<E: Entity> {
    db: MemoryDb,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> MemoryRepository<E> {
    pub(super) fn new(db: MemoryDb) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> Repository<E> for MemoryRepository<E>
where
    MemoryState: HasTable<E>,
{
    async fn insert(&self, draft: E::Draft) -> Result<E, RepositoryError> {
        let mut state = self.db.state.lock().await;

        if let Some(value) = E::draft_natural_key(&draft) {
            let table: &Table<E> = <MemoryState as HasTable<E>>::table(&state);
            if table
                .rows
                .values()
                .any(|row| row.natural_key() == Some(value))
            {
                return Err(RepositoryError::DuplicateKey {
                    entity: E::NAME,
                    key: E::NATURAL_KEY.unwrap_or("key"),
                    value: value.to_string(),
                });
            }
        }

        let table = <MemoryState as HasTable<E>>::table_mut(&mut state);
        let id = table.allocate_id();
        let entity = E::from_draft(id, draft);
        table.rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: E::Id, draft: E::Draft) -> Result<E, RepositoryError> {
        let mut state = self.db.state.lock().await;

        let existing = <MemoryState as HasTable<E>>::table(&state)
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: E::NAME,
                id: id.to_string(),
            })?;

        if let (Some(current), Some(next)) = (existing.natural_key(), E::draft_natural_key(&draft))
        {
            if current != next {
                return Err(RepositoryError::KeyImmutable {
                    entity: E::NAME,
                    key: E::NATURAL_KEY.unwrap_or("key"),
                });
            }
        }

        let updated = existing.merge_draft(draft);
        <MemoryState as HasTable<E>>::table_mut(&mut state)
            .rows
            .insert(id, updated.clone());
        Ok(updated)
    }

    async fn find_by_id(&self, id: E::Id) -> Result<Option<E>, RepositoryError> {
        let state = self.db.state.lock().await;
        Ok(<MemoryState as HasTable<E>>::table(&state)
            .rows
            .get(&id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<E>, RepositoryError> {
        let state = self.db.state.lock().await;
        Ok(<MemoryState as HasTable<E>>::table(&state)
            .rows
            .values()
            .cloned()
            .collect())
    }

    async fn find_page(&self, request: PageRequest) -> Result<Page<E>, RepositoryError> {
        let state = self.db.state.lock().await;
        let table = <MemoryState as HasTable<E>>::table(&state);
        let items = table
            .rows
            .values()
            .skip(request.page as usize * request.size as usize)
            .take(request.size as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            page: request.page,
            size: request.size,
            total_elements: table.rows.len() as u64,
        })
    }

    async fn delete_by_id(&self, id: E::Id) -> Result<(), RepositoryError> {
        let mut state = self.db.state.lock().await;
        match <MemoryState as HasTable<E>>::table_mut(&mut state).rows.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound {
                entity: E::NAME,
                id: id.to_string(),
            }),
        }
    }
}
