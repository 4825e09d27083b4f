use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::ports::repository::{BoxError, Entity, Page, PageRequest, Repository, RepositoryError};

use super::cache::EntityCache;

/// ディレクトリ層のエラー
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// 指定IDのエンティティが存在しない
    #[error("{entity} with id {id} does not exist")]
    NotFound { entity: &'static str, id: String },

    /// 自然キーの重複
    #[error("{entity} with {key} '{value}' already exists")]
    DuplicateKey {
        entity: &'static str,
        key: &'static str,
        value: String,
    },

    /// 自然キーは作成後に変更できない
    #[error("{entity} {key} is immutable and cannot be updated")]
    KeyImmutable {
        entity: &'static str,
        key: &'static str,
    },

    /// 他のレコードから参照されているため削除できない
    #[error("{entity} with id {id} is still referenced")]
    Referenced { entity: &'static str, id: String },

    /// ストア側の障害
    #[error("storage error")]
    Storage(#[source] BoxError),
}

impl From<RepositoryError> for DirectoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => DirectoryError::NotFound { entity, id },
            RepositoryError::DuplicateKey { entity, key, value } => {
                DirectoryError::DuplicateKey { entity, key, value }
            }
            RepositoryError::KeyImmutable { entity, key } => {
                DirectoryError::KeyImmutable { entity, key }
            }
            RepositoryError::Referenced { entity, id } => DirectoryError::Referenced { entity, id },
            RepositoryError::Backend(cause) => DirectoryError::Storage(cause),
        }
    }
}

/// エンティティのディレクトリサービス
///
/// ストア上の薄い参照・管理サービス。書籍・利用者はIDキーのリードスルー
/// キャッシュ付きで構成し、貸出記録はキャッシュなしで構成する。
///
/// 貸出エンジンはこのキャッシュを一切経由しない。エンジンの可用性チェック
/// は自身のトランザクション内の読み取りで行われるため、ここでの無効化遅延
/// が二重貸出につながることはない。
pub struct Directory<E: Entity> {
    repository: Arc<dyn Repository<E>>,
    cache: Option<EntityCache<E::Id, E>>,
}

impl<E: Entity> Directory<E> {
    /// キャッシュなしで構成する
    pub fn new(repository: Arc<dyn Repository<E>>) -> Self {
        Self {
            repository,
            cache: None,
        }
    }

    /// IDキーのリードスルーキャッシュ付きで構成する
    pub fn with_cache(repository: Arc<dyn Repository<E>>) -> Self {
        Self {
            repository,
            cache: Some(EntityCache::new()),
        }
    }

    /// IDで取得する（キャッシュがあればリードスルー）
    pub async fn find_by_id(&self, id: E::Id) -> Result<E, DirectoryError> {
        if let Some(cache) = &self.cache {
            if let Some(entity) = cache.get(&id) {
                debug!(entity = E::NAME, %id, "cache hit");
                return Ok(entity);
            }
        }

        debug!(entity = E::NAME, %id, "fetching entity from store");
        let entity = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| DirectoryError::NotFound {
                entity: E::NAME,
                id: id.to_string(),
            })?;

        if let Some(cache) = &self.cache {
            cache.put(id, entity.clone());
        }
        Ok(entity)
    }

    pub async fn find_all(&self) -> Result<Vec<E>, DirectoryError> {
        debug!(entity = E::NAME, "fetching all entities from store");
        Ok(self.repository.find_all().await?)
    }

    pub async fn find_page(&self, request: PageRequest) -> Result<Page<E>, DirectoryError> {
        debug!(
            entity = E::NAME,
            page = request.page,
            size = request.size,
            "fetching entity page from store"
        );
        Ok(self.repository.find_page(request).await?)
    }

    /// 登録する。成功した値はキャッシュにも載せる
    pub async fn create(&self, draft: E::Draft) -> Result<E, DirectoryError> {
        let entity = self.repository.insert(draft).await?;
        if let Some(cache) = &self.cache {
            cache.put(entity.id(), entity.clone());
        }
        info!(entity = E::NAME, id = %entity.id(), "entity created");
        Ok(entity)
    }

    /// 更新する。キャッシュのエントリは更新後の値で上書きされる
    pub async fn update(&self, id: E::Id, draft: E::Draft) -> Result<E, DirectoryError> {
        let entity = self.repository.update(id, draft).await?;
        if let Some(cache) = &self.cache {
            cache.put(id, entity.clone());
        }
        info!(entity = E::NAME, %id, "entity updated");
        Ok(entity)
    }

    /// 削除する。キャッシュからも同期的に無効化する
    pub async fn delete(&self, id: E::Id) -> Result<(), DirectoryError> {
        self.repository.delete_by_id(id).await?;
        if let Some(cache) = &self.cache {
            cache.invalidate(&id);
        }
        info!(entity = E::NAME, %id, "entity deleted");
        Ok(())
    }
}
