use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::book::{Book, NewBook};
use crate::domain::loan::{Loan, NewLoan};
use crate::domain::patron::{NewPatron, Patron};
use crate::domain::value_objects::{BookId, LoanId, PatronId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 永続化エラー
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// 指定IDのエンティティが存在しない
    #[error("{entity} with id {id} does not exist")]
    NotFound { entity: &'static str, id: String },

    /// 自然キーの一意制約違反
    #[error("{entity} with {key} '{value}' already exists")]
    DuplicateKey {
        entity: &'static str,
        key: &'static str,
        value: String,
    },

    /// 自然キーは作成後に変更できない
    #[error("{entity} {key} is immutable")]
    KeyImmutable {
        entity: &'static str,
        key: &'static str,
    },

    /// 他のエンティティから参照されているため削除できない
    #[error("{entity} with id {id} is still referenced")]
    Referenced { entity: &'static str, id: String },

    /// ストア側の障害
    #[error("storage error")]
    Backend(#[source] BoxError),
}

/// エンティティごとの設定（パラメトリックCRUDの型パラメータ側）
///
/// ID型・検証済み登録内容（Draft）・自然キーをエンティティごとに与える
/// ことで、`Repository`の契約を全エンティティで共通化する。共有基底
/// オブジェクトは持たない。
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    type Id: Copy
        + Eq
        + Ord
        + Hash
        + fmt::Debug
        + fmt::Display
        + From<i32>
        + Send
        + Sync
        + 'static;
    type Draft: Clone + fmt::Debug + Send + Sync + 'static;

    /// 表示名（エラーメッセージ・ログ用）
    const NAME: &'static str;
    /// 自然キーの名前（持たないエンティティはNone）
    const NATURAL_KEY: Option<&'static str>;

    fn id(&self) -> Self::Id;

    /// 採番済みIDとDraftからエンティティを組み立てる
    fn from_draft(id: Self::Id, draft: Self::Draft) -> Self;

    /// 更新用：Draftの内容を適用しつつ、作成後不変のフィールドを保持する
    fn merge_draft(&self, draft: Self::Draft) -> Self;

    /// 自然キーの現在値
    fn natural_key(&self) -> Option<&str>;

    /// Draft側の自然キー値（挿入時の重複検出・不変性チェック用）
    fn draft_natural_key(draft: &Self::Draft) -> Option<&str>;
}

/// ページ指定（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    /// sizeは1..=MAX_SIZEに丸められる
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

/// ページングされた結果
#[derive(Debug, Clone)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
}

impl<E> Page<E> {
    pub fn total_pages(&self) -> u32 {
        if self.total_elements == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(self.size)) as u32
    }
}

/// パラメトリックなデータアクセス契約
///
/// 全エンティティ共通のCRUD操作。実装はPostgreSQLとインメモリの2種。
/// 自然キーの一意性はストアが強制し、違反は`DuplicateKey`として現れる。
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn insert(&self, draft: E::Draft) -> Result<E, RepositoryError>;

    /// 属性を差し替える。自然キーを変更するDraftは`KeyImmutable`で拒否される
    async fn update(&self, id: E::Id, draft: E::Draft) -> Result<E, RepositoryError>;

    async fn find_by_id(&self, id: E::Id) -> Result<Option<E>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<E>, RepositoryError>;

    async fn find_page(&self, request: PageRequest) -> Result<Page<E>, RepositoryError>;

    /// 存在しないIDは`NotFound`
    async fn delete_by_id(&self, id: E::Id) -> Result<(), RepositoryError>;
}

// ============================================================================
// エンティティごとの設定
// ============================================================================

impl Entity for Book {
    type Id = BookId;
    type Draft = NewBook;

    const NAME: &'static str = "book";
    const NATURAL_KEY: Option<&'static str> = Some("isbn");

    fn id(&self) -> BookId {
        self.id
    }

    fn from_draft(id: BookId, draft: NewBook) -> Self {
        Self {
            id,
            isbn: draft.isbn,
            title: draft.title,
            author: draft.author,
            description: draft.description,
            publication_year: draft.publication_year,
        }
    }

    fn merge_draft(&self, draft: NewBook) -> Self {
        Self {
            id: self.id,
            // ISBNは不変
            isbn: self.isbn.clone(),
            title: draft.title,
            author: draft.author,
            description: draft.description,
            publication_year: draft.publication_year,
        }
    }

    fn natural_key(&self) -> Option<&str> {
        Some(self.isbn.as_str())
    }

    fn draft_natural_key(draft: &NewBook) -> Option<&str> {
        Some(draft.isbn.as_str())
    }
}

impl Entity for Patron {
    type Id = PatronId;
    type Draft = NewPatron;

    const NAME: &'static str = "patron";
    const NATURAL_KEY: Option<&'static str> = Some("email");

    fn id(&self) -> PatronId {
        self.id
    }

    fn from_draft(id: PatronId, draft: NewPatron) -> Self {
        Self {
            id,
            name: draft.name,
            address: draft.address,
            post_no: draft.post_no,
            city: draft.city,
            email: draft.email,
            phone_no: draft.phone_no,
        }
    }

    fn merge_draft(&self, draft: NewPatron) -> Self {
        Self {
            id: self.id,
            name: draft.name,
            address: draft.address,
            post_no: draft.post_no,
            city: draft.city,
            // メールアドレスは不変
            email: self.email.clone(),
            phone_no: draft.phone_no,
        }
    }

    fn natural_key(&self) -> Option<&str> {
        Some(self.email.as_str())
    }

    fn draft_natural_key(draft: &NewPatron) -> Option<&str> {
        Some(draft.email.as_str())
    }
}

impl Entity for Loan {
    type Id = LoanId;
    type Draft = NewLoan;

    const NAME: &'static str = "loan";
    const NATURAL_KEY: Option<&'static str> = None;

    fn id(&self) -> LoanId {
        self.id
    }

    fn from_draft(id: LoanId, draft: NewLoan) -> Self {
        Self {
            id,
            book_id: draft.book_id,
            patron_id: draft.patron_id,
            borrowed_at: draft.borrowed_at,
            returned_at: None,
        }
    }

    fn merge_draft(&self, draft: NewLoan) -> Self {
        Self {
            id: self.id,
            book_id: draft.book_id,
            patron_id: draft.patron_id,
            borrowed_at: draft.borrowed_at,
            // 返却状態の遷移は貸出エンジンのみが行う
            returned_at: self.returned_at,
        }
    }

    fn natural_key(&self) -> Option<&str> {
        None
    }

    fn draft_natural_key(_draft: &NewLoan) -> Option<&str> {
        None
    }
}
