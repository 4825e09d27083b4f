use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::book::Book;
use crate::domain::loan::Loan;
use crate::domain::patron::Patron;
use crate::ports::repository::Entity;

use super::lending_store::MemoryLendingStore;
use super::repository::MemoryRepository;

/// インメモリテーブル
///
/// IDは1始まりの連番で採番する。
#[derive(Debug, Clone)]
pub struct Table<E: Entity> {
    pub(super) rows: BTreeMap<E::Id, E>,
    next_id: i32,
}

impl<E: Entity> Table<E> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub(super) fn allocate_id(&mut self) -> E::Id {
        let id = E::Id::from(self.next_id);
        self.next_id += 1;
        id
    }
}

/// 全テーブルを保持するインメモリ状態
#[derive(Debug, Clone)]
pub struct MemoryState {
    pub(super) books: Table<Book>,
    pub(super) patrons: Table<Patron>,
    pub(super) loans: Table<Loan>,
}

impl MemoryState {
    fn new() -> Self {
        Self {
            books: Table::new(),
            patrons: Table::new(),
            loans: Table::new(),
        }
    }
}

/// エンティティ型から対応テーブルを引くための対応付け
pub trait HasTable<E: Entity> {
    fn table(&self) -> &Table<E>;
    fn table_mut(&mut self) -> &mut Table<E>;
}

impl HasTable<Book> for MemoryState {
    fn table(&self) -> &Table<Book> {
        &self.books
    }

    fn table_mut(&mut self) -> &mut Table<Book> {
        &mut self.books
    }
}

impl HasTable<Patron> for MemoryState {
    fn table(&self) -> &Table<Patron> {
        &self.patrons
    }

    fn table_mut(&mut self) -> &mut Table<Patron> {
        &mut self.patrons
    }
}

impl HasTable<Loan> for MemoryState {
    fn table(&self) -> &Table<Loan> {
        &self.loans
    }

    fn table_mut(&mut self) -> &mut Table<Loan> {
        &mut self.loans
    }
}

/// テスト・開発用の共有インメモリデータベース
///
/// リポジトリと貸出ストアが同じ状態を共有する。貸出ストアの
/// トランザクションは状態全体のロックを取って直列化される。
/// PostgreSQL側の外部キーに相当する参照整合性の検査は行わない。
#[derive(Clone)]
pub struct MemoryDb {
    pub(super) state: Arc<Mutex<MemoryState>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::new())),
        }
    }

    /// このデータベース上のリポジトリビューを作る
    pub fn repository<E: Entity>(&self) -> MemoryRepository<E>
    where
        MemoryState: HasTable<E>,
    {
        MemoryRepository::new(self.clone())
    }

    /// このデータベース上の貸出ストアを作る
    pub fn lending_store(&self) -> MemoryLendingStore {
        MemoryLendingStore::new(self.clone())
    }
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}
