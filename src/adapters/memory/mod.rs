mod db;
mod lending_store;
mod repository;

pub use db::MemoryDb;
pub use lending_store::MemoryLendingStore;
pub use repository::MemoryRepository;
