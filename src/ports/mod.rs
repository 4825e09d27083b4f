pub mod lending_store;
pub mod repository;

pub use lending_store::*;
pub use repository::*;
