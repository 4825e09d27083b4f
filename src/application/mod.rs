pub mod cache;
pub mod directory;
pub mod lending;
