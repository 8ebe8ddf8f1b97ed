//! Metaconfig persistence layer
//!
//! `ConfigRepository` is implemented by:
//! - `DbConfigRepository`: SQL storage (MySQL/PostgreSQL/SQLite via SeaORM)
//! - `MemoryConfigRepository`: process-local storage

pub mod mapping;
pub mod memory;
pub mod sql;
pub mod traits;

pub use mapping::TableMapping;
pub use memory::MemoryConfigRepository;
pub use sql::DbConfigRepository;
pub use traits::ConfigRepository;
