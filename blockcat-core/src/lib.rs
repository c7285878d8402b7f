#![forbid(unsafe_code)]

pub mod config;
pub mod domain;
pub mod error;
pub mod path;
pub mod query;

pub mod store;
pub mod store_factory;
pub mod store_sqlite;

pub mod index {
    pub mod inmem;
}

pub mod aggregator;
pub mod catalog;
pub mod navigator;

// Re-exports: stable API surface
pub use catalog::CategoryCatalog;
pub use config::{AnomalyPolicy, BackendKind, EngineConfig};
pub use domain::{
    AggregatedNode, BlockStatus, BlockedUrl, CategoryId, CategoryRow, Counts, ParentRef,
    PrefixCollision, MAX_COUNT,
};
pub use error::{CategoryError, Result};
pub use index::inmem::MemoryCategoryStore;
pub use path::{CategoryPath, LookupKey, MAX_DEPTH};
pub use store_factory::open_catalog;
pub use store_sqlite::SqliteCategoryStore;
