use std::sync::Arc;

use tracing::info;

use crate::catalog::CategoryCatalog;
use crate::config::{BackendKind, EngineConfig};
use crate::error::Result;
use crate::index::inmem::MemoryCategoryStore;
use crate::store_sqlite::SqliteCategoryStore;

pub fn open_catalog(config: &EngineConfig) -> Result<CategoryCatalog> {
    let sqlite = SqliteCategoryStore::open(&config.store.open_params())?;
    info!(path = %config.store.path.display(), backend = ?config.store.backend, "opening category store");
    match config.store.backend {
        BackendKind::Sqlite => Ok(CategoryCatalog::from_backend(
            Arc::new(sqlite),
            config.anomalies,
        )),
        BackendKind::Snapshot => Ok(CategoryCatalog::from_backend(
            Arc::new(MemoryCategoryStore::snapshot(&sqlite)?),
            config.anomalies,
        )),
    }
}
