#![allow(dead_code)]

use std::sync::Arc;

use blockcat_core::{
    AnomalyPolicy, BlockStatus, CategoryCatalog, CategoryId, CategoryPath, CategoryRow,
    LookupKey, MemoryCategoryStore, SqliteCategoryStore,
};

pub fn row(id: i64, display_name: &str, segs: &[&str], blocked: u64, blocks: u64) -> CategoryRow {
    CategoryRow {
        id: CategoryId(id),
        display_name: display_name.to_string(),
        path: CategoryPath::from_segments(segs.iter().copied()).unwrap(),
        blocked_url_count: blocked,
        block_count: blocks,
    }
}

pub fn key(segs: &[&str]) -> LookupKey {
    LookupKey::new(segs.iter().copied()).unwrap()
}

#[derive(Clone, Debug, Default)]
pub struct Fixture {
    pub rows: Vec<CategoryRow>,
    pub links: Vec<(&'static str, i64)>,
    pub statuses: Vec<(&'static str, &'static str, BlockStatus)>,
}

impl Fixture {
    pub fn rows(rows: Vec<CategoryRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn sqlite(&self) -> SqliteCategoryStore {
        let store = SqliteCategoryStore::in_memory().unwrap();
        for r in &self.rows {
            store.insert_row(r).unwrap();
        }
        for (url, id) in &self.links {
            store.link_url(url, CategoryId(*id)).unwrap();
        }
        for (url, network, status) in &self.statuses {
            store.record_status(url, network, *status).unwrap();
        }
        store
    }

    pub fn memory(&self) -> MemoryCategoryStore {
        let mut store = MemoryCategoryStore::new();
        for r in &self.rows {
            store.insert_row(r.clone()).unwrap();
        }
        for (url, id) in &self.links {
            store.link_url(url, CategoryId(*id));
        }
        for (url, network, status) in &self.statuses {
            store.record_status(url, network, *status);
        }
        store
    }

    /// One catalog per backend, labelled for assertion messages.
    pub fn catalogs_with(&self, policy: AnomalyPolicy) -> Vec<(&'static str, CategoryCatalog)> {
        vec![
            ("sqlite", CategoryCatalog::from_backend(Arc::new(self.sqlite()), policy)),
            ("memory", CategoryCatalog::from_backend(Arc::new(self.memory()), policy)),
        ]
    }

    pub fn catalogs(&self) -> Vec<(&'static str, CategoryCatalog)> {
        self.catalogs_with(AnomalyPolicy::Warn)
    }
}

/// A small well-formed taxonomy: every ancestor has its own row.
pub fn news_taxonomy() -> Fixture {
    Fixture::rows(vec![
        row(1, "News", &["News"], 2, 5),
        row(2, "News/Politics", &["News", "Politics"], 3, 1),
        row(3, "News/Politics/Elections", &["News", "Politics", "Elections"], 4, 4),
        row(4, "News/Sport", &["News", "Sport"], 0, 2),
        row(5, "Arts", &["Arts"], 1, 1),
        row(6, "Arts/Music", &["Arts", "Music"], 7, 9),
        row(7, "Newsletters", &["Newsletters"], 10, 10),
    ])
}
