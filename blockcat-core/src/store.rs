// blockcat_core/src/store.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{BlockedUrl, CategoryId, CategoryRow, Counts, NodeGroup};
use crate::error::Result;
use crate::path::LookupKey;
use crate::query::NodeQuery;

#[derive(Clone, Debug)]
pub struct OpenParams {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
}

/// Tabular access to category rows: equality/absence predicates, grouping and sums.
pub trait CategoryStore: Send + Sync {
    fn load(&self, id: CategoryId) -> Result<Option<CategoryRow>>;

    /// Groups matching `query`, ordered by representative `(display_name, id)`.
    fn group_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeGroup>>;

    /// Sums over every row whose path starts with `prefix`. Zero when nothing matches.
    fn sum_counts(&self, prefix: &LookupKey) -> Result<Counts>;
}

/// URL to leaf-category association.
pub trait UrlCategoryIndex: Send + Sync {
    /// Distinct URLs attached to exactly `leaf`, ordered by URL.
    fn urls_in(&self, leaf: CategoryId) -> Result<Vec<String>>;
}

/// Latest block status per URL per reporting network.
pub trait BlockStatusView: Send + Sync {
    /// URLs of `leaf` currently blocked somewhere, ordered by URL.
    fn blocking_networks(&self, leaf: CategoryId) -> Result<Vec<BlockedUrl>>;
}
