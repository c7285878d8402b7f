use std::sync::Arc;

use tracing::debug;

use crate::domain::{BlockedUrl, CategoryId, Counts};
use crate::error::{CategoryError, Result};
use crate::path::LookupKey;
use crate::store::{BlockStatusView, CategoryStore, UrlCategoryIndex};

/// Subtree sums and the leaf-scoped URL listings.
pub struct Aggregator {
    categories: Arc<dyn CategoryStore>,
    urls: Arc<dyn UrlCategoryIndex>,
    statuses: Arc<dyn BlockStatusView>,
}

impl Aggregator {
    pub fn new(
        categories: Arc<dyn CategoryStore>,
        urls: Arc<dyn UrlCategoryIndex>,
        statuses: Arc<dyn BlockStatusView>,
    ) -> Self {
        Self {
            categories,
            urls,
            statuses,
        }
    }

    /// Totals over every descendant at any depth; zeros when nothing matches.
    pub fn counts_for(&self, node: &LookupKey) -> Result<Counts> {
        self.categories.sum_counts(node)
    }

    /// URLs attached to exactly this leaf. Descendants are not visited.
    pub fn sites_of(&self, leaf: CategoryId) -> Result<Vec<String>> {
        self.ensure_exists(leaf)?;
        self.urls.urls_in(leaf)
    }

    /// URLs of this leaf blocked on at least one network, with the network count.
    pub fn blocks_of(&self, leaf: CategoryId) -> Result<Vec<BlockedUrl>> {
        self.ensure_exists(leaf)?;
        self.statuses.blocking_networks(leaf)
    }

    fn ensure_exists(&self, leaf: CategoryId) -> Result<()> {
        if self.categories.load(leaf)?.is_none() {
            debug!(%leaf, "leaf lookup on unknown category");
            return Err(CategoryError::NotFound(format!("category {leaf}")));
        }
        Ok(())
    }
}
