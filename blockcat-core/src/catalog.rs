use std::sync::Arc;

use crate::aggregator::Aggregator;
use crate::config::AnomalyPolicy;
use crate::domain::{AggregatedNode, BlockedUrl, CategoryId, CategoryRow, Counts, ParentRef};
use crate::error::{CategoryError, Result};
use crate::navigator::{Navigator, ParentResolution};
use crate::path::LookupKey;
use crate::store::{BlockStatusView, CategoryStore, UrlCategoryIndex};

/// Everything a category browser needs, over one backend.
pub struct CategoryCatalog {
    store: Arc<dyn CategoryStore>,
    navigator: Navigator,
    aggregator: Aggregator,
}

impl CategoryCatalog {
    pub fn from_backend<B>(backend: Arc<B>, policy: AnomalyPolicy) -> Self
    where
        B: CategoryStore + UrlCategoryIndex + BlockStatusView + 'static,
    {
        let store: Arc<dyn CategoryStore> = backend.clone();
        let urls: Arc<dyn UrlCategoryIndex> = backend.clone();
        let statuses: Arc<dyn BlockStatusView> = backend;
        Self {
            navigator: Navigator::new(store.clone(), policy),
            aggregator: Aggregator::new(store.clone(), urls, statuses),
            store,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn load(&self, id: CategoryId) -> Result<CategoryRow> {
        self.store
            .load(id)?
            .ok_or_else(|| CategoryError::NotFound(format!("category {id}")))
    }

    pub fn key_for(&self, id: CategoryId) -> Result<LookupKey> {
        self.navigator.key_for(id)
    }

    pub fn top_level(&self) -> Result<Vec<AggregatedNode>> {
        self.navigator.top_level()
    }

    pub fn children_of(&self, node: &LookupKey) -> Result<Vec<AggregatedNode>> {
        self.navigator.children_of(node)
    }

    pub fn parent_of(&self, node: &LookupKey) -> Result<ParentRef> {
        self.navigator.parent_of(node)
    }

    pub fn resolve_parent(&self, node: &LookupKey) -> Result<ParentResolution> {
        self.navigator.resolve_parent(node)
    }

    pub fn ancestors(&self, node: &LookupKey) -> Result<Vec<AggregatedNode>> {
        self.navigator.ancestors(node)
    }

    pub fn counts_for(&self, node: &LookupKey) -> Result<Counts> {
        self.aggregator.counts_for(node)
    }

    pub fn sites_of(&self, leaf: CategoryId) -> Result<Vec<String>> {
        self.aggregator.sites_of(leaf)
    }

    pub fn blocks_of(&self, leaf: CategoryId) -> Result<Vec<BlockedUrl>> {
        self.aggregator.blocks_of(leaf)
    }
}
