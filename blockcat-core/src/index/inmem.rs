use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::domain::{
    AggregatedNode, BlockStatus, BlockedUrl, CategoryId, CategoryRow, Counts, NodeGroup,
};
use crate::error::{CategoryError, Result};
use crate::path::LookupKey;
use crate::query::NodeQuery;
use crate::store::{BlockStatusView, CategoryStore, UrlCategoryIndex};
use crate::store_sqlite::SqliteCategoryStore;

/// Category rows materialized into a prefix-ordered map.
///
/// Keys sharing a prefix are contiguous in `by_key`, so a subtree is a single
/// range scan. Answers match [`SqliteCategoryStore`] row for row.
#[derive(Clone, Debug, Default)]
pub struct MemoryCategoryStore {
    by_key: BTreeMap<LookupKey, Vec<CategoryRow>>,
    by_id: BTreeMap<CategoryId, LookupKey>,
    links: BTreeMap<CategoryId, BTreeSet<String>>,
    // url -> network -> latest status
    statuses: BTreeMap<String, BTreeMap<String, BlockStatus>>,
}

#[derive(Default)]
struct GroupAcc<'a> {
    totals: Counts,
    // first in-scope row by (display_name, id), used when none is materialized
    first: Option<&'a CategoryRow>,
    materialized: Vec<&'a CategoryRow>,
}

fn tie_break(a: &CategoryRow, b: &CategoryRow) -> std::cmp::Ordering {
    (&a.display_name, a.id).cmp(&(&b.display_name, b.id))
}

fn overflow(prefix: &LookupKey) -> CategoryError {
    CategoryError::CountOverflow(prefix.to_string())
}

impl MemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize a whole database once; later reads never touch it.
    pub fn snapshot(source: &SqliteCategoryStore) -> Result<Self> {
        let mut store = Self::new();
        for row in source.rows()? {
            store.insert_row(row)?;
        }
        for (url, category) in source.url_links()? {
            store.link_url(&url, category);
        }
        for (url, network, status) in source.latest_statuses()? {
            store.record_status(&url, &network, status);
        }
        debug!(rows = store.by_id.len(), "materialized category snapshot");
        Ok(store)
    }

    /// Insert or replace by id. Rejects empty or gapped paths.
    pub fn insert_row(&mut self, row: CategoryRow) -> Result<()> {
        row.validate()?;
        if let Some(old_key) = self.by_id.remove(&row.id) {
            if let Some(rows) = self.by_key.get_mut(&old_key) {
                rows.retain(|r| r.id != row.id);
                if rows.is_empty() {
                    self.by_key.remove(&old_key);
                }
            }
        }
        let key = row.lookup_key();
        self.by_id.insert(row.id, key.clone());
        self.by_key.entry(key).or_default().push(row);
        Ok(())
    }

    pub fn link_url(&mut self, url: &str, category: CategoryId) {
        self.links
            .entry(category)
            .or_default()
            .insert(url.to_string());
    }

    pub fn record_status(&mut self, url: &str, network: &str, status: BlockStatus) {
        self.statuses
            .entry(url.to_string())
            .or_default()
            .insert(network.to_string(), status);
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn subtree<'a>(
        &'a self,
        prefix: &'a LookupKey,
    ) -> impl Iterator<Item = (&'a LookupKey, &'a Vec<CategoryRow>)> + 'a {
        self.by_key
            .range(prefix.clone()..)
            .take_while(move |(key, _)| prefix.is_prefix_of(key))
    }
}

impl CategoryStore for MemoryCategoryStore {
    fn load(&self, id: CategoryId) -> Result<Option<CategoryRow>> {
        Ok(self
            .by_id
            .get(&id)
            .and_then(|key| self.by_key.get(key))
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .cloned())
    }

    fn group_nodes(&self, query: &NodeQuery) -> Result<Vec<NodeGroup>> {
        let mut groups: BTreeMap<LookupKey, GroupAcc<'_>> = BTreeMap::new();
        for (_, rows) in self.subtree(query.scope()) {
            for row in rows.iter().filter(|r| query.in_scope(&r.path)) {
                let key = query.group_key(&row.path);
                let acc = groups.entry(key.clone()).or_default();
                acc.totals = acc
                    .totals
                    .checked_add(row.counts())
                    .ok_or_else(|| overflow(&key))?;
                if acc.first.is_none_or(|f| tie_break(row, f).is_lt()) {
                    acc.first = Some(row);
                }
                if query.is_materialized(&row.path) {
                    acc.materialized.push(row);
                }
            }
        }

        let mut out: Vec<NodeGroup> = groups
            .into_iter()
            .filter(|(_, acc)| !query.materialized_only() || !acc.materialized.is_empty())
            .filter_map(|(key, acc)| {
                let rep = acc
                    .materialized
                    .iter()
                    .copied()
                    .min_by(|a, b| tie_break(a, b))
                    .or(acc.first)?;
                Some(NodeGroup {
                    node: AggregatedNode {
                        id: rep.id,
                        display_name: rep.display_name.clone(),
                        name: key.name().unwrap_or_default().to_string(),
                        key,
                        totals: acc.totals,
                    },
                    materialized_rows: acc.materialized.len() as u64,
                })
            })
            .collect();
        out.sort_by(|a, b| {
            (&a.node.display_name, a.node.id).cmp(&(&b.node.display_name, b.node.id))
        });
        Ok(out)
    }

    fn sum_counts(&self, prefix: &LookupKey) -> Result<Counts> {
        self.subtree(prefix)
            .flat_map(|(_, rows)| rows.iter().map(CategoryRow::counts))
            .try_fold(Counts::default(), |acc, c| acc.checked_add(c))
            .ok_or_else(|| overflow(prefix))
    }
}

impl UrlCategoryIndex for MemoryCategoryStore {
    fn urls_in(&self, leaf: CategoryId) -> Result<Vec<String>> {
        Ok(self
            .links
            .get(&leaf)
            .map(|urls| urls.iter().cloned().collect())
            .unwrap_or_default())
    }
}

impl BlockStatusView for MemoryCategoryStore {
    fn blocking_networks(&self, leaf: CategoryId) -> Result<Vec<BlockedUrl>> {
        let Some(urls) = self.links.get(&leaf) else {
            return Ok(Vec::new());
        };
        Ok(urls
            .iter()
            .filter_map(|url| {
                let networks = self
                    .statuses
                    .get(url)?
                    .values()
                    .filter(|s| **s == BlockStatus::Blocked)
                    .count() as u64;
                (networks > 0).then(|| BlockedUrl {
                    url: url.clone(),
                    networks,
                })
            })
            .collect())
    }
}
