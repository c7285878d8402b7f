use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AnomalyPolicy;
use crate::domain::{AggregatedNode, CategoryId, NodeGroup, ParentRef, PrefixCollision};
use crate::error::{CategoryError, Result};
use crate::path::LookupKey;
use crate::query::NodeQuery;
use crate::store::CategoryStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentResolution {
    pub parent: ParentRef,
    /// The parent node itself; `None` when the parent is the root.
    pub node: Option<AggregatedNode>,
    pub anomaly: Option<PrefixCollision>,
}

/// Parent/child navigation over the implied tree. Holds no cached nodes.
pub struct Navigator {
    store: Arc<dyn CategoryStore>,
    policy: AnomalyPolicy,
}

impl Navigator {
    pub fn new(store: Arc<dyn CategoryStore>, policy: AnomalyPolicy) -> Self {
        Self { store, policy }
    }

    pub fn key_for(&self, id: CategoryId) -> Result<LookupKey> {
        self.store
            .load(id)?
            .map(|row| row.lookup_key())
            .ok_or_else(|| CategoryError::NotFound(format!("category {id}")))
    }

    pub fn parent_of(&self, node: &LookupKey) -> Result<ParentRef> {
        Ok(self.resolve_parent(node)?.parent)
    }

    /// Like [`Navigator::parent_of`] but also reports the parent node and any
    /// collision the tie-break had to settle.
    ///
    /// A parent with no row of its own resolves to its first descendant row by
    /// `(display_name, id)` and is reported as a collision with `rows == 0`.
    /// `NotFound` means no row lies under the parent prefix at all.
    pub fn resolve_parent(&self, node: &LookupKey) -> Result<ParentResolution> {
        let Some(query) = node.parent().as_ref().and_then(NodeQuery::node) else {
            return Ok(ParentResolution {
                parent: ParentRef::Root,
                node: None,
                anomaly: None,
            });
        };
        debug!(node = %node, parent = %query.scope(), "resolving parent");

        let groups = self.store.group_nodes(&query)?;
        let Some(first) = groups.first() else {
            return Err(CategoryError::NotFound(format!("parent of category \"{node}\"")));
        };

        let rows: u64 = groups.iter().map(|g| g.materialized_rows).sum();
        let anomaly = (groups.len() > 1 || rows != 1).then(|| PrefixCollision {
            key: query.scope().clone(),
            rows,
            groups: groups.len(),
            chosen: first.node.id,
            chosen_display_name: first.node.display_name.clone(),
        });
        if let Some(collision) = &anomaly {
            warn!(%collision, "ambiguous parent prefix");
            if self.policy == AnomalyPolicy::Reject {
                return Err(CategoryError::DataIntegrity(collision.clone()));
            }
        }

        Ok(ParentResolution {
            parent: ParentRef::Node(first.node.id),
            node: Some(first.node.clone()),
            anomaly,
        })
    }

    /// Immediate children, ordered by display name. Empty at full depth.
    pub fn children_of(&self, node: &LookupKey) -> Result<Vec<AggregatedNode>> {
        let Some(query) = NodeQuery::children_of(node) else {
            return Ok(Vec::new());
        };
        debug!(node = %node, "listing children");
        let groups = self.store.group_nodes(&query)?;
        Ok(groups.into_iter().map(report_duplicates).collect())
    }

    pub fn top_level(&self) -> Result<Vec<AggregatedNode>> {
        self.children_of(&LookupKey::root())
    }

    /// Breadcrumb trail from the top-level ancestor down to the parent of `node`.
    pub fn ancestors(&self, node: &LookupKey) -> Result<Vec<AggregatedNode>> {
        let mut trail = Vec::with_capacity(node.depth());
        let mut current = node.clone();
        while let Some(parent) = self.resolve_parent(&current)?.node {
            current = parent.key.clone();
            trail.push(parent);
        }
        trail.reverse();
        Ok(trail)
    }
}

fn report_duplicates(group: NodeGroup) -> AggregatedNode {
    if group.materialized_rows > 1 {
        warn!(
            key = %group.node.key,
            rows = group.materialized_rows,
            chosen = %group.node.id,
            "duplicate rows for one category node"
        );
    }
    group.node
}
