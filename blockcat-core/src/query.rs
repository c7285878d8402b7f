use crate::path::{CategoryPath, LookupKey, MAX_DEPTH};

/// Aggregate query over category rows, grouped by the prefix of length `group_depth`.
///
/// A row is in scope when its first `scope.depth()` segments equal the scope
/// and its segment at `group_depth` is occupied. It is *materialized* for its
/// group when it ends exactly at `group_depth`. Groups without a materialized
/// row are not nodes and are not reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeQuery {
    scope: LookupKey,
    group_depth: usize,
    materialized_only: bool,
}

impl NodeQuery {
    /// Immediate children of `key`. `None` at full depth.
    pub fn children_of(key: &LookupKey) -> Option<Self> {
        (key.depth() < MAX_DEPTH).then(|| Self {
            scope: key.clone(),
            group_depth: key.depth() + 1,
            materialized_only: true,
        })
    }

    /// The node named by `key` itself. `None` for the root.
    pub fn node(key: &LookupKey) -> Option<Self> {
        (!key.is_root()).then(|| Self {
            scope: key.clone(),
            group_depth: key.depth(),
            materialized_only: false,
        })
    }

    pub fn scope(&self) -> &LookupKey {
        &self.scope
    }

    pub fn group_depth(&self) -> usize {
        self.group_depth
    }

    /// Whether groups with no materialized row are dropped from the answer.
    pub fn materialized_only(&self) -> bool {
        self.materialized_only
    }

    /// Segment that must be absent for a row to be materialized; none at full depth.
    pub fn terminal_segment(&self) -> Option<usize> {
        (self.group_depth < MAX_DEPTH).then_some(self.group_depth + 1)
    }

    pub fn in_scope(&self, path: &CategoryPath) -> bool {
        path.segment(self.group_depth).is_some()
            && self
                .scope
                .segments()
                .iter()
                .enumerate()
                .all(|(i, v)| path.raw(i + 1) == Some(v.as_str()))
    }

    pub fn is_materialized(&self, path: &CategoryPath) -> bool {
        self.terminal_segment()
            .is_none_or(|i| path.segment(i).is_none())
    }

    /// Key of the group a path falls into.
    pub fn group_key(&self, path: &CategoryPath) -> LookupKey {
        path.lookup_key().truncated(self.group_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segs: &[&str]) -> CategoryPath {
        CategoryPath::from_segments(segs.iter().copied()).unwrap()
    }

    #[test]
    fn children_query_shape() {
        let news = LookupKey::new(["News"]).unwrap();
        let q = NodeQuery::children_of(&news).unwrap();
        assert_eq!(q.group_depth(), 2);
        assert_eq!(q.terminal_segment(), Some(3));
        assert!(q.materialized_only());

        assert!(!q.in_scope(&path(&["News"])));
        assert!(q.in_scope(&path(&["News", "Politics"])));
        assert!(q.in_scope(&path(&["News", "Politics", "Elections"])));
        assert!(!q.in_scope(&path(&["Sports", "Politics"])));

        assert!(q.is_materialized(&path(&["News", "Politics"])));
        assert!(!q.is_materialized(&path(&["News", "Politics", "Elections"])));
        assert_eq!(
            q.group_key(&path(&["News", "Politics", "Elections"])),
            LookupKey::new(["News", "Politics"]).unwrap()
        );
    }

    #[test]
    fn node_query_shape() {
        let politics = LookupKey::new(["News", "Politics"]).unwrap();
        let q = NodeQuery::node(&politics).unwrap();
        assert_eq!(q.group_depth(), 2);
        assert!(!q.materialized_only());
        assert!(q.in_scope(&path(&["News", "Politics"])));
        assert!(q.in_scope(&path(&["News", "Politics", "Elections"])));
        assert!(!q.in_scope(&path(&["News"])));
        assert!(NodeQuery::node(&LookupKey::root()).is_none());
    }

    #[test]
    fn full_depth_has_no_children_query() {
        let segs: Vec<String> = (1..=MAX_DEPTH).map(|i| format!("s{i}")).collect();
        let deepest = LookupKey::new(segs).unwrap();
        assert!(NodeQuery::children_of(&deepest).is_none());

        let q = NodeQuery::node(&deepest).unwrap();
        assert_eq!(q.terminal_segment(), None);
    }
}
