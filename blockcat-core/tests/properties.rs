mod common;

use std::collections::BTreeMap;

use blockcat_core::{Counts, LookupKey, ParentRef};
use common::{Fixture, row};
use proptest::prelude::*;

/// Random paths over a tiny alphabet, closed under prefixes so every node has a row.
fn taxonomy() -> impl Strategy<Value = Fixture> {
    let segment = prop::sample::select(vec!["a", "b", "c"]);
    let entry = (prop::collection::vec(segment, 1..=4), 0u64..50, 0u64..50);
    prop::collection::vec(entry, 1..24).prop_map(|entries| {
        let mut paths: BTreeMap<Vec<&'static str>, (u64, u64)> = BTreeMap::new();
        for (segs, blocked, blocks) in entries {
            for depth in 1..segs.len() {
                paths.entry(segs[..depth].to_vec()).or_insert((0, 0));
            }
            paths.insert(segs, (blocked, blocks));
        }
        let rows = paths
            .into_iter()
            .enumerate()
            .map(|(i, (segs, (blocked, blocks)))| {
                row(i as i64 + 1, &segs.join("/"), &segs, blocked, blocks)
            })
            .collect();
        Fixture::rows(rows)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_row_is_contiguous(fixture in taxonomy()) {
        for r in &fixture.rows {
            prop_assert!(r.path.is_contiguous());
            prop_assert_eq!(r.depth(), r.lookup_key().depth());
        }
    }

    #[test]
    fn subtree_counts_are_additive(fixture in taxonomy()) {
        for (_, catalog) in fixture.catalogs() {
            for r in &fixture.rows {
                let node = r.lookup_key();
                let children: Counts = catalog
                    .children_of(&node)
                    .unwrap()
                    .iter()
                    .map(|c| catalog.counts_for(&c.key).unwrap())
                    .sum();
                prop_assert_eq!(catalog.counts_for(&node).unwrap(), r.counts() + children);
            }
        }
    }

    #[test]
    fn children_point_back_to_parent(fixture in taxonomy()) {
        for (_, catalog) in fixture.catalogs() {
            for r in &fixture.rows {
                for child in catalog.children_of(&r.lookup_key()).unwrap() {
                    prop_assert_eq!(catalog.parent_of(&child.key).unwrap(), ParentRef::Node(r.id));
                }
            }
            for top in catalog.top_level().unwrap() {
                prop_assert_eq!(catalog.parent_of(&top.key).unwrap(), ParentRef::Root);
            }
        }
    }

    #[test]
    fn backends_agree(fixture in taxonomy()) {
        let catalogs = fixture.catalogs();
        let (sqlite, memory) = (&catalogs[0].1, &catalogs[1].1);
        prop_assert_eq!(sqlite.top_level().unwrap(), memory.top_level().unwrap());
        prop_assert_eq!(
            sqlite.counts_for(&LookupKey::root()).unwrap(),
            memory.counts_for(&LookupKey::root()).unwrap()
        );
        for r in &fixture.rows {
            let node = r.lookup_key();
            prop_assert_eq!(sqlite.children_of(&node).unwrap(), memory.children_of(&node).unwrap());
            prop_assert_eq!(sqlite.resolve_parent(&node).unwrap(), memory.resolve_parent(&node).unwrap());
        }
    }

    #[test]
    fn reads_are_idempotent(fixture in taxonomy()) {
        for (_, catalog) in fixture.catalogs() {
            let first = catalog.top_level().unwrap();
            prop_assert_eq!(&first, &catalog.top_level().unwrap());
            for node in &first {
                prop_assert_eq!(
                    catalog.children_of(&node.key).unwrap(),
                    catalog.children_of(&node.key).unwrap()
                );
            }
        }
    }
}
