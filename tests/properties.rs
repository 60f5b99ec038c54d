use fim::{diff, Snapshot, SnapshotStore};
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::btree_map("/w/[a-z]{1,6}(/[a-z]{1,4})?", "[0-9a-f]{8}", 0..24)
        .prop_map(|entries| entries.into_iter().collect())
}

proptest! {
    #[test]
    fn diff_with_itself_is_empty(s in snapshot_strategy()) {
        prop_assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn change_sets_are_disjoint(old in snapshot_strategy(), new in snapshot_strategy()) {
        let changes = diff(&old, &new);
        let added: HashSet<_> = changes.added.iter().collect();
        let removed: HashSet<_> = changes.removed.iter().collect();
        let modified: HashSet<_> = changes.modified.iter().collect();

        prop_assert!(added.is_disjoint(&removed));
        prop_assert!(added.is_disjoint(&modified));
        prop_assert!(removed.is_disjoint(&modified));
    }

    #[test]
    fn change_sets_are_sorted_and_accounted(old in snapshot_strategy(), new in snapshot_strategy()) {
        let changes = diff(&old, &new);
        for list in [&changes.added, &changes.removed, &changes.modified] {
            prop_assert!(list.windows(2).all(|w| w[0] < w[1]));
        }
        for path in &changes.added {
            prop_assert!(new.contains(path) && !old.contains(path));
        }
        for path in &changes.removed {
            prop_assert!(old.contains(path) && !new.contains(path));
        }
        for path in &changes.modified {
            prop_assert_ne!(old.get(path), new.get(path));
        }
    }

    #[test]
    fn store_round_trips(s in snapshot_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("file_hashes.json"));
        store.save(&s).unwrap();
        prop_assert_eq!(store.load().unwrap(), s);
    }
}
