//! View behaviour across mutations: hook propagation, structural
//! sharing, history, and tree diff.

use std::sync::Arc;

use merkle_tree::Diff;
use ssz_tree::{ContainerSchema, Gindex, Path, SszType, TypeRef, Value};

fn state_type() -> TypeRef {
    SszType::container(
        ContainerSchema::new(
            "State",
            vec![
                ("slot", SszType::uint64()),
                ("balances", SszType::list(SszType::uint64(), 1024)),
                ("blocks", SszType::vector(SszType::byte_vector(32).unwrap(), 8).unwrap()),
            ],
        )
        .unwrap(),
    )
}

#[test]
fn mutation_through_a_sub_view_updates_every_ancestor() {
    let ty = state_type();
    let state = Value::default(&ty);
    let balances = state.field("balances").unwrap();

    let root_0 = state.hash_tree_root();
    balances.append(&Value::uint64(32_000_000_000)).unwrap();
    let root_1 = state.hash_tree_root();
    assert_ne!(root_0, root_1);

    // The sub-view and a freshly fetched one agree.
    assert_eq!(balances.len().unwrap(), 1);
    assert_eq!(state.field("balances").unwrap().len().unwrap(), 1);

    // Mutating an element through a second level of views still reaches
    // the root.
    let first = balances.get(0).unwrap();
    first.replace(&Value::uint64(31_000_000_000)).unwrap();
    assert_ne!(state.hash_tree_root(), root_1);
    assert_eq!(
        state
            .field("balances")
            .unwrap()
            .get(0)
            .unwrap()
            .as_u64()
            .unwrap(),
        31_000_000_000
    );
}

#[test]
fn snapshots_share_all_untouched_subtrees() {
    let ty = state_type();
    let state = Value::default(&ty);
    let blocks = state.field("blocks").unwrap();
    let block_ty = SszType::byte_vector(32).unwrap();
    for i in 0..8 {
        blocks
            .set(i, &Value::bytes(&block_ty, &[i as u8 + 1; 32]).unwrap())
            .unwrap();
    }

    let before = state.snapshot();
    state
        .field("blocks")
        .unwrap()
        .set(3, &Value::bytes(&block_ty, &[0xff; 32]).unwrap())
        .unwrap();

    let old_blocks = before.field("blocks").unwrap();
    let new_blocks = state.field("blocks").unwrap();
    for i in 0..8 {
        let shared = Arc::ptr_eq(
            &old_blocks.get(i).unwrap().backing(),
            &new_blocks.get(i).unwrap().backing(),
        );
        assert_eq!(shared, i != 3, "element {i}");
    }

    // Untouched sibling fields are shared wholesale.
    assert!(Arc::ptr_eq(
        &before.field("balances").unwrap().backing(),
        &state.field("balances").unwrap().backing(),
    ));
}

#[test]
fn history_tracks_the_root_view() {
    let ty = state_type();
    let state = Value::default(&ty);
    let history = state.record_history();

    state.field("slot").unwrap().replace(&Value::uint64(1)).unwrap();
    state.field("slot").unwrap().replace(&Value::uint64(2)).unwrap();
    state
        .field("balances")
        .unwrap()
        .append(&Value::uint64(9))
        .unwrap();

    let snapshots = history.snapshots();
    assert_eq!(snapshots.len(), 4);
    assert_eq!(snapshots.last().unwrap().root(), state.hash_tree_root());
    // Every recorded backing is a complete, readable state.
    let old = Value::from_backing(&ty, snapshots[1].clone());
    assert_eq!(old.field("slot").unwrap().as_u64().unwrap(), 1);
    assert_eq!(old.field("balances").unwrap().len().unwrap(), 0);
}

#[test]
fn diff_pinpoints_a_single_mutation() {
    let ty = state_type();
    let state = Value::default(&ty);
    state
        .field("balances")
        .unwrap()
        .append(&Value::uint64(5))
        .unwrap();

    let before = state.backing();
    state
        .field("balances")
        .unwrap()
        .set(0, &Value::uint64(6))
        .unwrap();
    let after = state.backing();

    let expected_chunk = Path::new(&ty)
        .field("balances")
        .unwrap()
        .index(0)
        .unwrap()
        .gindex();

    let diffs: Vec<_> = Diff::new(before, after).collect();
    assert_eq!(diffs.len(), 1);
    let (gindex, old, new) = &diffs[0];
    assert_eq!(*gindex, expected_chunk);
    assert_ne!(old.root(), new.root());
}

#[test]
fn diff_is_empty_for_equal_values() {
    let ty = state_type();
    let a = Value::default(&ty);
    let b = Value::default(&ty);
    assert_eq!(Diff::new(a.backing(), b.backing()).count(), 0);
}

#[test]
fn aliased_views_observe_each_other() {
    // Clone aliases the same view cell, unlike snapshot.
    let ty = SszType::list(SszType::uint16(), 4);
    let a = Value::default(&ty);
    let b = a.clone();
    a.append(&Value::uint16(3)).unwrap();
    assert_eq!(b.len().unwrap(), 1);
    assert_eq!(a.hash_tree_root(), b.hash_tree_root());
}

#[test]
fn typed_setters_reject_wrong_types() {
    let ty = state_type();
    let state = Value::default(&ty);
    assert!(state
        .set_field("slot", &Value::uint32(1))
        .is_err());
    assert!(state
        .field("balances")
        .unwrap()
        .append(&Value::uint8(1))
        .is_err());
}

#[test]
fn getter_setter_round_trip_via_gindex() {
    // The raw tree layer agrees with the typed layer about positions.
    let ty = state_type();
    let state = Value::default(&ty);
    state.field("slot").unwrap().replace(&Value::uint64(99)).unwrap();

    let slot_gindex = Path::new(&ty).field("slot").unwrap().gindex();
    let leaf = state.backing().getter(slot_gindex).unwrap();
    assert_eq!(leaf.root(), Value::uint64(99).hash_tree_root());

    let rebound = state
        .backing()
        .setter(slot_gindex, Value::uint64(100).backing())
        .unwrap();
    let moved = Value::from_backing(&ty, rebound);
    assert_eq!(moved.field("slot").unwrap().as_u64().unwrap(), 100);
}

#[test]
fn gindex_arithmetic_matches_paths() {
    let ty = state_type();
    // Three fields pad to four leaves: depth 2, fields at 4, 5, 6.
    assert_eq!(Path::new(&ty).field("slot").unwrap().gindex().as_u64(), 4);
    assert_eq!(
        Path::new(&ty).field("balances").unwrap().gindex(),
        Gindex::new(5).unwrap()
    );
    assert_eq!(
        Path::new(&ty).field("blocks").unwrap().gindex().as_u64(),
        6
    );
}
