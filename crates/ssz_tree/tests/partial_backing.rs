//! Partial-backing tolerance: summarized subtrees keep the root intact,
//! serve every access that stays outside them, and fail loudly inside.

use std::sync::Arc;

use merkle_tree::{Error as TreeError, Leaves, Node, SubtreeResolver};
use ssz_tree::{ContainerSchema, Error, Hash256, Path, SszType, TypeRef, Value};

fn block_type() -> TypeRef {
    SszType::container(
        ContainerSchema::new(
            "Block",
            vec![
                ("slot", SszType::uint64()),
                ("parent", SszType::byte_vector(32).unwrap()),
                ("payload", SszType::byte_list(128)),
                ("votes", SszType::list(SszType::uint16(), 16)),
            ],
        )
        .unwrap(),
    )
}

fn sample_block(ty: &TypeRef) -> Value {
    let value = Value::default(ty);
    value.set_field("slot", &Value::uint64(7)).unwrap();
    value
        .set_field(
            "parent",
            &Value::bytes(&SszType::byte_vector(32).unwrap(), &[0xab; 32]).unwrap(),
        )
        .unwrap();
    value
        .set_field(
            "payload",
            &Value::bytes(&SszType::byte_list(128), &[1, 2, 3, 4, 5]).unwrap(),
        )
        .unwrap();
    let votes = value.field("votes").unwrap();
    votes.append(&Value::uint16(11)).unwrap();
    votes.append(&Value::uint16(22)).unwrap();
    value
}

#[test]
fn summarized_subtree_keeps_the_root_and_blocks_entry() {
    let ty = block_type();
    let full = sample_block(&ty);
    let payload_gindex = Path::new(&ty).field("payload").unwrap().gindex();

    let collapsed = full.backing().summarize_into(payload_gindex).unwrap();
    let partial = Value::from_backing(&ty, collapsed);

    // Property 7: the root is unchanged.
    assert_eq!(partial.hash_tree_root(), full.hash_tree_root());

    // Accesses outside the collapsed subtree all succeed.
    assert_eq!(partial.field("slot").unwrap().as_u64().unwrap(), 7);
    assert_eq!(
        partial.field("parent").unwrap().as_bytes().unwrap(),
        vec![0xab; 32]
    );
    assert_eq!(partial.field("votes").unwrap().len().unwrap(), 2);
    assert_eq!(
        partial
            .field("votes")
            .unwrap()
            .get(1)
            .unwrap()
            .as_u64()
            .unwrap(),
        22
    );

    // Entering the collapsed subtree fails with the partial-backing
    // error, whichever interface is used.
    assert!(matches!(
        partial.field("payload").unwrap().len(),
        Err(Error::Tree(TreeError::PartialBacking { .. }))
    ));
    assert!(matches!(
        partial.field("payload").unwrap().as_bytes(),
        Err(Error::Tree(TreeError::PartialBacking { .. }))
    ));
    assert!(matches!(
        partial.encode_bytes(),
        Err(Error::Tree(TreeError::PartialBacking { .. }))
    ));
    assert!(matches!(
        partial.byte_length(),
        Err(Error::Tree(TreeError::PartialBacking { .. }))
    ));
}

#[test]
fn mutation_outside_the_hole_still_works() {
    let ty = block_type();
    let full = sample_block(&ty);
    let payload_gindex = Path::new(&ty).field("payload").unwrap().gindex();
    let partial = Value::from_backing(
        &ty,
        full.backing().summarize_into(payload_gindex).unwrap(),
    );

    partial.set_field("slot", &Value::uint64(8)).unwrap();
    assert_eq!(partial.field("slot").unwrap().as_u64().unwrap(), 8);

    // The collapsed part still contributes its root: only the slot leaf
    // differs from the equivalent mutation of the full value.
    full.set_field("slot", &Value::uint64(8)).unwrap();
    assert_eq!(partial.hash_tree_root(), full.hash_tree_root());
}

#[test]
fn leaf_iteration_surfaces_stubs_not_contents() {
    let ty = block_type();
    let full = sample_block(&ty);
    let votes_gindex = Path::new(&ty).field("votes").unwrap().gindex();
    let collapsed = full.backing().summarize_into(votes_gindex).unwrap();

    let stubs: Vec<_> = Leaves::new(collapsed)
        .map(Result::unwrap)
        .filter(|(_, node)| node.chunk().is_none())
        .collect();
    assert_eq!(stubs.len(), 1);
    assert_eq!(stubs[0].0, votes_gindex);
}

#[derive(Debug)]
struct Unavailable;

impl SubtreeResolver for Unavailable {
    fn resolve(&self) -> Option<(Arc<Node>, Arc<Node>)> {
        None
    }
}

#[test]
fn virtual_nodes_without_data_fail_on_entry() {
    let ty = SszType::list(SszType::uint16(), 16);
    let full = Value::default(&ty);
    full.append(&Value::uint16(5)).unwrap();

    // Replace the content subtree with a virtual node carrying only its
    // root: the length stays readable, the contents do not.
    let content = full.backing().left().unwrap();
    let virtualized = Node::pair(
        Node::virtual_node(content.root(), Arc::new(Unavailable)),
        full.backing().right().unwrap(),
    );
    let partial = Value::from_backing(&ty, virtualized);

    assert_eq!(partial.hash_tree_root(), full.hash_tree_root());
    assert_eq!(partial.len().unwrap(), 1);
    assert!(matches!(
        partial.get(0),
        Err(Error::Tree(TreeError::PartialBacking { .. }))
    ));
}

#[derive(Debug)]
struct TwoChildren(Arc<Node>, Arc<Node>);

impl SubtreeResolver for TwoChildren {
    fn resolve(&self) -> Option<(Arc<Node>, Arc<Node>)> {
        Some((Arc::clone(&self.0), Arc::clone(&self.1)))
    }
}

#[test]
fn virtual_nodes_with_data_resolve_transparently() {
    // 16 u64 elements pack into four chunks, so the content tree has
    // real branches for the virtual node to resolve.
    let ty = SszType::vector(SszType::uint64(), 16).unwrap();
    let elems: Vec<Value> = (0..16u64).map(Value::uint64).collect();
    let full = Value::from_elements(&ty, &elems).unwrap();

    let backing = full.backing();
    let (left, right) = (backing.left().unwrap(), backing.right().unwrap());
    let virtualized = Node::virtual_node(backing.root(), Arc::new(TwoChildren(left, right)));
    let lazy = Value::from_backing(&ty, virtualized);

    assert_eq!(lazy.hash_tree_root(), full.hash_tree_root());
    assert_eq!(lazy.get(9).unwrap().as_u64().unwrap(), 9);
    assert_eq!(lazy.encode_bytes().unwrap(), full.encode_bytes().unwrap());
}

#[test]
fn stub_roots_compose_like_real_subtrees() {
    // A tree rebuilt from a stub at a child position has the same root
    // as the original.
    let ty = block_type();
    let full = sample_block(&ty);
    let parent_gindex = Path::new(&ty).field("parent").unwrap().gindex();
    let sub_root = full.backing().getter(parent_gindex).unwrap().root();

    let stubbed = full
        .backing()
        .setter(parent_gindex, Node::stub(sub_root))
        .unwrap();
    assert_eq!(stubbed.root(), full.hash_tree_root());
    assert_eq!(stubbed.getter(parent_gindex).unwrap().root(), sub_root);
    assert_eq!(
        stubbed.getter(parent_gindex).unwrap().chunk(),
        None::<Hash256>
    );
}
