//! Tree nodes.

use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use ssz_primitives::Hash256;

use crate::{Gindex, ZERO_HASHES, ZERO_HASHES_MAX_INDEX, hash32_concat};

/// Supplies the children of a [`Node::Virtual`] on demand.
///
/// A resolver that returns `None` marks the branch as absent: traversal
/// through it fails with [`Error::PartialBacking`](crate::Error), which is
/// how partially-transmitted trees (proofs) report missing data.
pub trait SubtreeResolver: fmt::Debug + Send + Sync {
    /// Produce the left and right children, or `None` if this branch is
    /// not carried by the backing.
    fn resolve(&self) -> Option<(Arc<Node>, Arc<Node>)>;
}

/// A node in an immutable binary Merkle tree.
///
/// Nodes never change after construction; every "mutation" of a tree is a
/// rebind producing new nodes along one path while sharing the rest. The
/// root of a [`Node::Pair`] is computed on first demand and memoized,
/// which is safe precisely because the children can never change.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.root() == other.root()
    }
}

#[derive(Debug)]
pub enum Node {
    /// A leaf holding one 32-byte chunk; its root is the chunk itself.
    Leaf(Hash256),

    /// A branch with two children; its root is
    /// `H(left.root || right.root)`.
    Pair {
        /// Left child.
        left: Arc<Node>,
        /// Right child.
        right: Arc<Node>,
        /// Lazily computed root. Set at most once; concurrent computation
        /// is idempotent.
        root: OnceLock<Hash256>,
    },

    /// A branch with a precomputed root whose children are produced on
    /// demand by a resolver; used for partial trees.
    Virtual {
        /// The precomputed root.
        root: Hash256,
        /// Child factory consulted on first traversal.
        resolver: Arc<dyn SubtreeResolver>,
        /// Resolution result, cached after the first attempt.
        children: OnceLock<Option<(Arc<Node>, Arc<Node>)>>,
    },

    /// A root with no recoverable children; the terminal form of a
    /// summarized subtree or a proof leaf.
    Stub(Hash256),
}

/// Shared all-zero subtrees, one per depth.
///
/// `ZERO_NODES[d]` is a fully navigable tree of `2^d` zero chunks built
/// over the level below it, so the entire table is `ZERO_HASHES_MAX_INDEX`
/// pairs; its roots coincide with [`ZERO_HASHES`].
static ZERO_NODES: LazyLock<Vec<Arc<Node>>> = LazyLock::new(|| {
    let mut nodes: Vec<Arc<Node>> = Vec::with_capacity(ZERO_HASHES_MAX_INDEX + 1);
    nodes.push(Node::leaf(Hash256::ZERO));
    for depth in 1..=ZERO_HASHES_MAX_INDEX {
        let child = Arc::clone(&nodes[depth - 1]);
        let root = OnceLock::new();
        root.set(ZERO_HASHES[depth])
            .expect("freshly created cell is empty");
        nodes.push(Arc::new(Node::Pair {
            left: Arc::clone(&child),
            right: child,
            root,
        }));
    }
    nodes
});

impl Node {
    /// Leaf node holding `chunk`.
    pub fn leaf(chunk: Hash256) -> Arc<Self> {
        Arc::new(Self::Leaf(chunk))
    }

    /// Branch node over two children.
    pub fn pair(left: Arc<Self>, right: Arc<Self>) -> Arc<Self> {
        Arc::new(Self::Pair {
            left,
            right,
            root: OnceLock::new(),
        })
    }

    /// Virtual branch with a precomputed `root` and on-demand children.
    pub fn virtual_node(root: Hash256, resolver: Arc<dyn SubtreeResolver>) -> Arc<Self> {
        Arc::new(Self::Virtual {
            root,
            resolver,
            children: OnceLock::new(),
        })
    }

    /// Root-only node: carries `root`, children are unrecoverable.
    pub fn stub(root: Hash256) -> Arc<Self> {
        Arc::new(Self::Stub(root))
    }

    /// The shared all-zero subtree of the given depth.
    ///
    /// Depth 0 is a single zero chunk. The returned tree is fully
    /// navigable, so default values can be descended into and rebound.
    pub fn zero(depth: u32) -> Arc<Self> {
        Arc::clone(&ZERO_NODES[depth as usize])
    }

    /// The 32-byte Merkle root of this node.
    ///
    /// Pure with respect to node content; pair roots are memoized on
    /// first call.
    pub fn root(&self) -> Hash256 {
        match self {
            Self::Leaf(chunk) => *chunk,
            Self::Pair { left, right, root } => *root
                .get_or_init(|| hash32_concat(left.root().as_ref(), right.root().as_ref())),
            Self::Virtual { root, .. } => *root,
            Self::Stub(root) => *root,
        }
    }

    /// Whether this node terminates traversal (leaf chunk or root-only).
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_) | Self::Stub(_))
    }

    /// The chunk payload, for leaf nodes.
    pub fn chunk(&self) -> Option<Hash256> {
        match self {
            Self::Leaf(chunk) => Some(*chunk),
            _ => None,
        }
    }

    /// Both children, if this node has recoverable children.
    ///
    /// `None` for leaves, stubs, and virtual nodes whose resolver carries
    /// no data. Distinguishing those cases is the caller's job (leaves via
    /// [`is_leaf`](Self::is_leaf)).
    pub fn children(&self) -> Option<(Arc<Node>, Arc<Node>)> {
        match self {
            Self::Leaf(_) | Self::Stub(_) => None,
            Self::Pair { left, right, .. } => Some((Arc::clone(left), Arc::clone(right))),
            Self::Virtual {
                resolver, children, ..
            } => children.get_or_init(|| resolver.resolve()).clone(),
        }
    }

    /// Left child; leaves fail with [`Error::Navigation`](crate::Error)
    /// and absent branches with
    /// [`Error::PartialBacking`](crate::Error), positioned at this node.
    pub fn left(&self) -> Result<Arc<Node>, crate::Error> {
        self.child_at(Gindex::ROOT, false)
    }

    /// Right child; fails like [`left`](Self::left).
    pub fn right(&self) -> Result<Arc<Node>, crate::Error> {
        self.child_at(Gindex::ROOT, true)
    }

    /// Child in the named direction, reporting errors against the node's
    /// absolute position `at`.
    pub(crate) fn child_at(&self, at: Gindex, right: bool) -> Result<Arc<Node>, crate::Error> {
        match self.children() {
            Some((l, r)) => Ok(if right { r } else { l }),
            None if self.is_leaf() => Err(crate::Error::Navigation { gindex: at }),
            None => Err(crate::Error::PartialBacking { gindex: at }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[derive(Debug)]
    struct Absent;

    impl SubtreeResolver for Absent {
        fn resolve(&self) -> Option<(Arc<Node>, Arc<Node>)> {
            None
        }
    }

    #[derive(Debug)]
    struct TwoLeaves;

    impl SubtreeResolver for TwoLeaves {
        fn resolve(&self) -> Option<(Arc<Node>, Arc<Node>)> {
            Some((
                Node::leaf(Hash256::repeat_byte(1)),
                Node::leaf(Hash256::repeat_byte(2)),
            ))
        }
    }

    #[test]
    fn leaf_root_is_its_chunk() {
        let chunk = Hash256::repeat_byte(7);
        assert_eq!(Node::leaf(chunk).root(), chunk);
    }

    #[test]
    fn pair_root_is_hash_of_children() {
        let left = Node::leaf(Hash256::repeat_byte(1));
        let right = Node::leaf(Hash256::repeat_byte(2));
        let expected = hash32_concat(left.root().as_ref(), right.root().as_ref());
        let pair = Node::pair(left, right);
        assert_eq!(pair.root(), expected);
        // Memoized: second read is identical.
        assert_eq!(pair.root(), expected);
    }

    #[test]
    fn zero_nodes_match_zero_hashes() {
        for depth in [0u32, 1, 5, 40, 64] {
            assert_eq!(Node::zero(depth).root(), ZERO_HASHES[depth as usize]);
        }
    }

    #[test]
    fn zero_nodes_are_navigable() {
        let (left, right) = Node::zero(3).children().unwrap();
        assert_eq!(left.root(), ZERO_HASHES[2]);
        assert!(Arc::ptr_eq(&left, &right));
    }

    #[test]
    fn leaf_has_no_children() {
        let leaf = Node::leaf(Hash256::ZERO);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.left(), Err(Error::Navigation { gindex: Gindex::ROOT }));
    }

    #[test]
    fn stub_reports_partial_backing() {
        let stub = Node::stub(Hash256::repeat_byte(3));
        assert!(stub.is_leaf());
        assert_eq!(stub.root(), Hash256::repeat_byte(3));
        assert_eq!(
            stub.right(),
            Err(Error::PartialBacking { gindex: Gindex::ROOT })
        );
    }

    #[test]
    fn virtual_node_resolves_children_once() {
        let expected = {
            let l = Hash256::repeat_byte(1);
            let r = Hash256::repeat_byte(2);
            hash32_concat(l.as_ref(), r.as_ref())
        };
        let node = Node::virtual_node(expected, Arc::new(TwoLeaves));
        assert_eq!(node.root(), expected);
        let (first, _) = node.children().unwrap();
        let (second, _) = node.children().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn unresolvable_virtual_is_partial() {
        let node = Node::virtual_node(Hash256::ZERO, Arc::new(Absent));
        assert!(!node.is_leaf());
        assert_eq!(
            node.left(),
            Err(Error::PartialBacking { gindex: Gindex::ROOT })
        );
    }
}
