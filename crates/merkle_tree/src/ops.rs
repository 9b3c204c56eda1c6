//! Whole-tree operations: addressed access, rebinding, summarization, and
//! chunk merkleization.

use std::sync::Arc;

use ssz_primitives::Hash256;

use crate::{Error, Gindex, Node, ZERO_HASHES, hash32_concat};

impl Node {
    /// The node at generalized index `gindex`.
    ///
    /// Fails with [`Error::Navigation`] if the path descends into a leaf
    /// and with [`Error::PartialBacking`] if it enters a branch this
    /// backing does not carry.
    pub fn getter(self: &Arc<Self>, gindex: Gindex) -> Result<Arc<Node>, Error> {
        let mut node = Arc::clone(self);
        let mut at = Gindex::ROOT;
        for right in gindex.branch_bits() {
            node = node.child_at(at, right)?;
            at = at.child(right);
        }
        Ok(node)
    }

    /// A new tree equal to this one except that the subtree at `gindex` is
    /// `node`.
    ///
    /// Every subtree off the rebound path is shared with the receiver.
    pub fn setter(self: &Arc<Self>, gindex: Gindex, node: Arc<Node>) -> Result<Arc<Node>, Error> {
        rebind(self, Gindex::ROOT, gindex.as_u64(), gindex.depth(), node)
    }

    /// A new tree where the subtree at `gindex` is collapsed to a
    /// root-only node carrying its root.
    ///
    /// The overall root is unchanged; interior detail below `gindex`
    /// becomes unreachable and reports [`Error::PartialBacking`].
    pub fn summarize_into(self: &Arc<Self>, gindex: Gindex) -> Result<Arc<Node>, Error> {
        let summary = Node::stub(self.getter(gindex)?.root());
        self.setter(gindex, summary)
    }
}

fn rebind(
    node: &Arc<Node>,
    at: Gindex,
    path: u64,
    depth: u32,
    new: Arc<Node>,
) -> Result<Arc<Node>, Error> {
    if depth == 0 {
        return Ok(new);
    }
    let right = (path >> (depth - 1)) & 1 == 1;
    let sibling_side = node.child_at(at, !right)?;
    let into = node.child_at(at, right)?;
    let rebound = rebind(&into, at.child(right), path, depth - 1, new)?;
    Ok(if right {
        Node::pair(sibling_side, rebound)
    } else {
        Node::pair(rebound, sibling_side)
    })
}

/// Build a subtree of the given depth whose leftmost positions are
/// `contents`, padded to the right with shared all-zero subtrees.
///
/// `contents` may hold at most `2^depth` nodes; each may itself be a
/// subtree (composite element backings sit below their layer).
pub fn subtree_fill_to_contents(mut contents: Vec<Arc<Node>>, depth: u32) -> Arc<Node> {
    debug_assert!(depth >= 64 || contents.len() <= 1usize << depth);
    if contents.is_empty() {
        return Node::zero(depth);
    }
    for level in 0..depth {
        let mut next = Vec::with_capacity(contents.len().div_ceil(2));
        let mut nodes = contents.into_iter();
        while let Some(left) = nodes.next() {
            let right = nodes.next().unwrap_or_else(|| Node::zero(level));
            next.push(Node::pair(left, right));
        }
        contents = next;
    }
    contents
        .pop()
        .expect("non-empty contents reduce to a single root")
}

/// Merkle root of `chunks` zero-padded to `next_pow2(limit)` leaves.
///
/// The flat, allocation-per-level reference algorithm; the tree-backed
/// values in this workspace build [`Node`]s instead and only use this for
/// cross-checking. `limit == 0` yields the zero chunk. `chunks` must not
/// outnumber `limit`.
pub fn merkleize_chunks(chunks: &[Hash256], limit: usize) -> Hash256 {
    debug_assert!(chunks.len() <= limit.max(1));
    if limit == 0 {
        return ZERO_HASHES[0];
    }
    let depth = depth_for(limit);
    let mut layer: Vec<Hash256> = chunks.to_vec();
    for level in 0..depth as usize {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        let mut hashes = layer.into_iter();
        while let Some(left) = hashes.next() {
            let right = hashes.next().unwrap_or(ZERO_HASHES[level]);
            next.push(hash32_concat(left.as_ref(), right.as_ref()));
        }
        layer = next;
    }
    layer.into_iter().next().unwrap_or(ZERO_HASHES[depth as usize])
}

/// Tree depth needed for `limit` leaves: `ceil(log2(limit))`.
pub fn depth_for(limit: usize) -> u32 {
    limit.next_power_of_two().trailing_zeros()
}

/// `H(root || u256_le(length))`, the list length mix-in.
pub fn mix_in_length(root: Hash256, length: u64) -> Hash256 {
    hash32_concat(root.as_ref(), Hash256::from_u64_le(length).as_ref())
}

/// `H(root || u256_le(selector))`, the union selector mix-in.
pub fn mix_in_selector(root: Hash256, selector: u8) -> Hash256 {
    hash32_concat(root.as_ref(), Hash256::from_u64_le(selector as u64).as_ref())
}
