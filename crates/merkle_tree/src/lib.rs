//! Immutable binary Merkle trees with cached roots and structural sharing.
//!
//! A tree is built from reference-counted [`Node`]s: leaves hold a 32-byte
//! chunk, pairs hold two children and memoize `H(left.root || right.root)`
//! on first demand. Because nodes never mutate, any number of trees may
//! share subtrees, and "mutation" is expressed as a rebind: [`Node::setter`]
//! returns a new root equal to the receiver except at one generalized
//! index, sharing every untouched path with the original.
//!
//! Positions are addressed by [`Gindex`]: the root is `1`, and the children
//! of `g` are `2g` and `2g + 1`.
//!
//! ```rust
//! use merkle_tree::{Gindex, Node};
//! use ssz_primitives::Hash256;
//!
//! let tree = Node::pair(
//!     Node::leaf(Hash256::repeat_byte(1)),
//!     Node::leaf(Hash256::repeat_byte(2)),
//! );
//! let g = Gindex::new(3).unwrap();
//! let updated = tree.setter(g, Node::leaf(Hash256::repeat_byte(9))).unwrap();
//!
//! // The original is untouched, and the left subtree is shared.
//! assert_ne!(tree.root(), updated.root());
//! assert!(std::sync::Arc::ptr_eq(
//!     &tree.getter(Gindex::new(2).unwrap()).unwrap(),
//!     &updated.getter(Gindex::new(2).unwrap()).unwrap(),
//! ));
//! ```

use std::sync::LazyLock;

use digest::Digest;
use ssz_primitives::Hash256;

mod error;
mod gindex;
mod iter;
mod node;
mod ops;

pub use error::Error;
pub use gindex::Gindex;
pub use iter::{Diff, Leaves};
pub use node::{Node, SubtreeResolver};
pub use ops::{
    depth_for, merkleize_chunks, mix_in_length, mix_in_selector, subtree_fill_to_contents,
};

/// Number of bytes in a chunk.
pub const BYTES_PER_CHUNK: usize = 32;

/// Size of a hashed pair of chunks.
pub const MERKLE_HASH_CHUNK: usize = 2 * BYTES_PER_CHUNK;

/// Deepest zero hash kept in the shared cache.
///
/// Covers every tree this crate can address (a [`Gindex`] is a `u64`).
pub const ZERO_HASHES_MAX_INDEX: usize = 64;

/// Roots of all-zero subtrees by depth: `ZERO_HASHES[0]` is the zero chunk,
/// `ZERO_HASHES[d] = H(ZERO_HASHES[d-1] || ZERO_HASHES[d-1])`.
pub static ZERO_HASHES: LazyLock<Vec<Hash256>> = LazyLock::new(|| {
    let mut hashes = vec![Hash256::ZERO; ZERO_HASHES_MAX_INDEX + 1];
    for i in 0..ZERO_HASHES_MAX_INDEX {
        hashes[i + 1] = hash32_concat(hashes[i].as_ref(), hashes[i].as_ref());
    }
    hashes
});

/// SHA-256 of the 64-byte concatenation of two 32-byte inputs.
pub fn hash32_concat(left: &[u8], right: &[u8]) -> Hash256 {
    let mut hasher = sha2::Sha256::new();
    hasher.update(left);
    hasher.update(right);
    Hash256::from_slice(&hasher.finalize())
}

/// SHA-256 of arbitrary input, as a [`Hash256`].
pub fn hash_fixed(data: &[u8]) -> Hash256 {
    let mut hasher = sha2::Sha256::new();
    hasher.update(data);
    Hash256::from_slice(&hasher.finalize())
}
