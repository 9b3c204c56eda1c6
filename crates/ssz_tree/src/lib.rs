//! Typed, mutable views over tree-backed SSZ values.
//!
//! Every value in this crate is a thin, typed view onto an immutable
//! binary Merkle tree (its *backing*, a [`merkle_tree::Node`]). Reads
//! decode straight out of the tree; writes build a new tree sharing every
//! untouched subtree and rebind the view to it, so the hash-tree-root of
//! any earlier snapshot stays valid and cheap to recompute.
//!
//! Types are built at runtime as [`SszType`] descriptors and shared behind
//! [`TypeRef`]:
//!
//! ```rust
//! use ssz_tree::{ContainerSchema, SszType, Value};
//!
//! let block = SszType::container(ContainerSchema::new(
//!     "MiniBlock",
//!     vec![
//!         ("slot", SszType::uint64()),
//!         ("votes", SszType::list(SszType::uint16(), 1024)),
//!     ],
//! )?);
//!
//! let value = Value::default(&block);
//! value.field("slot")?.replace(&Value::uint64(3))?;
//! value.field("votes")?.append(&Value::uint16(7))?;
//!
//! let root = value.hash_tree_root();
//! let bytes = value.encode_bytes()?;
//! let decoded = Value::decode_bytes(&block, &bytes)?;
//! assert_eq!(decoded.hash_tree_root(), root);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The wire format is canonical SSZ, bit-exact with other implementations;
//! roots follow the SSZ merkleization rules (chunk packing, zero padding,
//! length and selector mix-ins).

mod decode;
mod encode;
mod error;
mod obj;
mod path;
mod schema;
mod value;

pub use decode::{DecodeError, read_offset};
pub use error::Error;
pub use path::{Path, PathStep, apply_path};
pub use schema::{ContainerSchema, SchemaError, SszType, TypeRef, UintTy, UnionSchema};
pub use value::{History, Value};

// Re-exported tree layer: values hand out their backings as plain nodes.
pub use merkle_tree::{Diff, Gindex, Leaves, Node, SubtreeResolver};
pub use ssz_primitives::{Hash256, U128, U256};

/// The number of bytes used to represent an offset.
pub const BYTES_PER_LENGTH_OFFSET: usize = 4;

/// The number of bytes in a Merkle chunk.
pub const BYTES_PER_CHUNK: usize = 32;

/// The number of bits packed into a Merkle chunk.
pub const BITS_PER_CHUNK: usize = 8 * BYTES_PER_CHUNK;

/// The number of bytes used to indicate the variant of a union.
pub const BYTES_PER_UNION_SELECTOR: usize = 1;

/// The highest possible union selector value.
pub const MAX_UNION_SELECTOR: u8 = 127;
