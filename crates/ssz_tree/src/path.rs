//! Typed paths and generalized-index navigation.
//!
//! A [`Path`] starts at a root type and descends with the same accessors
//! the type itself offers: `field` for containers, `index` for sequences,
//! `length` for the length leaf of the list kinds. Each step is validated
//! against the type it is applied to and carries its local generalized
//! index, so a finished path folds into the absolute [`Gindex`] of the
//! subtree it names; given the type, the conversion runs in both
//! directions.

use std::sync::Arc;

use merkle_tree::{Gindex, Node};
use ssz_primitives::Hash256;

use crate::encode::leaf_chunk;
use crate::schema::{SszType, TypeRef};
use crate::value::Value;
use crate::{BITS_PER_CHUNK, BYTES_PER_CHUNK, Error};

/// One navigation step, as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// A named container field.
    Field(String),
    /// A positional element.
    Index(usize),
    /// The length leaf of a list, byte-list, or bitlist.
    Length,
}

impl std::fmt::Display for PathStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Length => write!(f, ".length"),
        }
    }
}

/// Where a resolved step lands in the parent's backing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// The child owns the whole subtree at the local gindex.
    Subtree,
    /// A basic element packed into part of the chunk at the local gindex.
    PackedBytes {
        /// Byte offset inside the chunk.
        offset: usize,
        /// Element width in bytes.
        size: usize,
    },
    /// A single bit of the chunk at the local gindex.
    PackedBit {
        /// Bit offset inside the chunk.
        bit: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedStep {
    step: PathStep,
    ty: TypeRef,
    local: Gindex,
    slot: Slot,
}

/// A validated path from a root type into one of its subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    root: TypeRef,
    steps: Vec<ResolvedStep>,
}

impl Path {
    /// An empty path anchored at `ty`.
    pub fn new(ty: &TypeRef) -> Self {
        Self {
            root: Arc::clone(ty),
            steps: Vec::new(),
        }
    }

    /// The type the path starts from.
    pub fn root_type(&self) -> &TypeRef {
        &self.root
    }

    /// The type the path currently points at.
    pub fn leaf_type(&self) -> &TypeRef {
        self.steps.last().map_or(&self.root, |step| &step.ty)
    }

    /// The steps taken so far.
    pub fn steps(&self) -> impl Iterator<Item = &PathStep> {
        self.steps.iter().map(|step| &step.step)
    }

    /// Step into the named field of a container.
    pub fn field(mut self, name: &str) -> Result<Self, Error> {
        let tip = Arc::clone(self.leaf_type());
        let SszType::Container(schema) = &*tip else {
            return Err(invalid_step(PathStep::Field(name.into()), &tip));
        };
        let index = schema
            .field_index(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        let (_, field_ty) = &schema.fields()[index];
        self.steps.push(ResolvedStep {
            step: PathStep::Field(name.to_string()),
            ty: Arc::clone(field_ty),
            local: tip.chunk_gindex(index),
            slot: Slot::Subtree,
        });
        Ok(self)
    }

    /// Step into the element at `index`.
    ///
    /// Lists validate against their limit (the path exists for every
    /// position the type can hold, whatever a value's current length).
    pub fn index(mut self, index: usize) -> Result<Self, Error> {
        let tip = Arc::clone(self.leaf_type());
        let resolved = match &*tip {
            SszType::Vector { elem, len } => {
                bounds(index, *len)?;
                element_step(&tip, elem, index)
            }
            SszType::List { elem, limit } => {
                bounds(index, *limit)?;
                element_step(&tip, elem, index)
            }
            SszType::ByteVector(len) => {
                bounds(index, *len)?;
                element_step(&tip, &SszType::uint8(), index)
            }
            SszType::ByteList(limit) => {
                bounds(index, *limit)?;
                element_step(&tip, &SszType::uint8(), index)
            }
            SszType::Bitvector(len) => {
                bounds(index, *len)?;
                bit_step(&tip, index)
            }
            SszType::Bitlist(limit) => {
                bounds(index, *limit)?;
                bit_step(&tip, index)
            }
            _ => return Err(invalid_step(PathStep::Index(index), &tip)),
        };
        self.steps.push(resolved);
        Ok(self)
    }

    /// Step onto the length leaf of a list, byte-list, or bitlist.
    pub fn length(mut self) -> Result<Self, Error> {
        let tip = Arc::clone(self.leaf_type());
        if !tip.has_length_mixin() {
            return Err(invalid_step(PathStep::Length, &tip));
        }
        self.steps.push(ResolvedStep {
            step: PathStep::Length,
            ty: SszType::uint64(),
            local: Gindex::RIGHT,
            slot: Slot::Subtree,
        });
        Ok(self)
    }

    /// The absolute generalized index this path resolves to.
    pub fn gindex(&self) -> Gindex {
        self.steps
            .iter()
            .fold(Gindex::ROOT, |g, step| g.concat(step.local))
    }

    /// Reconstruct the unique step sequence for `gindex` under `ty`.
    ///
    /// A gindex naming a chunk of packed basic elements resolves to the
    /// first element of that chunk. Positions that sit between step
    /// boundaries (interior branch nodes) or inside leaves are rejected.
    pub fn from_gindex(ty: &TypeRef, gindex: Gindex) -> Result<Self, Error> {
        let bits: Vec<bool> = gindex.branch_bits().collect();
        let mut path = Path::new(ty);
        let mut pos = 0;
        while pos < bits.len() {
            let tip = Arc::clone(path.leaf_type());
            match &*tip {
                SszType::Container(schema) => {
                    let depth = tip.contents_depth();
                    let index = take_index(&bits, &mut pos, depth)?;
                    if index >= schema.fields().len() {
                        return Err(Error::OutOfBounds {
                            i: index,
                            len: schema.fields().len(),
                        });
                    }
                    let name = schema.fields()[index].0.clone();
                    path = path.field(&name)?;
                }
                SszType::Vector { .. } | SszType::ByteVector(_) | SszType::Bitvector(_) => {
                    let index =
                        take_index(&bits, &mut pos, tip.contents_depth())? * elems_per_leaf(&tip);
                    path = path.index(index)?;
                }
                SszType::List { .. } | SszType::ByteList(_) | SszType::Bitlist(_) => {
                    if bits[pos] {
                        // The right branch holds only the length leaf.
                        if pos + 1 != bits.len() {
                            return Err(invalid_step(PathStep::Length, &tip));
                        }
                        pos += 1;
                        path = path.length()?;
                    } else {
                        pos += 1;
                        let index = take_index(&bits, &mut pos, tip.contents_depth())?
                            * elems_per_leaf(&tip);
                        path = path.index(index)?;
                    }
                }
                _ => {
                    return Err(Error::InvalidPathStep {
                        step: format!("generalized index {gindex}"),
                        ty: tip.to_string(),
                    });
                }
            }
        }
        Ok(path)
    }
}

/// Elements sharing one content leaf: the packing factor for packed
/// sequences, 1 for sequences of composites.
fn elems_per_leaf(ty: &SszType) -> usize {
    ty.elems_per_chunk().unwrap_or(1)
}

fn take_index(bits: &[bool], pos: &mut usize, depth: u32) -> Result<usize, Error> {
    let depth = depth as usize;
    if *pos + depth > bits.len() {
        return Err(Error::InvalidPathStep {
            step: "a partial-depth generalized index".to_string(),
            ty: "an interior branch".to_string(),
        });
    }
    let mut index = 0usize;
    for bit in &bits[*pos..*pos + depth] {
        index = index << 1 | *bit as usize;
    }
    *pos += depth;
    Ok(index)
}

fn bounds(index: usize, len: usize) -> Result<(), Error> {
    if index >= len {
        return Err(Error::OutOfBounds { i: index, len });
    }
    Ok(())
}

fn element_step(ty: &TypeRef, elem: &TypeRef, index: usize) -> ResolvedStep {
    match elem.basic_size() {
        Some(size) => {
            let per_chunk = BYTES_PER_CHUNK / size;
            ResolvedStep {
                step: PathStep::Index(index),
                ty: Arc::clone(elem),
                local: ty.chunk_gindex(index / per_chunk),
                slot: Slot::PackedBytes {
                    offset: (index % per_chunk) * size,
                    size,
                },
            }
        }
        None => ResolvedStep {
            step: PathStep::Index(index),
            ty: Arc::clone(elem),
            local: ty.chunk_gindex(index),
            slot: Slot::Subtree,
        },
    }
}

fn bit_step(ty: &TypeRef, index: usize) -> ResolvedStep {
    ResolvedStep {
        step: PathStep::Index(index),
        ty: SszType::boolean(),
        local: ty.chunk_gindex(index / BITS_PER_CHUNK),
        slot: Slot::PackedBit {
            bit: index % BITS_PER_CHUNK,
        },
    }
}

fn invalid_step(step: PathStep, ty: &SszType) -> Error {
    Error::InvalidPathStep {
        step: step.to_string(),
        ty: ty.to_string(),
    }
}

/// Resolve `path` against a raw tree.
pub fn apply_path(tree: &Arc<Node>, path: &Path) -> Result<Arc<Node>, merkle_tree::Error> {
    tree.getter(path.gindex())
}

impl SszType {
    /// Start a path builder anchored at this type.
    pub fn path(self: &Arc<Self>) -> Path {
        Path::new(self)
    }
}

impl Value {
    /// Resolve `path` against this value, returning a detached sub-view.
    ///
    /// The path must be rooted at this value's type. Fails with the
    /// partial-backing error when the addressed subtree is absent from
    /// the backing.
    pub fn navigate(&self, path: &Path) -> Result<Value, Error> {
        if *path.root_type() != *self.ty() {
            return Err(Error::TypeMismatch {
                expected: self.ty().to_string(),
                actual: path.root_type().to_string(),
            });
        }
        let gindex = path.gindex();
        let node = self.backing().getter(gindex)?;
        let Some(last) = path.steps.last() else {
            return Ok(self.snapshot());
        };
        match &last.slot {
            Slot::Subtree => Ok(Value::new_view(Arc::clone(&last.ty), node, None)),
            Slot::PackedBytes { offset, size } => {
                let chunk = leaf_chunk(&node, gindex)?;
                let le = &chunk.as_slice()[*offset..*offset + *size];
                Ok(Value::new_view(
                    Arc::clone(&last.ty),
                    Node::leaf(Hash256::from_slice(le)),
                    None,
                ))
            }
            Slot::PackedBit { bit } => {
                let chunk = leaf_chunk(&node, gindex)?;
                let set = chunk.as_slice()[bit / 8] >> (bit % 8) & 1 == 1;
                Ok(Value::new_view(
                    SszType::boolean(),
                    Node::leaf(Hash256::from_u64_le(set as u64)),
                    None,
                ))
            }
        }
    }
}
