//! Runtime-built SSZ type descriptors.
//!
//! Types are ordinary values: construct them once, share them behind
//! [`TypeRef`], and hand them to [`Value`](crate::Value) constructors and
//! decoders. A descriptor knows its serialized-size bounds, its chunk
//! layout, the default (all-zero) backing tree, and how its children map
//! onto generalized indices.

use std::fmt;
use std::sync::Arc;

use merkle_tree::{Gindex, Node, depth_for, subtree_fill_to_contents};
use thiserror::Error;

use crate::{BITS_PER_CHUNK, BYTES_PER_CHUNK, BYTES_PER_LENGTH_OFFSET, MAX_UNION_SELECTOR};

/// Shared handle to a type descriptor.
pub type TypeRef = Arc<SszType>;

/// Width of an unsigned-integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UintTy {
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 128-bit unsigned integer.
    U128,
    /// 256-bit unsigned integer.
    U256,
}

impl UintTy {
    /// Serialized width in bytes.
    pub const fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
            Self::U128 => 16,
            Self::U256 => 32,
        }
    }
}

/// An SSZ type descriptor.
///
/// Composite descriptors own their child descriptors behind [`TypeRef`],
/// so a schema is an immutable DAG that can be shared freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SszType {
    /// `boolean`.
    Bool,
    /// `uintN`.
    Uint(UintTy),
    /// `ByteVector[N]`: fixed-length byte sequence.
    ByteVector(usize),
    /// `ByteList[L]`: variable-length byte sequence with limit `L`.
    ByteList(usize),
    /// `Bitvector[N]`: fixed-length bit sequence.
    Bitvector(usize),
    /// `Bitlist[L]`: variable-length bit sequence with limit `L`.
    Bitlist(usize),
    /// `Vector[T, N]`: fixed-length sequence of `T`.
    Vector {
        /// Element type.
        elem: TypeRef,
        /// Number of elements.
        len: usize,
    },
    /// `List[T, L]`: variable-length sequence of `T` with limit `L`.
    List {
        /// Element type.
        elem: TypeRef,
        /// Maximum number of elements.
        limit: usize,
    },
    /// An ordered, named-field container.
    Container(Arc<ContainerSchema>),
    /// A tagged union; selector 0 is the none variant.
    Union(Arc<UnionSchema>),
}

/// Rejected type construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Vectors and byte-vectors must hold at least one element.
    #[error("vector length must be positive")]
    ZeroLengthVector,

    /// Bitvectors must hold at least one bit.
    #[error("bitvector length must be positive")]
    ZeroLengthBitvector,

    /// Containers must declare at least one field.
    #[error("container `{0}` has no fields")]
    EmptyContainer(String),

    /// Field names are unique, including across inheritance.
    #[error("duplicate field `{field}` in container `{container}`")]
    DuplicateField {
        /// Container being built.
        container: String,
        /// Offending field name.
        field: String,
    },

    /// Unions carry 2 to 128 variants.
    #[error("union must have 2 to 128 variants, got {0}")]
    UnionVariantCount(usize),

    /// Variant 0 is reserved for the none type.
    #[error("union variant 0 must be the none type")]
    UnionFirstVariantNotNone,

    /// Every variant above 0 must name a concrete type.
    #[error("union variant {0} must be a concrete type")]
    UnionVariantNotConcrete(usize),
}

/// Field list of a container type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSchema {
    name: String,
    fields: Vec<(String, TypeRef)>,
}

impl ContainerSchema {
    /// Build a container schema from ordered `(name, type)` pairs.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        fields: Vec<(S, TypeRef)>,
    ) -> Result<Arc<Self>, SchemaError> {
        let name = name.into();
        let fields: Vec<(String, TypeRef)> = fields
            .into_iter()
            .map(|(n, ty)| (n.into(), ty))
            .collect();
        if fields.is_empty() {
            return Err(SchemaError::EmptyContainer(name));
        }
        for (i, (field, _)) in fields.iter().enumerate() {
            if fields[..i].iter().any(|(other, _)| other == field) {
                return Err(SchemaError::DuplicateField {
                    container: name,
                    field: field.clone(),
                });
            }
        }
        Ok(Arc::new(Self { name, fields }))
    }

    /// Derive a new container by appending `extra` fields to this one.
    ///
    /// Single-level inheritance: the base's fields come first, re-declaring
    /// an inherited name is rejected.
    pub fn extend<S: Into<String>>(
        &self,
        name: impl Into<String>,
        extra: Vec<(S, TypeRef)>,
    ) -> Result<Arc<Self>, SchemaError> {
        let mut fields: Vec<(String, TypeRef)> = self.fields.clone();
        fields.extend(extra.into_iter().map(|(n, ty)| (n.into(), ty)));
        Self::new(name, fields)
    }

    /// The container's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered fields.
    pub fn fields(&self) -> &[(String, TypeRef)] {
        &self.fields
    }

    /// Position of the named field.
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(name, _)| name == field)
    }
}

/// Variant list of a union type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionSchema {
    variants: Vec<Option<TypeRef>>,
}

impl UnionSchema {
    /// Build a union schema. `variants[0]` must be `None`; all others must
    /// be concrete types; 2 to 128 variants total.
    pub fn new(variants: Vec<Option<TypeRef>>) -> Result<Arc<Self>, SchemaError> {
        if variants.len() < 2 || variants.len() > MAX_UNION_SELECTOR as usize + 1 {
            return Err(SchemaError::UnionVariantCount(variants.len()));
        }
        if variants[0].is_some() {
            return Err(SchemaError::UnionFirstVariantNotNone);
        }
        for (i, variant) in variants.iter().enumerate().skip(1) {
            if variant.is_none() {
                return Err(SchemaError::UnionVariantNotConcrete(i));
            }
        }
        Ok(Arc::new(Self { variants }))
    }

    /// All variants in selector order.
    pub fn variants(&self) -> &[Option<TypeRef>] {
        &self.variants
    }

    /// The type selected by `selector`, if the selector is in range.
    /// `Ok(None)` is the none variant.
    pub fn variant(&self, selector: u8) -> Option<Option<&TypeRef>> {
        self.variants.get(selector as usize).map(Option::as_ref)
    }
}

impl SszType {
    /// `boolean`.
    pub fn boolean() -> TypeRef {
        Arc::new(Self::Bool)
    }

    /// `uint8`.
    pub fn uint8() -> TypeRef {
        Arc::new(Self::Uint(UintTy::U8))
    }

    /// `uint16`.
    pub fn uint16() -> TypeRef {
        Arc::new(Self::Uint(UintTy::U16))
    }

    /// `uint32`.
    pub fn uint32() -> TypeRef {
        Arc::new(Self::Uint(UintTy::U32))
    }

    /// `uint64`.
    pub fn uint64() -> TypeRef {
        Arc::new(Self::Uint(UintTy::U64))
    }

    /// `uint128`.
    pub fn uint128() -> TypeRef {
        Arc::new(Self::Uint(UintTy::U128))
    }

    /// `uint256`.
    pub fn uint256() -> TypeRef {
        Arc::new(Self::Uint(UintTy::U256))
    }

    /// `ByteVector[N]`; `len` must be positive.
    pub fn byte_vector(len: usize) -> Result<TypeRef, SchemaError> {
        if len == 0 {
            return Err(SchemaError::ZeroLengthVector);
        }
        Ok(Arc::new(Self::ByteVector(len)))
    }

    /// `ByteList[L]`; a zero limit is allowed.
    pub fn byte_list(limit: usize) -> TypeRef {
        Arc::new(Self::ByteList(limit))
    }

    /// `Bitvector[N]`; `len` must be positive.
    pub fn bitvector(len: usize) -> Result<TypeRef, SchemaError> {
        if len == 0 {
            return Err(SchemaError::ZeroLengthBitvector);
        }
        Ok(Arc::new(Self::Bitvector(len)))
    }

    /// `Bitlist[L]`; a zero limit is allowed.
    pub fn bitlist(limit: usize) -> TypeRef {
        Arc::new(Self::Bitlist(limit))
    }

    /// `Vector[T, N]`; `len` must be positive.
    pub fn vector(elem: TypeRef, len: usize) -> Result<TypeRef, SchemaError> {
        if len == 0 {
            return Err(SchemaError::ZeroLengthVector);
        }
        Ok(Arc::new(Self::Vector { elem, len }))
    }

    /// `List[T, L]`; a zero limit is allowed.
    pub fn list(elem: TypeRef, limit: usize) -> TypeRef {
        Arc::new(Self::List { elem, limit })
    }

    /// Container type over a validated schema.
    pub fn container(schema: Arc<ContainerSchema>) -> TypeRef {
        Arc::new(Self::Container(schema))
    }

    /// Union type over a validated schema.
    pub fn union(schema: Arc<UnionSchema>) -> TypeRef {
        Arc::new(Self::Union(schema))
    }

    /// Whether this is a basic type (boolean or unsigned integer).
    pub fn is_basic(&self) -> bool {
        matches!(self, Self::Bool | Self::Uint(_))
    }

    /// Serialized size of a basic type.
    pub fn basic_size(&self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Uint(w) => Some(w.size()),
            _ => None,
        }
    }

    /// Whether values serialize to a fixed number of bytes.
    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }

    /// Serialized size, for fixed-size types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Uint(w) => Some(w.size()),
            Self::ByteVector(len) => Some(*len),
            Self::Bitvector(len) => Some(len.div_ceil(8)),
            Self::Vector { elem, len } => elem.fixed_size().map(|size| size * len),
            Self::Container(schema) => {
                let mut total = 0;
                for (_, field) in schema.fields() {
                    total += field.fixed_size()?;
                }
                Some(total)
            }
            Self::ByteList(_) | Self::Bitlist(_) | Self::List { .. } | Self::Union(_) => None,
        }
    }

    /// Smallest legal serialization, in bytes.
    pub fn min_byte_length(&self) -> usize {
        match self {
            Self::ByteList(_) | Self::List { .. } => 0,
            Self::Bitlist(_) => 1,
            Self::Union(schema) => {
                1 + schema
                    .variants()
                    .iter()
                    .map(|v| v.as_ref().map_or(0, |ty| ty.min_byte_length()))
                    .min()
                    .unwrap_or(0)
            }
            Self::Vector { elem, len } if !elem.is_fixed_size() => {
                (BYTES_PER_LENGTH_OFFSET + elem.min_byte_length()) * len
            }
            Self::Container(schema) => schema
                .fields()
                .iter()
                .map(|(_, field)| match field.fixed_size() {
                    Some(size) => size,
                    None => BYTES_PER_LENGTH_OFFSET + field.min_byte_length(),
                })
                .sum(),
            _ => self.fixed_size().unwrap_or(0),
        }
    }

    /// Largest legal serialization, in bytes.
    pub fn max_byte_length(&self) -> usize {
        match self {
            Self::ByteList(limit) => *limit,
            Self::Bitlist(limit) => limit / 8 + 1,
            Self::List { elem, limit } => match elem.fixed_size() {
                Some(size) => size * limit,
                None => (BYTES_PER_LENGTH_OFFSET + elem.max_byte_length()) * limit,
            },
            Self::Union(schema) => {
                1 + schema
                    .variants()
                    .iter()
                    .map(|v| v.as_ref().map_or(0, |ty| ty.max_byte_length()))
                    .max()
                    .unwrap_or(0)
            }
            Self::Vector { elem, len } if !elem.is_fixed_size() => {
                (BYTES_PER_LENGTH_OFFSET + elem.max_byte_length()) * len
            }
            Self::Container(schema) => schema
                .fields()
                .iter()
                .map(|(_, field)| match field.fixed_size() {
                    Some(size) => size,
                    None => BYTES_PER_LENGTH_OFFSET + field.max_byte_length(),
                })
                .sum(),
            _ => self.fixed_size().unwrap_or(0),
        }
    }

    /// Number of leaf positions in the content tree.
    ///
    /// For lists this is the chunk (or element) limit, not the current
    /// length; for containers it is the field count.
    pub fn chunk_count(&self) -> usize {
        match self {
            Self::Bool | Self::Uint(_) => 1,
            Self::ByteVector(len) => len.div_ceil(BYTES_PER_CHUNK),
            Self::ByteList(limit) => limit.div_ceil(BYTES_PER_CHUNK),
            Self::Bitvector(len) => len.div_ceil(BITS_PER_CHUNK),
            Self::Bitlist(limit) => limit.div_ceil(BITS_PER_CHUNK),
            Self::Vector { elem, len } => match elem.basic_size() {
                Some(size) => (len * size).div_ceil(BYTES_PER_CHUNK),
                None => *len,
            },
            Self::List { elem, limit } => match elem.basic_size() {
                Some(size) => (limit * size).div_ceil(BYTES_PER_CHUNK),
                None => *limit,
            },
            Self::Container(schema) => schema.fields().len(),
            Self::Union(_) => 1,
        }
    }

    /// Depth of the content tree (below the length/selector mix-in where
    /// one exists).
    pub fn contents_depth(&self) -> u32 {
        depth_for(self.chunk_count())
    }

    /// Whether the backing carries a length mix-in above the content tree.
    pub(crate) fn has_length_mixin(&self) -> bool {
        matches!(self, Self::ByteList(_) | Self::Bitlist(_) | Self::List { .. })
    }

    /// Basic elements packed into each content chunk, for packed
    /// sequences.
    pub(crate) fn elems_per_chunk(&self) -> Option<usize> {
        match self {
            Self::ByteVector(_) | Self::ByteList(_) => Some(BYTES_PER_CHUNK),
            Self::Bitvector(_) | Self::Bitlist(_) => Some(BITS_PER_CHUNK),
            Self::Vector { elem, .. } | Self::List { elem, .. } => {
                elem.basic_size().map(|size| BYTES_PER_CHUNK / size)
            }
            _ => None,
        }
    }

    /// Absolute position of content chunk `chunk` within a value's
    /// backing tree.
    pub(crate) fn chunk_gindex(&self, chunk: usize) -> Gindex {
        let local = Gindex::from_depth_and_index(self.contents_depth(), chunk as u64);
        if self.has_length_mixin() {
            Gindex::LEFT.concat(local)
        } else {
            local
        }
    }

    /// The backing of the type's default (all-zero) value.
    pub fn default_backing(&self) -> Arc<Node> {
        match self {
            Self::Bool | Self::Uint(_) => Node::zero(0),
            Self::ByteVector(_) | Self::Bitvector(_) => Node::zero(self.contents_depth()),
            Self::ByteList(_) | Self::Bitlist(_) | Self::List { .. } => {
                Node::pair(Node::zero(self.contents_depth()), Node::zero(0))
            }
            Self::Vector { elem, len } => match elem.basic_size() {
                Some(_) => Node::zero(self.contents_depth()),
                None => uniform_subtree(&elem.default_backing(), *len, self.contents_depth()),
            },
            Self::Container(schema) => subtree_fill_to_contents(
                schema
                    .fields()
                    .iter()
                    .map(|(_, field)| field.default_backing())
                    .collect(),
                self.contents_depth(),
            ),
            Self::Union(_) => Node::pair(Node::zero(0), Node::zero(0)),
        }
    }
}

/// Subtree of `depth` levels whose first `count` positions hold `node` and
/// whose remainder is zero padding. Shares full halves instead of
/// materializing them twice.
fn uniform_subtree(node: &Arc<Node>, count: usize, depth: u32) -> Arc<Node> {
    if count == 0 {
        return Node::zero(depth);
    }
    if depth == 0 {
        return Arc::clone(node);
    }
    let half = 1usize << (depth - 1);
    if count >= 2 * half {
        let full = uniform_subtree(node, half, depth - 1);
        return Node::pair(Arc::clone(&full), full);
    }
    let left = uniform_subtree(node, count.min(half), depth - 1);
    let right = uniform_subtree(node, count.saturating_sub(half), depth - 1);
    Node::pair(left, right)
}

impl fmt::Display for SszType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "boolean"),
            Self::Uint(w) => write!(f, "uint{}", w.size() * 8),
            Self::ByteVector(len) => write!(f, "ByteVector[{len}]"),
            Self::ByteList(limit) => write!(f, "ByteList[{limit}]"),
            Self::Bitvector(len) => write!(f, "Bitvector[{len}]"),
            Self::Bitlist(limit) => write!(f, "Bitlist[{limit}]"),
            Self::Vector { elem, len } => write!(f, "Vector[{elem}, {len}]"),
            Self::List { elem, limit } => write!(f, "List[{elem}, {limit}]"),
            Self::Container(schema) => write!(f, "{}", schema.name()),
            Self::Union(schema) => {
                write!(f, "Union[")?;
                for (i, variant) in schema.variants().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match variant {
                        Some(ty) => write!(f, "{ty}")?,
                        None => write!(f, "None")?,
                    }
                }
                write!(f, "]")
            }
        }
    }
}
