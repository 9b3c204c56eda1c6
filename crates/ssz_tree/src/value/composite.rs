//! Collection operations: containers, vectors, lists, and byte sequences.
//!
//! Composite views hand out child views wired with hooks, so mutating a
//! child, or `replace`-ing a transient packed-element view, rebinds the
//! parent automatically. Packed basic elements have no subtree of their
//! own: their views are anchored at a byte offset inside the parent's
//! chunk leaf and write through it.

use std::rc::Rc;
use std::sync::Arc;

use merkle_tree::{Gindex, Node, subtree_fill_to_contents};
use smallvec::SmallVec;
use ssz_primitives::Hash256;

use crate::decode::{packed_contents, with_length};
use crate::encode::{leaf_chunk, packed_bytes, read_length};
use crate::schema::{SszType, TypeRef};
use crate::value::{Hook, Value, propagate};
use crate::{BYTES_PER_CHUNK, Error};

/// Little-endian bytes of one basic element, truncated to its width.
type ElemBytes = SmallVec<[u8; BYTES_PER_CHUNK]>;

impl Value {
    /// Number of elements (or fields) currently held.
    ///
    /// Static for vectors, byte-vectors, bitvectors, and containers; read
    /// from the length leaf for the list kinds.
    pub fn len(&self) -> Result<usize, Error> {
        match &*self.ty {
            SszType::Vector { len, .. } => Ok(*len),
            SszType::ByteVector(len) => Ok(*len),
            SszType::Bitvector(len) => Ok(*len),
            SszType::Container(schema) => Ok(schema.fields().len()),
            SszType::List { .. } | SszType::ByteList(_) | SszType::Bitlist(_) => {
                read_length(&self.backing())
            }
            _ => Err(self.mismatch("a collection")),
        }
    }

    /// Whether the value holds no elements.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// View of the element (or field) at `index`.
    ///
    /// The returned view writes through to this value: rebinding it (via
    /// [`replace`](Value::replace) or any mutation) updates this value's
    /// backing and propagates to its own ancestors.
    pub fn get(&self, index: usize) -> Result<Value, Error> {
        let len = self.len()?;
        if index >= len {
            return Err(Error::OutOfBounds { i: index, len });
        }
        match &*self.ty {
            SszType::Container(schema) => {
                let (_, field_ty) = &schema.fields()[index];
                self.subtree_view(field_ty, index)
            }
            SszType::Vector { elem, .. } | SszType::List { elem, .. } => {
                match elem.basic_size() {
                    None => self.subtree_view(elem, index),
                    Some(size) => self.packed_view(elem, index, size),
                }
            }
            SszType::ByteVector(_) | SszType::ByteList(_) => {
                self.packed_view(&SszType::uint8(), index, 1)
            }
            SszType::Bitvector(_) | SszType::Bitlist(_) => self.bit_view(index),
            _ => Err(self.mismatch("a collection")),
        }
    }

    /// Replace the element (or field) at `index` with `value`.
    pub fn set(&self, index: usize, value: &Value) -> Result<(), Error> {
        self.get(index)?.replace(value)
    }

    /// View of the named container field.
    pub fn field(&self, name: &str) -> Result<Value, Error> {
        let SszType::Container(schema) = &*self.ty else {
            return Err(self.mismatch("a container"));
        };
        let index = schema
            .field_index(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        self.get(index)
    }

    /// Replace the named container field with `value`.
    pub fn set_field(&self, name: &str, value: &Value) -> Result<(), Error> {
        self.field(name)?.replace(value)
    }

    /// Append `value` to a list or byte-list.
    ///
    /// Rebinds the next content position and the length leaf in one step.
    pub fn append(&self, value: &Value) -> Result<(), Error> {
        match &*self.ty {
            SszType::List { elem, limit } => {
                check_elem_type(elem, value)?;
                let len = self.full_check(*limit)?;
                let content = match elem.basic_size() {
                    None => self.backing().setter(self.ty.chunk_gindex(len), value.backing())?,
                    Some(size) => {
                        self.splice_packed(len, &basic_le_bytes(value, size)?)?
                    }
                };
                self.rebind(content.setter(Gindex::RIGHT, length_leaf(len + 1))?)
            }
            SszType::ByteList(limit) => {
                check_elem_type(&SszType::uint8(), value)?;
                let len = self.full_check(*limit)?;
                let content = self.splice_packed(len, &basic_le_bytes(value, 1)?)?;
                self.rebind(content.setter(Gindex::RIGHT, length_leaf(len + 1))?)
            }
            SszType::Bitlist(_) => self.append_bit(value.as_bool()?),
            _ => Err(self.mismatch("a list")),
        }
    }

    /// Remove the last element of a list or byte-list.
    ///
    /// The vacated position is zero-filled so the root matches a value
    /// that never held the element.
    pub fn pop(&self) -> Result<(), Error> {
        match &*self.ty {
            SszType::List { elem, .. } => {
                let len = self.pop_check()?;
                let content = match elem.basic_size() {
                    None => self
                        .backing()
                        .setter(self.ty.chunk_gindex(len - 1), Node::zero(0))?,
                    Some(size) => {
                        self.splice_packed(len - 1, &ElemBytes::from_elem(0, size))?
                    }
                };
                self.rebind(content.setter(Gindex::RIGHT, length_leaf(len - 1))?)
            }
            SszType::ByteList(_) => {
                let len = self.pop_check()?;
                let content = self.splice_packed(len - 1, &ElemBytes::from_elem(0, 1))?;
                self.rebind(content.setter(Gindex::RIGHT, length_leaf(len - 1))?)
            }
            SszType::Bitlist(_) => self.pop_bit(),
            _ => Err(self.mismatch("a list")),
        }
    }

    /// The raw bytes of a byte-vector or byte-list.
    pub fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        match &*self.ty {
            SszType::ByteVector(len) => packed_bytes(&self.backing(), *len),
            SszType::ByteList(_) => {
                let len = self.len()?;
                packed_bytes(&self.backing().left()?, len)
            }
            _ => Err(self.mismatch("a byte sequence")),
        }
    }

    /// Build a vector or list from `elems`.
    pub fn from_elements(ty: &TypeRef, elems: &[Value]) -> Result<Value, Error> {
        match &**ty {
            SszType::Vector { elem, len } => {
                if elems.len() != *len {
                    return Err(Error::TypeMismatch {
                        expected: format!("{} elements for {ty}", len),
                        actual: format!("{} elements", elems.len()),
                    });
                }
                let contents = build_contents(elem, elems, ty.contents_depth())?;
                Ok(Value::new_view(Arc::clone(ty), contents, None))
            }
            SszType::List { elem, limit } => {
                if elems.len() > *limit {
                    return Err(Error::ListFull { limit: *limit });
                }
                let contents = build_contents(elem, elems, ty.contents_depth())?;
                Ok(Value::new_view(
                    Arc::clone(ty),
                    with_length(contents, elems.len()),
                    None,
                ))
            }
            _ => Err(Error::TypeMismatch {
                expected: "a vector or list type".to_string(),
                actual: ty.to_string(),
            }),
        }
    }

    /// Build a byte-vector or byte-list from `data`.
    pub fn bytes(ty: &TypeRef, data: &[u8]) -> Result<Value, Error> {
        if !matches!(&**ty, SszType::ByteVector(_) | SszType::ByteList(_)) {
            return Err(Error::TypeMismatch {
                expected: "a byte-vector or byte-list type".to_string(),
                actual: ty.to_string(),
            });
        }
        // The wire encoding of both byte kinds is the raw bytes.
        Ok(Value::decode_bytes(ty, data)?)
    }

    /// Hooked view of a composite child occupying its own subtree.
    fn subtree_view(&self, child_ty: &TypeRef, index: usize) -> Result<Value, Error> {
        let gindex = self.ty.chunk_gindex(index);
        let node = self.backing().getter(gindex)?;
        Ok(Value::new_view(
            Arc::clone(child_ty),
            node,
            Some(self.child_hook(gindex)),
        ))
    }

    /// Transient view of a basic element packed inside a chunk leaf.
    fn packed_view(&self, elem: &TypeRef, index: usize, size: usize) -> Result<Value, Error> {
        let per_chunk = BYTES_PER_CHUNK / size;
        let gindex = self.ty.chunk_gindex(index / per_chunk);
        let offset = (index % per_chunk) * size;
        let chunk = leaf_chunk(&self.backing().getter(gindex)?, gindex)?;
        let node = Node::leaf(Hash256::from_slice(&chunk.as_slice()[offset..offset + size]));
        Ok(Value::new_view(
            Arc::clone(elem),
            node,
            Some(self.packed_hook(gindex, offset, size)),
        ))
    }

    /// Hook that writes a basic element's bytes back into its chunk.
    fn packed_hook(&self, gindex: Gindex, offset: usize, size: usize) -> Hook {
        let cell = Rc::clone(&self.cell);
        Rc::new(move |child: &Arc<Node>| {
            let bytes = child.chunk().ok_or_else(|| {
                Error::InvalidBacking("basic value backing must be a chunk leaf".into())
            })?;
            let current = cell.node.borrow().clone();
            let mut chunk = leaf_chunk(&current.getter(gindex)?, gindex)?;
            chunk.as_mut()[offset..offset + size].copy_from_slice(&bytes.as_slice()[..size]);
            let updated = current.setter(gindex, Node::leaf(chunk))?;
            propagate(&cell, updated)
        })
    }

    /// Write `bytes` over element `index`'s slot in the packed content
    /// tree, returning the updated whole backing.
    fn splice_packed(&self, index: usize, bytes: &[u8]) -> Result<Arc<Node>, Error> {
        let size = bytes.len();
        let per_chunk = BYTES_PER_CHUNK / size;
        let gindex = self.ty.chunk_gindex(index / per_chunk);
        let offset = (index % per_chunk) * size;
        let backing = self.backing();
        let mut chunk = leaf_chunk(&backing.getter(gindex)?, gindex)?;
        chunk.as_mut()[offset..offset + size].copy_from_slice(bytes);
        Ok(backing.setter(gindex, Node::leaf(chunk))?)
    }

    fn full_check(&self, limit: usize) -> Result<usize, Error> {
        let len = self.len()?;
        if len == limit {
            return Err(Error::ListFull { limit });
        }
        Ok(len)
    }

    fn pop_check(&self) -> Result<usize, Error> {
        let len = self.len()?;
        if len == 0 {
            return Err(Error::OutOfBounds { i: 0, len: 0 });
        }
        Ok(len)
    }
}

fn check_elem_type(elem: &TypeRef, value: &Value) -> Result<(), Error> {
    if *elem != *value.ty() {
        return Err(Error::TypeMismatch {
            expected: elem.to_string(),
            actual: value.ty().to_string(),
        });
    }
    Ok(())
}

pub(crate) fn length_leaf(length: usize) -> Arc<Node> {
    Node::leaf(Hash256::from_u64_le(length as u64))
}

fn basic_le_bytes(value: &Value, size: usize) -> Result<ElemBytes, Error> {
    let chunk = value.backing().chunk().ok_or_else(|| {
        Error::InvalidBacking("basic value backing must be a chunk leaf".into())
    })?;
    Ok(ElemBytes::from_slice(&chunk.as_slice()[..size]))
}

fn build_contents(elem: &TypeRef, elems: &[Value], depth: u32) -> Result<Arc<Node>, Error> {
    for value in elems {
        check_elem_type(elem, value)?;
    }
    match elem.basic_size() {
        Some(size) => {
            let mut buf = Vec::with_capacity(elems.len() * size);
            for value in elems {
                buf.extend_from_slice(&basic_le_bytes(value, size)?);
            }
            Ok(packed_contents(&buf, depth))
        }
        None => Ok(subtree_fill_to_contents(
            elems.iter().map(|v| v.backing()).collect(),
            depth,
        )),
    }
}
