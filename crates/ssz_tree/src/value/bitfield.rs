//! Bit operations on bitvectors and bitlists.
//!
//! Bits are packed little-endian within bytes, 256 to a chunk. Bit views
//! are transient boolean values with a write-through hook, the same shape
//! as packed integer elements.

use std::rc::Rc;
use std::sync::Arc;

use merkle_tree::{Gindex, Node};
use ssz_primitives::Hash256;

use crate::decode::{packed_contents, with_length};
use crate::encode::{leaf_chunk, packed_bytes};
use crate::schema::{SszType, TypeRef};
use crate::value::composite::length_leaf;
use crate::value::{Hook, Value, propagate};
use crate::{BITS_PER_CHUNK, Error};

impl Value {
    /// Read the bit at `index`.
    pub fn bit(&self, index: usize) -> Result<bool, Error> {
        self.get(index)?.as_bool()
    }

    /// Set the bit at `index`.
    pub fn set_bit(&self, index: usize, bit: bool) -> Result<(), Error> {
        self.get(index)?.replace(&Value::boolean(bit))
    }

    /// Append a bit to a bitlist.
    pub fn append_bit(&self, bit: bool) -> Result<(), Error> {
        let SszType::Bitlist(limit) = &*self.ty else {
            return Err(self.mismatch("a bitlist"));
        };
        let len = self.len()?;
        if len == *limit {
            return Err(Error::ListFull { limit: *limit });
        }
        let content = self.splice_bit(len, bit)?;
        self.rebind(content.setter(Gindex::RIGHT, length_leaf(len + 1))?)
    }

    /// Remove the last bit of a bitlist, zeroing its position.
    pub fn pop_bit(&self) -> Result<(), Error> {
        if !matches!(&*self.ty, SszType::Bitlist(_)) {
            return Err(self.mismatch("a bitlist"));
        }
        let len = self.len()?;
        if len == 0 {
            return Err(Error::OutOfBounds { i: 0, len: 0 });
        }
        let content = self.splice_bit(len - 1, false)?;
        self.rebind(content.setter(Gindex::RIGHT, length_leaf(len - 1))?)
    }

    /// All bits, lowest index first.
    pub fn as_bits(&self) -> Result<Vec<bool>, Error> {
        let len = match &*self.ty {
            SszType::Bitvector(len) => *len,
            SszType::Bitlist(_) => self.len()?,
            _ => return Err(self.mismatch("a bitfield")),
        };
        let content = if self.ty.has_length_mixin() {
            self.backing().left()?
        } else {
            self.backing()
        };
        let bytes = packed_bytes(&content, len.div_ceil(8))?;
        Ok((0..len).map(|i| bytes[i / 8] >> (i % 8) & 1 == 1).collect())
    }

    /// Build a bitvector or bitlist from `bits`.
    pub fn bits(ty: &TypeRef, bits: &[bool]) -> Result<Value, Error> {
        match &**ty {
            SszType::Bitvector(len) => {
                if bits.len() != *len {
                    return Err(Error::TypeMismatch {
                        expected: format!("{len} bits for {ty}"),
                        actual: format!("{} bits", bits.len()),
                    });
                }
                let contents = packed_contents(&pack_bits(bits), ty.contents_depth());
                Ok(Value::new_view(Arc::clone(ty), contents, None))
            }
            SszType::Bitlist(limit) => {
                if bits.len() > *limit {
                    return Err(Error::ListFull { limit: *limit });
                }
                let contents = packed_contents(&pack_bits(bits), ty.contents_depth());
                Ok(Value::new_view(
                    Arc::clone(ty),
                    with_length(contents, bits.len()),
                    None,
                ))
            }
            _ => Err(Error::TypeMismatch {
                expected: "a bitvector or bitlist type".to_string(),
                actual: ty.to_string(),
            }),
        }
    }

    /// Transient boolean view of one bit; bounds already checked.
    pub(crate) fn bit_view(&self, index: usize) -> Result<Value, Error> {
        let gindex = self.ty.chunk_gindex(index / BITS_PER_CHUNK);
        let chunk = leaf_chunk(&self.backing().getter(gindex)?, gindex)?;
        let bit_in_chunk = index % BITS_PER_CHUNK;
        let set = chunk.as_slice()[bit_in_chunk / 8] >> (bit_in_chunk % 8) & 1 == 1;
        Ok(Value::new_view(
            SszType::boolean(),
            Node::leaf(Hash256::from_u64_le(set as u64)),
            Some(self.bit_hook(gindex, bit_in_chunk)),
        ))
    }

    fn bit_hook(&self, gindex: Gindex, bit_in_chunk: usize) -> Hook {
        let cell = Rc::clone(&self.cell);
        Rc::new(move |child: &Arc<Node>| {
            let bit = child
                .chunk()
                .ok_or_else(|| {
                    Error::InvalidBacking("boolean backing must be a chunk leaf".into())
                })?
                .as_slice()[0]
                != 0;
            let current = cell.node.borrow().clone();
            let updated = current.setter(
                gindex,
                Node::leaf(written_bit(
                    leaf_chunk(&current.getter(gindex)?, gindex)?,
                    bit_in_chunk,
                    bit,
                )),
            )?;
            propagate(&cell, updated)
        })
    }

    /// Write one bit into the content tree, returning the updated whole
    /// backing.
    fn splice_bit(&self, index: usize, bit: bool) -> Result<Arc<Node>, Error> {
        let gindex = self.ty.chunk_gindex(index / BITS_PER_CHUNK);
        let backing = self.backing();
        let chunk = leaf_chunk(&backing.getter(gindex)?, gindex)?;
        let updated = written_bit(chunk, index % BITS_PER_CHUNK, bit);
        Ok(backing.setter(gindex, Node::leaf(updated))?)
    }
}

fn written_bit(mut chunk: Hash256, bit_in_chunk: usize, bit: bool) -> Hash256 {
    let mask = 1u8 << (bit_in_chunk % 8);
    if bit {
        chunk.as_mut()[bit_in_chunk / 8] |= mask;
    } else {
        chunk.as_mut()[bit_in_chunk / 8] &= !mask;
    }
    chunk
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            bytes[i / 8] |= 1 << (i % 8);
        }
    }
    bytes
}
