//! SSZ deserialization: wire bytes to backing trees.
//!
//! Decoding validates the canonical encoding (offset tables, bitfield
//! padding, boolean bytes, scopes) before constructing any nodes, then
//! builds the backing bottom-up with [`subtree_fill_to_contents`], so the
//! resulting value's root is still computed lazily on first demand.

use std::sync::Arc;

use itertools::Itertools;
use merkle_tree::{Node, subtree_fill_to_contents};
use ssz_primitives::Hash256;
use thiserror::Error;

use crate::schema::{ContainerSchema, SszType};
use crate::{BYTES_PER_CHUNK, BYTES_PER_LENGTH_OFFSET, MAX_UNION_SELECTOR};

/// Returned when SSZ bytes cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The scope does not match the type's required byte length.
    #[error("invalid byte length: got {len}, expected {expected}")]
    InvalidByteLength {
        /// Bytes given.
        len: usize,
        /// Bytes required.
        expected: usize,
    },

    /// The first offset does not point at the end of the fixed portion.
    #[error("offset {0} points into the fixed portion")]
    OffsetIntoFixedPortion(usize),

    /// An offset is smaller than its predecessor.
    #[error("offset {0} is decreasing")]
    OffsetsAreDecreasing(usize),

    /// An offset points past the end of the scope.
    #[error("offset {0} is out of bounds")]
    OffsetOutOfBounds(usize),

    /// A boolean byte other than `0x00` or `0x01`.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),

    /// A bitvector carries set bits above its declared length.
    #[error("bitfield has excess bits set above its length")]
    ExcessBits,

    /// A bitlist's final byte is zero, so its length is unrecoverable.
    #[error("bitlist is missing its delimiter bit")]
    MissingDelimiter,

    /// A list-kind value is longer than its type's limit.
    #[error("length {len} exceeds the limit {limit}")]
    LengthExceedsLimit {
        /// Decoded length.
        len: usize,
        /// Declared limit.
        limit: usize,
    },

    /// A union selector with no corresponding variant.
    #[error("union selector {0} is out of range")]
    UnionSelectorInvalid(u8),

    /// The reader failed while filling the scope.
    #[error("i/o failure during deserialization: {0}")]
    Io(String),

    /// Any other structural violation.
    #[error("invalid bytes: {0}")]
    BytesInvalid(String),
}

/// Read a 4-byte little-endian offset from the front of `bytes`.
pub fn read_offset(bytes: &[u8]) -> Result<usize, DecodeError> {
    let slice = bytes
        .get(..BYTES_PER_LENGTH_OFFSET)
        .ok_or(DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: BYTES_PER_LENGTH_OFFSET,
        })?;
    Ok(u32::from_le_bytes(
        slice.try_into().expect("slice is exactly four bytes"),
    ) as usize)
}

/// Validate one offset against its predecessor and the enclosing scope.
///
/// The first offset of a composite must land exactly at the end of the
/// fixed portion (`fixed_len`); later offsets must be monotonically
/// non-decreasing; all must stay inside the scope.
fn sanitize_offset(
    offset: usize,
    previous: Option<usize>,
    num_bytes: usize,
    fixed_len: Option<usize>,
) -> Result<usize, DecodeError> {
    if offset > num_bytes {
        return Err(DecodeError::OffsetOutOfBounds(offset));
    }
    match (previous, fixed_len) {
        (None, Some(fixed)) if offset != fixed => Err(DecodeError::OffsetIntoFixedPortion(offset)),
        (Some(prev), _) if offset < prev => Err(DecodeError::OffsetsAreDecreasing(offset)),
        _ => Ok(offset),
    }
}

/// Decode `bytes` (the value's exact scope) into a backing tree.
pub(crate) fn decode_node(ty: &SszType, bytes: &[u8]) -> Result<Arc<Node>, DecodeError> {
    match ty {
        SszType::Bool => {
            expect_scope(bytes, 1)?;
            match bytes[0] {
                0x00 | 0x01 => Ok(Node::leaf(Hash256::from_slice(bytes))),
                other => Err(DecodeError::InvalidBoolean(other)),
            }
        }
        SszType::Uint(width) => {
            expect_scope(bytes, width.size())?;
            Ok(Node::leaf(Hash256::from_slice(bytes)))
        }
        SszType::ByteVector(len) => {
            expect_scope(bytes, *len)?;
            Ok(packed_contents(bytes, ty.contents_depth()))
        }
        SszType::ByteList(limit) => {
            if bytes.len() > *limit {
                return Err(DecodeError::LengthExceedsLimit {
                    len: bytes.len(),
                    limit: *limit,
                });
            }
            Ok(with_length(
                packed_contents(bytes, ty.contents_depth()),
                bytes.len(),
            ))
        }
        SszType::Bitvector(len) => {
            expect_scope(bytes, len.div_ceil(8))?;
            if excess_bits(bytes, *len) {
                return Err(DecodeError::ExcessBits);
            }
            Ok(packed_contents(bytes, ty.contents_depth()))
        }
        SszType::Bitlist(limit) => {
            let (content, bit_len) = strip_delimiter(bytes)?;
            if bit_len > *limit {
                return Err(DecodeError::LengthExceedsLimit {
                    len: bit_len,
                    limit: *limit,
                });
            }
            Ok(with_length(
                packed_contents(&content, ty.contents_depth()),
                bit_len,
            ))
        }
        SszType::Vector { elem, len } => {
            if elem.basic_size().is_some() {
                let size = elem.basic_size().expect("checked basic");
                expect_scope(bytes, len * size)?;
                return Ok(packed_contents(bytes, ty.contents_depth()));
            }
            let elems = match elem.fixed_size() {
                // Fixed-size elements concatenate without offsets.
                Some(elem_size) => {
                    expect_scope(bytes, len * elem_size)?;
                    bytes
                        .chunks(elem_size)
                        .map(|slice| decode_node(elem, slice))
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let elems = decode_elements(bytes, elem)?;
                    if elems.len() != *len {
                        return Err(DecodeError::BytesInvalid(format!(
                            "vector of {len} elements decoded {} elements",
                            elems.len()
                        )));
                    }
                    elems
                }
            };
            Ok(subtree_fill_to_contents(elems, ty.contents_depth()))
        }
        SszType::List { elem, limit } => {
            if let Some(size) = elem.basic_size() {
                if bytes.len() % size != 0 {
                    return Err(DecodeError::InvalidByteLength {
                        len: bytes.len(),
                        expected: bytes.len() - bytes.len() % size,
                    });
                }
                let len = bytes.len() / size;
                if len > *limit {
                    return Err(DecodeError::LengthExceedsLimit { len, limit: *limit });
                }
                return Ok(with_length(
                    packed_contents(bytes, ty.contents_depth()),
                    len,
                ));
            }
            let elems = match elem.fixed_size() {
                Some(elem_size) => {
                    if bytes.len() % elem_size != 0 {
                        return Err(DecodeError::InvalidByteLength {
                            len: bytes.len(),
                            expected: bytes.len() - bytes.len() % elem_size,
                        });
                    }
                    bytes
                        .chunks(elem_size)
                        .map(|slice| decode_node(elem, slice))
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => decode_elements(bytes, elem)?,
            };
            if elems.len() > *limit {
                return Err(DecodeError::LengthExceedsLimit {
                    len: elems.len(),
                    limit: *limit,
                });
            }
            let len = elems.len();
            Ok(with_length(
                subtree_fill_to_contents(elems, ty.contents_depth()),
                len,
            ))
        }
        SszType::Container(schema) => decode_container(bytes, schema, ty.contents_depth()),
        SszType::Union(schema) => {
            let (&selector, value_bytes) =
                bytes
                    .split_first()
                    .ok_or(DecodeError::InvalidByteLength {
                        len: 0,
                        expected: 1,
                    })?;
            if selector > MAX_UNION_SELECTOR {
                return Err(DecodeError::UnionSelectorInvalid(selector));
            }
            let variant = schema
                .variant(selector)
                .ok_or(DecodeError::UnionSelectorInvalid(selector))?;
            let value = match variant {
                None => {
                    expect_scope(value_bytes, 0)?;
                    Node::zero(0)
                }
                Some(variant_ty) => decode_node(variant_ty, value_bytes)?,
            };
            Ok(Node::pair(
                value,
                Node::leaf(Hash256::from_u64_le(selector as u64)),
            ))
        }
    }
}

fn expect_scope(bytes: &[u8], expected: usize) -> Result<(), DecodeError> {
    if bytes.len() != expected {
        return Err(DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected,
        });
    }
    Ok(())
}

/// Pack raw bytes into zero-padded chunk leaves and build the content
/// subtree of the given depth.
pub(crate) fn packed_contents(bytes: &[u8], depth: u32) -> Arc<Node> {
    let leaves = bytes
        .chunks(BYTES_PER_CHUNK)
        .map(|chunk| Node::leaf(Hash256::from_slice(chunk)))
        .collect();
    subtree_fill_to_contents(leaves, depth)
}

/// Mount a content tree under a length leaf.
pub(crate) fn with_length(contents: Arc<Node>, length: usize) -> Arc<Node> {
    Node::pair(contents, Node::leaf(Hash256::from_u64_le(length as u64)))
}

/// Whether any bit at position `len` or above is set.
fn excess_bits(bytes: &[u8], len: usize) -> bool {
    let Some(&last) = bytes.last() else {
        return false;
    };
    let used = len % 8;
    used != 0 && last >> used != 0
}

/// Split a bitlist encoding into its content bytes and bit length.
fn strip_delimiter(bytes: &[u8]) -> Result<(Vec<u8>, usize), DecodeError> {
    let (&last, rest) = bytes.split_last().ok_or(DecodeError::InvalidByteLength {
        len: 0,
        expected: 1,
    })?;
    if last == 0 {
        return Err(DecodeError::MissingDelimiter);
    }
    let high_bit = 7 - last.leading_zeros() as usize;
    let bit_len = rest.len() * 8 + high_bit;
    let mut content = rest.to_vec();
    let last_content = last & !(1 << high_bit);
    // When the delimiter was the byte's only content, the final byte is
    // pure padding and is dropped.
    if high_bit != 0 || last_content != 0 {
        content.push(last_content);
    }
    content.truncate(bit_len.div_ceil(8));
    Ok((content, bit_len))
}

/// Decode a sequence of variable-size elements laid out as an offset
/// table followed by the payloads.
fn decode_elements(bytes: &[u8], elem: &SszType) -> Result<Vec<Arc<Node>>, DecodeError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let first = read_offset(bytes)?;
    if first == 0 || first % BYTES_PER_LENGTH_OFFSET != 0 {
        return Err(DecodeError::OffsetIntoFixedPortion(first));
    }
    let count = first / BYTES_PER_LENGTH_OFFSET;

    let mut offsets = Vec::with_capacity(count + 1);
    let mut previous = None;
    for i in 0..count {
        let offset = read_offset(&bytes[i * BYTES_PER_LENGTH_OFFSET..])?;
        sanitize_offset(offset, previous, bytes.len(), Some(first))?;
        offsets.push(offset);
        previous = Some(offset);
    }
    offsets.push(bytes.len());

    offsets
        .into_iter()
        .tuple_windows()
        .map(|(start, end)| decode_node(elem, &bytes[start..end]))
        .collect()
}

/// Decode a container: fixed fields and an offset table in the fixed
/// portion, variable payloads after it.
fn decode_container(
    bytes: &[u8],
    schema: &ContainerSchema,
    depth: u32,
) -> Result<Arc<Node>, DecodeError> {
    let fixed_len: usize = schema
        .fields()
        .iter()
        .map(|(_, field)| field.fixed_size().unwrap_or(BYTES_PER_LENGTH_OFFSET))
        .sum();
    let is_fixed = schema.fields().iter().all(|(_, f)| f.is_fixed_size());
    if is_fixed {
        expect_scope(bytes, fixed_len)?;
    } else if bytes.len() < fixed_len {
        return Err(DecodeError::InvalidByteLength {
            len: bytes.len(),
            expected: fixed_len,
        });
    }

    // First pass: walk the fixed portion, collecting fixed-field slices
    // and the offset table.
    enum Slot<'a> {
        Fixed(&'a [u8]),
        Variable(usize),
    }
    let mut slots = Vec::with_capacity(schema.fields().len());
    let mut offsets = Vec::new();
    let mut pos = 0;
    let mut previous = None;
    for (_, field) in schema.fields() {
        match field.fixed_size() {
            Some(size) => {
                slots.push(Slot::Fixed(&bytes[pos..pos + size]));
                pos += size;
            }
            None => {
                let offset = read_offset(&bytes[pos..])?;
                sanitize_offset(offset, previous, bytes.len(), Some(fixed_len))?;
                previous = Some(offset);
                offsets.push(offset);
                slots.push(Slot::Variable(offsets.len() - 1));
                pos += BYTES_PER_LENGTH_OFFSET;
            }
        }
    }
    offsets.push(bytes.len());

    // Second pass: decode every field in declaration order.
    let mut nodes = Vec::with_capacity(schema.fields().len());
    for ((_, field), slot) in schema.fields().iter().zip(slots) {
        let node = match slot {
            Slot::Fixed(slice) => decode_node(field, slice)?,
            Slot::Variable(i) => decode_node(field, &bytes[offsets[i]..offsets[i + 1]])?,
        };
        nodes.push(node);
    }
    Ok(subtree_fill_to_contents(nodes, depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_are_strict() {
        assert!(decode_node(&SszType::Bool, &[0x00]).is_ok());
        assert!(decode_node(&SszType::Bool, &[0x01]).is_ok());
        assert_eq!(
            decode_node(&SszType::Bool, &[0x02]).unwrap_err(),
            DecodeError::InvalidBoolean(0x02)
        );
        assert_eq!(
            decode_node(&SszType::Bool, &[]).unwrap_err(),
            DecodeError::InvalidByteLength { len: 0, expected: 1 }
        );
    }

    #[test]
    fn uint_scope_is_exact() {
        let ty = SszType::uint64();
        assert!(decode_node(&ty, &[1, 0, 0, 0, 0, 0, 0, 0]).is_ok());
        assert_eq!(
            decode_node(&ty, &[1, 0, 0]).unwrap_err(),
            DecodeError::InvalidByteLength { len: 3, expected: 8 }
        );
    }

    #[test]
    fn bitvector_rejects_excess_bits() {
        let ty = SszType::bitvector(4).unwrap();
        assert!(decode_node(&ty, &[0x03]).is_ok());
        assert_eq!(
            decode_node(&ty, &[0x13]).unwrap_err(),
            DecodeError::ExcessBits
        );
    }

    #[test]
    fn bitlist_delimiter_recovers_length() {
        // Bits [1, 0, 1] plus a delimiter at position 3.
        let (content, len) = strip_delimiter(&[0x0d]).unwrap();
        assert_eq!(len, 3);
        assert_eq!(content, vec![0x05]);

        // A delimiter alone in its byte: the byte is dropped.
        let (content, len) = strip_delimiter(&[0xaa, 0x01]).unwrap();
        assert_eq!(len, 8);
        assert_eq!(content, vec![0xaa]);

        // An empty bitlist is just the delimiter at position 0.
        let (content, len) = strip_delimiter(&[0x01]).unwrap();
        assert_eq!(len, 0);
        assert!(content.is_empty());

        assert_eq!(
            strip_delimiter(&[0xaa, 0x00]).unwrap_err(),
            DecodeError::MissingDelimiter
        );
    }

    #[test]
    fn bitlist_length_is_bounded() {
        let ty = SszType::bitlist(3);
        assert_eq!(
            decode_node(&ty, &[0x1d]).unwrap_err(),
            DecodeError::LengthExceedsLimit { len: 4, limit: 3 }
        );
    }

    #[test]
    fn list_of_basics_validates_item_granularity() {
        let ty = SszType::list(SszType::uint16(), 4);
        assert!(decode_node(&ty, &[1, 0, 2, 0]).is_ok());
        assert_eq!(
            decode_node(&ty, &[1, 0, 2]).unwrap_err(),
            DecodeError::InvalidByteLength { len: 3, expected: 2 }
        );
        assert_eq!(
            decode_node(&ty, &[0; 10]).unwrap_err(),
            DecodeError::LengthExceedsLimit { len: 5, limit: 4 }
        );
    }

    #[test]
    fn offset_table_violations_are_detected() {
        let elem = SszType::byte_list(8);
        let ty = SszType::list(elem, 4);

        // First offset must land at the end of the offset table.
        let bad_first = [0x05, 0, 0, 0, 0xaa];
        assert_eq!(
            decode_node(&ty, &bad_first).unwrap_err(),
            DecodeError::OffsetIntoFixedPortion(5)
        );

        // Decreasing second offset.
        let decreasing = [0x08, 0, 0, 0, 0x07, 0, 0, 0, 0xaa];
        assert_eq!(
            decode_node(&ty, &decreasing).unwrap_err(),
            DecodeError::OffsetsAreDecreasing(7)
        );

        // Offset past the end of the scope.
        let oob = [0x08, 0, 0, 0, 0xaa];
        assert_eq!(
            decode_node(&ty, &oob).unwrap_err(),
            DecodeError::OffsetOutOfBounds(8)
        );
    }

    #[test]
    fn fixed_composite_elements_concatenate_without_offsets() {
        let elem = SszType::byte_vector(4).unwrap();
        let ty = SszType::list(elem.clone(), 3);

        let node = decode_node(&ty, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let length = node.right().unwrap().chunk().unwrap();
        assert_eq!(length.try_to_u64_le(), Some(2));

        assert_eq!(
            decode_node(&ty, &[1, 2, 3]).unwrap_err(),
            DecodeError::InvalidByteLength { len: 3, expected: 0 }
        );

        let vec_ty = SszType::vector(elem, 2).unwrap();
        assert!(decode_node(&vec_ty, &[0; 8]).is_ok());
        assert_eq!(
            decode_node(&vec_ty, &[0; 12]).unwrap_err(),
            DecodeError::InvalidByteLength { len: 12, expected: 8 }
        );
    }

    #[test]
    fn union_selector_is_checked() {
        let schema = crate::UnionSchema::new(vec![None, Some(SszType::uint32())]).unwrap();
        let ty = SszType::union(schema);

        assert!(decode_node(&ty, &[0x01, 7, 0, 0, 0]).is_ok());
        assert!(decode_node(&ty, &[0x00]).is_ok());
        assert_eq!(
            decode_node(&ty, &[0x02, 0]).unwrap_err(),
            DecodeError::UnionSelectorInvalid(2)
        );
        // The none variant carries no payload.
        assert_eq!(
            decode_node(&ty, &[0x00, 0x00]).unwrap_err(),
            DecodeError::InvalidByteLength { len: 1, expected: 0 }
        );
    }
}
