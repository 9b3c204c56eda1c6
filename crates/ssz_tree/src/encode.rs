//! SSZ serialization: backing trees to wire bytes.
//!
//! Serialization walks the backing tree under the guidance of the type
//! descriptor. Packed sequences read their chunk leaves left to right;
//! variable composites make two passes, first the fixed portion with a
//! 4-byte offset per variable child, then the variable payloads. Output
//! streams to any [`std::io::Write`].

use std::io;
use std::sync::Arc;

use merkle_tree::{Gindex, Leaves, Node};
use ssz_primitives::Hash256;

use crate::schema::SszType;
use crate::{BYTES_PER_CHUNK, BYTES_PER_LENGTH_OFFSET, Error, MAX_UNION_SELECTOR};

/// Serialize the value backed by `node` into `writer`, returning the
/// number of bytes written.
pub(crate) fn serialize_node<W: io::Write>(
    ty: &SszType,
    node: &Arc<Node>,
    writer: &mut W,
) -> Result<usize, Error> {
    match ty {
        SszType::Bool | SszType::Uint(_) => {
            let size = ty.basic_size().expect("basic types have a size");
            let chunk = leaf_chunk(node, Gindex::ROOT)?;
            write_bytes(writer, &chunk.as_slice()[..size])
        }
        SszType::ByteVector(len) => {
            let bytes = packed_bytes(node, *len)?;
            write_bytes(writer, &bytes)
        }
        SszType::ByteList(_) => {
            let len = read_length(node)?;
            let bytes = packed_bytes(&node.left()?, len)?;
            write_bytes(writer, &bytes)
        }
        SszType::Bitvector(len) => {
            let bytes = packed_bytes(node, len.div_ceil(8))?;
            write_bytes(writer, &bytes)
        }
        SszType::Bitlist(_) => {
            let len = read_length(node)?;
            let mut bytes = packed_bytes(&node.left()?, len.div_ceil(8))?;
            // The wire encoding carries a delimiter bit just above the
            // last content bit; the chunked payload does not.
            if len % 8 == 0 {
                bytes.push(0);
            }
            let last = bytes.len() - 1;
            bytes[last] |= 1 << (len % 8);
            write_bytes(writer, &bytes)
        }
        SszType::Vector { elem, len } => match elem.basic_size() {
            Some(size) => {
                let bytes = packed_bytes(node, len * size)?;
                write_bytes(writer, &bytes)
            }
            None => {
                let children = composite_children(ty, node, *len)?;
                serialize_elements(elem, &children, writer)
            }
        },
        SszType::List { elem, .. } => match elem.basic_size() {
            Some(size) => {
                let len = read_length(node)?;
                let bytes = packed_bytes(&node.left()?, len * size)?;
                write_bytes(writer, &bytes)
            }
            None => {
                let len = read_length(node)?;
                let children = composite_children(ty, node, len)?;
                serialize_elements(elem, &children, writer)
            }
        },
        SszType::Container(schema) => {
            let children = composite_children(ty, node, schema.fields().len())?;
            let fixed_len: usize = schema
                .fields()
                .iter()
                .map(|(_, field)| field.fixed_size().unwrap_or(BYTES_PER_LENGTH_OFFSET))
                .sum();

            let mut written = 0;
            let mut offset = fixed_len;
            for ((_, field), child) in schema.fields().iter().zip(&children) {
                if field.is_fixed_size() {
                    written += serialize_node(field, child, writer)?;
                } else {
                    written += write_bytes(writer, &(offset as u32).to_le_bytes())?;
                    offset += byte_length_of(field, child)?;
                }
            }
            for ((_, field), child) in schema.fields().iter().zip(&children) {
                if !field.is_fixed_size() {
                    written += serialize_node(field, child, writer)?;
                }
            }
            Ok(written)
        }
        SszType::Union(schema) => {
            let selector = read_selector(node)?;
            let variant = schema.variant(selector).ok_or_else(|| {
                Error::InvalidBacking(format!("union backing selects unknown variant {selector}"))
            })?;
            let mut written = write_bytes(writer, &[selector])?;
            if let Some(variant_ty) = variant {
                written += serialize_node(variant_ty, &node.left()?, writer)?;
            }
            Ok(written)
        }
    }
}

/// Exact serialized length of the value backed by `node`, without
/// serializing.
pub(crate) fn byte_length_of(ty: &SszType, node: &Arc<Node>) -> Result<usize, Error> {
    if let Some(size) = ty.fixed_size() {
        return Ok(size);
    }
    match ty {
        SszType::ByteList(_) => read_length(node),
        SszType::Bitlist(_) => Ok(read_length(node)? / 8 + 1),
        SszType::List { elem, .. } => {
            let len = read_length(node)?;
            match elem.fixed_size() {
                Some(size) => Ok(len * size),
                None => {
                    let children = composite_children(ty, node, len)?;
                    let mut total = len * BYTES_PER_LENGTH_OFFSET;
                    for child in &children {
                        total += byte_length_of(elem, child)?;
                    }
                    Ok(total)
                }
            }
        }
        SszType::Vector { elem, len } => {
            // Only reachable for variable-size elements.
            let children = composite_children(ty, node, *len)?;
            let mut total = len * BYTES_PER_LENGTH_OFFSET;
            for child in &children {
                total += byte_length_of(elem, child)?;
            }
            Ok(total)
        }
        SszType::Container(schema) => {
            let children = composite_children(ty, node, schema.fields().len())?;
            let mut total = 0;
            for ((_, field), child) in schema.fields().iter().zip(&children) {
                total += match field.fixed_size() {
                    Some(size) => size,
                    None => BYTES_PER_LENGTH_OFFSET + byte_length_of(field, child)?,
                };
            }
            Ok(total)
        }
        SszType::Union(schema) => {
            let selector = read_selector(node)?;
            let variant = schema.variant(selector).ok_or_else(|| {
                Error::InvalidBacking(format!("union backing selects unknown variant {selector}"))
            })?;
            match variant {
                None => Ok(1),
                Some(variant_ty) => Ok(1 + byte_length_of(variant_ty, &node.left()?)?),
            }
        }
        _ => unreachable!("fixed-size types are handled above"),
    }
}

fn serialize_elements<W: io::Write>(
    elem: &SszType,
    children: &[Arc<Node>],
    writer: &mut W,
) -> Result<usize, Error> {
    if elem.is_fixed_size() {
        let mut written = 0;
        for child in children {
            written += serialize_node(elem, child, writer)?;
        }
        return Ok(written);
    }
    let mut written = 0;
    let mut offset = children.len() * BYTES_PER_LENGTH_OFFSET;
    for child in children {
        written += write_bytes(writer, &(offset as u32).to_le_bytes())?;
        offset += byte_length_of(elem, child)?;
    }
    for child in children {
        written += serialize_node(elem, child, writer)?;
    }
    Ok(written)
}

fn write_bytes<W: io::Write>(writer: &mut W, bytes: &[u8]) -> Result<usize, Error> {
    writer
        .write_all(bytes)
        .map_err(|e| Error::Io(e.to_string()))?;
    Ok(bytes.len())
}

/// The chunk payload of a node that must be a leaf, with tree errors
/// reported against position `at`.
pub(crate) fn leaf_chunk(node: &Arc<Node>, at: Gindex) -> Result<Hash256, Error> {
    match node.chunk() {
        Some(chunk) => Ok(chunk),
        None if node.is_leaf() => Err(merkle_tree::Error::PartialBacking { gindex: at }.into()),
        None => Err(Error::InvalidBacking(format!(
            "expected a chunk leaf at generalized index {at}"
        ))),
    }
}

/// Current length of a length-mixed backing (right child leaf).
pub(crate) fn read_length(node: &Arc<Node>) -> Result<usize, Error> {
    let chunk = leaf_chunk(&node.right()?, Gindex::RIGHT)?;
    let length = chunk
        .try_to_u64_le()
        .ok_or_else(|| Error::InvalidBacking("length leaf overflows u64".into()))?;
    Ok(length as usize)
}

/// Selector of a union backing (right child leaf, low byte).
pub(crate) fn read_selector(node: &Arc<Node>) -> Result<u8, Error> {
    let chunk = leaf_chunk(&node.right()?, Gindex::RIGHT)?;
    let selector = chunk
        .try_to_u64_le()
        .filter(|s| *s <= MAX_UNION_SELECTOR as u64)
        .ok_or_else(|| Error::InvalidBacking("selector leaf is not a valid selector".into()))?;
    Ok(selector as u8)
}

/// The first `num_bytes` bytes packed into a content subtree.
///
/// `node` must be the value backing for types without a length mix-in and
/// the content (left) subtree for types with one.
pub(crate) fn packed_bytes(node: &Arc<Node>, num_bytes: usize) -> Result<Vec<u8>, Error> {
    let chunk_count = num_bytes.div_ceil(BYTES_PER_CHUNK);
    let mut bytes = Vec::with_capacity(chunk_count * BYTES_PER_CHUNK);
    for item in Leaves::new(Arc::clone(node)).take(chunk_count) {
        let (gindex, leaf) = item?;
        bytes.extend_from_slice(leaf_chunk(&leaf, gindex)?.as_slice());
    }
    if bytes.len() < num_bytes {
        return Err(Error::InvalidBacking(format!(
            "content tree holds {} bytes, expected at least {num_bytes}",
            bytes.len()
        )));
    }
    bytes.truncate(num_bytes);
    Ok(bytes)
}

/// The children of a composite value, one backing per element or field,
/// in order.
pub(crate) fn composite_children(
    ty: &SszType,
    node: &Arc<Node>,
    count: usize,
) -> Result<Vec<Arc<Node>>, Error> {
    let mut children = Vec::with_capacity(count);
    for i in 0..count {
        children.push(node.getter(ty.chunk_gindex(i))?);
    }
    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_node;

    fn round_trip(ty: &SszType, bytes: &[u8]) {
        let node = decode_node(ty, bytes).unwrap();
        let mut out = Vec::new();
        let written = serialize_node(ty, &node, &mut out).unwrap();
        assert_eq!(out, bytes);
        assert_eq!(written, bytes.len());
        assert_eq!(byte_length_of(ty, &node).unwrap(), bytes.len());
    }

    #[test]
    fn basic_round_trips() {
        round_trip(&SszType::Bool, &[0x01]);
        round_trip(&SszType::uint64(), &[1, 0, 0, 0, 0, 0, 0, 0]);
        round_trip(&SszType::uint256(), &[0xff; 32]);
    }

    #[test]
    fn packed_sequences_round_trip() {
        round_trip(&SszType::byte_vector(5).unwrap(), &[1, 2, 3, 4, 5]);
        round_trip(&SszType::byte_list(64), &[9; 33]);
        round_trip(&SszType::bitvector(12).unwrap(), &[0xff, 0x0f]);
        round_trip(&SszType::bitlist(16), &[0xaa, 0x01]);
        round_trip(&SszType::vector(SszType::uint16(), 3).unwrap(), &[1, 0, 2, 0, 3, 0]);
        round_trip(&SszType::list(SszType::uint64(), 8), &[7, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn variable_composites_round_trip() {
        // List of byte-lists: offset table plus payloads.
        let ty = SszType::list(SszType::byte_list(8), 4);
        round_trip(&ty, &[0x08, 0, 0, 0, 0x0a, 0, 0, 0, 0xaa, 0xbb, 0xcc]);
        // Empty list.
        round_trip(&ty, &[]);
    }

    #[test]
    fn union_round_trips() {
        let schema = crate::UnionSchema::new(vec![None, Some(SszType::uint32())]).unwrap();
        let ty = SszType::union(schema);
        round_trip(&ty, &[0x01, 7, 0, 0, 0]);
        round_trip(&ty, &[0x00]);
    }

    #[test]
    fn serializing_a_summarized_content_tree_is_partial() {
        let ty = SszType::byte_vector(64).unwrap();
        let node = decode_node(&ty, &[3; 64]).unwrap();
        let collapsed = node.summarize_into(Gindex::LEFT).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            serialize_node(&ty, &collapsed, &mut out),
            Err(Error::Tree(merkle_tree::Error::PartialBacking { .. }))
        ));
    }
}
