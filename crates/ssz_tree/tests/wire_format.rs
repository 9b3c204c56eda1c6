//! Known-answer tests for the wire format and merkleization.
//!
//! These fix the exact bytes and roots the encoding must produce, so any
//! drift from the canonical SSZ layout shows up as a literal mismatch.

use merkle_tree::{merkleize_chunks, mix_in_length, mix_in_selector};
use ssz_tree::{
    ContainerSchema, DecodeError, Hash256, SszType, UnionSchema, Value,
};

#[test]
fn uint64_little_endian() {
    let ty = SszType::uint64();
    let bytes = [0x01, 0, 0, 0, 0, 0, 0, 0];

    let decoded = Value::decode_bytes(&ty, &bytes).unwrap();
    assert_eq!(decoded.as_u64().unwrap(), 1);
    assert_eq!(Value::uint64(1).encode_bytes().unwrap(), bytes);
}

#[test]
fn bitlist_carries_a_delimiter_on_the_wire() {
    let ty = SszType::bitlist(8);
    let value = Value::bits(&ty, &[true, false, true]).unwrap();
    assert_eq!(value.encode_bytes().unwrap(), vec![0x0d]);

    let decoded = Value::decode_bytes(&ty, &[0x0d]).unwrap();
    assert_eq!(decoded.len().unwrap(), 3);
    assert_eq!(decoded.as_bits().unwrap(), vec![true, false, true]);

    // The delimiter is not part of the chunked payload: the content chunk
    // holds only the three content bits.
    let mut chunk = [0u8; 32];
    chunk[0] = 0x05;
    assert_eq!(
        value.hash_tree_root(),
        mix_in_length(Hash256::from(chunk), 3)
    );
}

#[test]
fn empty_bitlist_is_a_lone_delimiter() {
    let ty = SszType::bitlist(8);
    let value = Value::default(&ty);
    assert_eq!(value.encode_bytes().unwrap(), vec![0x01]);
    assert_eq!(
        Value::decode_bytes(&ty, &[0x01]).unwrap().len().unwrap(),
        0
    );
}

#[test]
fn bitvector_trailing_bits_must_be_zero() {
    let ty = SszType::bitvector(4).unwrap();
    let value = Value::bits(&ty, &[true, true, false, false]).unwrap();
    assert_eq!(value.encode_bytes().unwrap(), vec![0x03]);

    assert_eq!(
        Value::decode_bytes(&ty, &[0x13]).unwrap_err(),
        DecodeError::ExcessBits
    );
}

#[test]
fn u16_list_bytes_and_root() {
    let ty = SszType::list(SszType::uint16(), 4);
    let value = Value::from_elements(&ty, &[Value::uint16(1), Value::uint16(2)]).unwrap();

    assert_eq!(value.encode_bytes().unwrap(), vec![0x01, 0x00, 0x02, 0x00]);

    // Chunk limit is ceil(4 * 2 / 32) = 1, so the content root is the one
    // packed chunk; the value root mixes in the length.
    let mut chunk = [0u8; 32];
    chunk[0] = 0x01;
    chunk[2] = 0x02;
    let content_root = merkleize_chunks(&[Hash256::from(chunk)], 1);
    assert_eq!(value.hash_tree_root(), mix_in_length(content_root, 2));
}

#[test]
fn container_with_variable_field_uses_offsets() {
    let schema = ContainerSchema::new(
        "Outer",
        vec![("a", SszType::uint8()), ("b", SszType::list(SszType::uint8(), 4))],
    )
    .unwrap();
    let ty = SszType::container(schema);

    let value = Value::default(&ty);
    value.set_field("a", &Value::uint8(1)).unwrap();
    let b = value.field("b").unwrap();
    b.append(&Value::uint8(2)).unwrap();
    b.append(&Value::uint8(3)).unwrap();

    // Fixed byte for `a`, a 4-byte offset pointing past the fixed
    // portion (5 bytes), then `b`'s payload.
    assert_eq!(
        value.encode_bytes().unwrap(),
        vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x02, 0x03]
    );

    let decoded = Value::decode_bytes(&ty, &value.encode_bytes().unwrap()).unwrap();
    assert_eq!(decoded.hash_tree_root(), value.hash_tree_root());
}

#[test]
fn union_bytes_and_root() {
    let ty = SszType::union(UnionSchema::new(vec![None, Some(SszType::uint32())]).unwrap());
    let value = Value::union_of(&ty, 1, Some(&Value::uint32(7))).unwrap();

    assert_eq!(value.encode_bytes().unwrap(), vec![0x01, 0x07, 0, 0, 0]);
    assert_eq!(
        value.hash_tree_root(),
        mix_in_selector(Hash256::from_u64_le(7), 1)
    );

    let none = Value::default(&ty);
    assert_eq!(none.encode_bytes().unwrap(), vec![0x00]);
    assert_eq!(
        none.hash_tree_root(),
        mix_in_selector(Hash256::ZERO, 0)
    );
}

#[test]
fn fixed_composites_concatenate() {
    let ty = SszType::vector(SszType::uint16(), 3).unwrap();
    let value = Value::from_elements(
        &ty,
        &[Value::uint16(1), Value::uint16(2), Value::uint16(3)],
    )
    .unwrap();
    assert_eq!(value.encode_bytes().unwrap(), vec![1, 0, 2, 0, 3, 0]);

    let bytes_ty = SszType::byte_vector(4).unwrap();
    let bytes = Value::bytes(&bytes_ty, &[9, 8, 7, 6]).unwrap();
    assert_eq!(bytes.encode_bytes().unwrap(), vec![9, 8, 7, 6]);
    // A byte-vector shorter than a chunk roots as its padded chunk.
    let mut chunk = [0u8; 32];
    chunk[..4].copy_from_slice(&[9, 8, 7, 6]);
    assert_eq!(bytes.hash_tree_root(), Hash256::from(chunk));
}

#[test]
fn fixed_size_values_reject_wrong_scopes() {
    let ty = SszType::byte_vector(4).unwrap();
    assert_eq!(
        Value::decode_bytes(&ty, &[1, 2, 3]).unwrap_err(),
        DecodeError::InvalidByteLength { len: 3, expected: 4 }
    );

    let vec_ty = SszType::vector(SszType::uint32(), 2).unwrap();
    assert_eq!(
        Value::decode_bytes(&vec_ty, &[0; 9]).unwrap_err(),
        DecodeError::InvalidByteLength { len: 9, expected: 8 }
    );
}

#[test]
fn list_roots_depend_on_length_not_just_content() {
    // Same (zero) content, different lengths: the mixed-in length must
    // separate the roots.
    let ty = SszType::list(SszType::uint8(), 8);
    let empty = Value::default(&ty);
    let one_zero = Value::from_elements(&ty, &[Value::uint8(0)]).unwrap();
    assert_ne!(empty.hash_tree_root(), one_zero.hash_tree_root());
}

#[test]
fn nested_variable_composites() {
    // List of byte-lists, mixed lengths, including an empty element.
    let ty = SszType::list(SszType::byte_list(8), 4);
    let inner_ty = SszType::byte_list(8);
    let value = Value::default(&ty);
    value
        .append(&Value::bytes(&inner_ty, &[0xaa, 0xbb]).unwrap())
        .unwrap();
    value.append(&Value::bytes(&inner_ty, &[]).unwrap()).unwrap();
    value
        .append(&Value::bytes(&inner_ty, &[0xcc]).unwrap())
        .unwrap();

    // Three offsets (12 bytes), then the payloads.
    assert_eq!(
        value.encode_bytes().unwrap(),
        vec![
            0x0c, 0, 0, 0, // offset 0 = 12
            0x0e, 0, 0, 0, // offset 1 = 14
            0x0e, 0, 0, 0, // offset 2 = 14 (empty element)
            0xaa, 0xbb, 0xcc,
        ]
    );

    let decoded = Value::decode_bytes(&ty, &value.encode_bytes().unwrap()).unwrap();
    assert_eq!(decoded.hash_tree_root(), value.hash_tree_root());
    assert_eq!(
        decoded.get(0).unwrap().as_bytes().unwrap(),
        vec![0xaa, 0xbb]
    );
    assert_eq!(decoded.get(1).unwrap().as_bytes().unwrap(), Vec::<u8>::new());
}
