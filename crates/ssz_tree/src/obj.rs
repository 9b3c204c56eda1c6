//! Object round-trip: values to and from a language-neutral form.
//!
//! The object form is a [`serde_json::Value`]: numbers (or decimal
//! strings) for integers, booleans for `boolean`, `0x`-prefixed hex
//! strings for byte sequences, arrays of booleans for bitfields, arrays
//! for vectors and lists, keyed objects for containers, and
//! `{"selector", "value"}` objects for unions. Containers reject unknown
//! keys.

use std::sync::Arc;

use merkle_tree::{Node, subtree_fill_to_contents};
use serde_json::Value as Json;
use ssz_primitives::{Hash256, U128, U256};

use crate::decode::decode_node;
use crate::encode::{composite_children, packed_bytes, read_length, read_selector};
use crate::schema::{SszType, TypeRef, UintTy};
use crate::value::Value;
use crate::Error;

/// Build a backing tree for `ty` from its object form.
pub(crate) fn node_from_obj(ty: &TypeRef, raw: &Json) -> Result<Arc<Node>, Error> {
    match &**ty {
        SszType::Bool => {
            let bit = raw.as_bool().ok_or_else(|| mismatch(ty, raw))?;
            Ok(Node::leaf(Hash256::from_u64_le(bit as u64)))
        }
        SszType::Uint(width) => uint_from_obj(ty, *width, raw),
        SszType::ByteVector(_) | SszType::ByteList(_) => {
            let bytes = bytes_from_obj(ty, raw)?;
            Ok(decode_node(ty, &bytes)?)
        }
        SszType::Bitvector(_) | SszType::Bitlist(_) => {
            let bits = bools_from_obj(ty, raw)?;
            Ok(Value::bits(ty, &bits)?.backing())
        }
        SszType::Vector { elem, .. } | SszType::List { elem, .. } => {
            let items = raw.as_array().ok_or_else(|| mismatch(ty, raw))?;
            let values = items
                .iter()
                .map(|item| Value::from_obj(elem, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::from_elements(ty, &values)?.backing())
        }
        SszType::Container(schema) => {
            let map = raw.as_object().ok_or_else(|| mismatch(ty, raw))?;
            for key in map.keys() {
                if schema.field_index(key).is_none() {
                    return Err(Error::UnknownField(key.clone()));
                }
            }
            let mut nodes = Vec::with_capacity(schema.fields().len());
            for (name, field_ty) in schema.fields() {
                let field_raw = map
                    .get(name)
                    .ok_or_else(|| Error::MissingField(name.clone()))?;
                nodes.push(node_from_obj(field_ty, field_raw)?);
            }
            Ok(subtree_fill_to_contents(nodes, ty.contents_depth()))
        }
        SszType::Union(schema) => {
            let map = raw.as_object().ok_or_else(|| mismatch(ty, raw))?;
            for key in map.keys() {
                if key != "selector" && key != "value" {
                    return Err(Error::UnknownField(key.clone()));
                }
            }
            let selector = map
                .get("selector")
                .and_then(Json::as_u64)
                .ok_or_else(|| mismatch(ty, raw))?;
            let selector =
                u8::try_from(selector).map_err(|_| Error::TypeMismatch {
                    expected: format!("a selector below {}", schema.variants().len()),
                    actual: format!("selector {selector}"),
                })?;
            let raw_value = map.get("value").unwrap_or(&Json::Null);
            let value = match raw_value {
                Json::Null => None,
                other => {
                    let variant_ty = schema
                        .variant(selector)
                        .flatten()
                        .ok_or_else(|| mismatch(ty, raw))?;
                    Some(Value::from_obj(variant_ty, other)?)
                }
            };
            Ok(Value::union_of(ty, selector, value.as_ref())?.backing())
        }
    }
}

/// Render the value backed by `node` into its object form.
pub(crate) fn node_to_obj(ty: &SszType, node: &Arc<Node>) -> Result<Json, Error> {
    match ty {
        SszType::Bool | SszType::Uint(_) => {
            let size = ty.basic_size().expect("basic types have a size");
            let chunk = crate::encode::leaf_chunk(node, merkle_tree::Gindex::ROOT)?;
            Ok(basic_to_obj(ty, &chunk.as_slice()[..size]))
        }
        SszType::ByteVector(len) => Ok(hex_obj(&packed_bytes(node, *len)?)),
        SszType::ByteList(_) => {
            let len = read_length(node)?;
            Ok(hex_obj(&packed_bytes(&node.left()?, len)?))
        }
        SszType::Bitvector(len) => bits_obj(&packed_bytes(node, len.div_ceil(8))?, *len),
        SszType::Bitlist(_) => {
            let len = read_length(node)?;
            bits_obj(&packed_bytes(&node.left()?, len.div_ceil(8))?, len)
        }
        SszType::Vector { elem, len } => sequence_obj(ty, elem, node, *len),
        SszType::List { elem, .. } => {
            let len = read_length(node)?;
            sequence_obj(ty, elem, node, len)
        }
        SszType::Container(schema) => {
            let children = composite_children(ty, node, schema.fields().len())?;
            let mut map = serde_json::Map::with_capacity(schema.fields().len());
            for ((name, field_ty), child) in schema.fields().iter().zip(&children) {
                map.insert(name.clone(), node_to_obj(field_ty, child)?);
            }
            Ok(Json::Object(map))
        }
        SszType::Union(schema) => {
            let selector = read_selector(node)?;
            let variant = schema.variant(selector).ok_or_else(|| {
                Error::InvalidBacking(format!("union backing selects unknown variant {selector}"))
            })?;
            let value = match variant {
                None => Json::Null,
                Some(variant_ty) => node_to_obj(variant_ty, &node.left()?)?,
            };
            Ok(serde_json::json!({ "selector": selector, "value": value }))
        }
    }
}

fn uint_from_obj(ty: &TypeRef, width: UintTy, raw: &Json) -> Result<Arc<Node>, Error> {
    let chunk = match width {
        UintTy::U128 => {
            let value: U128 = parse_uint(ty, raw)?;
            Hash256::from_u128_le(value)
        }
        UintTy::U256 => {
            let value: U256 = parse_uint(ty, raw)?;
            Hash256::from_u256_le(value)
        }
        _ => {
            let value = match raw {
                Json::Number(_) => raw.as_u64().ok_or_else(|| mismatch(ty, raw))?,
                Json::String(s) => s.parse::<u64>().map_err(|_| mismatch(ty, raw))?,
                _ => return Err(mismatch(ty, raw)),
            };
            let size = width.size();
            if size < 8 && value >> (8 * size) != 0 {
                return Err(Error::TypeMismatch {
                    expected: ty.to_string(),
                    actual: format!("out-of-range value {value}"),
                });
            }
            Hash256::from_u64_le(value)
        }
    };
    Ok(Node::leaf(chunk))
}

fn parse_uint<T: std::str::FromStr + TryFrom<u64>>(ty: &TypeRef, raw: &Json) -> Result<T, Error> {
    match raw {
        Json::Number(_) => raw
            .as_u64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| mismatch(ty, raw)),
        Json::String(s) => s.parse::<T>().map_err(|_| mismatch(ty, raw)),
        _ => Err(mismatch(ty, raw)),
    }
}

fn bytes_from_obj(ty: &TypeRef, raw: &Json) -> Result<Vec<u8>, Error> {
    match raw {
        Json::String(s) => {
            let s = s.strip_prefix("0x").unwrap_or(s);
            hex::decode(s).map_err(|_| mismatch(ty, raw))
        }
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| mismatch(ty, raw))
            })
            .collect(),
        _ => Err(mismatch(ty, raw)),
    }
}

fn bools_from_obj(ty: &TypeRef, raw: &Json) -> Result<Vec<bool>, Error> {
    raw.as_array()
        .ok_or_else(|| mismatch(ty, raw))?
        .iter()
        .map(|item| item.as_bool().ok_or_else(|| mismatch(ty, raw)))
        .collect()
}

fn basic_to_obj(ty: &SszType, le: &[u8]) -> Json {
    match ty {
        SszType::Bool => Json::Bool(le[0] != 0),
        SszType::Uint(UintTy::U128) => {
            Json::String(Hash256::from_slice(le).to_u128_le().to_string())
        }
        SszType::Uint(UintTy::U256) => {
            Json::String(Hash256::from_slice(le).to_u256_le().to_string())
        }
        _ => {
            let mut bytes = [0u8; 8];
            bytes[..le.len()].copy_from_slice(le);
            Json::from(u64::from_le_bytes(bytes))
        }
    }
}

fn sequence_obj(ty: &SszType, elem: &TypeRef, node: &Arc<Node>, len: usize) -> Result<Json, Error> {
    let mut items = Vec::with_capacity(len);
    match elem.basic_size() {
        Some(size) => {
            let content = if ty.has_length_mixin() {
                node.left()?
            } else {
                Arc::clone(node)
            };
            let bytes = packed_bytes(&content, len * size)?;
            for chunk in bytes.chunks(size) {
                items.push(basic_to_obj(elem, chunk));
            }
        }
        None => {
            for child in composite_children(ty, node, len)? {
                items.push(node_to_obj(elem, &child)?);
            }
        }
    }
    Ok(Json::Array(items))
}

fn hex_obj(bytes: &[u8]) -> Json {
    Json::String(format!("0x{}", hex::encode(bytes)))
}

fn bits_obj(bytes: &[u8], len: usize) -> Result<Json, Error> {
    Ok(Json::Array(
        (0..len)
            .map(|i| Json::Bool(bytes[i / 8] >> (i % 8) & 1 == 1))
            .collect(),
    ))
}

fn mismatch(ty: &TypeRef, raw: &Json) -> Error {
    let kind = match raw {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    };
    Error::TypeMismatch {
        expected: ty.to_string(),
        actual: kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ContainerSchema, UnionSchema};
    use serde_json::json;

    fn round_trip(ty: &TypeRef, raw: Json) {
        let value = Value::from_obj(ty, &raw).unwrap();
        assert_eq!(value.to_obj().unwrap(), raw);
        // Property 6: from_obj(to_obj(v)) == v.
        let again = Value::from_obj(ty, &value.to_obj().unwrap()).unwrap();
        assert_eq!(again, value);
    }

    #[test]
    fn scalars_round_trip() {
        round_trip(&SszType::boolean(), json!(true));
        round_trip(&SszType::uint8(), json!(200));
        round_trip(&SszType::uint64(), json!(u64::MAX));
        round_trip(&SszType::uint256(), json!("123456789012345678901234567890"));
    }

    #[test]
    fn quoted_integers_are_accepted() {
        let from_str = Value::from_obj(&SszType::uint64(), &json!("42")).unwrap();
        assert_eq!(from_str.as_u64().unwrap(), 42);
    }

    #[test]
    fn out_of_range_uints_are_rejected() {
        assert!(matches!(
            Value::from_obj(&SszType::uint8(), &json!(256)),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn sequences_round_trip() {
        round_trip(&SszType::byte_vector(3).unwrap(), json!("0x010203"));
        round_trip(&SszType::byte_list(8), json!("0xdead"));
        round_trip(&SszType::bitlist(6), json!([true, false, true]));
        round_trip(
            &SszType::vector(SszType::uint16(), 3).unwrap(),
            json!([1, 2, 3]),
        );
        round_trip(&SszType::list(SszType::uint64(), 10), json!([5, 6]));
        round_trip(
            &SszType::list(SszType::byte_list(4), 4),
            json!(["0xaa", "0x"]),
        );
    }

    #[test]
    fn byte_arrays_are_accepted_as_input() {
        let ty = SszType::byte_vector(2).unwrap();
        let value = Value::from_obj(&ty, &json!([1, 2])).unwrap();
        assert_eq!(value.as_bytes().unwrap(), vec![1, 2]);
    }

    #[test]
    fn containers_reject_unknown_and_missing_fields() {
        let schema = ContainerSchema::new(
            "Pair",
            vec![("a", SszType::uint8()), ("b", SszType::uint16())],
        )
        .unwrap();
        let ty = SszType::container(schema);

        round_trip(&ty, json!({"a": 1, "b": 2}));

        assert_eq!(
            Value::from_obj(&ty, &json!({"a": 1, "b": 2, "c": 3})).unwrap_err(),
            Error::UnknownField("c".into())
        );
        assert_eq!(
            Value::from_obj(&ty, &json!({"a": 1})).unwrap_err(),
            Error::MissingField("b".into())
        );
    }

    #[test]
    fn unions_round_trip() {
        let ty = SszType::union(
            UnionSchema::new(vec![None, Some(SszType::uint32())]).unwrap(),
        );
        round_trip(&ty, json!({"selector": 0, "value": null}));
        round_trip(&ty, json!({"selector": 1, "value": 7}));

        assert!(Value::from_obj(&ty, &json!({"selector": 2, "value": 7})).is_err());
        assert!(matches!(
            Value::from_obj(&ty, &json!({"selector": 1, "extra": 1})).unwrap_err(),
            Error::UnknownField(_)
        ));
    }
}
