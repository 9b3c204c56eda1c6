//! Union operations.
//!
//! A union backing is a pair of the selected value's backing (left) and a
//! selector leaf (right); its root is therefore the selector mix-in by
//! construction. Selector 0 is the none variant, whose value side is the
//! zero chunk.

use std::sync::Arc;

use merkle_tree::{Gindex, Node};
use ssz_primitives::Hash256;

use crate::encode::read_selector;
use crate::schema::{SszType, TypeRef};
use crate::value::Value;
use crate::Error;

impl Value {
    /// The current selector.
    pub fn selector(&self) -> Result<u8, Error> {
        if !matches!(&*self.ty, SszType::Union(_)) {
            return Err(self.mismatch("a union"));
        }
        read_selector(&self.backing())
    }

    /// View of the selected value, or `None` for the none variant.
    ///
    /// The view writes through: mutating it updates this union's backing
    /// (the selector is left as is).
    pub fn variant(&self) -> Result<Option<Value>, Error> {
        let SszType::Union(schema) = &*self.ty else {
            return Err(self.mismatch("a union"));
        };
        let selector = read_selector(&self.backing())?;
        let variant = schema.variant(selector).ok_or_else(|| {
            Error::InvalidBacking(format!("union backing selects unknown variant {selector}"))
        })?;
        match variant {
            None => Ok(None),
            Some(variant_ty) => {
                let node = self.backing().left()?;
                Ok(Some(Value::new_view(
                    Arc::clone(variant_ty),
                    node,
                    Some(self.child_hook(Gindex::LEFT)),
                )))
            }
        }
    }

    /// Switch to `selector`, installing `value` as the selected value.
    ///
    /// `value` must be `None` exactly for selector 0 and must match the
    /// variant's type otherwise. The value backing and the selector leaf
    /// are replaced together.
    pub fn select(&self, selector: u8, value: Option<&Value>) -> Result<(), Error> {
        let SszType::Union(schema) = &*self.ty else {
            return Err(self.mismatch("a union"));
        };
        let variant = schema.variant(selector).ok_or_else(|| Error::TypeMismatch {
            expected: format!("a selector below {}", schema.variants().len()),
            actual: format!("selector {selector}"),
        })?;
        let value_backing = match (variant, value) {
            (None, None) => Node::zero(0),
            (Some(variant_ty), Some(value)) => {
                if *variant_ty != *value.ty() {
                    return Err(Error::TypeMismatch {
                        expected: variant_ty.to_string(),
                        actual: value.ty().to_string(),
                    });
                }
                value.backing()
            }
            (None, Some(value)) => {
                return Err(Error::TypeMismatch {
                    expected: "no value for the none variant".to_string(),
                    actual: value.ty().to_string(),
                });
            }
            (Some(variant_ty), None) => {
                return Err(Error::TypeMismatch {
                    expected: variant_ty.to_string(),
                    actual: "no value".to_string(),
                });
            }
        };
        self.rebind(Node::pair(
            value_backing,
            Node::leaf(Hash256::from_u64_le(selector as u64)),
        ))
    }

    /// Build a union value holding the given variant.
    pub fn union_of(ty: &TypeRef, selector: u8, value: Option<&Value>) -> Result<Value, Error> {
        if !matches!(&**ty, SszType::Union(_)) {
            return Err(Error::TypeMismatch {
                expected: "a union type".to_string(),
                actual: ty.to_string(),
            });
        }
        let union = Value::default(ty);
        union.select(selector, value)?;
        Ok(union)
    }
}
