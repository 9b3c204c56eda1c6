//! Typed views over backing trees.
//!
//! A [`Value`] pairs a [`TypeRef`] with a shared cell holding the current
//! backing node and an optional *hook*. Mutation never changes a node:
//! the view computes a new backing, swaps its cell over to it, and invokes
//! the hook. Hooks installed by parent views capture the child's
//! generalized index and rebind the parent in turn, so a single mutation
//! anywhere updates every ancestor's root.
//!
//! Views are deliberately single-threaded (`Rc`/`RefCell`); the backing
//! trees themselves are `Send + Sync` and may be shared across threads.

mod bitfield;
mod composite;
mod union;

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use merkle_tree::{Gindex, Node};
use ssz_primitives::{Hash256, U128, U256};

use crate::encode::{byte_length_of, leaf_chunk, serialize_node};
use crate::schema::{SszType, TypeRef, UintTy};
use crate::{DecodeError, Error, decode, obj};

/// Callback invoked with a view's new backing after every rebind.
pub(crate) type Hook = Rc<dyn Fn(&Arc<Node>) -> Result<(), Error>>;

/// Shared state of a view: the current backing and the upward hook.
pub(crate) struct ViewCell {
    node: RefCell<Arc<Node>>,
    hook: RefCell<Option<Hook>>,
}

/// Swap `cell` over to `updated` and propagate through its hook.
pub(crate) fn propagate(cell: &Rc<ViewCell>, updated: Arc<Node>) -> Result<(), Error> {
    *cell.node.borrow_mut() = Arc::clone(&updated);
    let hook = cell.hook.borrow().clone();
    if let Some(hook) = hook {
        hook(&updated)?;
    }
    Ok(())
}

/// A typed, mutable view over a backing tree.
///
/// Cloning a `Value` yields an alias of the same view (both observe the
/// same backing cell); use [`snapshot`](Self::snapshot) for an
/// independent view of the current backing.
#[derive(Clone)]
pub struct Value {
    ty: TypeRef,
    cell: Rc<ViewCell>,
}

impl Value {
    pub(crate) fn new_view(ty: TypeRef, node: Arc<Node>, hook: Option<Hook>) -> Self {
        Self {
            ty,
            cell: Rc::new(ViewCell {
                node: RefCell::new(node),
                hook: RefCell::new(hook),
            }),
        }
    }

    /// The type's default (all-zero) value.
    pub fn default(ty: &TypeRef) -> Self {
        Self::new_view(Arc::clone(ty), ty.default_backing(), None)
    }

    /// View an existing backing tree as a value of type `ty`.
    ///
    /// The backing is trusted to have the type's shape; this is how
    /// partial trees (summaries, proofs) are wrapped. Reads that meet a
    /// shape mismatch report `InvalidBacking`; absent subtrees report the
    /// partial-backing error.
    pub fn from_backing(ty: &TypeRef, backing: Arc<Node>) -> Self {
        Self::new_view(Arc::clone(ty), backing, None)
    }

    /// The view's type descriptor.
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    /// The current backing node.
    pub fn backing(&self) -> Arc<Node> {
        self.cell.node.borrow().clone()
    }

    /// The value's 32-byte hash-tree-root.
    pub fn hash_tree_root(&self) -> Hash256 {
        self.backing().root()
    }

    /// An independent view of the current backing.
    ///
    /// The snapshot shares the backing tree structurally but has no hook:
    /// later mutations of either view leave the other untouched.
    pub fn snapshot(&self) -> Self {
        Self::new_view(Arc::clone(&self.ty), self.backing(), None)
    }

    /// Rebind this view to `other`'s backing.
    ///
    /// The types must be equal. Through the hook chain this writes the
    /// new value into every ancestor, which makes `replace` the
    /// write-through primitive for views handed out by `get`/`field`,
    /// including transient views of basic elements packed inside a chunk.
    pub fn replace(&self, other: &Value) -> Result<(), Error> {
        if self.ty != other.ty {
            return Err(Error::TypeMismatch {
                expected: self.ty.to_string(),
                actual: other.ty.to_string(),
            });
        }
        self.rebind(other.backing())
    }

    /// Install `new` as this view's backing and propagate upward.
    pub(crate) fn rebind(&self, new: Arc<Node>) -> Result<(), Error> {
        propagate(&self.cell, new)
    }

    /// Hook for a child view anchored at `gindex`: rebinding the child
    /// rebinds this view's backing at that position.
    pub(crate) fn child_hook(&self, gindex: Gindex) -> Hook {
        let cell = Rc::clone(&self.cell);
        Rc::new(move |child: &Arc<Node>| {
            let current = cell.node.borrow().clone();
            let updated = current.setter(gindex, Arc::clone(child))?;
            propagate(&cell, updated)
        })
    }

    /// Record every backing this view holds from now on.
    ///
    /// Intended for root-level views: the handle starts with the current
    /// backing and appends one entry per rebind. Any hook already
    /// installed keeps firing after the recorder.
    pub fn record_history(&self) -> History {
        let history = History {
            records: Rc::new(RefCell::new(vec![self.backing()])),
        };
        let records = Rc::clone(&history.records);
        let previous = self.cell.hook.borrow_mut().take();
        let hook: Hook = Rc::new(move |node: &Arc<Node>| {
            records.borrow_mut().push(Arc::clone(node));
            if let Some(previous) = &previous {
                previous(node)?;
            }
            Ok(())
        });
        *self.cell.hook.borrow_mut() = Some(hook);
        history
    }

    /// Decode an SSZ byte string into a value of type `ty`.
    ///
    /// `bytes` is the value's exact scope.
    pub fn decode_bytes(ty: &TypeRef, bytes: &[u8]) -> Result<Self, DecodeError> {
        let node = decode::decode_node(ty, bytes)?;
        Ok(Self::new_view(Arc::clone(ty), node, None))
    }

    /// Read exactly `scope` bytes from `reader` and decode them as `ty`.
    pub fn deserialize<R: io::Read>(
        ty: &TypeRef,
        reader: &mut R,
        scope: usize,
    ) -> Result<Self, DecodeError> {
        let mut bytes = vec![0u8; scope];
        reader
            .read_exact(&mut bytes)
            .map_err(|e| DecodeError::Io(e.to_string()))?;
        Self::decode_bytes(ty, &bytes)
    }

    /// The canonical SSZ encoding.
    pub fn encode_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::with_capacity(self.ty.min_byte_length());
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Stream the canonical SSZ encoding into `writer`; returns the byte
    /// count.
    pub fn serialize<W: io::Write>(&self, writer: &mut W) -> Result<usize, Error> {
        serialize_node(&self.ty, &self.backing(), writer)
    }

    /// Exact encoded length, computed without serializing.
    pub fn byte_length(&self) -> Result<usize, Error> {
        byte_length_of(&self.ty, &self.backing())
    }

    /// Build a value of type `ty` from its language-neutral object form.
    pub fn from_obj(ty: &TypeRef, raw: &serde_json::Value) -> Result<Self, Error> {
        let node = obj::node_from_obj(ty, raw)?;
        Ok(Self::new_view(Arc::clone(ty), node, None))
    }

    /// The value's language-neutral object form.
    pub fn to_obj(&self) -> Result<serde_json::Value, Error> {
        obj::node_to_obj(&self.ty, &self.backing())
    }

    /// `boolean` value.
    pub fn boolean(value: bool) -> Self {
        Self::basic(SszType::boolean(), Hash256::from_u64_le(value as u64))
    }

    /// `uint8` value.
    pub fn uint8(value: u8) -> Self {
        Self::basic(SszType::uint8(), Hash256::from_u64_le(value as u64))
    }

    /// `uint16` value.
    pub fn uint16(value: u16) -> Self {
        Self::basic(SszType::uint16(), Hash256::from_u64_le(value as u64))
    }

    /// `uint32` value.
    pub fn uint32(value: u32) -> Self {
        Self::basic(SszType::uint32(), Hash256::from_u64_le(value as u64))
    }

    /// `uint64` value.
    pub fn uint64(value: u64) -> Self {
        Self::basic(SszType::uint64(), Hash256::from_u64_le(value))
    }

    /// `uint128` value.
    pub fn uint128(value: U128) -> Self {
        Self::basic(SszType::uint128(), Hash256::from_u128_le(value))
    }

    /// `uint256` value.
    pub fn uint256(value: U256) -> Self {
        Self::basic(SszType::uint256(), Hash256::from_u256_le(value))
    }

    fn basic(ty: TypeRef, chunk: Hash256) -> Self {
        Self::new_view(ty, Node::leaf(chunk), None)
    }

    /// Read a boolean value.
    pub fn as_bool(&self) -> Result<bool, Error> {
        if !matches!(&*self.ty, SszType::Bool) {
            return Err(self.mismatch("boolean"));
        }
        Ok(self.chunk()?.as_slice()[0] != 0)
    }

    /// Read an unsigned integer of up to 64 bits.
    pub fn as_u64(&self) -> Result<u64, Error> {
        let size = match &*self.ty {
            SszType::Uint(width) if width.size() <= 8 => width.size(),
            _ => return Err(self.mismatch("uint8 through uint64")),
        };
        let chunk = self.chunk()?;
        let mut le = [0u8; 8];
        le[..size].copy_from_slice(&chunk.as_slice()[..size]);
        Ok(u64::from_le_bytes(le))
    }

    /// Read a `uint128` value.
    pub fn as_u128(&self) -> Result<U128, Error> {
        if !matches!(&*self.ty, SszType::Uint(UintTy::U128)) {
            return Err(self.mismatch("uint128"));
        }
        Ok(self.chunk()?.to_u128_le())
    }

    /// Read a `uint256` value.
    pub fn as_u256(&self) -> Result<U256, Error> {
        if !matches!(&*self.ty, SszType::Uint(UintTy::U256)) {
            return Err(self.mismatch("uint256"));
        }
        Ok(self.chunk()?.to_u256_le())
    }

    fn chunk(&self) -> Result<Hash256, Error> {
        leaf_chunk(&self.backing(), Gindex::ROOT)
    }

    pub(crate) fn mismatch(&self, expected: &str) -> Error {
        Error::TypeMismatch {
            expected: expected.to_string(),
            actual: self.ty.to_string(),
        }
    }
}

impl PartialEq for Value {
    /// Equal types and equal roots; the latter implies structural
    /// equality of the values.
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.hash_tree_root() == other.hash_tree_root()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("ty", &self.ty.to_string())
            .field("root", &self.hash_tree_root())
            .finish()
    }
}

/// The backings a view has held, recorded by
/// [`Value::record_history`].
#[derive(Debug, Clone)]
pub struct History {
    records: Rc<RefCell<Vec<Arc<Node>>>>,
}

impl History {
    /// Every recorded backing, oldest first (the first entry is the
    /// backing at recording time).
    pub fn snapshots(&self) -> Vec<Arc<Node>> {
        self.records.borrow().clone()
    }

    /// Number of recorded backings.
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}
