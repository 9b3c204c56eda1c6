//! Lazy tree traversals: leaf iteration and structural diff.

use std::sync::Arc;

use crate::{Error, Gindex, Node};

/// Left-to-right iterator over the leaves of a tree.
///
/// Yields `(position, node)` for every terminal node (chunk leaves and
/// root-only stubs alike) and an [`Error::PartialBacking`] item for each
/// virtual branch whose children cannot be resolved.
#[derive(Debug)]
pub struct Leaves {
    stack: Vec<(Gindex, Arc<Node>)>,
}

impl Leaves {
    /// Leaves of the tree rooted at `node`.
    pub fn new(node: Arc<Node>) -> Self {
        Self {
            stack: vec![(Gindex::ROOT, node)],
        }
    }
}

impl Iterator for Leaves {
    type Item = Result<(Gindex, Arc<Node>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (gindex, node) = self.stack.pop()?;
            if node.is_leaf() {
                return Some(Ok((gindex, node)));
            }
            match node.children() {
                Some((left, right)) => {
                    self.stack.push((gindex.child(true), right));
                    self.stack.push((gindex.child(false), left));
                }
                None => return Some(Err(Error::PartialBacking { gindex })),
            }
        }
    }
}

/// Lazy iterator over the maximal differing subtrees of two trees.
///
/// Descent stops as soon as roots agree (structural sharing shows up as
/// root equality); where they disagree and both sides still expose
/// children, the walk continues, and otherwise the differing pair is
/// yielded. An empty iteration therefore means the trees have equal
/// roots, and every yielded pair differs at its root.
#[derive(Debug)]
pub struct Diff {
    stack: Vec<(Gindex, Arc<Node>, Arc<Node>)>,
}

impl Diff {
    /// Differences between the trees rooted at `a` and `b`.
    pub fn new(a: Arc<Node>, b: Arc<Node>) -> Self {
        Self {
            stack: vec![(Gindex::ROOT, a, b)],
        }
    }
}

impl Iterator for Diff {
    type Item = (Gindex, Arc<Node>, Arc<Node>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((gindex, a, b)) = self.stack.pop() {
            if a.root() == b.root() {
                continue;
            }
            match (a.children(), b.children()) {
                (Some((al, ar)), Some((bl, br))) => {
                    self.stack.push((gindex.child(true), ar, br));
                    self.stack.push((gindex.child(false), al, bl));
                }
                _ => return Some((gindex, a, b)),
            }
        }
        None
    }
}
