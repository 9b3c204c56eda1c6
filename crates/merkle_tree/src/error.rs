//! Tree traversal errors.

use thiserror::Error;

use crate::Gindex;

/// Returned when a tree operation cannot reach the addressed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The path descends into a node that has no children.
    #[error("navigation into a leaf at generalized index {gindex}")]
    Navigation {
        /// Position of the node that could not be entered.
        gindex: Gindex,
    },

    /// The path enters a branch this backing does not carry: either a
    /// subtree summarized away to its root, or a virtual node whose
    /// resolver has no data for it.
    #[error("subtree at generalized index {gindex} is absent from this backing")]
    PartialBacking {
        /// Position of the unavailable subtree.
        gindex: Gindex,
    },
}
