//! Shared contract implemented by the four internal-node kinds, and the
//! tagged dispatch used to invoke it without static knowledge of which kind
//! a given reference points at (spec §4.6: "Polymorphic dispatch").

pub mod node16;
pub mod node256;
pub mod node4;
pub mod node48;

use crate::alloc::TreeAllocator;
use crate::nodes::{Header, NodeType, OpaqueNodePtr};
use crate::stats::Stats;

/// Operations common to `InnerNode4`, `InnerNode16`, `InnerNode48`, and
/// `InnerNode256`.
///
/// Implemented as a tagged union dispatched through [`OpaqueNodePtr`] (one of
/// the three faithful designs spec §4.6 allows): the concrete type is
/// recovered via a `match` on the pointer's tag, then this trait's methods
/// run with full static knowledge of the layout.
pub trait InnerNode: Sized {
    /// This kind's `NodeType` discriminant.
    const TYPE: NodeType;

    /// Borrow the common header.
    fn header(&self) -> &Header;

    /// Mutably borrow the common header.
    fn header_mut(&mut self) -> &mut Header;

    /// Find the child reference for `key_byte`, if present.
    fn find_child(&self, key_byte: u8) -> Option<OpaqueNodePtr>;

    /// Insert `child` under `key_byte`.
    ///
    /// # Panics
    /// Panics (via `debug_assert!`) if the node is already full or
    /// `key_byte` is already occupied — both are caller preconditions.
    fn add_child(&mut self, key_byte: u8, child: OpaqueNodePtr);

    /// Remove and return the child under `key_byte`, if present.
    fn remove_child(&mut self, key_byte: u8) -> Option<OpaqueNodePtr>;

    /// Iterate over all `(key_byte, child)` pairs currently stored.
    ///
    /// Used only by promotion/demotion and subtree teardown, never on the
    /// point-lookup hot path, so a boxed iterator's overhead is immaterial.
    fn iter_children(&self) -> Box<dyn Iterator<Item = (u8, OpaqueNodePtr)> + '_>;

    /// Whether this node is at (or would exceed) its capacity bracket.
    fn is_full(&self) -> bool {
        self.header().num_children() as usize >= Self::TYPE.inner_capacity()
    }

    /// Whether removing one more child would underflow this node's bracket.
    fn is_min_size(&self) -> bool {
        self.header().num_children() as usize <= Self::TYPE.inner_min_size()
    }

    /// Recursively free every child subtree (but not `self`).
    fn delete_children(&self, allocator: &mut TreeAllocator, stats: &mut Stats) {
        for (_, child) in self.iter_children() {
            // SAFETY: each child is a live, uniquely-owned subtree reachable
            // only from this node, which is itself being torn down.
            unsafe { child.delete_subtree(allocator, stats) };
        }
    }
}
