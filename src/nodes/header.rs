//! Common header shared by all four internal-node kinds.

use super::prefix::KeyPrefix;
use super::NodeType;

/// Fields common to every internal node, always located at offset 0 so the
/// node's kind tag is readable without knowing which concrete kind a
/// reference points at.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Header {
    /// Tag byte; duplicates the tag stashed in the owning [`super::OpaqueNodePtr`].
    node_type: NodeType,
    /// Live child count. A `u16` rather than `u8` so Node256's bracket of
    /// 49..=256 never wraps (see spec's open question on the 256-vs-0
    /// ambiguity of an 8-bit counter).
    num_children: u16,
    /// Path-compression prefix.
    pub prefix: KeyPrefix,
}

impl Header {
    /// Construct a fresh, empty header for `node_type`.
    pub fn new(node_type: NodeType) -> Self {
        Header {
            node_type,
            num_children: 0,
            prefix: KeyPrefix::default(),
        }
    }

    /// This header's node kind.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Current live child count.
    pub fn num_children(&self) -> u16 {
        self.num_children
    }

    /// Increment the live child count by one.
    pub fn inc_num_children(&mut self) {
        self.num_children += 1;
    }

    /// Decrement the live child count by one.
    ///
    /// # Panics
    /// Panics if the count is already zero.
    pub fn dec_num_children(&mut self) {
        self.num_children = self
            .num_children
            .checked_sub(1)
            .expect("child count underflow");
    }

    /// Directly set the live child count (used by cross-kind constructors).
    pub fn set_num_children(&mut self, n: u16) {
        self.num_children = n;
    }
}
