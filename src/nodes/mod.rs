//! Node representations and the tagged reference that ties them together.

pub mod header;
pub mod inner;
pub mod leaf;
pub mod prefix;

use std::ptr::NonNull;

use crate::alloc::{node_size, TreeAllocator};
use crate::stats::Stats;
use crate::tagged_pointer::TaggedPointer;

pub use header::Header;
pub use inner::node16::InnerNode16;
pub use inner::node256::InnerNode256;
pub use inner::node4::InnerNode4;
pub use inner::node48::InnerNode48;
pub use inner::InnerNode;
pub use prefix::{KeyPrefix, MAX_PREFIX_LEN};

/// Discriminant identifying the kind of node a reference points to.
///
/// Stored both in the low bits of every [`OpaqueNodePtr`] (for dispatch
/// without touching memory) and as the first byte of every node's
/// [`Header`] (so the tag is recoverable even if the reference itself is
/// examined purely as bytes).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Variable-size leaf holding a key and value.
    Leaf = 0,
    /// 2-4 children, parallel sorted arrays.
    Node4 = 1,
    /// 5-16 children, parallel sorted arrays (SIMD-searchable).
    Node16 = 2,
    /// 17-48 children, 256-byte index + compact child array.
    Node48 = 3,
    /// 49-256 children, direct 256-wide child array.
    Node256 = 4,
}

impl NodeType {
    /// Recover a `NodeType` from its raw discriminant.
    ///
    /// # Panics
    /// Panics if `raw` is not a valid discriminant. Reaching this indicates
    /// memory corruption or a bug in this crate.
    pub fn from_u8(raw: u8) -> NodeType {
        match raw {
            0 => NodeType::Leaf,
            1 => NodeType::Node4,
            2 => NodeType::Node16,
            3 => NodeType::Node48,
            4 => NodeType::Node256,
            _ => unreachable!("invalid node type tag {raw}"),
        }
    }

    /// All four internal-node kinds, smallest to largest.
    pub const INNER_KINDS: [NodeType; 4] = [
        NodeType::Node4,
        NodeType::Node16,
        NodeType::Node48,
        NodeType::Node256,
    ];

    /// Index of this kind into a 4-element per-internal-kind counter array.
    ///
    /// # Panics
    /// Panics if called on [`NodeType::Leaf`].
    pub fn inner_index(self) -> usize {
        match self {
            NodeType::Node4 => 0,
            NodeType::Node16 => 1,
            NodeType::Node48 => 2,
            NodeType::Node256 => 3,
            NodeType::Leaf => unreachable!("leaf has no inner-node index"),
        }
    }

    /// Index of this kind into a 5-element per-kind counter array.
    pub fn node_index(self) -> usize {
        self as usize
    }
}

/// A reference to any node (leaf or internal), tagged with its kind.
///
/// Either null-free (there is no "null" state; absence is represented by
/// `Option<OpaqueNodePtr>` at the slot level) or pointing at a live,
/// uniquely-owned node.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct OpaqueNodePtr(TaggedPointer<()>);

impl std::fmt::Debug for OpaqueNodePtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueNodePtr")
            .field("node_type", &self.node_type())
            .finish()
    }
}

impl OpaqueNodePtr {
    /// Wrap a typed, tagged pointer as an opaque one.
    pub fn new(ptr: NonNull<u8>, tag: NodeType) -> Self {
        OpaqueNodePtr(TaggedPointer::new(ptr.cast(), tag))
    }

    /// Wrap an owning pointer to a concrete internal-node kind.
    pub fn from_inner<T: InnerNode>(ptr: NonNull<T>) -> Self {
        OpaqueNodePtr::new(ptr.cast(), T::TYPE)
    }

    /// The kind of node this reference points to, read from the pointer's
    /// tag bits (no memory access required).
    pub fn node_type(self) -> NodeType {
        self.0.tag()
    }

    /// The untagged byte pointer to the node's storage.
    pub fn untagged(self) -> NonNull<u8> {
        self.0.untagged_ptr().cast()
    }

    /// Reinterpret as a leaf pointer.
    ///
    /// # Safety
    /// Caller must ensure `self.node_type() == NodeType::Leaf`.
    pub unsafe fn as_leaf(self) -> leaf::LeafPtr {
        debug_assert_eq!(self.node_type(), NodeType::Leaf);
        leaf::LeafPtr::from_raw(self.untagged())
    }

    /// Borrow the common header of an internal node.
    ///
    /// # Safety
    /// Caller must ensure `self.node_type()` is an internal kind.
    pub unsafe fn header<'a>(self) -> &'a Header {
        debug_assert_ne!(self.node_type(), NodeType::Leaf);
        unsafe { self.untagged().cast::<Header>().as_ref() }
    }

    /// Find the child for `key_byte`, dispatching on node kind.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node.
    pub unsafe fn find_child(self, key_byte: u8) -> Option<OpaqueNodePtr> {
        match self.node_type() {
            NodeType::Node4 => unsafe { self.untagged().cast::<InnerNode4>().as_ref() }
                .find_child(key_byte),
            NodeType::Node16 => unsafe { self.untagged().cast::<InnerNode16>().as_ref() }
                .find_child(key_byte),
            NodeType::Node48 => unsafe { self.untagged().cast::<InnerNode48>().as_ref() }
                .find_child(key_byte),
            NodeType::Node256 => unsafe { self.untagged().cast::<InnerNode256>().as_ref() }
                .find_child(key_byte),
            NodeType::Leaf => unreachable!("find_child called on a leaf"),
        }
    }

    /// Borrow the key prefix of an internal node.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node.
    pub unsafe fn prefix<'a>(self) -> &'a KeyPrefix {
        unsafe { &self.header().prefix }
    }

    /// Mutably borrow the key prefix of an internal node.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node.
    pub unsafe fn prefix_mut<'a>(self) -> &'a mut KeyPrefix {
        unsafe { &mut self.untagged().cast::<Header>().as_mut().prefix }
    }

    /// Raw pointer to the slot holding the child for `key_byte`, if present.
    ///
    /// Used by the tree walk to advance its "slot to overwrite" cursor
    /// without a separate parent-pointer structure.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node and that the returned
    /// pointer is not used once `self`'s storage is freed or reallocated.
    pub unsafe fn child_slot_mut(self, key_byte: u8) -> Option<*mut Option<OpaqueNodePtr>> {
        match self.node_type() {
            NodeType::Node4 => unsafe { self.untagged().cast::<InnerNode4>().as_mut() }
                .child_slot_mut(key_byte),
            NodeType::Node16 => unsafe { self.untagged().cast::<InnerNode16>().as_mut() }
                .child_slot_mut(key_byte),
            NodeType::Node48 => unsafe { self.untagged().cast::<InnerNode48>().as_mut() }
                .child_slot_mut(key_byte),
            NodeType::Node256 => unsafe { self.untagged().cast::<InnerNode256>().as_mut() }
                .child_slot_mut(key_byte),
            NodeType::Leaf => unreachable!("child_slot_mut called on a leaf"),
        }
    }

    /// Insert `child` under `key_byte`.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node, is not full, and that
    /// `key_byte` is not already occupied.
    pub unsafe fn add_child(self, key_byte: u8, child: OpaqueNodePtr) {
        match self.node_type() {
            NodeType::Node4 => {
                unsafe { self.untagged().cast::<InnerNode4>().as_mut() }.add_child(key_byte, child)
            }
            NodeType::Node16 => unsafe { self.untagged().cast::<InnerNode16>().as_mut() }
                .add_child(key_byte, child),
            NodeType::Node48 => unsafe { self.untagged().cast::<InnerNode48>().as_mut() }
                .add_child(key_byte, child),
            NodeType::Node256 => unsafe { self.untagged().cast::<InnerNode256>().as_mut() }
                .add_child(key_byte, child),
            NodeType::Leaf => unreachable!("add_child called on a leaf"),
        }
    }

    /// Remove and return the child for `key_byte`, if present.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node.
    pub unsafe fn remove_child(self, key_byte: u8) -> Option<OpaqueNodePtr> {
        match self.node_type() {
            NodeType::Node4 => {
                unsafe { self.untagged().cast::<InnerNode4>().as_mut() }.remove_child(key_byte)
            }
            NodeType::Node16 => {
                unsafe { self.untagged().cast::<InnerNode16>().as_mut() }.remove_child(key_byte)
            }
            NodeType::Node48 => {
                unsafe { self.untagged().cast::<InnerNode48>().as_mut() }.remove_child(key_byte)
            }
            NodeType::Node256 => {
                unsafe { self.untagged().cast::<InnerNode256>().as_mut() }.remove_child(key_byte)
            }
            NodeType::Leaf => unreachable!("remove_child called on a leaf"),
        }
    }

    /// Whether this internal node is at (or would exceed) its capacity.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node.
    pub unsafe fn is_full(self) -> bool {
        unsafe { self.header() }.num_children() as usize
            >= self.node_type().inner_capacity()
    }

    /// Whether this internal node is at its minimum bracket size.
    ///
    /// # Safety
    /// Caller must ensure `self` is an internal node.
    pub unsafe fn is_min_size(self) -> bool {
        unsafe { self.header() }.num_children() as usize
            <= self.node_type().inner_min_size()
    }

    /// Recursively free this node and, if internal, all of its children and
    /// pool/heap allocations, updating `stats`/`allocator` accounting.
    ///
    /// # Safety
    /// `self` must be a live, uniquely-owned node reference not otherwise
    /// accessed afterwards.
    pub unsafe fn delete_subtree(self, allocator: &mut TreeAllocator, stats: &mut Stats) {
        match self.node_type() {
            NodeType::Leaf => unsafe {
                let leaf = self.as_leaf();
                allocator.release(leaf.size());
                stats.dec_node_count(NodeType::Leaf);
                leaf.dealloc();
            },
            NodeType::Node4 => unsafe {
                self.untagged().cast::<InnerNode4>().as_ref().delete_children(allocator, stats);
                allocator.free_inner::<InnerNode4>(self.untagged().cast());
                allocator.release(node_size::<InnerNode4>());
            },
            NodeType::Node16 => unsafe {
                self.untagged().cast::<InnerNode16>().as_ref().delete_children(allocator, stats);
                allocator.free_inner::<InnerNode16>(self.untagged().cast());
                allocator.release(node_size::<InnerNode16>());
            },
            NodeType::Node48 => unsafe {
                self.untagged().cast::<InnerNode48>().as_ref().delete_children(allocator, stats);
                allocator.free_inner::<InnerNode48>(self.untagged().cast());
                allocator.release(node_size::<InnerNode48>());
            },
            NodeType::Node256 => unsafe {
                self.untagged().cast::<InnerNode256>().as_ref().delete_children(allocator, stats);
                allocator.free_inner::<InnerNode256>(self.untagged().cast());
                allocator.release(node_size::<InnerNode256>());
            },
        }
        if self.node_type() != NodeType::Leaf {
            stats.dec_node_count(self.node_type());
        }
    }
}

impl NodeType {
    /// Upper bound on child count for internal-node kinds.
    pub fn inner_capacity(self) -> usize {
        match self {
            NodeType::Node4 => 4,
            NodeType::Node16 => 16,
            NodeType::Node48 => 48,
            NodeType::Node256 => 256,
            NodeType::Leaf => 0,
        }
    }

    /// Lower bound on child count for internal-node kinds.
    pub fn inner_min_size(self) -> usize {
        match self {
            NodeType::Node4 => 2,
            NodeType::Node16 => 5,
            NodeType::Node48 => 17,
            NodeType::Node256 => 49,
            NodeType::Leaf => 0,
        }
    }
}
