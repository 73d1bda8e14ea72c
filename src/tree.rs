//! The public `Tree` type and its search/insert/remove/teardown algorithms.
//!
//! Mirrors `unodb::db`'s top-level shape (`original_source/art.hpp`): a
//! single owned root reference, a node allocator, and a statistics block,
//! with `get`/`insert`/`remove` walking the tree iteratively rather than
//! recursively so there is no call-stack depth tied to key length.

use crate::alloc::{node_size, TreeAllocator};
use crate::error::{InsertError, MAX_VALUE_LEN};
use crate::key::ArtKey;
use crate::nodes::leaf::{self, LeafPtr};
use crate::nodes::{
    InnerNode, InnerNode16, InnerNode256, InnerNode4, InnerNode48, KeyPrefix, NodeType, OpaqueNodePtr,
};
use crate::stats::Stats;

/// Tunables for a [`Tree`].
#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    /// Hard cap, in bytes, on [`Tree::current_memory_use`]. `0` means
    /// unlimited (spec §4.7).
    pub memory_limit: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig { memory_limit: 0 }
    }
}

/// A single-threaded adaptive radix tree mapping `u64` keys to opaque byte
/// values.
///
/// Not `Send`/`Sync`: callers needing concurrent access must synchronize
/// externally (spec §5: "single-threaded; no internal synchronization").
pub struct Tree {
    root: Option<OpaqueNodePtr>,
    allocator: TreeAllocator,
    stats: Stats,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    /// Construct an empty tree with no memory limit.
    pub fn new() -> Self {
        Tree::with_config(TreeConfig::default())
    }

    /// Construct an empty tree with the given configuration.
    pub fn with_config(config: TreeConfig) -> Self {
        Tree {
            root: None,
            allocator: TreeAllocator::new(config.memory_limit),
            stats: Stats::default(),
        }
    }

    /// Look up `key`, returning its value if present.
    pub fn get(&self, key: u64) -> Option<&[u8]> {
        let art_key = ArtKey::encode(key);
        let mut cur = self.root?;
        let mut depth = 0usize;
        loop {
            match cur.node_type() {
                NodeType::Leaf => {
                    // SAFETY: tagged as a leaf.
                    let leaf = unsafe { cur.as_leaf() };
                    return if leaf.matches(art_key) {
                        Some(leaf.value())
                    } else {
                        None
                    };
                }
                _ => {
                    // SAFETY: tagged as an internal node.
                    let prefix = unsafe { cur.prefix() };
                    if prefix.shared_length(&art_key, depth) < prefix.len() {
                        return None;
                    }
                    depth += prefix.len();
                    let key_byte = art_key.byte_at(depth)?;
                    // SAFETY: tagged as an internal node.
                    cur = unsafe { cur.find_child(key_byte) }?;
                    depth += 1;
                }
            }
        }
    }

    /// Insert `key`/`value`, returning `Ok(true)` if a new entry was added or
    /// `Ok(false)` if `key` was already present (in which case the tree is
    /// unchanged; spec §4.5 insert: "does not overwrite").
    pub fn insert(&mut self, key: u64, value: &[u8]) -> Result<bool, InsertError> {
        if value.len() > MAX_VALUE_LEN {
            return Err(InsertError::ValueTooLong { len: value.len() });
        }
        let art_key = ArtKey::encode(key);
        let leaf_size = leaf::size_for(value.len());

        if self.root.is_none() {
            self.allocator.charge(leaf_size)?;
            let (new_leaf, _) = match LeafPtr::create(art_key, value) {
                Ok(l) => l,
                Err(e) => {
                    self.allocator.release(leaf_size);
                    return Err(e);
                }
            };
            self.root = Some(OpaqueNodePtr::new(new_leaf.as_raw(), NodeType::Leaf));
            self.stats.inc_node_count(NodeType::Leaf);
            return Ok(true);
        }

        let mut slot: *mut Option<OpaqueNodePtr> = &mut self.root;
        let mut depth = 0usize;
        loop {
            // SAFETY: `slot` always points at a populated `Option` reached by
            // descending from `self.root`, which is non-`None` here.
            let current = unsafe { (*slot).expect("slot must be populated during descent") };

            match current.node_type() {
                NodeType::Leaf => {
                    // SAFETY: tagged as a leaf.
                    let existing = unsafe { current.as_leaf() };
                    if existing.matches(art_key) {
                        return Ok(false);
                    }
                    return self.split_leaf(slot, existing, art_key, value, leaf_size, depth);
                }
                _ => {
                    // SAFETY: tagged as an internal node.
                    let prefix = unsafe { current.prefix() };
                    let shared = prefix.shared_length(&art_key, depth);
                    if shared < prefix.len() {
                        return self.split_prefix(slot, current, art_key, value, leaf_size, depth, shared);
                    }
                    depth += prefix.len();
                    let key_byte = art_key
                        .byte_at(depth)
                        .expect("fixed-width key exhausted before reaching a leaf");
                    // SAFETY: tagged as an internal node.
                    match unsafe { current.child_slot_mut(key_byte) } {
                        Some(child_slot) => {
                            slot = child_slot;
                            depth += 1;
                        }
                        None => {
                            return self.insert_new_child(slot, current, key_byte, art_key, value, leaf_size);
                        }
                    }
                }
            }
        }
    }

    /// Case: descent reached a leaf holding a different key than `new_key`
    /// (spec §4.5 insert, leaf split). Both keys become siblings under a
    /// fresh `Node4` whose prefix is their shared bytes from `depth`.
    fn split_leaf(
        &mut self,
        slot: *mut Option<OpaqueNodePtr>,
        existing: LeafPtr,
        new_key: ArtKey,
        value: &[u8],
        leaf_size: usize,
        depth: usize,
    ) -> Result<bool, InsertError> {
        let existing_key = existing.key();
        let mut shared = 0usize;
        while depth + shared < crate::key::KEY_LEN
            && existing_key.byte_at(depth + shared) == new_key.byte_at(depth + shared)
        {
            shared += 1;
        }
        let prefix_bytes: Vec<u8> = (0..shared)
            .map(|i| new_key.byte_at(depth + i).unwrap())
            .collect();

        let total_delta = leaf_size + node_size::<InnerNode4>();
        self.allocator.charge(total_delta)?;
        let (new_leaf, _) = match LeafPtr::create(new_key, value) {
            Ok(l) => l,
            Err(e) => {
                self.allocator.release(total_delta);
                return Err(e);
            }
        };

        let existing_byte = existing_key
            .byte_at(depth + shared)
            .expect("distinct keys must differ within the fixed key length");
        let new_byte = new_key.byte_at(depth + shared).unwrap();

        let mut node = InnerNode4::new(KeyPrefix::from_slice(&prefix_bytes));
        node.add_child(existing_byte, OpaqueNodePtr::new(existing.as_raw(), NodeType::Leaf));
        node.add_child(new_byte, OpaqueNodePtr::new(new_leaf.as_raw(), NodeType::Leaf));

        let node_ptr = self.allocator.alloc_inner(node);
        // SAFETY: `slot` still points at the leaf being replaced; the leaf
        // itself is kept alive as a child of the new node, not freed.
        unsafe { *slot = Some(OpaqueNodePtr::from_inner(node_ptr)) };

        self.stats.inc_node_count(NodeType::Node4);
        self.stats.inc_node_count(NodeType::Leaf);
        Ok(true)
    }

    /// Case: descent reached an internal node whose prefix partially
    /// mismatches `new_key` (spec §4.5 insert, prefix split). A fresh
    /// `Node4` is spliced in above `n`, holding the shared prefix bytes; `n`
    /// keeps its remaining prefix (minus the shared part and the diverging
    /// separator byte) and becomes one child, the new leaf the other.
    fn split_prefix(
        &mut self,
        slot: *mut Option<OpaqueNodePtr>,
        n: OpaqueNodePtr,
        new_key: ArtKey,
        value: &[u8],
        leaf_size: usize,
        depth: usize,
        shared: usize,
    ) -> Result<bool, InsertError> {
        let total_delta = leaf_size + node_size::<InnerNode4>();
        self.allocator.charge(total_delta)?;
        let (new_leaf, _) = match LeafPtr::create(new_key, value) {
            Ok(l) => l,
            Err(e) => {
                self.allocator.release(total_delta);
                return Err(e);
            }
        };

        // SAFETY: `n` is an internal node.
        let old_prefix = unsafe { *n.prefix() };
        let shared_bytes = KeyPrefix::from_slice(&old_prefix.as_bytes()[..shared]);
        let discarded_byte = old_prefix.as_bytes()[shared];
        // SAFETY: `n` is an internal node, uniquely reachable via `slot`.
        unsafe { n.prefix_mut().cut(shared + 1) };

        let new_byte = new_key
            .byte_at(depth + shared)
            .expect("distinct keys must differ within the fixed key length");

        let mut n4 = InnerNode4::new(shared_bytes);
        n4.add_child(discarded_byte, n);
        n4.add_child(new_byte, OpaqueNodePtr::new(new_leaf.as_raw(), NodeType::Leaf));

        let node_ptr = self.allocator.alloc_inner(n4);
        // SAFETY: `n` survives as a child of the new node; `slot` is
        // overwritten only after `n` has been re-parented.
        unsafe { *slot = Some(OpaqueNodePtr::from_inner(node_ptr)) };

        self.stats.inc_node_count(NodeType::Node4);
        self.stats.inc_node_count(NodeType::Leaf);
        self.stats.record_prefix_split();
        Ok(true)
    }

    /// Case: descent reached an internal node `n` whose prefix fully
    /// matched, but which has no child for `key_byte` (spec §4.5 insert,
    /// plain add / promotion). If `n` is full, it is promoted to the next
    /// larger kind first.
    fn insert_new_child(
        &mut self,
        slot: *mut Option<OpaqueNodePtr>,
        n: OpaqueNodePtr,
        key_byte: u8,
        new_key: ArtKey,
        value: &[u8],
        leaf_size: usize,
    ) -> Result<bool, InsertError> {
        // SAFETY: `n` is an internal node.
        let full = unsafe { n.is_full() };
        let promotion_delta = if full {
            self.promotion_delta_for(n.node_type())
        } else {
            0
        };
        let total_delta = leaf_size + promotion_delta;
        self.allocator.charge(total_delta)?;

        let (new_leaf, _) = match LeafPtr::create(new_key, value) {
            Ok(l) => l,
            Err(e) => {
                self.allocator.release(total_delta);
                return Err(e);
            }
        };
        let new_leaf_opaque = OpaqueNodePtr::new(new_leaf.as_raw(), NodeType::Leaf);

        if full {
            let promoted = self.promote(n, key_byte, new_leaf_opaque);
            // SAFETY: `n`'s children (all reachable from `promoted` now) are
            // untouched; only `n`'s own shell was freed inside `promote`.
            unsafe { *slot = Some(promoted) };
        } else {
            // SAFETY: `n` is internal, not full, and `key_byte` is vacant.
            unsafe { n.add_child(key_byte, new_leaf_opaque) };
        }
        self.stats.inc_node_count(NodeType::Leaf);
        Ok(true)
    }

    /// Promote `n` to the next larger kind with `new_child` installed under
    /// `key_byte`, freeing `n`'s own storage (spec §4.4 Node growth).
    fn promote(&mut self, n: OpaqueNodePtr, key_byte: u8, new_child: OpaqueNodePtr) -> OpaqueNodePtr {
        match n.node_type() {
            NodeType::Node4 => {
                let old_ptr = n.untagged().cast::<InnerNode4>();
                // SAFETY: `old_ptr` is a live `InnerNode4` tagged as such.
                let new_node = InnerNode16::from_node4(unsafe { old_ptr.as_ref() }, key_byte, new_child);
                let new_ptr = self.allocator.alloc_inner(new_node);
                // SAFETY: `old_ptr`'s children have all been copied into
                // `new_node`; `old_ptr` itself is no longer referenced.
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node4);
                self.stats.inc_node_count(NodeType::Node16);
                self.stats.record_growth(NodeType::Node16);
                OpaqueNodePtr::from_inner(new_ptr)
            }
            NodeType::Node16 => {
                let old_ptr = n.untagged().cast::<InnerNode16>();
                let new_node = InnerNode48::from_node16(unsafe { old_ptr.as_ref() }, key_byte, new_child);
                let new_ptr = self.allocator.alloc_inner(new_node);
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node16);
                self.stats.inc_node_count(NodeType::Node48);
                self.stats.record_growth(NodeType::Node48);
                OpaqueNodePtr::from_inner(new_ptr)
            }
            NodeType::Node48 => {
                let old_ptr = n.untagged().cast::<InnerNode48>();
                let new_node = InnerNode256::from_node48(unsafe { old_ptr.as_ref() }, key_byte, new_child);
                let new_ptr = self.allocator.alloc_inner(new_node);
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node48);
                self.stats.inc_node_count(NodeType::Node256);
                self.stats.record_growth(NodeType::Node256);
                OpaqueNodePtr::from_inner(new_ptr)
            }
            NodeType::Node256 => unreachable!("Node256 is never full for promotion purposes"),
            NodeType::Leaf => unreachable!("promote called on a leaf"),
        }
    }

    fn promotion_delta_for(&self, kind: NodeType) -> usize {
        match kind {
            NodeType::Node4 => self.allocator.promotion_delta::<InnerNode4, InnerNode16>(),
            NodeType::Node16 => self.allocator.promotion_delta::<InnerNode16, InnerNode48>(),
            NodeType::Node48 => self.allocator.promotion_delta::<InnerNode48, InnerNode256>(),
            NodeType::Node256 => 0,
            NodeType::Leaf => unreachable!("leaves are never promoted"),
        }
    }

    /// Remove `key`, returning `true` if it was present.
    pub fn remove(&mut self, key: u64) -> bool {
        let art_key = ArtKey::encode(key);
        let Some(root) = self.root else {
            return false;
        };

        if root.node_type() == NodeType::Leaf {
            // SAFETY: tagged as a leaf.
            let leaf = unsafe { root.as_leaf() };
            if !leaf.matches(art_key) {
                return false;
            }
            let size = leaf.size();
            // SAFETY: `root` is this leaf, uniquely owned by `self.root`.
            unsafe { leaf.dealloc() };
            self.allocator.release(size);
            self.stats.dec_node_count(NodeType::Leaf);
            self.root = None;
            return true;
        }

        let mut slot_of_n: *mut Option<OpaqueNodePtr> = &mut self.root;
        let mut depth = 0usize;
        loop {
            // SAFETY: descent invariant, as in `insert`.
            let n = unsafe { (*slot_of_n).expect("slot must be populated during descent") };
            debug_assert_ne!(n.node_type(), NodeType::Leaf);

            // SAFETY: `n` is an internal node.
            let prefix = unsafe { n.prefix() };
            let shared = prefix.shared_length(&art_key, depth);
            if shared < prefix.len() {
                return false;
            }
            let depth_after_prefix = depth + prefix.len();
            let Some(key_byte) = art_key.byte_at(depth_after_prefix) else {
                return false;
            };
            // SAFETY: `n` is an internal node.
            let Some(child) = (unsafe { n.find_child(key_byte) }) else {
                return false;
            };

            if child.node_type() != NodeType::Leaf {
                // SAFETY: `n` is an internal node and `key_byte` is occupied.
                slot_of_n = unsafe { n.child_slot_mut(key_byte) }.expect("child exists");
                depth = depth_after_prefix + 1;
                continue;
            }

            // SAFETY: tagged as a leaf.
            let leaf = unsafe { child.as_leaf() };
            if !leaf.matches(art_key) {
                return false;
            }

            let leaf_size = leaf.size();
            // SAFETY: `n` is an internal node.
            let n_children = unsafe { n.header() }.num_children() as usize;
            let min_size = n.node_type().inner_min_size();

            if n_children > min_size {
                // SAFETY: `n` is an internal node, `key_byte` is occupied.
                unsafe { n.remove_child(key_byte) };
                // SAFETY: `leaf` is being removed from the tree here.
                unsafe { leaf.dealloc() };
                self.allocator.release(leaf_size);
                self.stats.dec_node_count(NodeType::Leaf);
                return true;
            }

            // `n` is at its minimum bracket size: removing this leaf
            // underflows it (spec §4.5 remove, collapse/demotion).
            // SAFETY: `leaf` is being removed from the tree here.
            unsafe { leaf.dealloc() };
            self.allocator.release(leaf_size);
            self.stats.dec_node_count(NodeType::Leaf);

            if n.node_type() == NodeType::Node4 {
                let old_ptr = n.untagged().cast::<InnerNode4>();
                // SAFETY: `old_ptr` is a live `InnerNode4`; it held exactly
                // two children before removal, one of which (`key_byte`) is
                // the one just freed, leaving exactly one other.
                let (sep_byte, remaining_child) = unsafe { old_ptr.as_ref() }
                    .iter_children()
                    .find(|&(byte, _)| byte != key_byte)
                    .expect("Node4 at minimum size must have one other child");

                if remaining_child.node_type() != NodeType::Leaf {
                    // SAFETY: `n` is an internal node.
                    let n_prefix = unsafe { *n.prefix() };
                    // SAFETY: `remaining_child` is an internal node.
                    unsafe {
                        let mut new_prefix = *remaining_child.prefix();
                        new_prefix.prepend(&n_prefix, sep_byte);
                        *remaining_child.prefix_mut() = new_prefix;
                    }
                }

                // SAFETY: `remaining_child` was extracted above and is kept
                // alive; only `n`'s own shell is released here.
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node4);
                self.allocator.release(node_size::<InnerNode4>());
                // SAFETY: `slot_of_n` still points at the slot holding `n`.
                unsafe { *slot_of_n = Some(remaining_child) };
            } else {
                let demoted = self.demote(n, key_byte);
                // SAFETY: `slot_of_n` still points at the slot holding `n`.
                unsafe { *slot_of_n = Some(demoted) };
            }
            return true;
        }
    }

    /// Demote `n` to the next smaller kind, dropping the child at
    /// `drop_key_byte` (already freed by the caller), freeing `n`'s own
    /// storage (spec §4.4 Node shrinking).
    fn demote(&mut self, n: OpaqueNodePtr, drop_key_byte: u8) -> OpaqueNodePtr {
        match n.node_type() {
            NodeType::Node16 => {
                let old_ptr = n.untagged().cast::<InnerNode16>();
                // SAFETY: `old_ptr` is a live `InnerNode16`.
                let new_node = InnerNode4::from_node16(unsafe { old_ptr.as_ref() }, drop_key_byte);
                let new_ptr = self.allocator.alloc_inner(new_node);
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node16);
                self.stats.inc_node_count(NodeType::Node4);
                self.stats.record_shrink(NodeType::Node16);
                let delta = self.allocator.promotion_delta::<InnerNode4, InnerNode16>();
                self.allocator.release(delta);
                OpaqueNodePtr::from_inner(new_ptr)
            }
            NodeType::Node48 => {
                let old_ptr = n.untagged().cast::<InnerNode48>();
                let new_node = InnerNode16::from_node48(unsafe { old_ptr.as_ref() }, drop_key_byte);
                let new_ptr = self.allocator.alloc_inner(new_node);
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node48);
                self.stats.inc_node_count(NodeType::Node16);
                self.stats.record_shrink(NodeType::Node48);
                let delta = self.allocator.promotion_delta::<InnerNode16, InnerNode48>();
                self.allocator.release(delta);
                OpaqueNodePtr::from_inner(new_ptr)
            }
            NodeType::Node256 => {
                let old_ptr = n.untagged().cast::<InnerNode256>();
                let new_node = InnerNode48::from_node256(unsafe { old_ptr.as_ref() }, drop_key_byte);
                let new_ptr = self.allocator.alloc_inner(new_node);
                unsafe { self.allocator.free_inner(old_ptr) };
                self.stats.dec_node_count(NodeType::Node256);
                self.stats.inc_node_count(NodeType::Node48);
                self.stats.record_shrink(NodeType::Node256);
                let delta = self.allocator.promotion_delta::<InnerNode48, InnerNode256>();
                self.allocator.release(delta);
                OpaqueNodePtr::from_inner(new_ptr)
            }
            NodeType::Node4 => unreachable!("Node4 collapses rather than demoting"),
            NodeType::Leaf => unreachable!("demote called on a leaf"),
        }
    }

    /// Remove every entry, freeing all storage.
    pub fn clear(&mut self) {
        if let Some(root) = self.root.take() {
            // SAFETY: `root` is the tree's sole owning reference to its
            // contents; nothing else can reach it after `take`.
            unsafe { root.delete_subtree(&mut self.allocator, &mut self.stats) };
        }
        debug_assert_eq!(self.allocator.current_memory_use(), 0);
    }

    /// Bytes currently charged against this tree's storage.
    pub fn current_memory_use(&self) -> usize {
        self.allocator.current_memory_use()
    }

    /// The configured hard memory cap, or 0 if unlimited.
    pub fn memory_limit(&self) -> usize {
        self.allocator.memory_limit()
    }

    /// Live node count for `kind`.
    pub fn node_count(&self, kind: NodeType) -> u64 {
        self.stats.node_count(kind)
    }

    /// Cumulative promotions whose target kind is `kind`.
    pub fn growing_inode_count(&self, kind: NodeType) -> u64 {
        self.stats.growing_inode_count(kind)
    }

    /// Cumulative demotions whose source kind is `kind`.
    pub fn shrinking_inode_count(&self, kind: NodeType) -> u64 {
        self.stats.shrinking_inode_count(kind)
    }

    /// Cumulative count of prefix-split transformations performed on insert.
    pub fn key_prefix_splits(&self) -> u64 {
        self.stats.key_prefix_splits()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        self.clear();
    }
}
