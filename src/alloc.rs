//! Per-kind internal-node pools and the tree-wide memory accounting.
//!
//! Mirrors `unodb`'s node pool design (`original_source/art.cpp`:
//! `get_internal_node_pool`/`get_leaf_node_pool`, `pmr_unsynchronized_pool_resource`
//! configured to request ~2MiB backing chunks): one pool per internal-node
//! kind, each serving fixed-size blocks, backed by chunked requests to the
//! system allocator. Leaves bypass the pools entirely and go straight
//! through the system allocator (spec §4.7), since they are variable-sized.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::InsertError;
use crate::nodes::inner::node16::InnerNode16;
use crate::nodes::inner::node256::InnerNode256;
use crate::nodes::inner::node4::InnerNode4;
use crate::nodes::inner::node48::InnerNode48;
use crate::nodes::inner::InnerNode;

/// Target size, in bytes, of each backing chunk requested from the system
/// allocator by a node-kind pool (spec §4.7: "configured to request backing
/// chunks of roughly 2 MiB from the OS").
pub const POOL_CHUNK_BYTES: usize = 2 * 1024 * 1024;

/// A free-list pool serving fixed-size, fixed-alignment blocks for one
/// internal-node kind.
///
/// Block addresses are stable for the lifetime of the node occupying them,
/// and a block is always returned to the pool it came from — the two
/// properties spec §4.7 requires of the (otherwise unobservable) pool
/// discipline.
struct Pool {
    block_layout: Layout,
    free_list: Vec<NonNull<u8>>,
    /// Every chunk ever requested from the system allocator, so the pool can
    /// free them on drop.
    chunks: Vec<(NonNull<u8>, Layout)>,
}

impl Pool {
    fn new(block_layout: Layout) -> Self {
        Pool {
            block_layout,
            free_list: Vec::new(),
            chunks: Vec::new(),
        }
    }

    fn blocks_per_chunk(&self) -> usize {
        (POOL_CHUNK_BYTES / self.block_layout.size()).max(1)
    }

    fn refill(&mut self) {
        let n = self.blocks_per_chunk();
        let chunk_layout = Layout::from_size_align(
            self.block_layout.size() * n,
            self.block_layout.align(),
        )
        .expect("pool chunk layout overflow");
        // SAFETY: `chunk_layout` has non-zero size (block size > 0, n >= 1).
        let raw = unsafe { alloc::alloc(chunk_layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(chunk_layout);
        };
        for i in 0..n {
            // SAFETY: `i * block_size` stays within the chunk allocation.
            let block = unsafe { base.as_ptr().add(i * self.block_layout.size()) };
            self.free_list.push(NonNull::new(block).unwrap());
        }
        self.chunks.push((base, chunk_layout));
    }

    fn alloc(&mut self) -> NonNull<u8> {
        if self.free_list.is_empty() {
            self.refill();
        }
        self.free_list.pop().expect("pool refill invariant")
    }

    fn dealloc(&mut self, block: NonNull<u8>) {
        self.free_list.push(block);
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        for (base, layout) in self.chunks.drain(..) {
            // SAFETY: `base`/`layout` were produced together by `refill` and
            // are freed exactly once here, after every block handed out has
            // already been returned to `free_list` by the owning `Tree`'s
            // teardown.
            unsafe { alloc::dealloc(base.as_ptr(), layout) };
        }
    }
}

fn layout_of<T>() -> Layout {
    Layout::new::<T>().align_to(crate::tagged_pointer::ALIGNMENT).unwrap()
}

/// Size, in bytes, of one `T` node's pool block.
pub fn node_size<T: InnerNode>() -> usize {
    layout_of::<T>().size()
}

/// Owns the four per-kind internal-node pools plus the tree's running memory
/// counter and optional hard cap.
pub struct TreeAllocator {
    node4_pool: Pool,
    node16_pool: Pool,
    node48_pool: Pool,
    node256_pool: Pool,
    current_memory_use: usize,
    memory_limit: usize,
}

impl TreeAllocator {
    /// Construct a fresh allocator. `memory_limit == 0` means unlimited.
    pub fn new(memory_limit: usize) -> Self {
        TreeAllocator {
            node4_pool: Pool::new(layout_of::<InnerNode4>()),
            node16_pool: Pool::new(layout_of::<InnerNode16>()),
            node48_pool: Pool::new(layout_of::<InnerNode48>()),
            node256_pool: Pool::new(layout_of::<InnerNode256>()),
            current_memory_use: 0,
            memory_limit,
        }
    }

    /// Bytes currently charged against tree storage.
    pub fn current_memory_use(&self) -> usize {
        self.current_memory_use
    }

    /// The configured hard cap, or 0 if unlimited.
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Reserve `delta` bytes against the budget, failing with
    /// [`InsertError::OutOfMemory`] if that would exceed `memory_limit`
    /// (spec §4.7: "If an optional hard cap ... is configured and the new
    /// total would exceed it, the operation fails ... before any state
    /// mutation"). On success, the charge is applied immediately; callers
    /// must call [`TreeAllocator::release`] with the same amount if a later
    /// step in the same operation fails (spec §9: "charge first, allocate
    /// second, and on any failure ... reverse the charge").
    pub fn charge(&mut self, delta: usize) -> Result<(), InsertError> {
        if self.memory_limit != 0 && self.current_memory_use + delta > self.memory_limit {
            return Err(InsertError::OutOfMemory);
        }
        self.current_memory_use += delta;
        Ok(())
    }

    /// Reverse a charge of `delta` bytes (rollback on a failed insert, or
    /// bookkeeping on a successful remove).
    pub fn release(&mut self, delta: usize) {
        debug_assert!(delta <= self.current_memory_use, "releasing more than charged");
        self.current_memory_use = self.current_memory_use.saturating_sub(delta);
    }

    fn pool_for<T: InnerNode>(&mut self) -> &mut Pool {
        match T::TYPE {
            crate::nodes::NodeType::Node4 => &mut self.node4_pool,
            crate::nodes::NodeType::Node16 => &mut self.node16_pool,
            crate::nodes::NodeType::Node48 => &mut self.node48_pool,
            crate::nodes::NodeType::Node256 => &mut self.node256_pool,
            crate::nodes::NodeType::Leaf => unreachable!("leaves are not pool-allocated"),
        }
    }

    /// Allocate space for and move `node` into the pool for its kind,
    /// returning an owning pointer.
    pub fn alloc_inner<T: InnerNode>(&mut self, node: T) -> NonNull<T> {
        let block = self.pool_for::<T>().alloc();
        let ptr = block.cast::<T>();
        // SAFETY: `block` is freshly allocated with `T`'s layout and
        // uninitialized; writing `node` into it is the first write.
        unsafe { ptr.as_ptr().write(node) };
        ptr
    }

    /// Drop and return `ptr`'s block to the pool for `T`.
    ///
    /// # Safety
    /// `ptr` must point at a live `T` allocated by
    /// [`TreeAllocator::alloc_inner`] for the same `T`, not used afterwards.
    pub unsafe fn free_inner<T: InnerNode>(&mut self, ptr: NonNull<T>) {
        unsafe { std::ptr::drop_in_place(ptr.as_ptr()) };
        self.pool_for::<T>().dealloc(ptr.cast());
    }

    /// Node-size delta charged when promoting from `From` to `To`
    /// (the larger kind's block size minus the smaller one's).
    pub fn promotion_delta<From: InnerNode, To: InnerNode>(&self) -> usize {
        layout_of::<To>().size().saturating_sub(layout_of::<From>().size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_respects_limit() {
        let mut alloc = TreeAllocator::new(100);
        assert!(alloc.charge(50).is_ok());
        assert!(alloc.charge(51).is_err());
        assert_eq!(alloc.current_memory_use(), 50);
    }

    #[test]
    fn release_reverses_charge() {
        let mut alloc = TreeAllocator::new(0);
        alloc.charge(100).unwrap();
        alloc.release(40);
        assert_eq!(alloc.current_memory_use(), 60);
    }

    #[test]
    fn inner_pool_round_trip() {
        let mut alloc = TreeAllocator::new(0);
        let ptr = alloc.alloc_inner(InnerNode4::new(Default::default()));
        unsafe {
            assert_eq!((*ptr.as_ptr()).header().num_children(), 0);
            alloc.free_inner(ptr);
        }
    }
}
