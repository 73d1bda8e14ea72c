//! Observability counters (spec §2 "Statistics", §4.7, §6, §8).
//!
//! This crate has no logging dependency: neither the teacher (`blart`) nor
//! `unodb` (the system spec.md distills from) log on the hot path, and
//! these counters are their substitute — see `SPEC_FULL.md` §A.3.

use crate::nodes::NodeType;

/// Per-kind node counts, growth/shrink event counters, and the
/// prefix-split counter, mirroring `unodb::db`'s `node_counts` /
/// `growing_inode_counts` / `shrinking_inode_counts` / `key_prefix_splits`
/// (`original_source/art.hpp`).
#[derive(Debug, Default, Clone)]
pub struct Stats {
    /// Live node count per kind, indexed by [`NodeType::node_index`].
    node_counts: [u64; 5],
    /// Cumulative promotions per internal kind, indexed by
    /// [`NodeType::inner_index`] (the *target* kind of the promotion).
    growing_inode_counts: [u64; 4],
    /// Cumulative demotions per internal kind, indexed by
    /// [`NodeType::inner_index`] (the *source* kind of the demotion).
    shrinking_inode_counts: [u64; 4],
    /// Cumulative prefix splits (spec §4.5 insert case 3).
    key_prefix_splits: u64,
}

impl Stats {
    /// Live node count for `kind`.
    pub fn node_count(&self, kind: NodeType) -> u64 {
        self.node_counts[kind.node_index()]
    }

    /// Cumulative promotions whose target kind is `kind`.
    ///
    /// # Panics
    /// Panics if `kind` is [`NodeType::Leaf`] (leaves never grow).
    pub fn growing_inode_count(&self, kind: NodeType) -> u64 {
        self.growing_inode_counts[kind.inner_index()]
    }

    /// Cumulative demotions whose source kind is `kind`.
    ///
    /// # Panics
    /// Panics if `kind` is [`NodeType::Leaf`] (leaves never shrink).
    pub fn shrinking_inode_count(&self, kind: NodeType) -> u64 {
        self.shrinking_inode_counts[kind.inner_index()]
    }

    /// Cumulative count of prefix-split transformations performed on insert.
    pub fn key_prefix_splits(&self) -> u64 {
        self.key_prefix_splits
    }

    pub(crate) fn inc_node_count(&mut self, kind: NodeType) {
        self.node_counts[kind.node_index()] += 1;
    }

    pub(crate) fn dec_node_count(&mut self, kind: NodeType) {
        self.node_counts[kind.node_index()] -= 1;
    }

    /// Record a promotion landing on `target_kind`.
    pub(crate) fn record_growth(&mut self, target_kind: NodeType) {
        self.growing_inode_counts[target_kind.inner_index()] += 1;
    }

    /// Record a demotion originating from `source_kind`.
    pub(crate) fn record_shrink(&mut self, source_kind: NodeType) {
        self.shrinking_inode_counts[source_kind.inner_index()] += 1;
    }

    pub(crate) fn record_prefix_split(&mut self) {
        self.key_prefix_splits += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = Stats::default();
        for kind in NodeType::INNER_KINDS {
            assert_eq!(stats.growing_inode_count(kind), 0);
            assert_eq!(stats.shrinking_inode_count(kind), 0);
        }
        assert_eq!(stats.key_prefix_splits(), 0);
    }

    #[test]
    fn growth_and_shrink_never_decrease() {
        let mut stats = Stats::default();
        stats.record_growth(NodeType::Node16);
        stats.record_growth(NodeType::Node16);
        assert_eq!(stats.growing_inode_count(NodeType::Node16), 2);
        stats.record_shrink(NodeType::Node16);
        assert_eq!(stats.shrinking_inode_count(NodeType::Node16), 1);
    }
}
