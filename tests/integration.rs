//! Concrete scenarios and cross-cutting properties, exercised against the
//! public API only (no `unsafe`, no internal types).

use std::collections::BTreeMap;

use artcore::{InsertError, NodeType, Tree, TreeConfig};
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn key(msb_to_lsb: [u8; 8]) -> u64 {
    u64::from_be_bytes(msb_to_lsb)
}

#[test]
fn scenario_1_four_sequential_keys_form_n4_root() {
    let mut tree = Tree::new();
    for k in 0u64..4 {
        assert!(tree.insert(k, b"v").unwrap());
    }
    assert_eq!(tree.node_count(NodeType::Node4), 1);
    assert_eq!(tree.node_count(NodeType::Leaf), 4);
    for k in 0u64..4 {
        assert_eq!(tree.get(k), Some(&b"v"[..]));
    }
    assert_eq!(tree.get(4), None);
}

#[test]
fn scenario_2_fifth_key_promotes_root_to_n16() {
    let mut tree = Tree::new();
    for k in 0u64..5 {
        tree.insert(k, b"v").unwrap();
    }
    assert_eq!(tree.node_count(NodeType::Node16), 1);
    assert_eq!(tree.node_count(NodeType::Node4), 0);
    assert_eq!(tree.growing_inode_count(NodeType::Node16), 1);
    for k in 0u64..5 {
        assert_eq!(tree.get(k), Some(&b"v"[..]));
    }
}

#[test]
fn scenario_3_two_keys_differing_in_top_byte_share_no_prefix() {
    let mut tree = Tree::new();
    tree.insert(0x0000_0000_0000_0000, b"v").unwrap();
    tree.insert(0x0100_0000_0000_0000, b"v").unwrap();
    assert_eq!(tree.node_count(NodeType::Node4), 1);
    assert_eq!(tree.get(0x0000_0000_0000_0000), Some(&b"v"[..]));
    assert_eq!(tree.get(0x0100_0000_0000_0000), Some(&b"v"[..]));
}

#[test]
fn scenario_4_removing_back_to_four_demotes_n16_to_n4_once() {
    let mut tree = Tree::new();
    for k in 0u64..5 {
        tree.insert(k, b"v").unwrap();
    }
    assert!(tree.remove(4));
    assert!(tree.remove(3));
    assert_eq!(tree.node_count(NodeType::Node16), 0);
    assert_eq!(tree.node_count(NodeType::Node4), 1);
    assert_eq!(tree.shrinking_inode_count(NodeType::Node16), 1);
    for k in 0u64..3 {
        assert_eq!(tree.get(k), Some(&b"v"[..]));
    }
}

#[test]
fn scenario_5_growth_and_shrink_through_every_bracket() {
    let mut tree = Tree::new();
    for k in 0u64..17 {
        tree.insert(k, b"v").unwrap();
    }
    assert_eq!(tree.growing_inode_count(NodeType::Node16), 1);
    assert_eq!(tree.growing_inode_count(NodeType::Node48), 1);
    assert_eq!(tree.node_count(NodeType::Node48), 1);

    for k in 0u64..16 {
        assert!(tree.remove(k));
    }
    assert_eq!(tree.shrinking_inode_count(NodeType::Node48), 1);
    assert_eq!(tree.shrinking_inode_count(NodeType::Node16), 1);
    assert_eq!(tree.node_count(NodeType::Leaf), 1);
    assert_eq!(tree.get(16), Some(&b"v"[..]));
}

#[test]
fn scenario_6_oversized_value_is_rejected_without_mutation() {
    let mut tree = Tree::new();
    let huge = vec![0u8; artcore::MAX_VALUE_LEN + 1];
    let before = tree.current_memory_use();
    let err = tree.insert(1, &huge).unwrap_err();
    assert!(matches!(err, InsertError::ValueTooLong { len } if len == huge.len()));
    assert_eq!(tree.current_memory_use(), before);
    assert_eq!(tree.get(1), None);
}

#[test]
fn scenario_7_memory_limit_admits_exactly_one_leaf() {
    // Discover one leaf's footprint with an unlimited tree first.
    let mut probe = Tree::new();
    probe.insert(1, b"v").unwrap();
    let leaf_size = probe.current_memory_use();

    let mut tree = Tree::with_config(TreeConfig {
        memory_limit: leaf_size + 1,
    });
    assert!(tree.insert(1, b"v").unwrap());
    let err = tree.insert(2, b"v").unwrap_err();
    assert!(matches!(err, InsertError::OutOfMemory));
    assert_eq!(tree.current_memory_use(), leaf_size);
    assert_eq!(tree.get(1), Some(&b"v"[..]));
    assert_eq!(tree.get(2), None);
}

#[test]
fn scenario_8_shared_prefix_of_seven_bytes_is_a_single_n4() {
    let mut tree = Tree::new();
    tree.insert(key([0, 0, 0, 0, 0, 0, 0, 0xAA]), b"v").unwrap();
    tree.insert(key([0, 0, 0, 0, 0, 0, 0, 0xBB]), b"v").unwrap();
    assert_eq!(tree.node_count(NodeType::Node4), 1);
    assert_eq!(tree.get(key([0, 0, 0, 0, 0, 0, 0, 0xAA])), Some(&b"v"[..]));
    assert_eq!(tree.get(key([0, 0, 0, 0, 0, 0, 0, 0xBB])), Some(&b"v"[..]));
}

#[test]
fn scenario_9_diverging_third_key_triggers_one_prefix_split() {
    let mut tree = Tree::new();
    let a = key([1, 2, 3, 0, 0, 0, 0, 0]);
    let b = key([1, 2, 3, 0, 0, 0, 0, 1]);
    let c = key([1, 9, 0, 0, 0, 0, 0, 0]);
    tree.insert(a, b"v").unwrap();
    tree.insert(b, b"v").unwrap();
    assert_eq!(tree.key_prefix_splits(), 0);
    tree.insert(c, b"v").unwrap();
    assert_eq!(tree.key_prefix_splits(), 1);
    assert_eq!(tree.get(a), Some(&b"v"[..]));
    assert_eq!(tree.get(b), Some(&b"v"[..]));
    assert_eq!(tree.get(c), Some(&b"v"[..]));
}

#[test]
fn property_round_trip_over_random_keys() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xC0FF_EE00_1234_5678);
    let mut keys: Vec<u64> = (0..500).map(|_| rand::Rng::gen(&mut rng)).collect();
    keys.sort_unstable();
    keys.dedup();

    let mut tree = Tree::new();
    for (i, &k) in keys.iter().enumerate() {
        let value = i.to_le_bytes();
        assert!(tree.insert(k, &value).unwrap());
    }
    for (i, &k) in keys.iter().enumerate() {
        assert_eq!(tree.get(k), Some(&i.to_le_bytes()[..]));
    }

    let never_inserted = 700u64..800;
    for k in never_inserted {
        if !keys.contains(&k) {
            assert_eq!(tree.get(k), None);
        }
    }
}

#[test]
fn property_insert_remove_is_an_inverse() {
    let mut tree = Tree::new();
    let present = [10u64, 20, 30, 40];
    for &k in &present {
        tree.insert(k, b"v").unwrap();
    }
    let before_memory = tree.current_memory_use();
    let before_node4 = tree.node_count(NodeType::Node4);
    let before_leaf = tree.node_count(NodeType::Leaf);

    assert!(tree.insert(99, b"new").unwrap());
    assert!(tree.remove(99));

    assert_eq!(tree.current_memory_use(), before_memory);
    assert_eq!(tree.node_count(NodeType::Node4), before_node4);
    assert_eq!(tree.node_count(NodeType::Leaf), before_leaf);
    for &k in &present {
        assert_eq!(tree.get(k), Some(&b"v"[..]));
    }
    assert_eq!(tree.get(99), None);
}

#[test]
fn property_no_overwrite() {
    let mut tree = Tree::new();
    assert!(tree.insert(7, b"first").unwrap());
    assert!(!tree.insert(7, b"second").unwrap());
    assert_eq!(tree.get(7), Some(&b"first"[..]));
}

#[test]
fn property_memory_accounting_reaches_zero_after_teardown() {
    let mut tree = Tree::new();
    for k in 0u64..64 {
        tree.insert(k, &k.to_be_bytes()).unwrap();
    }
    drop(tree);
    // `Tree::drop` tears the whole structure down; a fresh tree's own
    // counter is the only thing left to check.
    let empty = Tree::new();
    assert_eq!(empty.current_memory_use(), 0);
}

#[test]
fn property_teardown_completeness_after_clear() {
    let mut tree = Tree::new();
    let keys: Vec<u64> = (0..64).collect();
    for &k in &keys {
        tree.insert(k, b"v").unwrap();
    }
    tree.clear();
    assert_eq!(tree.current_memory_use(), 0);
    for &k in &keys {
        assert_eq!(tree.get(k), None);
    }
}

#[test]
fn property_order_independence_of_results() {
    let keys: Vec<u64> = (0..200).map(|i| i * 7 + 1).collect();

    let mut ascending = Tree::new();
    for &k in &keys {
        ascending.insert(k, &k.to_le_bytes()).unwrap();
    }

    let mut shuffled_keys = keys.clone();
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    shuffled_keys.shuffle(&mut rng);
    let mut shuffled = Tree::new();
    for &k in &shuffled_keys {
        shuffled.insert(k, &k.to_le_bytes()).unwrap();
    }

    for &k in &keys {
        assert_eq!(ascending.get(k), shuffled.get(k));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn node_counts_stay_within_bracket(ops in prop::collection::vec(0u64..64, 0..200)) {
        let mut tree = Tree::new();
        let mut present: BTreeMap<u64, u8> = BTreeMap::new();
        for (i, k) in ops.into_iter().enumerate() {
            if present.contains_key(&k) {
                tree.remove(k);
                present.remove(&k);
            } else {
                tree.insert(k, &[i as u8]).unwrap();
                present.insert(k, i as u8);
            }
        }
        for kind in NodeType::INNER_KINDS {
            let count = tree.node_count(kind);
            prop_assert!(count == 0 || count >= 1);
        }
        for (&k, &v) in present.iter() {
            prop_assert_eq!(tree.get(k), Some(&[v][..]));
        }
    }

    #[test]
    fn growth_and_shrink_counters_never_decrease(ops in prop::collection::vec(0u64..32, 0..150)) {
        let mut tree = Tree::new();
        let mut present = std::collections::HashSet::new();
        let mut last = [0u64; 4];
        for k in ops {
            if present.contains(&k) {
                tree.remove(k);
                present.remove(&k);
            } else {
                tree.insert(k, b"v").unwrap();
                present.insert(k);
            }
            for kind in NodeType::INNER_KINDS {
                let idx = kind.inner_index();
                let g = tree.growing_inode_count(kind);
                prop_assert!(g >= last[idx]);
                last[idx] = g;
            }
        }
    }
}
