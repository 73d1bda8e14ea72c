//! `Node16`: 5-16 children, parallel sorted `keys`/`children` arrays.
//!
//! The ART paper's `Node16` uses a 16-wide SIMD byte-equality compare to
//! find a child in one step. Per spec §4.4/§9, a sequential scan over the
//! live key slice is an accepted, externally-identical fallback, which is
//! what this crate uses: it keeps the hot path portable without depending
//! on a nightly `std::simd` feature the way the teacher crate does.

use super::InnerNode;
use crate::nodes::{Header, NodeType, OpaqueNodePtr};

/// Node that references between 5 and 16 children.
#[repr(C, align(8))]
#[derive(Debug)]
pub struct InnerNode16 {
    header: Header,
    keys: [u8; 16],
    children: [Option<OpaqueNodePtr>; 16],
}

impl InnerNode16 {
    fn empty(prefix: crate::nodes::KeyPrefix) -> Self {
        let mut header = Header::new(NodeType::Node16);
        header.prefix = prefix;
        InnerNode16 {
            header,
            keys: [0; 16],
            children: [None; 16],
        }
    }

    fn live(&self) -> usize {
        self.header.num_children() as usize
    }

    /// Raw pointer to the child slot for `key_byte`, if present.
    pub fn child_slot_mut(&mut self, key_byte: u8) -> Option<*mut Option<OpaqueNodePtr>> {
        let n = self.live();
        self.keys[..n]
            .iter()
            .position(|&k| k == key_byte)
            .map(|idx| &mut self.children[idx] as *mut _)
    }

    /// Build a `Node16` from a full `Node4` plus the new child that
    /// triggered promotion (spec §4.4: `N16::from(N4, new_leaf, depth)`).
    pub fn from_node4(src: &super::node4::InnerNode4, new_key_byte: u8, new_child: OpaqueNodePtr) -> Self {
        let mut node = InnerNode16::empty(src.header().prefix);
        for (byte, child) in src.iter_children() {
            node.add_child(byte, child);
        }
        node.add_child(new_key_byte, new_child);
        node
    }

    /// Build a `Node16` from a `Node48` that is dropping one child and
    /// shrinking (spec §4.4: `N16::from(N48, child_to_drop)`). Walking the
    /// 256-byte index in ascending order naturally yields sorted keys.
    pub fn from_node48(src: &super::node48::InnerNode48, drop_key_byte: u8) -> Self {
        let mut node = InnerNode16::empty(src.header().prefix);
        for (byte, child) in src.iter_children() {
            if byte == drop_key_byte {
                continue;
            }
            node.add_child(byte, child);
        }
        node
    }
}

impl InnerNode for InnerNode16 {
    const TYPE: NodeType = NodeType::Node16;

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn find_child(&self, key_byte: u8) -> Option<OpaqueNodePtr> {
        self.keys[..self.live()]
            .iter()
            .position(|&k| k == key_byte)
            .and_then(|idx| self.children[idx])
    }

    fn add_child(&mut self, key_byte: u8, child: OpaqueNodePtr) {
        let n = self.live();
        debug_assert!(n < 16, "Node16 is full");
        debug_assert!(
            !self.keys[..n].contains(&key_byte),
            "key byte already present"
        );
        let pos = self.keys[..n].iter().position(|&k| k > key_byte).unwrap_or(n);
        self.keys.copy_within(pos..n, pos + 1);
        self.children.copy_within(pos..n, pos + 1);
        self.keys[pos] = key_byte;
        self.children[pos] = Some(child);
        self.header.inc_num_children();
    }

    fn remove_child(&mut self, key_byte: u8) -> Option<OpaqueNodePtr> {
        let n = self.live();
        let pos = self.keys[..n].iter().position(|&k| k == key_byte)?;
        let removed = self.children[pos].take();
        self.keys.copy_within(pos + 1..n, pos);
        self.children.copy_within(pos + 1..n, pos);
        self.header.dec_num_children();
        removed
    }

    fn iter_children(&self) -> Box<dyn Iterator<Item = (u8, OpaqueNodePtr)> + '_> {
        let n = self.live();
        Box::new(
            self.keys[..n]
                .iter()
                .copied()
                .zip(self.children[..n].iter().copied().map(|c| c.unwrap())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::inner::node4::InnerNode4;
    use crate::nodes::prefix::KeyPrefix;

    fn dummy_child(tag: u8) -> OpaqueNodePtr {
        use std::ptr::NonNull;
        let addr = (crate::tagged_pointer::ALIGNMENT * (tag as usize + 1)) as *mut u8;
        OpaqueNodePtr::new(NonNull::new(addr).unwrap(), NodeType::Leaf)
    }

    #[test]
    fn from_node4_includes_new_child_sorted() {
        let mut n4 = InnerNode4::new(KeyPrefix::default());
        n4.add_child(1, dummy_child(1));
        n4.add_child(2, dummy_child(2));
        n4.add_child(3, dummy_child(3));
        n4.add_child(4, dummy_child(4));
        let n16 = InnerNode16::from_node4(&n4, 0, dummy_child(0));
        let keys: Vec<u8> = n16.iter_children().map(|(b, _)| b).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
        assert_eq!(n16.header().num_children(), 5);
    }
}
