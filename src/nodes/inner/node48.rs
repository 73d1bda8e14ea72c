//! `Node48`: 17-48 children, 256-byte byte-to-slot index + compact slot array.

use super::InnerNode;
use crate::nodes::{Header, NodeType, OpaqueNodePtr};

/// Sentinel marking an empty slot in [`InnerNode48::child_indices`].
pub const EMPTY: u8 = 0xFF;

/// Node that references between 17 and 48 children.
#[repr(C, align(8))]
#[derive(Debug)]
pub struct InnerNode48 {
    header: Header,
    child_indices: [u8; 256],
    children: [Option<OpaqueNodePtr>; 48],
}

impl InnerNode48 {
    fn empty(prefix: crate::nodes::KeyPrefix) -> Self {
        let mut header = Header::new(NodeType::Node48);
        header.prefix = prefix;
        InnerNode48 {
            header,
            child_indices: [EMPTY; 256],
            children: [None; 48],
        }
    }

    /// Build a `Node48` from a full `Node16` plus the new child that
    /// triggered promotion (spec §4.4: `N48::from(N16, new_leaf, depth)`).
    pub fn from_node16(src: &super::node16::InnerNode16, new_key_byte: u8, new_child: OpaqueNodePtr) -> Self {
        let mut node = InnerNode48::empty(src.header().prefix);
        for (byte, child) in src.iter_children() {
            node.add_child(byte, child);
        }
        node.add_child(new_key_byte, new_child);
        node
    }

    /// Build a `Node48` from a `Node256` that is dropping one child and
    /// shrinking (spec §4.4: `N48::from(N256, child_to_drop)`).
    pub fn from_node256(src: &super::node256::InnerNode256, drop_key_byte: u8) -> Self {
        let mut node = InnerNode48::empty(src.header().prefix);
        for (byte, child) in src.iter_children() {
            if byte == drop_key_byte {
                continue;
            }
            node.add_child(byte, child);
        }
        node
    }

    /// Raw pointer to the child slot for `key_byte`, if present.
    pub fn child_slot_mut(&mut self, key_byte: u8) -> Option<*mut Option<OpaqueNodePtr>> {
        let idx = self.child_indices[key_byte as usize];
        if idx == EMPTY {
            None
        } else {
            Some(&mut self.children[idx as usize] as *mut _)
        }
    }
}

impl InnerNode for InnerNode48 {
    const TYPE: NodeType = NodeType::Node48;

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn find_child(&self, key_byte: u8) -> Option<OpaqueNodePtr> {
        let idx = self.child_indices[key_byte as usize];
        if idx == EMPTY {
            None
        } else {
            self.children[idx as usize]
        }
    }

    fn add_child(&mut self, key_byte: u8, child: OpaqueNodePtr) {
        debug_assert_eq!(
            self.child_indices[key_byte as usize],
            EMPTY,
            "key byte already present"
        );
        let slot = self.children[..48]
            .iter()
            .position(|c| c.is_none())
            .expect("Node48 is full");
        self.children[slot] = Some(child);
        self.child_indices[key_byte as usize] = slot as u8;
        self.header.inc_num_children();
    }

    fn remove_child(&mut self, key_byte: u8) -> Option<OpaqueNodePtr> {
        let idx = self.child_indices[key_byte as usize];
        if idx == EMPTY {
            return None;
        }
        let removed = self.children[idx as usize].take();
        self.child_indices[key_byte as usize] = EMPTY;
        self.header.dec_num_children();
        removed
    }

    fn iter_children(&self) -> Box<dyn Iterator<Item = (u8, OpaqueNodePtr)> + '_> {
        Box::new(
            self.child_indices
                .iter()
                .enumerate()
                .filter(|(_, &idx)| idx != EMPTY)
                .map(|(byte, &idx)| (byte as u8, self.children[idx as usize].unwrap())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::inner::node16::InnerNode16;
    use crate::nodes::prefix::KeyPrefix;

    fn dummy_child(tag: u8) -> OpaqueNodePtr {
        use std::ptr::NonNull;
        let addr = (crate::tagged_pointer::ALIGNMENT * (tag as usize + 1)) as *mut u8;
        OpaqueNodePtr::new(NonNull::new(addr).unwrap(), NodeType::Leaf)
    }

    #[test]
    fn index_round_trips() {
        let mut n16 = InnerNode16::from_node4(
            &{
                let mut n4 = crate::nodes::inner::node4::InnerNode4::new(KeyPrefix::default());
                n4.add_child(1, dummy_child(1));
                n4.add_child(2, dummy_child(2));
                n4.add_child(3, dummy_child(3));
                n4
            },
            4,
            dummy_child(4),
        );
        // pad n16 to 16 entries
        for b in 5..16u8 {
            n16.add_child(b, dummy_child(b));
        }
        let n48 = InnerNode48::from_node16(&n16, 16, dummy_child(16));
        assert_eq!(n48.header().num_children(), 17);
        assert!(n48.find_child(1).is_some());
        assert!(n48.find_child(16).is_some());
        assert!(n48.find_child(200).is_none());
    }

    #[test]
    fn remove_frees_slot_and_marks_empty() {
        let mut node = InnerNode48::empty(KeyPrefix::default());
        node.add_child(10, dummy_child(10));
        node.add_child(20, dummy_child(20));
        node.remove_child(10);
        assert_eq!(node.child_indices[10], EMPTY);
        assert!(node.find_child(10).is_none());
        assert!(node.find_child(20).is_some());
    }
}
