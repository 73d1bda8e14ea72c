//! `Node256`: 49-256 children, direct byte-indexed child array. Terminal
//! size — `Node256` never promotes further.

use super::InnerNode;
use crate::nodes::{Header, NodeType, OpaqueNodePtr};

/// Node that references between 49 and 256 children.
#[repr(C, align(8))]
#[derive(Debug)]
pub struct InnerNode256 {
    header: Header,
    children: [Option<OpaqueNodePtr>; 256],
}

impl InnerNode256 {
    fn empty(prefix: crate::nodes::KeyPrefix) -> Self {
        let mut header = Header::new(NodeType::Node256);
        header.prefix = prefix;
        InnerNode256 {
            header,
            children: [None; 256],
        }
    }

    /// Build a `Node256` from a full `Node48` plus the new child that
    /// triggered promotion (spec §4.4: `N256::from(N48, new_leaf, depth)`).
    pub fn from_node48(src: &super::node48::InnerNode48, new_key_byte: u8, new_child: OpaqueNodePtr) -> Self {
        let mut node = InnerNode256::empty(src.header().prefix);
        for (byte, child) in src.iter_children() {
            node.add_child(byte, child);
        }
        node.add_child(new_key_byte, new_child);
        node
    }

    /// Raw pointer to the child slot for `key_byte`, if present.
    pub fn child_slot_mut(&mut self, key_byte: u8) -> Option<*mut Option<OpaqueNodePtr>> {
        if self.children[key_byte as usize].is_some() {
            Some(&mut self.children[key_byte as usize] as *mut _)
        } else {
            None
        }
    }
}

impl InnerNode for InnerNode256 {
    const TYPE: NodeType = NodeType::Node256;

    fn header(&self) -> &Header {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn find_child(&self, key_byte: u8) -> Option<OpaqueNodePtr> {
        self.children[key_byte as usize]
    }

    fn add_child(&mut self, key_byte: u8, child: OpaqueNodePtr) {
        debug_assert!(
            self.children[key_byte as usize].is_none(),
            "key byte already present"
        );
        self.children[key_byte as usize] = Some(child);
        self.header.inc_num_children();
    }

    fn remove_child(&mut self, key_byte: u8) -> Option<OpaqueNodePtr> {
        let removed = self.children[key_byte as usize].take();
        if removed.is_some() {
            self.header.dec_num_children();
        }
        removed
    }

    fn iter_children(&self) -> Box<dyn Iterator<Item = (u8, OpaqueNodePtr)> + '_> {
        Box::new(
            self.children
                .iter()
                .enumerate()
                .filter_map(|(byte, c)| c.map(|c| (byte as u8, c))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_child(tag: u8) -> OpaqueNodePtr {
        use std::ptr::NonNull;
        let addr = (crate::tagged_pointer::ALIGNMENT * (tag as usize + 1)) as *mut u8;
        OpaqueNodePtr::new(NonNull::new(addr).unwrap(), NodeType::Leaf)
    }

    #[test]
    fn direct_index_find_and_remove() {
        let mut node = InnerNode256::empty(crate::nodes::prefix::KeyPrefix::default());
        node.add_child(200, dummy_child(200));
        assert!(node.find_child(200).is_some());
        node.remove_child(200);
        assert!(node.find_child(200).is_none());
        assert_eq!(node.header().num_children(), 0);
    }
}
