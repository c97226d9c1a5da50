//! Arena node shared by chain bins and tree bins.
//!
//! Every entry is one `Node` in a `SlotMap`. A node carries both sets of
//! links at all times: `next` threads the bin's chain in enumeration
//! order, while `prev`/`parent`/`left`/`right`/`red` are only meaningful
//! while the node sits in a tree bin. Converting between the two
//! representations rewrites links in place, so a node keeps its `NodeId`
//! for its whole life in the map.

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable identity of an entry inside one map.
    pub(crate) struct NodeId;
}

pub(crate) type Nodes<K, V> = SlotMap<NodeId, Node<K, V>>;

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) hash: u32,
    /// Creation order token; orders equal-hash keys nothing else can order.
    pub(crate) seq: u64,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) red: bool,
}

impl<K, V> Node<K, V> {
    /// A fresh node, not yet linked into any bin.
    pub(crate) fn new(hash: u32, seq: u64, key: K, value: V) -> Self {
        Self {
            hash,
            seq,
            key,
            value,
            next: None,
            prev: None,
            parent: None,
            left: None,
            right: None,
            red: false,
        }
    }

    /// Drop the tree linkage, leaving only the chain successor.
    #[inline]
    pub(crate) fn clear_tree_links(&mut self) {
        self.prev = None;
        self.parent = None;
        self.left = None;
        self.right = None;
        self.red = false;
    }
}

/// Head of one bucket. The variant tells the engine which algorithm owns
/// the bin, so dispatch is a `match` instead of a node-type test.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    /// Singly linked chain starting at the node.
    Chain(NodeId),
    /// Tree bin whose chain starts at the node. The node is also the tree
    /// root, except transiently after a cursor removal.
    Tree(NodeId),
}

impl Bucket {
    #[inline]
    pub(crate) fn head(self) -> Option<NodeId> {
        match self {
            Bucket::Empty => None,
            Bucket::Chain(h) | Bucket::Tree(h) => Some(h),
        }
    }
}

/// Shape of the bin a key maps to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinKind {
    Chain,
    Tree,
}

/// Number of nodes in the chain starting at `head`, counting no further
/// than `limit + 1`.
pub(crate) fn chain_len_capped<K, V>(nodes: &Nodes<K, V>, head: NodeId, limit: usize) -> usize {
    let mut count = 0;
    let mut e = Some(head);
    while let Some(id) = e {
        count += 1;
        if count > limit {
            break;
        }
        e = nodes[id].next;
    }
    count
}
