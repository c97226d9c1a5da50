//! Bucket table engine.
//!
//! Owns the bucket array, the node arena and the counters. Callers hand
//! in a precomputed spread hash; the table never hashes keys itself, so
//! growth and bin conversion never call back into user `Hash` code.

use crate::config::{MapConfig, DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY};
use crate::hashing::{capacity_for_len, index_for, table_size_for, threshold_for};
use crate::node::{BinKind, Bucket, Node, NodeId, Nodes};
use crate::tree_bin::{self, KeyCmp, Slot};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::mem;
use slotmap::SlotMap;

/// Result of [`RawTable::put`].
pub(crate) enum Put<V> {
    /// A new node was linked.
    Inserted(NodeId),
    /// The key was present and its value was overwritten; holds the old value.
    Replaced(NodeId, V),
    /// The key was present and left alone; holds the rejected value.
    Kept(NodeId, V),
}

#[derive(Clone)]
pub(crate) struct RawTable<K, V> {
    pub(crate) buckets: Vec<Bucket>,
    pub(crate) nodes: Nodes<K, V>,
    /// Next size at which to grow. Before the first allocation this holds
    /// the capacity to allocate, zero meaning the default.
    threshold: usize,
    mod_count: u64,
    next_seq: u64,
    config: MapConfig,
    key_cmp: Option<KeyCmp<K>>,
    /// Growth stops at this bucket count; `MAXIMUM_CAPACITY` outside tests.
    max_capacity: usize,
}

impl<K, V> RawTable<K, V> {
    /// `config` must already be validated.
    pub(crate) fn new(config: MapConfig) -> Self {
        let threshold = config.initial_capacity_hint().map_or(0, table_size_for);
        Self {
            buckets: Vec::new(),
            nodes: SlotMap::with_key(),
            threshold,
            mod_count: 0,
            next_seq: 0,
            config,
            key_cmp: None,
            max_capacity: MAXIMUM_CAPACITY,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn mod_count(&self) -> u64 {
        self.mod_count
    }

    pub(crate) fn load_factor(&self) -> f32 {
        self.config.get_load_factor()
    }

    pub(crate) fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Bucket count, or the count the first allocation will use.
    pub(crate) fn capacity(&self) -> usize {
        if !self.buckets.is_empty() {
            self.buckets.len()
        } else if self.threshold > 0 {
            self.threshold
        } else {
            DEFAULT_INITIAL_CAPACITY
        }
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.nodes[id]
    }

    pub(crate) fn has_key_cmp(&self) -> bool {
        self.key_cmp.is_some()
    }

    /// Install the comparator for equal-hash keys and rebuild every tree
    /// bin under the new order. A rebuild reorders the bin's chain, so it
    /// counts as a structural modification.
    pub(crate) fn set_key_cmp(&mut self, cmp: Option<KeyCmp<K>>) {
        self.key_cmp = cmp;
        let mut rebuilt = false;
        for index in 0..self.buckets.len() {
            if let Bucket::Tree(first) = self.buckets[index] {
                let head = tree_bin::untreeify(&mut self.nodes, first);
                self.buckets[index] = Bucket::Chain(head);
                self.treeify_chain(index, head);
                rebuilt = true;
            }
        }
        if rebuilt {
            self.mod_count += 1;
        }
    }

    /// Locate the node for `key` in the bucket selected by `hash`.
    pub(crate) fn find<Q>(&self, hash: u32, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.find_by(hash, key, None)
    }

    /// [`RawTable::find`] for an owned key: tree bins are descended by the
    /// installed comparator, if any.
    pub(crate) fn find_key(&self, hash: u32, key: &K) -> Option<NodeId>
    where
        K: Eq,
    {
        match self.key_cmp {
            Some(cmp) => {
                let rank = move |pk: &K| cmp(key, pk);
                self.find_by(hash, key, Some(&rank))
            }
            None => self.find(hash, key),
        }
    }

    /// Locate `key`, ranking it against stored keys with `order` inside
    /// tree bins. `order` must agree with the installed comparator.
    pub(crate) fn find_by<Q>(
        &self,
        hash: u32,
        key: &Q,
        order: Option<&dyn Fn(&K) -> Ordering>,
    ) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if self.buckets.is_empty() {
            return None;
        }
        let bucket = self.buckets[index_for(hash, self.buckets.len())];
        let first = bucket.head()?;
        let n = &self.nodes[first];
        if n.hash == hash && n.key.borrow() == key {
            return Some(first);
        }
        match bucket {
            Bucket::Tree(first) => {
                let root = tree_bin::root_of(&self.nodes, first);
                tree_bin::find(&self.nodes, root, hash, key, order)
            }
            _ => {
                let mut e = n.next;
                while let Some(id) = e {
                    let n = &self.nodes[id];
                    if n.hash == hash && n.key.borrow() == key {
                        return Some(id);
                    }
                    e = n.next;
                }
                None
            }
        }
    }

    /// Kind of the bin `hash` selects, `None` while it is empty.
    pub(crate) fn bin_kind(&self, hash: u32) -> Option<BinKind> {
        if self.buckets.is_empty() {
            return None;
        }
        match self.buckets[index_for(hash, self.buckets.len())] {
            Bucket::Empty => None,
            Bucket::Chain(_) => Some(BinKind::Chain),
            Bucket::Tree(_) => Some(BinKind::Tree),
        }
    }

    /// First node of the bin `hash` selects.
    pub(crate) fn bin_head(&self, hash: u32) -> Option<NodeId> {
        if self.buckets.is_empty() {
            return None;
        }
        self.buckets[index_for(hash, self.buckets.len())].head()
    }

    fn new_node(&mut self, hash: u32, key: K, value: V) -> NodeId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.insert(Node::new(hash, seq, key, value))
    }

    /// Grow until `len` entries fit without crossing the threshold.
    /// Before the first allocation this only raises the capacity to
    /// allocate.
    pub(crate) fn reserve_for_len(&mut self, len: usize) {
        if self.buckets.is_empty() {
            let target = capacity_for_len(len, self.load_factor());
            if target > self.threshold {
                self.threshold = target;
            }
        } else {
            while len > self.threshold && self.buckets.len() < self.max_capacity {
                self.resize();
            }
        }
    }

    /// Allocate, or double, the bucket array and move every bin into it.
    ///
    /// Doubling only ever keeps a node at its index or moves it up by
    /// exactly the old capacity, so each bin is partitioned in one pass on
    /// the bit `old_cap` without recomputing any index.
    pub(crate) fn resize(&mut self) {
        let old_cap = self.buckets.len();
        let new_cap = if old_cap > 0 {
            if old_cap >= self.max_capacity {
                tracing::debug!(capacity = old_cap, "table at maximum capacity, growth refused");
                self.threshold = usize::MAX;
                return;
            }
            old_cap << 1
        } else if self.threshold > 0 {
            self.threshold.min(self.max_capacity)
        } else {
            DEFAULT_INITIAL_CAPACITY.min(self.max_capacity)
        };
        self.threshold = threshold_for(new_cap, self.load_factor());
        tracing::trace!(old_cap, new_cap, len = self.len(), threshold = self.threshold, "resize");

        let old = mem::replace(&mut self.buckets, vec![Bucket::Empty; new_cap]);
        if old_cap > 0 {
            self.mod_count += 1;
        }
        for (j, bucket) in old.into_iter().enumerate() {
            match bucket {
                Bucket::Empty => {}
                Bucket::Chain(head) if self.nodes[head].next.is_none() => {
                    self.buckets[index_for(self.nodes[head].hash, new_cap)] = Bucket::Chain(head);
                }
                Bucket::Chain(head) => self.split_chain(head, j, old_cap),
                Bucket::Tree(first) => tree_bin::split(
                    &mut self.nodes,
                    &mut self.buckets,
                    first,
                    j,
                    old_cap,
                    self.config.untreeify_threshold(),
                    self.key_cmp,
                ),
            }
        }
    }

    /// Partition a plain chain into the nodes staying at `index` and the
    /// nodes moving to `index + bit`, keeping relative order.
    fn split_chain(&mut self, head: NodeId, index: usize, bit: usize) {
        let (mut lo_head, mut lo_tail): (Option<NodeId>, Option<NodeId>) = (None, None);
        let (mut hi_head, mut hi_tail): (Option<NodeId>, Option<NodeId>) = (None, None);
        let mut e = Some(head);
        while let Some(id) = e {
            e = self.nodes[id].next;
            if self.nodes[id].hash as usize & bit == 0 {
                match lo_tail {
                    None => lo_head = Some(id),
                    Some(t) => self.nodes[t].next = Some(id),
                }
                lo_tail = Some(id);
            } else {
                match hi_tail {
                    None => hi_head = Some(id),
                    Some(t) => self.nodes[t].next = Some(id),
                }
                hi_tail = Some(id);
            }
        }
        if let (Some(h), Some(t)) = (lo_head, lo_tail) {
            self.nodes[t].next = None;
            self.buckets[index] = Bucket::Chain(h);
        }
        if let (Some(h), Some(t)) = (hi_head, hi_tail) {
            self.nodes[t].next = None;
            self.buckets[index + bit] = Bucket::Chain(h);
        }
    }

    /// Convert the overfull chain `hash` selects into a tree bin, or grow
    /// instead while the table is below the minimum treeify capacity.
    fn treeify_bin(&mut self, hash: u32) {
        let n = self.buckets.len();
        if n < self.config.get_min_treeify_capacity() {
            self.resize();
            return;
        }
        let index = index_for(hash, n);
        if let Bucket::Chain(head) = self.buckets[index] {
            self.treeify_chain(index, head);
            self.mod_count += 1;
        }
    }

    fn treeify_chain(&mut self, index: usize, head: NodeId) {
        let mut prev = None;
        let mut e = Some(head);
        while let Some(id) = e {
            self.nodes[id].prev = prev;
            prev = Some(id);
            e = self.nodes[id].next;
        }
        tracing::trace!(index, "treeify bin");
        self.buckets[index] = Bucket::Tree(head);
        tree_bin::treeify(&mut self.nodes, &mut self.buckets, head, self.key_cmp);
    }

    /// Remove `id` from whatever bin holds it and free it. With `movable`
    /// unset, a tree bin's root is not moved to the front, which keeps the
    /// chain order a cursor is walking.
    pub(crate) fn remove_by_id(&mut self, id: NodeId, movable: bool) -> Option<(K, V)> {
        if self.buckets.is_empty() {
            return None;
        }
        let index = index_for(self.nodes.get(id)?.hash, self.buckets.len());
        match self.buckets[index] {
            Bucket::Empty => return None,
            Bucket::Tree(_) => tree_bin::remove(
                &mut self.nodes,
                &mut self.buckets,
                id,
                movable,
                self.config.untreeify_threshold(),
            ),
            Bucket::Chain(head) if head == id => {
                self.buckets[index] = match self.nodes[id].next {
                    Some(next) => Bucket::Chain(next),
                    None => Bucket::Empty,
                };
            }
            Bucket::Chain(head) => {
                let mut p = head;
                loop {
                    match self.nodes[p].next {
                        Some(n) if n == id => {
                            self.nodes[p].next = self.nodes[id].next;
                            break;
                        }
                        Some(n) => p = n,
                        None => return None,
                    }
                }
            }
        }
        self.mod_count += 1;
        let node = self.nodes.remove(id)?;
        Some((node.key, node.value))
    }

    /// Remove `id` if `matches` accepts its value.
    pub(crate) fn remove_if<F>(&mut self, id: NodeId, matches: F) -> Option<(K, V)>
    where
        F: FnOnce(&V) -> bool,
    {
        if !matches(&self.nodes.get(id)?.value) {
            return None;
        }
        self.remove_by_id(id, true)
    }

    pub(crate) fn clear(&mut self) {
        self.mod_count += 1;
        self.nodes.clear();
        self.buckets.fill(Bucket::Empty);
    }

    /// Empty the table and hand its nodes to the caller. The table is
    /// empty and consistent as soon as this returns, whatever becomes of
    /// the iterator.
    pub(crate) fn drain(&mut self) -> slotmap::basic::IntoIter<NodeId, Node<K, V>> {
        self.mod_count += 1;
        self.buckets.fill(Bucket::Empty);
        mem::replace(&mut self.nodes, SlotMap::with_key()).into_iter()
    }

    /// Collect the ids `keep` rejects, then unlink them.
    pub(crate) fn rejected_ids<F>(&mut self, mut keep: F) -> Vec<NodeId>
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.nodes
            .iter_mut()
            .filter_map(|(id, n)| (!keep(&n.key, &mut n.value)).then_some(id))
            .collect()
    }
}

impl<K: Eq, V> RawTable<K, V> {
    /// Insert `key` under `hash`. With `only_if_absent` an existing value
    /// is kept and the new one handed back.
    pub(crate) fn put(&mut self, hash: u32, key: K, value: V, only_if_absent: bool) -> Put<V> {
        if self.buckets.is_empty() {
            self.resize();
        }
        let n = self.buckets.len();
        let index = index_for(hash, n);
        let existing = match self.buckets[index] {
            Bucket::Empty => {
                let id = self.new_node(hash, key, value);
                self.buckets[index] = Bucket::Chain(id);
                return self.after_insert(id);
            }
            Bucket::Chain(head) => {
                let mut p = head;
                let mut count = 1usize;
                let found = loop {
                    let node = &self.nodes[p];
                    if node.hash == hash && node.key == key {
                        break Some(p);
                    }
                    match node.next {
                        Some(next) => {
                            p = next;
                            count += 1;
                        }
                        None => break None,
                    }
                };
                match found {
                    Some(id) => id,
                    None => {
                        let id = self.new_node(hash, key, value);
                        self.nodes[p].next = Some(id);
                        if count + 1 >= self.config.treeify_threshold() {
                            self.treeify_bin(hash);
                        }
                        return self.after_insert(id);
                    }
                }
            }
            Bucket::Tree(first) => {
                let root = tree_bin::root_of(&self.nodes, first);
                match tree_bin::find_slot(&self.nodes, root, hash, &key, self.key_cmp, self.next_seq) {
                    Slot::Occupied(id) => id,
                    Slot::Vacant { parent, left } => {
                        let id = self.new_node(hash, key, value);
                        tree_bin::link(&mut self.nodes, &mut self.buckets, root, parent, left, id);
                        return self.after_insert(id);
                    }
                }
            }
        };
        if only_if_absent {
            Put::Kept(existing, value)
        } else {
            let old = mem::replace(&mut self.nodes[existing].value, value);
            Put::Replaced(existing, old)
        }
    }

    fn after_insert(&mut self, id: NodeId) -> Put<V> {
        self.mod_count += 1;
        if self.len() > self.threshold {
            self.resize();
        }
        Put::Inserted(id)
    }
}

#[cfg(test)]
impl<K, V> RawTable<K, V> {
    /// Exhaustive structural check used by tests.
    pub(crate) fn assert_consistent(&self) {
        use crate::tree_bin::tests::{black_height, in_order};
        use std::collections::HashSet;

        let cap = self.buckets.len();
        if cap == 0 {
            assert_eq!(self.len(), 0);
            return;
        }
        assert!(cap.is_power_of_two(), "capacity {cap} is not a power of two");
        assert!(cap <= MAXIMUM_CAPACITY);
        assert!(
            self.len() <= self.threshold,
            "len {} above threshold {}",
            self.len(),
            self.threshold
        );

        let mut seen = HashSet::new();
        for (index, bucket) in self.buckets.iter().enumerate() {
            let mut chain = Vec::new();
            let mut e = bucket.head();
            while let Some(id) = e {
                assert!(seen.insert(id), "node reachable twice");
                assert_eq!(index_for(self.nodes[id].hash, cap), index, "node in wrong bucket");
                chain.push(id);
                e = self.nodes[id].next;
            }
            if let Bucket::Tree(first) = bucket {
                let root = tree_bin::root_of(&self.nodes, *first);
                assert!(!self.nodes[root].red, "tree root must be black");
                assert!(tree_bin::check_invariants(&self.nodes, root));
                assert!(black_height(&self.nodes, Some(root)).is_some());
                let mut ordered = Vec::new();
                in_order(&self.nodes, Some(root), &mut ordered);
                let mut sorted_chain = chain.clone();
                sorted_chain.sort();
                ordered.sort();
                assert_eq!(sorted_chain, ordered, "tree and chain disagree");
                assert!(self.nodes[*first].prev.is_none());
            } else {
                for &id in &chain {
                    let n = &self.nodes[id];
                    assert!(n.parent.is_none() && n.left.is_none() && n.right.is_none());
                }
            }
        }
        assert_eq!(seen.len(), self.len(), "unreachable nodes in arena");
    }

    /// Table whose growth stops at `max_capacity` buckets.
    pub(crate) fn with_max_capacity(config: MapConfig, max_capacity: usize) -> Self {
        debug_assert!(max_capacity.is_power_of_two());
        Self {
            max_capacity,
            ..Self::new(config)
        }
    }

    pub(crate) fn tree_root_is_head(&self) -> bool {
        self.buckets.iter().all(|b| match b {
            Bucket::Tree(first) => self.nodes[*first].parent.is_none(),
            _ => true,
        })
    }
}
