//! Iterators and the fail-fast cursor.
//!
//! Borrowing iterators walk the bucket array in index order and each bin
//! along its chain, which is the order a chain keeps across treeify,
//! untreeify and split. Mutable and owning iterators walk the arena
//! directly; their order is unspecified.

use crate::error::CursorError;
use crate::hooks::NodeHooks;
use crate::map::TreeBinMap;
use crate::node::{Bucket, Node, NodeId, Nodes};
use crate::table::RawTable;
use core::iter::FusedIterator;
use core::marker::PhantomData;

/// Entries of a map, in bucket order.
pub struct Iter<'a, K, V> {
    nodes: &'a Nodes<K, V>,
    buckets: &'a [Bucket],
    index: usize,
    next: Option<NodeId>,
    remaining: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>) -> Self {
        Self {
            nodes: &table.nodes,
            buckets: &table.buckets,
            index: 0,
            next: None,
            remaining: table.len(),
        }
    }
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes,
            buckets: self.buckets,
            index: self.index,
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.next {
                let n = &self.nodes[id];
                self.next = n.next;
                self.remaining -= 1;
                return Some((&n.key, &n.value));
            }
            let bucket = self.buckets.get(self.index)?;
            self.index += 1;
            self.next = bucket.head();
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

/// Entries of a single bin, in chain order.
pub struct BinEntries<'a, K, V> {
    nodes: &'a Nodes<K, V>,
    next: Option<NodeId>,
}

impl<'a, K, V> BinEntries<'a, K, V> {
    pub(crate) fn new(table: &'a RawTable<K, V>, head: Option<NodeId>) -> Self {
        Self {
            nodes: &table.nodes,
            next: head,
        }
    }
}

impl<'a, K, V> Iterator for BinEntries<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let n = &self.nodes[self.next?];
        self.next = n.next;
        Some((&n.key, &n.value))
    }
}

impl<K, V> FusedIterator for BinEntries<'_, K, V> {}

/// Mutable entries, in arena order.
pub struct IterMut<'a, K, V> {
    pub(crate) inner: slotmap::basic::IterMut<'a, NodeId, Node<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, n)| (&n.key, &mut n.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct ValuesMut<'a, K, V> {
    pub(crate) inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Owned entries, in arena order.
pub struct IntoIter<K, V> {
    pub(crate) inner: slotmap::basic::IntoIter<NodeId, Node<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next().map(|(_, n)| (n.key, n.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Entries removed by [`TreeBinMap::drain`]. The map is already empty
/// when this is created; whatever is not consumed is dropped along with
/// the iterator, or leaked with it.
pub struct Drain<'a, K, V> {
    pub(crate) inner: slotmap::basic::IntoIter<NodeId, Node<K, V>>,
    pub(crate) marker: PhantomData<&'a mut ()>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next().map(|(_, n)| (n.key, n.value))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Detached, fail-fast position in a map's bucket order.
///
/// The cursor borrows nothing between steps; each call takes the map it
/// was created from. Any structural change made to the map other than
/// through [`Cursor::remove`] is reported as
/// [`CursorError::ConcurrentModification`] on the next call. Detection is
/// best-effort: it relies on the map's modification count.
#[derive(Clone, Debug)]
pub struct Cursor {
    expected: u64,
    index: usize,
    next: Option<NodeId>,
    current: Option<NodeId>,
}

impl Cursor {
    pub(crate) fn new<K, V>(table: &RawTable<K, V>) -> Self {
        let mut cursor = Self {
            expected: table.mod_count(),
            index: 0,
            next: None,
            current: None,
        };
        cursor.advance_bucket(&table.buckets);
        cursor
    }

    fn advance_bucket(&mut self, buckets: &[Bucket]) {
        while self.next.is_none() && self.index < buckets.len() {
            self.next = buckets[self.index].head();
            self.index += 1;
        }
    }

    fn check<K, V>(&self, table: &RawTable<K, V>) -> Result<(), CursorError> {
        if table.mod_count() != self.expected {
            return Err(CursorError::ConcurrentModification);
        }
        Ok(())
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Step to the next entry.
    pub fn next<'m, K, V, S, H>(
        &mut self,
        map: &'m TreeBinMap<K, V, S, H>,
    ) -> Result<Option<(&'m K, &'m V)>, CursorError> {
        let table = &map.table;
        self.check(table)?;
        let Some(id) = self.next else {
            return Ok(None);
        };
        let n = table
            .nodes
            .get(id)
            .ok_or(CursorError::ConcurrentModification)?;
        self.current = Some(id);
        self.next = n.next;
        self.advance_bucket(&table.buckets);
        Ok(Some((&n.key, &n.value)))
    }

    /// Remove the entry last returned by [`Cursor::next`]. The traversal
    /// order of the remaining entries is not disturbed.
    pub fn remove<K, V, S, H>(
        &mut self,
        map: &mut TreeBinMap<K, V, S, H>,
    ) -> Result<(K, V), CursorError>
    where
        H: NodeHooks<K, V>,
    {
        let id = self.current.ok_or(CursorError::NoCurrentEntry)?;
        self.check(&map.table)?;
        self.current = None;
        let (k, v) = map
            .table
            .remove_by_id(id, false)
            .ok_or(CursorError::ConcurrentModification)?;
        map.hooks.after_remove(&k, &v);
        self.expected = map.table.mod_count();
        Ok((k, v))
    }
}

#[cfg(test)]
mod tests {
    use crate::{BinKind, TreeBinMap};
    use core::hash::{BuildHasher, Hasher};

    #[derive(Clone, Default)]
    struct ConstBuildHasher;

    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> ConstHasher {
            ConstHasher
        }
    }

    struct ConstHasher;

    impl Hasher for ConstHasher {
        fn finish(&self) -> u64 {
            0
        }
        fn write(&mut self, _bytes: &[u8]) {}
    }

    /// Invariant: cursor removal inside a tree bin keeps the walk order
    /// of the remaining entries, even though the root is not moved.
    #[test]
    fn cursor_remove_in_tree_bin_keeps_order() {
        let mut m = TreeBinMap::with_capacity_and_hasher(64, ConstBuildHasher);
        for k in 0..12u32 {
            m.insert(k, k);
        }
        assert_eq!(m.bin_kind(&0), Some(BinKind::Tree));
        let order: Vec<u32> = m.keys().copied().collect();

        let mut cur = m.cursor();
        let mut seen = Vec::new();
        while let Some((&k, _)) = cur.next(&m).unwrap() {
            seen.push(k);
            if k % 3 == 0 {
                cur.remove(&mut m).unwrap();
            }
            m.assert_consistent();
        }
        assert_eq!(seen, order);
        let expected: Vec<u32> = order.iter().copied().filter(|k| k % 3 != 0).collect();
        let left: Vec<u32> = m.keys().copied().collect();
        assert_eq!(left, expected);
    }

    /// Invariant: a tree bin left with a root that is not the bucket head
    /// is still searchable.
    #[test]
    fn lookups_after_unmoved_root() {
        let mut m = TreeBinMap::with_capacity_and_hasher(64, ConstBuildHasher);
        for k in 0..10u32 {
            m.insert(k, k * 10);
        }
        let mut cur = m.cursor();
        let (&first, _) = cur.next(&m).unwrap().unwrap();
        cur.remove(&mut m).unwrap();
        for k in (0..10u32).filter(|&k| k != first) {
            assert_eq!(m.get(&k), Some(&(k * 10)));
        }
        assert_eq!(m.get(&first), None);
        m.insert(first, 1);
        assert_eq!(m.get(&first), Some(&1));
        m.assert_consistent();
    }
}
