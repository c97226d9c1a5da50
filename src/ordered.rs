//! OrderedTreeBinMap: a TreeBinMap whose tree bins are ordered by `K: Ord`
//! and whose lookups use that order.
//!
//! A plain map can only compare a borrowed `&Q` with stored keys for
//! equality, so a lookup that meets two non-equal keys with the same hash
//! must search both subtrees. Here every lookup method requires `Q: Ord`
//! and descends one side per node, keeping a bin flooded with a single
//! hash at O(log n). `Borrow` requires `Q`'s order to agree with `K`'s.
//!
//! Everything that does not look a key up by reference is reached through
//! `Deref` to the underlying [`TreeBinMap`].

use crate::hooks::{NoHooks, NodeHooks};
use crate::iter::{IntoIter, Iter, IterMut};
use crate::map::TreeBinMap;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::{Deref, DerefMut, Index};
use std::collections::hash_map::RandomState;

/// [`TreeBinMap`] with key-ordered tree bins, built by
/// [`TreeBinMap::with_key_order`].
#[derive(Clone)]
pub struct OrderedTreeBinMap<K, V, S = RandomState, H = NoHooks> {
    inner: TreeBinMap<K, V, S, H>,
}

impl<K: Ord, V> OrderedTreeBinMap<K, V> {
    pub fn new() -> Self {
        TreeBinMap::new().with_key_order()
    }
}

impl<K, V, S, H> OrderedTreeBinMap<K, V, S, H> {
    /// `inner` must already carry the `K: Ord` comparator.
    pub(crate) fn from_ordered(inner: TreeBinMap<K, V, S, H>) -> Self {
        Self { inner }
    }

    /// Replace the hook strategy, keeping the key order.
    pub fn with_hooks<H2: NodeHooks<K, V>>(self, hooks: H2) -> OrderedTreeBinMap<K, V, S, H2> {
        OrderedTreeBinMap {
            inner: self.inner.with_hooks(hooks),
        }
    }

    /// The underlying map. Tree bins stay ordered, but its borrowed
    /// lookups no longer use the order.
    pub fn into_inner(self) -> TreeBinMap<K, V, S, H> {
        self.inner
    }
}

impl<K, V, S, H> Deref for OrderedTreeBinMap<K, V, S, H> {
    type Target = TreeBinMap<K, V, S, H>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<K, V, S, H> DerefMut for OrderedTreeBinMap<K, V, S, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<K, V, S, H> OrderedTreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.inner
            .entry_at(self.inner.find_ordered(key))
            .map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.inner.entry_at(self.inner.find_ordered(key))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.inner.find_ordered(key).is_some()
    }
}

impl<K, V, S, H> OrderedTreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher,
    H: NodeHooks<K, V>,
{
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let id = self.inner.find_ordered(key)?;
        Some(self.inner.get_mut_at(id))
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let id = self.inner.find_ordered(key)?;
        self.inner.remove_node(id)
    }

    /// Remove `key` only while it maps to `value`.
    pub fn remove_if_eq<Q>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
        V: PartialEq,
    {
        let id = self.inner.find_ordered(key);
        self.inner.remove_if_eq_at(id, value)
    }

    /// Overwrite the value of a present key; absent keys are not added.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        let id = self.inner.find_ordered(key)?;
        Some(self.inner.replace_at(id, value))
    }

    /// Overwrite the value of `key` only while it equals `current`.
    pub fn replace_if_eq<Q>(&mut self, key: &Q, current: &V, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
        V: PartialEq,
    {
        let id = self.inner.find_ordered(key);
        self.inner.replace_if_eq_at(id, current, value)
    }

    /// Recompute the value of a present key. `f` returning `None` removes
    /// the entry.
    pub fn compute_if_present<Q, F>(&mut self, key: &Q, f: F) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let id = self.inner.find_ordered(key)?;
        self.inner.compute_if_present_at(id, f)
    }
}

impl<K, V, S, H> Default for OrderedTreeBinMap<K, V, S, H>
where
    K: Ord,
    S: Default,
    H: Default,
{
    fn default() -> Self {
        TreeBinMap::default().with_key_order()
    }
}

impl<K, V, S, H> fmt::Debug for OrderedTreeBinMap<K, V, S, H>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<K, V, S, H> PartialEq for OrderedTreeBinMap<K, V, S, H>
where
    K: Ord + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, H> Eq for OrderedTreeBinMap<K, V, S, H>
where
    K: Ord + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S, H> Index<&Q> for OrderedTreeBinMap<K, V, S, H>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Ord + Hash,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => panic!("no entry found for key"),
        }
    }
}

impl<K, V, S, H> Extend<(K, V)> for OrderedTreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher,
    H: NodeHooks<K, V>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.inner.extend(iter);
    }
}

impl<K, V, S, H> FromIterator<(K, V)> for OrderedTreeBinMap<K, V, S, H>
where
    K: Ord + Hash,
    S: BuildHasher + Default,
    H: NodeHooks<K, V> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.inner.put_all(iter, false);
        map
    }
}

impl<'a, K, V, S, H> IntoIterator for &'a OrderedTreeBinMap<K, V, S, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<'a, K, V, S, H> IntoIterator for &'a mut OrderedTreeBinMap<K, V, S, H> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter_mut()
    }
}

impl<K, V, S, H> IntoIterator for OrderedTreeBinMap<K, V, S, H> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}
