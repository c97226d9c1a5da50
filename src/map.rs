//! TreeBinMap: the public mapping surface over the bucket table engine.

use crate::config::MapConfig;
use crate::error::ConfigError;
use crate::hashing::spread;
use crate::hooks::{NoHooks, NodeHooks};
use crate::iter::{BinEntries, Cursor, Drain, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::node::{BinKind, NodeId};
use crate::ordered::OrderedTreeBinMap;
use crate::table::{Put, RawTable};
use crate::tree_bin::KeyCmp;
use core::borrow::Borrow;
use core::marker::PhantomData;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops::Index;
use std::collections::hash_map::RandomState;

/// Hash map whose overfull buckets turn into red-black trees.
///
/// Lookups are O(1) on average and O(log n) in a bucket that has been
/// flooded with colliding hashes. Not internally synchronized.
#[derive(Clone)]
pub struct TreeBinMap<K, V, S = RandomState, H = NoHooks> {
    pub(crate) table: RawTable<K, V>,
    hasher: S,
    pub(crate) hooks: H,
}

impl<K, V> TreeBinMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Empty map whose first allocation holds `capacity` buckets, rounded
    /// up to a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }

    pub fn with_capacity_and_load_factor(
        capacity: usize,
        load_factor: f32,
    ) -> Result<Self, ConfigError> {
        Self::with_config(MapConfig::new().initial_capacity(capacity).load_factor(load_factor))
    }

    pub fn with_config(config: MapConfig) -> Result<Self, ConfigError> {
        Self::with_config_and_hasher(config, RandomState::new())
    }
}

impl<K, V, S> TreeBinMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: RawTable::new(MapConfig::default()),
            hasher,
            hooks: NoHooks,
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            table: RawTable::new(MapConfig::new().initial_capacity(capacity)),
            hasher,
            hooks: NoHooks,
        }
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table: RawTable::new(config),
            hasher,
            hooks: NoHooks,
        })
    }
}

impl<K, V, S, H> TreeBinMap<K, V, S, H> {
    /// Replace the hook strategy.
    pub fn with_hooks<H2: NodeHooks<K, V>>(self, hooks: H2) -> TreeBinMap<K, V, S, H2> {
        TreeBinMap {
            table: self.table,
            hasher: self.hasher,
            hooks,
        }
    }

    /// Order equal-hash keys in tree bins by `K`'s `Ord` instead of by
    /// insertion order alone. Existing tree bins are rebuilt, which counts
    /// as a structural modification.
    ///
    /// The returned map looks keys up by that order as well, so a bin
    /// flooded with one hash is still searched in O(log n).
    pub fn with_key_order(mut self) -> OrderedTreeBinMap<K, V, S, H>
    where
        K: Ord,
    {
        let cmp: KeyCmp<K> = K::cmp;
        self.table.set_key_cmp(Some(cmp));
        OrderedTreeBinMap::from_ordered(self)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Current bucket count, or the count the first insertion will
    /// allocate.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    pub fn config(&self) -> &MapConfig {
        self.table.config()
    }

    /// Number of structural modifications so far. Value overwrites do not
    /// count.
    pub fn modification_count(&self) -> u64 {
        self.table.mod_count()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Remove every entry, keeping the bucket array. Hooks are not fired.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Entries in bucket order, each bin in chain order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.table)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Mutable entries, in unspecified order.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.nodes.iter_mut(),
        }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Remove and yield every entry, in unspecified order. Hooks are not
    /// fired.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            inner: self.table.drain(),
            marker: PhantomData,
        }
    }

    /// Fail-fast cursor positioned before the first entry.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(&self.table)
    }
}

impl<K, V, S, H> TreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    #[inline]
    fn hash<Q>(&self, key: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        spread(&self.hasher, key)
    }

    #[inline]
    fn find<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find(self.hash(key), key)
    }

    /// Lookup by an owned key, using the key order when one is installed.
    #[inline]
    fn find_owned(&self, key: &K) -> Option<NodeId> {
        self.table.find_key(self.hash(key), key)
    }

    /// Lookup that descends tree bins by `Q`'s order. Only valid once the
    /// map orders its tree bins by `K: Ord`, which `Borrow` requires `Q`
    /// to agree with.
    pub(crate) fn find_ordered<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Ord,
    {
        debug_assert!(self.table.has_key_cmp());
        let rank = |k: &K| key.cmp(<K as Borrow<Q>>::borrow(k));
        self.table.find_by(self.hash(key), key, Some(&rank))
    }

    pub(crate) fn entry_at(&self, id: Option<NodeId>) -> Option<(&K, &V)> {
        id.map(|id| {
            let n = self.table.node(id);
            (&n.key, &n.value)
        })
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.entry_at(self.find(key)).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.entry_at(self.find(key))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).is_some()
    }

    pub fn contains_value(&self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.values().any(|v| v == value)
    }

    /// Shape of the bin `key` hashes to, `None` while it is empty.
    pub fn bin_kind<Q>(&self, key: &Q) -> Option<BinKind>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        self.table.bin_kind(self.hash(key))
    }

    /// Every entry sharing the bin `key` hashes to, in chain order.
    pub fn bin_entries<Q>(&self, key: &Q) -> BinEntries<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        BinEntries::new(&self.table, self.table.bin_head(self.hash(key)))
    }
}

impl<K, V, S, H> TreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher,
    H: NodeHooks<K, V>,
{
    pub(crate) fn put_val(
        &mut self,
        key: K,
        value: V,
        only_if_absent: bool,
        evict: bool,
    ) -> (NodeId, Option<V>) {
        let hash = self.hash(&key);
        match self.table.put(hash, key, value, only_if_absent) {
            Put::Inserted(id) => {
                let n = self.table.node(id);
                self.hooks.after_insert(&n.key, &n.value, evict);
                (id, None)
            }
            Put::Replaced(id, v) | Put::Kept(id, v) => {
                let n = self.table.node(id);
                self.hooks.after_access(&n.key, &n.value);
                (id, Some(v))
            }
        }
    }

    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<(K, V)> {
        let (k, v) = self.table.remove_by_id(id, true)?;
        self.hooks.after_remove(&k, &v);
        Some((k, v))
    }

    fn set_existing(&mut self, id: NodeId, value: V) -> &mut V {
        self.table.node_mut(id).value = value;
        let n = self.table.node(id);
        self.hooks.after_access(&n.key, &n.value);
        &mut self.table.node_mut(id).value
    }

    pub(crate) fn get_mut_at(&mut self, id: NodeId) -> &mut V {
        let n = self.table.node(id);
        self.hooks.after_access(&n.key, &n.value);
        &mut self.table.node_mut(id).value
    }

    pub(crate) fn remove_if_eq_at(&mut self, id: Option<NodeId>, value: &V) -> bool
    where
        V: PartialEq,
    {
        let Some(id) = id else { return false };
        match self.table.remove_if(id, |v| v == value) {
            Some((k, v)) => {
                self.hooks.after_remove(&k, &v);
                true
            }
            None => false,
        }
    }

    pub(crate) fn replace_at(&mut self, id: NodeId, value: V) -> V {
        let old = core::mem::replace(&mut self.table.node_mut(id).value, value);
        let n = self.table.node(id);
        self.hooks.after_access(&n.key, &n.value);
        old
    }

    pub(crate) fn replace_if_eq_at(&mut self, id: Option<NodeId>, current: &V, value: V) -> bool
    where
        V: PartialEq,
    {
        match id {
            Some(id) if self.table.node(id).value == *current => {
                self.set_existing(id, value);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn compute_if_present_at<F>(&mut self, id: NodeId, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let n = self.table.node(id);
        match f(&n.key, &n.value) {
            Some(value) => Some(self.set_existing(id, value)),
            None => {
                self.remove_node(id);
                None
            }
        }
    }

    /// Insert or overwrite; returns the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.put_val(key, value, false, true).1
    }

    /// Insert only if `key` is absent. When it is present the map is left
    /// alone and `value` is handed back.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> Option<V> {
        self.put_val(key, value, true, true).1
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(key)?;
        Some(self.get_mut_at(id))
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(key)?;
        self.remove_node(id)
    }

    /// Remove `key` only while it maps to `value`.
    pub fn remove_if_eq<Q>(&mut self, key: &Q, value: &V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        let id = self.find(key);
        self.remove_if_eq_at(id, value)
    }

    /// Overwrite the value of a present key; absent keys are not added.
    pub fn replace<Q>(&mut self, key: &Q, value: V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let id = self.find(key)?;
        Some(self.replace_at(id, value))
    }

    /// Overwrite the value of `key` only while it equals `current`.
    pub fn replace_if_eq<Q>(&mut self, key: &Q, current: &V, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        let id = self.find(key);
        self.replace_if_eq_at(id, current, value)
    }

    /// Value for `key`, computing and inserting one if absent. `f`
    /// returning `None` leaves the map unchanged.
    pub fn compute_if_absent<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K) -> Option<V>,
    {
        if let Some(id) = self.find_owned(&key) {
            return Some(self.get_mut_at(id));
        }
        let value = f(&key)?;
        let (id, _) = self.put_val(key, value, false, true);
        Some(&mut self.table.node_mut(id).value)
    }

    /// Recompute the value of a present key. `f` returning `None` removes
    /// the entry.
    pub fn compute_if_present<Q, F>(&mut self, key: &Q, f: F) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        F: FnOnce(&K, &V) -> Option<V>,
    {
        let id = self.find(key)?;
        self.compute_if_present_at(id, f)
    }

    /// Recompute the mapping for `key` from its current value, if any.
    /// `f` returning `None` removes the entry, or adds nothing when the
    /// key was absent.
    pub fn compute<F>(&mut self, key: K, f: F) -> Option<&mut V>
    where
        F: FnOnce(&K, Option<&V>) -> Option<V>,
    {
        match self.find_owned(&key) {
            Some(id) => {
                let n = self.table.node(id);
                match f(&n.key, Some(&n.value)) {
                    Some(value) => Some(self.set_existing(id, value)),
                    None => {
                        self.remove_node(id);
                        None
                    }
                }
            }
            None => {
                let value = f(&key, None)?;
                let (id, _) = self.put_val(key, value, false, true);
                Some(&mut self.table.node_mut(id).value)
            }
        }
    }

    /// Insert `value` if `key` is absent, otherwise combine the current
    /// value with it. `f` returning `None` removes the entry.
    pub fn merge<F>(&mut self, key: K, value: V, f: F) -> Option<&mut V>
    where
        F: FnOnce(&V, V) -> Option<V>,
    {
        match self.find_owned(&key) {
            Some(id) => match f(&self.table.node(id).value, value) {
                Some(merged) => Some(self.set_existing(id, merged)),
                None => {
                    self.remove_node(id);
                    None
                }
            },
            None => {
                let (id, _) = self.put_val(key, value, false, true);
                Some(&mut self.table.node_mut(id).value)
            }
        }
    }

    /// Keep only the entries `f` accepts.
    pub fn retain<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        for id in self.table.rejected_ids(f) {
            self.remove_node(id);
        }
    }

    /// Make room for `additional` more entries without growing.
    pub fn reserve(&mut self, additional: usize) {
        self.table
            .reserve_for_len(self.len().saturating_add(additional));
    }

    /// Insert every pair, sizing the table up front from the iterator's
    /// lower bound.
    pub(crate) fn put_all<I>(&mut self, iter: I, evict: bool)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let iter = iter.into_iter();
        self.table.reserve_for_len(iter.size_hint().0);
        for (k, v) in iter {
            self.put_val(k, v, false, evict);
        }
    }
}

impl<K, V, S, H> Default for TreeBinMap<K, V, S, H>
where
    S: Default,
    H: Default,
{
    fn default() -> Self {
        Self {
            table: RawTable::new(MapConfig::default()),
            hasher: S::default(),
            hooks: H::default(),
        }
    }
}

impl<K, V, S, H> fmt::Debug for TreeBinMap<K, V, S, H>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, H> PartialEq for TreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S, H> Eq for TreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S, H> Index<&Q> for TreeBinMap<K, V, S, H>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
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

impl<K, V, S, H> Extend<(K, V)> for TreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher,
    H: NodeHooks<K, V>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.put_all(iter, true);
    }
}

impl<K, V, S, H> FromIterator<(K, V)> for TreeBinMap<K, V, S, H>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    H: NodeHooks<K, V> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.put_all(iter, false);
        map
    }
}

impl<'a, K, V, S, H> IntoIterator for &'a TreeBinMap<K, V, S, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S, H> IntoIterator for &'a mut TreeBinMap<K, V, S, H> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<K, V, S, H> IntoIterator for TreeBinMap<K, V, S, H> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.nodes.into_iter(),
        }
    }
}

#[cfg(test)]
impl<K, V, S, H> TreeBinMap<K, V, S, H> {
    pub(crate) fn assert_consistent(&self) {
        self.table.assert_consistent();
    }
}
