//! Extension points fired by the map after entries are read, added or
//! removed.
//!
//! A layer that keeps its own ordering metadata (an access-ordered or
//! evicting cache, for example) implements [`NodeHooks`] and installs it
//! with [`crate::TreeBinMap::with_hooks`]. The hooks only observe; the
//! table's own algorithms are untouched.

/// Callbacks invoked by a [`crate::TreeBinMap`].
///
/// All methods default to no-ops.
pub trait NodeHooks<K, V> {
    /// An existing entry was read and kept: an insert that found the key,
    /// `get_mut`, or a `compute*`/`merge` that left the entry in place.
    fn after_access(&mut self, _key: &K, _value: &V) {}

    /// A new entry was linked. `evict` is false during bulk construction
    /// (`FromIterator`, deserialization), so eviction policies can hold
    /// off until the map is fully built.
    fn after_insert(&mut self, _key: &K, _value: &V, _evict: bool) {}

    /// An entry was unlinked. Not fired by `clear` or `drain`.
    fn after_remove(&mut self, _key: &K, _value: &V) {}
}

/// The default: no callbacks.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct NoHooks;

impl<K, V> NodeHooks<K, V> for NoHooks {}
