//! treebin-map: a single-threaded hash map whose overfull buckets turn
//! into red-black trees, so a flood of colliding hashes degrades lookups
//! to O(log n) instead of O(n).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: O(1) average operations with a bounded worst case per bucket,
//!   built in layers that can each be reasoned about on their own.
//! - Layers:
//!   - `tree_bin`: red-black tree algorithms over one bucket's nodes
//!     (search, insert, delete, treeify, untreeify, split).
//!   - `table`: the bucket array. Chooses chain or tree handling per
//!     bucket, owns growth, and applies the chain/tree conversion policy.
//!   - `TreeBinMap<K, V, S, H>`: public API. Hashes keys, fires hooks, and
//!     exposes iterators and the fail-fast cursor.
//!   - `OrderedTreeBinMap<K, V, S, H>`: a `TreeBinMap` built with
//!     `with_key_order`, whose lookups by reference also descend by
//!     `Q: Ord`.
//!
//! Storage
//! - Every entry is a node in one `SlotMap`; links between nodes are
//!   generational `NodeId`s, never references. A node keeps its id from
//!   insertion to removal, across growth and bin conversion.
//! - A bucket is a tagged head: `Empty`, `Chain(first)` or `Tree(first)`.
//!   Tree bins keep their chain (`next`/`prev`) threaded alongside the
//!   tree links, so converting back to a chain, splitting on growth and
//!   iterating all follow chain order without touching the tree.
//!
//! Hashing
//! - Keys are hashed once with the map's `BuildHasher`, folded to 32 bits
//!   and spread (`h ^ h >> 16`), then cached on the node. Growth and
//!   conversion never call `K: Hash` again.
//! - Indexing masks the low bits of the spread hash; capacity is always a
//!   power of two, at most 2^30.
//!
//! Conversion policy
//! - A chain reaching the treeify threshold (8) becomes a tree, unless the
//!   table holds fewer than 64 buckets, in which case the table grows.
//! - A tree bin shrinking to the untreeify threshold (6), or whose shape
//!   becomes too small to be balanced, goes back to being a chain.
//! - Growth splits each bin on the old-capacity bit in a single pass,
//!   preserving relative order on both sides.
//!
//! Ordering inside a tree bin
//! - Nodes order by hash. Equal hashes order by the key comparator when
//!   one is installed (`with_key_order`), then by creation sequence. The
//!   sequence is only a tie-break and never implies key equality.
//! - A lookup with no order to consult (a borrowed `&Q` on a plain
//!   `TreeBinMap`) searches both subtrees where hashes tie. Owned-key
//!   lookups use the installed comparator, and `OrderedTreeBinMap` ranks
//!   borrowed keys by `Q: Ord`, so both stay O(log n) in a flooded bin.
//! - Installing an order rebuilds existing tree bins, which reorders
//!   their chains and counts as a structural modification.
//!
//! Constraints
//! - No internal synchronization; wrap externally to share.
//! - No `unsafe`.
//! - Structural modifications bump a counter; the fail-fast `Cursor`
//!   reports changes made behind its back. Value overwrites do not count.
//!
//! Notes and non-goals
//! - No persistence and no key ordering guarantee beyond the tie-break.
//! - Borrowing iterators follow bucket order. Mutable, owning and draining
//!   iterators follow arena order.

mod config;
mod error;
mod hashing;
mod hooks;
mod iter;
mod map;
#[cfg(test)]
mod map_proptest;
mod node;
mod ordered;
#[cfg(feature = "serde")]
mod serialized;
mod table;
mod tree_bin;

// Public surface
pub use config::{
    MapConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY,
    MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD,
};
pub use error::{ConfigError, CursorError};
pub use hooks::{NoHooks, NodeHooks};
pub use iter::{BinEntries, Cursor, Drain, IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
pub use map::TreeBinMap;
pub use node::BinKind;
pub use ordered::OrderedTreeBinMap;
