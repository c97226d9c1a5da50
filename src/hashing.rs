//! Hash spreading and power-of-two sizing arithmetic.

use crate::config::{DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY};
use core::hash::{BuildHasher, Hash};

/// Hash `key` and fold the high bits into the low ones.
///
/// Bucket indexes only look at the low bits of the hash, so without the
/// fold, hashes that differ only above the mask would always collide.
#[inline]
pub(crate) fn spread<S, Q>(hasher: &S, key: &Q) -> u32
where
    S: BuildHasher,
    Q: ?Sized + Hash,
{
    spread_raw(hasher.hash_one(key))
}

#[inline]
pub(crate) fn spread_raw(h: u64) -> u32 {
    let h = (h ^ (h >> 32)) as u32;
    h ^ (h >> 16)
}

#[inline]
pub(crate) fn index_for(hash: u32, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    hash as usize & (capacity - 1)
}

/// Smallest power of two `>= cap`, clamped to `[1, MAXIMUM_CAPACITY]`.
pub(crate) fn table_size_for(cap: usize) -> usize {
    if cap >= MAXIMUM_CAPACITY {
        return MAXIMUM_CAPACITY;
    }
    cap.max(1).next_power_of_two()
}

/// `capacity * load_factor`, pinned to `usize::MAX` once the capacity is
/// at its maximum or the product no longer fits.
pub(crate) fn threshold_for(capacity: usize, load_factor: f32) -> usize {
    let ft = capacity as f32 * load_factor;
    if capacity < MAXIMUM_CAPACITY && ft < MAXIMUM_CAPACITY as f32 {
        ft as usize
    } else {
        usize::MAX
    }
}

/// Bucket count that holds `mappings` entries without growing:
/// `mappings / load_factor + 1`, rounded up to a power of two.
pub(crate) fn capacity_for_len(mappings: usize, load_factor: f32) -> usize {
    let fc = mappings as f32 / load_factor + 1.0;
    if fc >= MAXIMUM_CAPACITY as f32 {
        MAXIMUM_CAPACITY
    } else {
        table_size_for(fc as usize)
    }
}

/// Like [`capacity_for_len`] but never below the default capacity and
/// with the load factor clamped to `[0.25, 4.0]`, for sizing a table from
/// an untrusted declared count.
#[cfg_attr(not(feature = "serde"), allow(dead_code))]
pub(crate) fn defensive_capacity_for_len(mappings: usize, load_factor: f32) -> (usize, f32) {
    let lf = load_factor.clamp(0.25, 4.0);
    let cap = capacity_for_len(mappings, lf).max(DEFAULT_INITIAL_CAPACITY);
    (cap, lf)
}
