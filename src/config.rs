//! Sizing and conversion policy for a `TreeBinMap`.
//!
//! The treeify/untreeify thresholds form a hysteresis band: a bin turns
//! into a tree when its chain reaches `treeify_threshold` nodes and only
//! turns back into a chain once it drops to `untreeify_threshold`. A
//! table smaller than `min_treeify_capacity` grows instead of treeifying.

use crate::error::ConfigError;

/// Capacity used when the first insertion allocates an unsized table.
pub const DEFAULT_INITIAL_CAPACITY: usize = 16;

/// Largest bucket count. Growth past this point is refused.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

pub const TREEIFY_THRESHOLD: usize = 8;

pub const UNTREEIFY_THRESHOLD: usize = 6;

pub const MIN_TREEIFY_CAPACITY: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapConfig {
    initial_capacity: Option<usize>,
    load_factor: f32,
    treeify_threshold: usize,
    untreeify_threshold: usize,
    min_treeify_capacity: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: None,
            load_factor: DEFAULT_LOAD_FACTOR,
            treeify_threshold: TREEIFY_THRESHOLD,
            untreeify_threshold: UNTREEIFY_THRESHOLD,
            min_treeify_capacity: MIN_TREEIFY_CAPACITY,
        }
    }
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket count hint for the first allocation. Rounded up to a power
    /// of two and clamped to [`MAXIMUM_CAPACITY`].
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    pub fn load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn treeify_thresholds(mut self, treeify: usize, untreeify: usize) -> Self {
        self.treeify_threshold = treeify;
        self.untreeify_threshold = untreeify;
        self
    }

    pub fn min_treeify_capacity(mut self, capacity: usize) -> Self {
        self.min_treeify_capacity = capacity;
        self
    }

    pub fn initial_capacity_hint(&self) -> Option<usize> {
        self.initial_capacity
    }

    pub fn get_load_factor(&self) -> f32 {
        self.load_factor
    }

    pub fn treeify_threshold(&self) -> usize {
        self.treeify_threshold
    }

    pub fn untreeify_threshold(&self) -> usize {
        self.untreeify_threshold
    }

    pub fn get_min_treeify_capacity(&self) -> usize {
        self.min_treeify_capacity
    }

    /// Check every field. The load factor is never clamped; a NaN, zero
    /// or negative value is rejected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_factor.is_nan() || self.load_factor <= 0.0 {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        if self.treeify_threshold <= 2 {
            return Err(ConfigError::InvalidTreeifyThreshold(self.treeify_threshold));
        }
        if self.untreeify_threshold >= self.treeify_threshold {
            return Err(ConfigError::InvalidUntreeifyThreshold {
                untreeify: self.untreeify_threshold,
                treeify: self.treeify_threshold,
            });
        }
        if !self.min_treeify_capacity.is_power_of_two()
            || self
                .treeify_threshold
                .checked_mul(4)
                .map_or(true, |floor| self.min_treeify_capacity < floor)
        {
            return Err(ConfigError::InvalidMinTreeifyCapacity {
                capacity: self.min_treeify_capacity,
                treeify: self.treeify_threshold,
            });
        }
        Ok(())
    }
}
