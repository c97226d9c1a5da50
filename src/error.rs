//! Error types surfaced by construction and by the fail-fast cursor.

use core::fmt;

/// Rejected map configuration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ConfigError {
    InvalidLoadFactor(f32),
    InvalidTreeifyThreshold(usize),
    InvalidUntreeifyThreshold { untreeify: usize, treeify: usize },
    InvalidMinTreeifyCapacity { capacity: usize, treeify: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLoadFactor(lf) => write!(f, "illegal load factor: {lf}"),
            ConfigError::InvalidTreeifyThreshold(t) => {
                write!(f, "treeify threshold must be greater than 2, got {t}")
            }
            ConfigError::InvalidUntreeifyThreshold { untreeify, treeify } => write!(
                f,
                "untreeify threshold {untreeify} must be below treeify threshold {treeify}"
            ),
            ConfigError::InvalidMinTreeifyCapacity { capacity, treeify } => write!(
                f,
                "minimum treeify capacity {capacity} must be a power of two and at least 4 * {treeify}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure reported by [`crate::Cursor`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CursorError {
    /// The map was structurally modified by something other than this
    /// cursor. Detection is best-effort and only meant as a debugging aid.
    ConcurrentModification,
    /// `remove` was called before `next`, or twice for the same entry.
    NoCurrentEntry,
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::ConcurrentModification => {
                f.write_str("map was structurally modified during iteration")
            }
            CursorError::NoCurrentEntry => f.write_str("cursor has no current entry"),
        }
    }
}

impl std::error::Error for CursorError {}
