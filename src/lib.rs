#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Element contracts: how a table hashes and compares the values it stores.
pub mod contract;

pub mod error;

/// Separate chaining: every bucket owns a singly linked collision list.
pub mod chained;

/// Mixed-list hashing: collisions borrow free cells of the same array and
/// link them into the home slot's chain.
pub mod mixed;

/// Open addressing with pluggable probe sequences and tombstone deletion.
pub mod probing;

#[cfg(feature = "stats")]
pub mod stats;

mod raw;

#[cfg(test)]
mod testing;

pub use chained::ChainedTable;
pub use contract::Contract;
pub use contract::FnContract;
pub use contract::Natural;
pub use error::TryReserveError;
pub use mixed::MixedTable;
pub use probing::ProbeSequence;
pub use probing::Probing;
pub use probing::ProbingTable;
#[cfg(feature = "stats")]
pub use stats::TableStats;

/// Capacity used by the `new()` constructors.
pub const DEFAULT_CAPACITY: usize = 8;

/// Operations shared by every table variant.
///
/// The three tables are alternative implementations of one interface; this
/// trait lets callers pick a variant at the type level and stay generic over
/// the rest of their code.
///
/// Elements are moved into the table on insert and handed back on replace or
/// delete, so dropping a returned value is the element's destruction.
pub trait Table<T> {
    /// Total number of slots in the backing array.
    fn capacity(&self) -> usize;

    /// Number of live elements.
    fn stuffed(&self) -> usize;

    /// Inserts `elem`, replacing and returning a stored element with the same
    /// key.
    fn insert(&mut self, elem: T) -> Option<T>;

    /// Like [`Table::insert`], but reports allocation failure during a rehash
    /// instead of aborting.
    fn try_insert(&mut self, elem: T) -> Result<Option<T>, TryReserveError>;

    /// Returns the stored element with the same key as `elem`.
    fn search(&self, elem: &T) -> Option<&T>;

    /// Removes and returns the stored element with the same key as `elem`.
    fn delete(&mut self, elem: &T) -> Option<T>;

    /// Doubles the capacity and reinserts every live element.
    fn rehash(&mut self);

    /// Like [`Table::rehash`], but reports allocation failure instead of
    /// aborting. On error the table is left untouched.
    fn try_rehash(&mut self) -> Result<(), TryReserveError>;

    /// Returns `true` if no element is stored.
    fn is_empty(&self) -> bool {
        self.stuffed() == 0
    }

    /// Returns `true` if an element with the same key as `elem` is stored.
    fn contains(&self, elem: &T) -> bool {
        self.search(elem).is_some()
    }

    /// Ratio of live elements to slots.
    fn load_factor(&self) -> f64 {
        self.stuffed() as f64 / self.capacity() as f64
    }
}
