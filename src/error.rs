//! Errors reported by the fallible `try_*` table operations.

use core::alloc::Layout;
use core::fmt;

/// The error type for `try_insert` and `try_rehash`.
///
/// Looking up a missing key is never an error; the only failure a table can
/// report is being unable to allocate the doubled backing array.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TryReserveError {
    /// The doubled capacity overflows `usize` or the maximum allocation size.
    CapacityOverflow,

    /// The memory allocator returned an error.
    AllocError {
        /// The layout of the allocation request that failed.
        layout: Layout,
    },
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("hash table capacity overflow while rehashing")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                "memory allocation of {} bytes failed while rehashing",
                layout.size()
            ),
        }
    }
}

impl core::error::Error for TryReserveError {}
