use alloc::alloc::handle_alloc_error;
use alloc::vec::Vec;
use core::alloc::Layout;

use crate::error::TryReserveError;

/// Largest population at which a table of `capacity` slots still accepts an
/// insert without growing.
#[inline(always)]
pub(crate) fn max_stuffed(capacity: usize) -> usize {
    ((capacity as u128 * 3) / 4) as usize
}

/// Returns `true` once the load factor has passed 0.75; checked before every
/// insert.
#[inline(always)]
pub(crate) fn needs_growth(stuffed: usize, capacity: usize) -> bool {
    stuffed > max_stuffed(capacity)
}

#[inline(always)]
pub(crate) fn home_slot(hash: u64, capacity: usize) -> usize {
    (hash % capacity as u64) as usize
}

/// Whether memory allocation errors should return an error or abort.
#[derive(Copy, Clone)]
pub(crate) enum Fallibility {
    Fallible,
    Infallible,
}

impl Fallibility {
    /// Error to return on capacity overflow.
    fn capacity_overflow(self) -> TryReserveError {
        match self {
            Fallibility::Fallible => TryReserveError::CapacityOverflow,
            Fallibility::Infallible => panic!("Hash table capacity overflow"),
        }
    }

    /// Error to return on allocation error.
    fn alloc_err(self, layout: Layout) -> TryReserveError {
        match self {
            Fallibility::Fallible => TryReserveError::AllocError { layout },
            Fallibility::Infallible => handle_alloc_error(layout),
        }
    }
}

/// Capacity after one doubling.
pub(crate) fn doubled(capacity: usize, fallibility: Fallibility) -> Result<usize, TryReserveError> {
    capacity
        .checked_mul(2)
        .ok_or_else(|| fallibility.capacity_overflow())
}

/// Allocates a backing array of exactly `capacity` slots, each produced by
/// `empty`.
///
/// Nothing outside the returned vector is touched, so a caller that only swaps
/// its array after this succeeds never observes a half-built table.
pub(crate) fn alloc_slots<S>(
    capacity: usize,
    fallibility: Fallibility,
    empty: impl FnMut() -> S,
) -> Result<Vec<S>, TryReserveError> {
    let layout = Layout::array::<S>(capacity).map_err(|_| fallibility.capacity_overflow())?;

    let mut slots = Vec::new();
    if slots.try_reserve_exact(capacity).is_err() {
        return Err(fallibility.alloc_err(layout));
    }
    slots.resize_with(capacity, empty);

    Ok(slots)
}

/// Unwraps the result of an operation run with [`Fallibility::Infallible`],
/// which panics or aborts instead of returning an error.
#[inline(always)]
pub(crate) fn infallible<R>(result: Result<R, TryReserveError>) -> R {
    match result {
        Ok(value) => value,
        Err(_) => unreachable!("infallible allocation returned an error"),
    }
}
