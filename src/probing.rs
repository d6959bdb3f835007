use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::mem;

use log::debug;
use log::trace;

use crate::DEFAULT_CAPACITY;
use crate::Table;
use crate::contract::Contract;
use crate::contract::Natural;
use crate::error::TryReserveError;
use crate::raw;
use crate::raw::Fallibility;

/// Linear coefficient of [`Quadratic`] probing.
pub const C1: usize = 7;

/// Quadratic coefficient of [`Quadratic`] probing.
pub const C2: usize = 19;

/// Modulus of the secondary hash used by [`DoubleHashing`].
pub const CO_PRIME: u64 = 31;

/// A probe sequence: the order in which slots are tried after the home slot
/// of a hash is taken.
///
/// `probe` is called with `attempt = 0, 1, 2, ...` for a fixed `hash` and
/// `home` (`hash % capacity`) and must be deterministic. Attempt 0 should
/// return `home`. Results are reduced modulo `capacity` by the caller.
///
/// Any `Fn(hash, home, attempt, capacity) -> usize` closure is a probe
/// sequence.
pub trait ProbeSequence {
    /// Returns the slot to try on the given attempt.
    fn probe(&self, hash: u64, home: usize, attempt: usize, capacity: usize) -> usize;
}

impl<F> ProbeSequence for F
where
    F: Fn(u64, usize, usize, usize) -> usize,
{
    #[inline]
    fn probe(&self, hash: u64, home: usize, attempt: usize, capacity: usize) -> usize {
        self(hash, home, attempt, capacity)
    }
}

#[inline(always)]
fn wrap(offset: u128, capacity: usize) -> usize {
    (offset % capacity as u128) as usize
}

/// `home + attempt`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Linear;

impl ProbeSequence for Linear {
    #[inline]
    fn probe(&self, _hash: u64, home: usize, attempt: usize, capacity: usize) -> usize {
        wrap(home as u128 + attempt as u128, capacity)
    }
}

/// `home + C1·attempt + C2·attempt²`, with `home` fixed for the whole walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Quadratic;

impl ProbeSequence for Quadratic {
    #[inline]
    fn probe(&self, _hash: u64, home: usize, attempt: usize, capacity: usize) -> usize {
        let attempt = (attempt % capacity) as u128;
        let square = attempt * attempt % capacity as u128;
        wrap(
            home as u128 + C1 as u128 * attempt + C2 as u128 * square,
            capacity,
        )
    }
}

/// `home + attempt·step` with `step = CO_PRIME - hash % CO_PRIME`.
///
/// Keys sharing a home slot usually get different steps, so their walks
/// diverge after the first collision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DoubleHashing;

impl DoubleHashing {
    /// Secondary hash; always in `1..=CO_PRIME`.
    #[inline]
    pub fn step(hash: u64) -> u64 {
        CO_PRIME - hash % CO_PRIME
    }
}

impl ProbeSequence for DoubleHashing {
    #[inline]
    fn probe(&self, hash: u64, home: usize, attempt: usize, capacity: usize) -> usize {
        wrap(
            home as u128 + attempt as u128 * Self::step(hash) as u128,
            capacity,
        )
    }
}

/// Runtime choice among the built-in probe sequences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Probing {
    /// See [`Linear`].
    #[default]
    Linear,
    /// See [`Quadratic`].
    Quadratic,
    /// See [`DoubleHashing`].
    DoubleHashing,
}

impl ProbeSequence for Probing {
    #[inline]
    fn probe(&self, hash: u64, home: usize, attempt: usize, capacity: usize) -> usize {
        match self {
            Probing::Linear => Linear.probe(hash, home, attempt, capacity),
            Probing::Quadratic => Quadratic.probe(hash, home, attempt, capacity),
            Probing::DoubleHashing => DoubleHashing.probe(hash, home, attempt, capacity),
        }
    }
}

/// Slot indices visited for one hash.
///
/// The strategy's first `capacity` attempts come first, followed by a linear
/// sweep of the whole array from the home slot. Strategies that do not cover
/// every slot (quadratic or double hashing on an unlucky capacity) therefore
/// still reach every slot, and the walk always ends after `2 × capacity`
/// steps.
pub(crate) struct ProbeWalk<'a, P: ?Sized> {
    probe: &'a P,
    hash: u64,
    home: usize,
    capacity: usize,
    attempt: usize,
}

impl<'a, P: ProbeSequence + ?Sized> ProbeWalk<'a, P> {
    pub(crate) fn new(probe: &'a P, hash: u64, capacity: usize) -> Self {
        Self {
            probe,
            hash,
            home: raw::home_slot(hash, capacity),
            capacity,
            attempt: 0,
        }
    }
}

impl<P: ProbeSequence + ?Sized> Iterator for ProbeWalk<'_, P> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let attempt = self.attempt;
        if attempt >= self.capacity * 2 {
            return None;
        }
        self.attempt += 1;

        if attempt < self.capacity {
            return Some(self.probe.probe(self.hash, self.home, attempt, self.capacity) % self.capacity);
        }

        let sweep = attempt - self.capacity;
        if sweep == 0 {
            trace!(
                "probe sequence exhausted after {} attempts; sweeping from slot {}",
                self.capacity, self.home
            );
        }
        Some((self.home + sweep) % self.capacity)
    }
}

#[derive(Clone)]
enum Slot<T> {
    Empty,
    Tombstone,
    Occupied(T),
}

impl<T> Slot<T> {
    fn value(&self) -> Option<&T> {
        match self {
            Slot::Occupied(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Debug> Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => f.write_str("Empty"),
            Slot::Tombstone => f.write_str("Deleted"),
            Slot::Occupied(value) => value.fmt(f),
        }
    }
}

enum Lookup {
    /// The key is stored at this slot.
    Present(usize),
    /// The key is not stored; the first tombstone or empty slot on its walk,
    /// if any, is where it belongs.
    Absent(Option<usize>),
}

/// A hash table resolving collisions by open addressing.
///
/// Every slot is empty, occupied, or a tombstone left by a deletion. Lookups
/// walk the probe sequence `P` from the home slot, passing tombstones and
/// foreign elements, until they hit the key or a never-used slot. Inserting a
/// new key reuses the first tombstone on its walk. Tombstones are only
/// reclaimed by a rehash, which runs before an insert once the load factor has
/// passed 0.75.
///
/// # Examples
///
/// ```rust
/// use probe_hash::Probing;
/// use probe_hash::ProbingTable;
///
/// let mut table: ProbingTable<&str> = ProbingTable::with_capacity(8, Probing::Quadratic);
/// table.insert("alpha");
/// table.insert("beta");
///
/// assert_eq!(table.delete(&"alpha"), Some("alpha"));
/// assert_eq!(table.search(&"alpha"), None);
/// assert_eq!(table.search(&"beta"), Some(&"beta"));
/// assert_eq!(table.tombstones(), 1);
/// ```
#[derive(Clone)]
pub struct ProbingTable<T, C = Natural, P = Probing> {
    slots: Vec<Slot<T>>,
    stuffed: usize,
    tombstones: usize,
    contract: C,
    probe: P,
}

impl<T, C, P> ProbingTable<T, C, P>
where
    C: Contract<T>,
    P: ProbeSequence,
{
    /// Creates an empty table with `capacity` slots, walking collisions with
    /// `probe` and identifying elements through `contract`.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity_and_contract(capacity: usize, probe: P, contract: C) -> Self {
        Self {
            slots: raw::infallible(raw::alloc_slots(
                capacity.max(1),
                Fallibility::Infallible,
                || Slot::Empty,
            )),
            stuffed: 0,
            tombstones: 0,
            contract,
            probe,
        }
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of stored elements. Tombstones are not counted.
    pub fn stuffed(&self) -> usize {
        self.stuffed
    }

    /// Returns the number of stored elements. Same as [`stuffed`].
    ///
    /// [`stuffed`]: ProbingTable::stuffed
    pub fn len(&self) -> usize {
        self.stuffed
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.stuffed == 0
    }

    /// Returns the number of tombstoned slots.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Ratio of stored elements to slots.
    pub fn load_factor(&self) -> f64 {
        self.stuffed as f64 / self.slots.len() as f64
    }

    /// Returns the contract used to hash and compare elements.
    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// Returns the probe sequence.
    pub fn probe_sequence(&self) -> &P {
        &self.probe
    }

    fn lookup(&self, hash: u64, elem: &T) -> Lookup {
        let mut vacant = None;
        for index in ProbeWalk::new(&self.probe, hash, self.slots.len()) {
            match &self.slots[index] {
                Slot::Empty => return Lookup::Absent(vacant.or(Some(index))),
                Slot::Tombstone => {
                    vacant.get_or_insert(index);
                }
                Slot::Occupied(value) if self.contract.same_key(value, elem) => {
                    return Lookup::Present(index);
                }
                Slot::Occupied(_) => {}
            }
        }
        Lookup::Absent(vacant)
    }

    /// Returns the stored element with the same key as `elem`.
    pub fn search(&self, elem: &T) -> Option<&T> {
        match self.lookup(self.contract.hash(elem), elem) {
            Lookup::Present(index) => self.slots[index].value(),
            Lookup::Absent(_) => None,
        }
    }

    /// Returns `true` if an element with the same key as `elem` is stored.
    pub fn contains(&self, elem: &T) -> bool {
        self.search(elem).is_some()
    }

    /// Inserts `elem`.
    ///
    /// The table first doubles if its load factor has passed 0.75. An element
    /// with the same key is replaced in its slot and returned. Otherwise the
    /// element takes the first tombstone or empty slot on its probe walk.
    pub fn insert(&mut self, elem: T) -> Option<T> {
        raw::infallible(self.insert_inner(elem, Fallibility::Infallible))
    }

    /// Like [`insert`], but returns an error if growing the table fails to
    /// allocate. The table is unchanged on error and `elem` is dropped.
    ///
    /// [`insert`]: ProbingTable::insert
    pub fn try_insert(&mut self, elem: T) -> Result<Option<T>, TryReserveError> {
        self.insert_inner(elem, Fallibility::Fallible)
    }

    fn insert_inner(
        &mut self,
        elem: T,
        fallibility: Fallibility,
    ) -> Result<Option<T>, TryReserveError> {
        if raw::needs_growth(self.stuffed, self.slots.len()) {
            self.grow(fallibility)?;
        }

        let hash = self.contract.hash(&elem);
        match self.lookup(hash, &elem) {
            Lookup::Present(index) => match mem::replace(&mut self.slots[index], Slot::Occupied(elem)) {
                Slot::Occupied(previous) => Ok(Some(previous)),
                _ => unreachable!("lookup reported a vacant slot as present"),
            },
            Lookup::Absent(Some(index)) => {
                self.occupy(index, elem);
                Ok(None)
            }
            Lookup::Absent(None) => unreachable!("a table under its load limit has a free slot"),
        }
    }

    fn occupy(&mut self, index: usize, elem: T) {
        if let Slot::Tombstone = mem::replace(&mut self.slots[index], Slot::Occupied(elem)) {
            self.tombstones -= 1;
        }
        self.stuffed += 1;
    }

    /// Removes and returns the stored element with the same key as `elem`,
    /// leaving a tombstone in its slot.
    ///
    /// Does nothing and returns `None` if no such element is stored.
    pub fn delete(&mut self, elem: &T) -> Option<T> {
        let Lookup::Present(index) = self.lookup(self.contract.hash(elem), elem) else {
            return None;
        };

        match mem::replace(&mut self.slots[index], Slot::Tombstone) {
            Slot::Occupied(value) => {
                self.stuffed -= 1;
                self.tombstones += 1;
                Some(value)
            }
            _ => unreachable!("lookup reported a vacant slot as present"),
        }
    }

    /// Doubles the number of slots, reinserting every element and dropping
    /// all tombstones.
    pub fn rehash(&mut self) {
        raw::infallible(self.grow(Fallibility::Infallible));
    }

    /// Like [`rehash`], but returns an error instead of aborting when the
    /// doubled array cannot be allocated. The table is unchanged on error.
    ///
    /// [`rehash`]: ProbingTable::rehash
    pub fn try_rehash(&mut self) -> Result<(), TryReserveError> {
        self.grow(Fallibility::Fallible)
    }

    fn grow(&mut self, fallibility: Fallibility) -> Result<(), TryReserveError> {
        let old_capacity = self.slots.len();
        let capacity = raw::doubled(old_capacity, fallibility)?;
        let slots = raw::alloc_slots(capacity, fallibility, || Slot::Empty)?;

        let old_slots = mem::replace(&mut self.slots, slots);
        let dropped_tombstones = mem::take(&mut self.tombstones);
        self.stuffed = 0;
        for slot in old_slots {
            if let Slot::Occupied(value) = slot {
                self.reinsert(value);
            }
        }

        debug!(
            "probing table rehashed: {} -> {} slots, {} elements, {} tombstones dropped",
            old_capacity, capacity, self.stuffed, dropped_tombstones
        );

        Ok(())
    }

    /// Places an element known to be absent into a table without tombstones.
    fn reinsert(&mut self, elem: T) {
        let hash = self.contract.hash(&elem);
        let vacant = ProbeWalk::new(&self.probe, hash, self.slots.len())
            .find(|&index| matches!(self.slots[index], Slot::Empty));
        match vacant {
            Some(index) => self.occupy(index, elem),
            None => unreachable!("a freshly doubled table has a free slot"),
        }
    }
}

impl<T, C, P> ProbingTable<T, C, P>
where
    C: Contract<T> + Default,
    P: ProbeSequence,
{
    /// Creates an empty table with `capacity` slots and a default contract.
    pub fn with_capacity(capacity: usize, probe: P) -> Self {
        Self::with_capacity_and_contract(capacity, probe, C::default())
    }
}

impl<T, C, P> ProbingTable<T, C, P>
where
    C: Contract<T> + Default,
    P: ProbeSequence + Default,
{
    /// Creates an empty table with [`DEFAULT_CAPACITY`] slots and the default
    /// probe sequence.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, P::default())
    }
}

impl<T, C, P> Default for ProbingTable<T, C, P>
where
    C: Contract<T> + Default,
    P: ProbeSequence + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, P> ProbingTable<T, C, P> {
    /// Drops every stored element and forgets every tombstone, keeping the
    /// current capacity.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
        self.stuffed = 0;
        self.tombstones = 0;
    }

    /// Returns an iterator over the stored elements in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            slots: self.slots.iter(),
            remaining: self.stuffed,
        }
    }
}

#[cfg(feature = "stats")]
impl<T, C, P> ProbingTable<T, C, P>
where
    C: Contract<T>,
    P: ProbeSequence,
{
    /// Returns slot-level statistics. `longest_chain` is the longest probe
    /// walk, counted in slots visited, needed to reach a stored element.
    pub fn debug_stats(&self) -> crate::stats::TableStats {
        let longest_chain = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let value = slot.value()?;
                ProbeWalk::new(&self.probe, self.contract.hash(value), self.slots.len())
                    .position(|visited| visited == index)
                    .map(|steps| steps + 1)
            })
            .max()
            .unwrap_or(0);

        crate::stats::TableStats {
            capacity: self.slots.len(),
            stuffed: self.stuffed,
            occupied_slots: self.stuffed,
            tombstones: self.tombstones,
            longest_chain,
        }
    }
}

impl<T, C, P> Table<T> for ProbingTable<T, C, P>
where
    C: Contract<T>,
    P: ProbeSequence,
{
    fn capacity(&self) -> usize {
        self.capacity()
    }

    fn stuffed(&self) -> usize {
        self.stuffed()
    }

    fn insert(&mut self, elem: T) -> Option<T> {
        self.insert(elem)
    }

    fn try_insert(&mut self, elem: T) -> Result<Option<T>, TryReserveError> {
        self.try_insert(elem)
    }

    fn search(&self, elem: &T) -> Option<&T> {
        self.search(elem)
    }

    fn delete(&mut self, elem: &T) -> Option<T> {
        self.delete(elem)
    }

    fn rehash(&mut self) {
        self.rehash()
    }

    fn try_rehash(&mut self) -> Result<(), TryReserveError> {
        self.try_rehash()
    }
}

impl<T: Debug, C, P: Debug> Debug for ProbingTable<T, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbingTable")
            .field("probe", &self.probe)
            .field("capacity", &self.slots.len())
            .field("stuffed", &self.stuffed)
            .field("tombstones", &self.tombstones)
            .field("slots", &self.slots)
            .finish()
    }
}

/// An iterator over the elements of a [`ProbingTable`].
///
/// Created by [`ProbingTable::iter`].
pub struct Iter<'a, T> {
    slots: core::slice::Iter<'a, Slot<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.slots.by_ref().find_map(Slot::value)?;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T, C, P> IntoIterator for &'a ProbingTable<T, C, P> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
