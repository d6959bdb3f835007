use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Debug;
use core::mem;

use log::debug;

use crate::DEFAULT_CAPACITY;
use crate::Table;
use crate::contract::Contract;
use crate::contract::Natural;
use crate::error::TryReserveError;
use crate::raw;
use crate::raw::Fallibility;

struct Node<T> {
    value: T,
    next: Option<Box<Node<T>>>,
}

/// Collision list of one bucket.
///
/// New elements go to the front. Nodes are moved between buckets whole during
/// a rehash, so growing the table never allocates per element.
struct Bucket<T> {
    head: Option<Box<Node<T>>>,
    len: usize,
}

impl<T> Bucket<T> {
    const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[cfg_attr(not(any(test, feature = "stats")), allow(dead_code))]
    fn len(&self) -> usize {
        self.len
    }

    fn push_front(&mut self, value: T) {
        self.push_node(Box::new(Node { value, next: None }));
    }

    fn push_node(&mut self, mut node: Box<Node<T>>) {
        node.next = self.head.take();
        self.head = Some(node);
        self.len += 1;
    }

    fn pop_node(&mut self) -> Option<Box<Node<T>>> {
        let mut node = self.head.take()?;
        self.head = node.next.take();
        self.len -= 1;
        Some(node)
    }

    fn iter(&self) -> BucketIter<'_, T> {
        BucketIter {
            next: self.head.as_deref(),
        }
    }

    fn find(&self, mut eq: impl FnMut(&T) -> bool) -> Option<&T> {
        self.iter().find(|value| eq(value))
    }

    fn find_mut(&mut self, mut eq: impl FnMut(&T) -> bool) -> Option<&mut T> {
        let mut cursor = self.head.as_deref_mut();
        while let Some(node) = cursor {
            if eq(&node.value) {
                return Some(&mut node.value);
            }
            cursor = node.next.as_deref_mut();
        }
        None
    }

    fn position(&self, mut eq: impl FnMut(&T) -> bool) -> Option<usize> {
        self.iter().position(|value| eq(value))
    }

    fn remove_at(&mut self, index: usize) -> Option<T> {
        let mut link = &mut self.head;
        for _ in 0..index {
            link = &mut link.as_mut()?.next;
        }

        let mut node = link.take()?;
        *link = node.next.take();
        self.len -= 1;
        Some(node.value)
    }
}

impl<T> Drop for Bucket<T> {
    fn drop(&mut self) {
        // Unlink one node at a time; a long chain would otherwise drop
        // recursively.
        let mut cursor = self.head.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
        }
    }
}

impl<T: Clone> Clone for Bucket<T> {
    fn clone(&self) -> Self {
        let values: Vec<&T> = self.iter().collect();
        let mut bucket = Bucket::new();
        for value in values.into_iter().rev() {
            bucket.push_front(value.clone());
        }
        bucket
    }
}

struct BucketIter<'a, T> {
    next: Option<&'a Node<T>>,
}

impl<'a, T> Iterator for BucketIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            &node.value
        })
    }
}

/// A hash table resolving collisions by separate chaining.
///
/// Slot `i` of the backing array heads a linked list of every element whose
/// hash reduced modulo the capacity is `i`. Every insert first doubles the
/// capacity if the load factor is above 0.75.
///
/// # Examples
///
/// ```rust
/// use probe_hash::ChainedTable;
///
/// let mut table: ChainedTable<u32> = ChainedTable::with_capacity(4);
/// for n in 0..10 {
///     table.insert(n);
/// }
///
/// assert_eq!(table.stuffed(), 10);
/// assert!(table.capacity() >= 16);
/// assert_eq!(table.search(&7), Some(&7));
/// assert_eq!(table.delete(&7), Some(7));
/// assert_eq!(table.search(&7), None);
/// ```
#[derive(Clone)]
pub struct ChainedTable<T, C = Natural> {
    buckets: Vec<Bucket<T>>,
    stuffed: usize,
    contract: C,
}

impl<T, C> ChainedTable<T, C>
where
    C: Contract<T>,
{
    /// Creates an empty table with `capacity` buckets, identifying elements
    /// through `contract`.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_capacity_and_contract(capacity: usize, contract: C) -> Self {
        Self {
            buckets: raw::infallible(raw::alloc_slots(
                capacity.max(1),
                Fallibility::Infallible,
                Bucket::new,
            )),
            stuffed: 0,
            contract,
        }
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the number of stored elements.
    pub fn stuffed(&self) -> usize {
        self.stuffed
    }

    /// Returns the number of stored elements. Same as [`stuffed`].
    ///
    /// [`stuffed`]: ChainedTable::stuffed
    pub fn len(&self) -> usize {
        self.stuffed
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.stuffed == 0
    }

    /// Ratio of stored elements to buckets.
    pub fn load_factor(&self) -> f64 {
        self.stuffed as f64 / self.buckets.len() as f64
    }

    /// Returns the contract used to hash and compare elements.
    pub fn contract(&self) -> &C {
        &self.contract
    }

    fn home(&self, elem: &T) -> usize {
        raw::home_slot(self.contract.hash(elem), self.buckets.len())
    }

    /// Returns the stored element with the same key as `elem`.
    pub fn search(&self, elem: &T) -> Option<&T> {
        self.buckets[self.home(elem)].find(|value| self.contract.same_key(value, elem))
    }

    /// Returns `true` if an element with the same key as `elem` is stored.
    pub fn contains(&self, elem: &T) -> bool {
        self.search(elem).is_some()
    }

    /// Inserts `elem`.
    ///
    /// The table first doubles if its load factor has passed 0.75. If an
    /// element with the same key is already stored it is then replaced in
    /// place and returned, leaving the population unchanged; otherwise the
    /// element is pushed onto the front of its bucket.
    pub fn insert(&mut self, elem: T) -> Option<T> {
        raw::infallible(self.insert_inner(elem, Fallibility::Infallible))
    }

    /// Like [`insert`], but returns an error if growing the table fails to
    /// allocate. The table is unchanged on error and `elem` is dropped.
    ///
    /// [`insert`]: ChainedTable::insert
    pub fn try_insert(&mut self, elem: T) -> Result<Option<T>, TryReserveError> {
        self.insert_inner(elem, Fallibility::Fallible)
    }

    fn insert_inner(
        &mut self,
        elem: T,
        fallibility: Fallibility,
    ) -> Result<Option<T>, TryReserveError> {
        if raw::needs_growth(self.stuffed, self.buckets.len()) {
            self.grow(fallibility)?;
        }

        let home = self.home(&elem);
        let contract = &self.contract;
        if let Some(stored) = self.buckets[home].find_mut(|value| contract.same_key(value, &elem)) {
            return Ok(Some(mem::replace(stored, elem)));
        }

        self.buckets[home].push_front(elem);
        self.stuffed += 1;

        Ok(None)
    }

    /// Removes and returns the stored element with the same key as `elem`.
    ///
    /// Does nothing and returns `None` if no such element is stored.
    pub fn delete(&mut self, elem: &T) -> Option<T> {
        let home = self.home(elem);
        let index = self.buckets[home].position(|value| self.contract.same_key(value, elem))?;
        let removed = self.buckets[home].remove_at(index)?;
        self.stuffed -= 1;
        Some(removed)
    }

    /// Doubles the number of buckets and redistributes every element.
    pub fn rehash(&mut self) {
        raw::infallible(self.grow(Fallibility::Infallible));
    }

    /// Like [`rehash`], but returns an error instead of aborting when the
    /// doubled array cannot be allocated. The table is unchanged on error.
    ///
    /// [`rehash`]: ChainedTable::rehash
    pub fn try_rehash(&mut self) -> Result<(), TryReserveError> {
        self.grow(Fallibility::Fallible)
    }

    fn grow(&mut self, fallibility: Fallibility) -> Result<(), TryReserveError> {
        let old_capacity = self.buckets.len();
        let capacity = raw::doubled(old_capacity, fallibility)?;
        let buckets = raw::alloc_slots(capacity, fallibility, Bucket::new)?;

        let old_buckets = mem::replace(&mut self.buckets, buckets);
        let mut moved = 0;
        for mut bucket in old_buckets {
            while let Some(node) = bucket.pop_node() {
                let home = raw::home_slot(self.contract.hash(&node.value), capacity);
                self.buckets[home].push_node(node);
                moved += 1;
            }
        }
        debug_assert_eq!(moved, self.stuffed);

        debug!(
            "chained table rehashed: {} -> {} buckets, {} elements",
            old_capacity, capacity, self.stuffed
        );

        Ok(())
    }
}

impl<T, C> ChainedTable<T, C>
where
    C: Contract<T> + Default,
{
    /// Creates an empty table with [`DEFAULT_CAPACITY`] buckets.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table with `capacity` buckets and a default contract.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_contract(capacity, C::default())
    }
}

impl<T, C> Default for ChainedTable<T, C>
where
    C: Contract<T> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> ChainedTable<T, C> {
    /// Drops every stored element, keeping the current capacity.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::new();
        }
        self.stuffed = 0;
    }

    /// Returns an iterator over the stored elements, bucket by bucket.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            buckets: self.buckets.iter(),
            current: BucketIter { next: None },
            remaining: self.stuffed,
        }
    }

    /// Returns slot-level statistics.
    #[cfg(feature = "stats")]
    pub fn debug_stats(&self) -> crate::stats::TableStats {
        crate::stats::TableStats {
            capacity: self.buckets.len(),
            stuffed: self.stuffed,
            occupied_slots: self.buckets.iter().filter(|b| b.len() > 0).count(),
            tombstones: 0,
            longest_chain: self.buckets.iter().map(Bucket::len).max().unwrap_or(0),
        }
    }
}

impl<T, C> Table<T> for ChainedTable<T, C>
where
    C: Contract<T>,
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

impl<T: Debug, C> Debug for ChainedTable<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedTable")
            .field("capacity", &self.buckets.len())
            .field("stuffed", &self.stuffed)
            .field(
                "buckets",
                &self
                    .buckets
                    .iter()
                    .map(|bucket| bucket.iter().collect::<Vec<_>>())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// An iterator over the elements of a [`ChainedTable`].
///
/// Created by [`ChainedTable::iter`].
pub struct Iter<'a, T> {
    buckets: core::slice::Iter<'a, Bucket<T>>,
    current: BucketIter<'a, T>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.current.next() {
                self.remaining -= 1;
                return Some(value);
            }
            self.current = self.buckets.next()?.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T, C> IntoIterator for &'a ChainedTable<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
