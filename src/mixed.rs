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
use crate::probing::Linear;
use crate::probing::ProbeSequence;
use crate::probing::ProbeWalk;
use crate::raw;
use crate::raw::Fallibility;

/// One cell of the backing array. `next` indexes another cell of the same
/// array and is `None` whenever `value` is.
#[derive(Clone)]
struct Cell<T> {
    value: Option<T>,
    next: Option<usize>,
}

impl<T> Cell<T> {
    const fn empty() -> Self {
        Self {
            value: None,
            next: None,
        }
    }

    fn take(&mut self) -> Option<T> {
        self.next = None;
        self.value.take()
    }
}

impl<T: Debug> Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            None => f.write_str("Empty"),
            Some(value) => {
                value.fmt(f)?;
                match self.next {
                    Some(next) => write!(f, " -> {next}"),
                    None => Ok(()),
                }
            }
        }
    }
}

/// A hash table whose collision lists live inside its own array.
///
/// Every cell can hold one element and a link to another cell. The element
/// whose home slot is `h` always heads the chain of `h`; colliding elements
/// borrow free cells, found by walking the probe sequence `P` (the "guess"),
/// and are linked behind it. When a new element's home cell is held by a
/// borrower from some other chain, the newcomer takes its home cell back and
/// the borrower is moved to another free cell of its own chain.
///
/// # Examples
///
/// ```rust
/// use probe_hash::MixedTable;
/// use probe_hash::contract;
///
/// let by_value = contract::from_fns(|n: &u32| u64::from(*n), |a: &u32, b: &u32| a.cmp(b));
/// let mut table: MixedTable<u32, _> = MixedTable::with_capacity_and_contract(4, by_value);
/// table.insert(0); // home 0
/// table.insert(4); // home 0, borrows cell 1
/// table.insert(1); // home 1, takes cell 1 back
///
/// assert_eq!(format!("{table:?}"), "MixedTable { capacity: 4, stuffed: 3, cells: [0 -> 2, 1, 4, Empty] }");
/// ```
#[derive(Clone)]
pub struct MixedTable<T, C = Natural, P = Linear> {
    cells: Vec<Cell<T>>,
    stuffed: usize,
    contract: C,
    probe: P,
}

impl<T, C, P> MixedTable<T, C, P>
where
    C: Contract<T>,
    P: ProbeSequence,
{
    /// Creates an empty table with `capacity` cells that looks for free cells
    /// along `probe`.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_probe_sequence(capacity: usize, probe: P, contract: C) -> Self {
        Self {
            cells: raw::infallible(raw::alloc_slots(
                capacity.max(1),
                Fallibility::Infallible,
                Cell::empty,
            )),
            stuffed: 0,
            contract,
            probe,
        }
    }

    /// Returns the number of cells.
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Returns the number of stored elements.
    pub fn stuffed(&self) -> usize {
        self.stuffed
    }

    /// Returns the number of stored elements. Same as [`stuffed`].
    ///
    /// [`stuffed`]: MixedTable::stuffed
    pub fn len(&self) -> usize {
        self.stuffed
    }

    /// Returns `true` if the table holds no elements.
    pub fn is_empty(&self) -> bool {
        self.stuffed == 0
    }

    /// Ratio of stored elements to cells.
    pub fn load_factor(&self) -> f64 {
        self.stuffed as f64 / self.cells.len() as f64
    }

    /// Returns the contract used to hash and compare elements.
    pub fn contract(&self) -> &C {
        &self.contract
    }

    fn home_of(&self, elem: &T) -> usize {
        raw::home_slot(self.contract.hash(elem), self.cells.len())
    }

    /// Finds `elem` in the chain of `home`, returning the index of the cell
    /// linking to it (if any) and its own index.
    fn locate(&self, home: usize, elem: &T) -> Option<(Option<usize>, usize)> {
        let head = self.cells[home].value.as_ref()?;
        // A borrower in the home cell means the chain of `home` is empty.
        if self.home_of(head) != home {
            return None;
        }

        let mut prev = None;
        let mut index = home;
        loop {
            let cell = &self.cells[index];
            if cell
                .value
                .as_ref()
                .is_some_and(|value| self.contract.same_key(value, elem))
            {
                return Some((prev, index));
            }
            prev = Some(index);
            index = cell.next?;
        }
    }

    /// Returns the stored element with the same key as `elem`.
    pub fn search(&self, elem: &T) -> Option<&T> {
        let (_, index) = self.locate(self.home_of(elem), elem)?;
        self.cells[index].value.as_ref()
    }

    /// Returns `true` if an element with the same key as `elem` is stored.
    pub fn contains(&self, elem: &T) -> bool {
        self.search(elem).is_some()
    }

    /// Inserts `elem`.
    ///
    /// The table first doubles if its load factor has passed 0.75. An element
    /// with the same key is replaced in its cell and returned.
    pub fn insert(&mut self, elem: T) -> Option<T> {
        raw::infallible(self.insert_inner(elem, Fallibility::Infallible))
    }

    /// Like [`insert`], but returns an error if growing the table fails to
    /// allocate. The table is unchanged on error and `elem` is dropped.
    ///
    /// [`insert`]: MixedTable::insert
    pub fn try_insert(&mut self, elem: T) -> Result<Option<T>, TryReserveError> {
        self.insert_inner(elem, Fallibility::Fallible)
    }

    fn insert_inner(
        &mut self,
        elem: T,
        fallibility: Fallibility,
    ) -> Result<Option<T>, TryReserveError> {
        if raw::needs_growth(self.stuffed, self.cells.len()) {
            self.grow(fallibility)?;
        }

        let home = self.home_of(&elem);
        if let Some((_, index)) = self.locate(home, &elem) {
            return Ok(self.cells[index].value.replace(elem));
        }

        self.place(home, elem);
        self.stuffed += 1;
        Ok(None)
    }

    /// Stores an element known to be absent. The caller accounts for it in
    /// `stuffed`.
    fn place(&mut self, home: usize, elem: T) {
        let Some(occupant) = self.cells[home].value.as_ref() else {
            self.cells[home].value = Some(elem);
            return;
        };

        let occupant_home = self.home_of(occupant);
        if occupant_home == home {
            self.append(home, elem);
            return;
        }

        trace!(
            "mixed table: cell {} reclaimed from an element of chain {}",
            home, occupant_home
        );
        self.unlink(occupant_home, home);
        let evicted = mem::replace(
            &mut self.cells[home],
            Cell {
                value: Some(elem),
                next: None,
            },
        );
        if let Some(evicted) = evicted.value {
            // The head of `occupant_home` is native, so this never evicts.
            self.append(occupant_home, evicted);
        }
    }

    /// Links `elem` behind the tail of the non-empty chain of `home`, in the
    /// first free cell along the probe walk.
    fn append(&mut self, home: usize, elem: T) {
        let mut tail = home;
        while let Some(next) = self.cells[tail].next {
            tail = next;
        }

        let hash = self.contract.hash(&elem);
        let free = ProbeWalk::new(&self.probe, hash, self.cells.len())
            .find(|&index| self.cells[index].value.is_none());
        let Some(free) = free else {
            unreachable!("a table under its load limit has a free cell");
        };

        self.cells[free] = Cell {
            value: Some(elem),
            next: None,
        };
        self.cells[tail].next = Some(free);
    }

    /// Detaches the non-head cell `index` from the chain of `home`.
    fn unlink(&mut self, home: usize, index: usize) {
        let mut prev = home;
        while let Some(next) = self.cells[prev].next {
            if next == index {
                self.cells[prev].next = self.cells[index].next.take();
                return;
            }
            prev = next;
        }
        unreachable!("cell {index} is not linked from chain {home}");
    }

    /// Removes and returns the stored element with the same key as `elem`.
    ///
    /// A removed chain head is replaced by its successor; a removed link is
    /// spliced out. Does nothing and returns `None` if no such element is
    /// stored.
    pub fn delete(&mut self, elem: &T) -> Option<T> {
        let (prev, index) = self.locate(self.home_of(elem), elem)?;

        let removed = match prev {
            Some(prev) => {
                self.cells[prev].next = self.cells[index].next;
                self.cells[index].take()
            }
            None => match self.cells[index].next {
                Some(successor) => {
                    let successor = mem::replace(&mut self.cells[successor], Cell::empty());
                    mem::replace(&mut self.cells[index], successor).value
                }
                None => self.cells[index].take(),
            },
        };

        if removed.is_some() {
            self.stuffed -= 1;
        }
        removed
    }

    /// Doubles the number of cells and places every element again.
    pub fn rehash(&mut self) {
        raw::infallible(self.grow(Fallibility::Infallible));
    }

    /// Like [`rehash`], but returns an error instead of aborting when the
    /// doubled array cannot be allocated. The table is unchanged on error.
    ///
    /// [`rehash`]: MixedTable::rehash
    pub fn try_rehash(&mut self) -> Result<(), TryReserveError> {
        self.grow(Fallibility::Fallible)
    }

    fn grow(&mut self, fallibility: Fallibility) -> Result<(), TryReserveError> {
        let old_capacity = self.cells.len();
        let capacity = raw::doubled(old_capacity, fallibility)?;
        let cells = raw::alloc_slots(capacity, fallibility, Cell::empty)?;

        // Chains are rebuilt from scratch, so cells are visited by index.
        let old_cells = mem::replace(&mut self.cells, cells);
        for value in old_cells.into_iter().filter_map(|cell| cell.value) {
            let home = self.home_of(&value);
            self.place(home, value);
        }

        debug!(
            "mixed table rehashed: {} -> {} cells, {} elements",
            old_capacity, capacity, self.stuffed
        );

        Ok(())
    }
}

impl<T, C, P> MixedTable<T, C, P>
where
    C: Contract<T>,
    P: ProbeSequence + Default,
{
    /// Creates an empty table with `capacity` cells and the default guess
    /// strategy.
    pub fn with_capacity_and_contract(capacity: usize, contract: C) -> Self {
        Self::with_probe_sequence(capacity, P::default(), contract)
    }
}

impl<T, C, P> MixedTable<T, C, P>
where
    C: Contract<T> + Default,
    P: ProbeSequence + Default,
{
    /// Creates an empty table with [`DEFAULT_CAPACITY`] cells.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table with `capacity` cells and a default contract.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_contract(capacity, C::default())
    }
}

impl<T, C, P> Default for MixedTable<T, C, P>
where
    C: Contract<T> + Default,
    P: ProbeSequence + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C, P> MixedTable<T, C, P> {
    /// Drops every stored element, keeping the current capacity.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::empty();
        }
        self.stuffed = 0;
    }

    /// Returns an iterator over the stored elements in cell order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cells: self.cells.iter(),
            remaining: self.stuffed,
        }
    }
}

#[cfg(feature = "stats")]
impl<T, C, P> MixedTable<T, C, P>
where
    C: Contract<T>,
    P: ProbeSequence,
{
    /// Returns cell-level statistics. `longest_chain` counts the cells of the
    /// longest chain, head included.
    pub fn debug_stats(&self) -> crate::stats::TableStats {
        let longest_chain = (0..self.cells.len())
            .filter(|&home| {
                self.cells[home]
                    .value
                    .as_ref()
                    .is_some_and(|head| self.home_of(head) == home)
            })
            .map(|home| {
                let mut length = 1;
                let mut index = home;
                while let Some(next) = self.cells[index].next {
                    length += 1;
                    index = next;
                }
                length
            })
            .max()
            .unwrap_or(0);

        crate::stats::TableStats {
            capacity: self.cells.len(),
            stuffed: self.stuffed,
            occupied_slots: self.stuffed,
            tombstones: 0,
            longest_chain,
        }
    }
}

impl<T, C, P> Table<T> for MixedTable<T, C, P>
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

impl<T: Debug, C, P> Debug for MixedTable<T, C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixedTable")
            .field("capacity", &self.cells.len())
            .field("stuffed", &self.stuffed)
            .field("cells", &self.cells)
            .finish()
    }
}

/// An iterator over the elements of a [`MixedTable`].
///
/// Created by [`MixedTable::iter`].
pub struct Iter<'a, T> {
    cells: core::slice::Iter<'a, Cell<T>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.cells.by_ref().find_map(|cell| cell.value.as_ref())?;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T, C, P> IntoIterator for &'a MixedTable<T, C, P> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::Cell as DropCount;

    use super::*;
    use crate::probing::DoubleHashing;
    use crate::probing::Probing;
    use crate::testing;
    use crate::testing::ByKey;
    use crate::testing::Keyed;
    use crate::testing::SipHashBuilder;

    fn keyed_table(capacity: usize) -> MixedTable<Keyed, ByKey> {
        MixedTable::with_capacity_and_contract(capacity, ByKey)
    }

    fn layout(table: &MixedTable<Keyed, ByKey>) -> Vec<(Option<u64>, Option<usize>)> {
        table
            .cells
            .iter()
            .map(|cell| (cell.value.as_ref().map(|k| k.key), cell.next))
            .collect()
    }

    /// Every chain starts at a native head, links only elements of that home,
    /// and together the chains reach every stored element exactly once.
    fn assert_chains_consistent<P: ProbeSequence>(table: &MixedTable<Keyed, ByKey, P>) {
        let capacity = table.capacity();
        let mut reached = vec![false; capacity];
        for home in 0..capacity {
            let Some(head) = &table.cells[home].value else {
                assert_eq!(table.cells[home].next, None);
                continue;
            };
            if table.home_of(head) != home {
                continue;
            }
            let mut index = Some(home);
            while let Some(at) = index {
                let value = table.cells[at].value.as_ref().unwrap();
                assert_eq!(table.home_of(value), home, "cell {at}");
                assert!(!reached[at], "cell {at} reached twice");
                reached[at] = true;
                index = table.cells[at].next;
            }
        }
        let occupied = table.cells.iter().filter(|c| c.value.is_some()).count();
        assert_eq!(reached.iter().filter(|&&r| r).count(), occupied);
        assert_eq!(occupied, table.stuffed());
    }

    #[test]
    fn borrowed_cell_is_reclaimed() {
        let mut table = keyed_table(4);
        table.insert(Keyed::new(1, 0)); // A
        table.insert(Keyed::new(2, 4)); // B, home 0
        assert_eq!(
            layout(&table),
            vec![(Some(1), Some(1)), (Some(2), None), (None, None), (None, None)]
        );

        table.insert(Keyed::new(3, 1)); // C, home 1
        assert_eq!(table.capacity(), 4);
        assert_eq!(table.stuffed(), 3);
        assert_eq!(
            layout(&table),
            vec![(Some(1), Some(2)), (Some(3), None), (Some(2), None), (None, None)]
        );
        for (key, hash) in [(1, 0), (2, 4), (3, 1)] {
            assert_eq!(table.search(&Keyed::new(key, hash)).unwrap().key, key);
        }
        assert_chains_consistent(&table);
    }

    #[test]
    fn eviction_keeps_the_rest_of_the_chain() {
        let mut table = keyed_table(8);
        for key in 0..4 {
            table.insert(Keyed::new(key, 0));
        }
        // Chain of 0 runs through cells 0, 1, 2, 3.
        table.insert(Keyed::new(10, 2));

        assert_eq!(table.cells[2].value.as_ref().unwrap().key, 10);
        assert_eq!(table.cells[2].next, None);
        assert_eq!(table.cells[1].next, Some(3));
        assert_eq!(table.cells[3].next, Some(4));
        assert_eq!(table.cells[4].value.as_ref().unwrap().key, 2);
        for key in 0..4 {
            assert!(table.contains(&Keyed::new(key, 0)));
        }
        assert_chains_consistent(&table);
    }

    #[test]
    fn delete_head_promotes_successor() {
        let mut table = keyed_table(8);
        table.insert(Keyed::new(1, 0));
        table.insert(Keyed::new(2, 0));
        table.insert(Keyed::new(3, 0));

        assert_eq!(table.delete(&Keyed::new(1, 0)).unwrap().key, 1);
        assert_eq!(table.stuffed(), 2);
        assert_eq!(table.cells[0].value.as_ref().unwrap().key, 2);
        assert_eq!(table.cells[0].next, Some(2));
        assert!(table.cells[1].value.is_none());
        assert_eq!(table.cells[1].next, None);
        assert!(table.contains(&Keyed::new(3, 0)));
        assert_chains_consistent(&table);
    }

    #[test]
    fn delete_link_splices_it_out() {
        let mut table = keyed_table(8);
        for key in 1..=3 {
            table.insert(Keyed::new(key, 0));
        }

        assert_eq!(table.delete(&Keyed::new(2, 0)).unwrap().key, 2);
        assert_eq!(table.cells[0].next, Some(2));
        assert!(table.cells[1].value.is_none());
        assert_eq!(table.delete(&Keyed::new(3, 0)).unwrap().key, 3);
        assert_eq!(table.cells[0].next, None);
        assert_eq!(table.delete(&Keyed::new(1, 0)).unwrap().key, 1);
        assert!(table.is_empty());
        assert!(table.cells.iter().all(|c| c.value.is_none() && c.next.is_none()));
    }

    #[test]
    fn search_ignores_borrowers() {
        let mut table = keyed_table(8);
        table.insert(Keyed::new(1, 0));
        table.insert(Keyed::new(2, 0)); // borrows cell 1

        // Same key as the borrower, but homed at 1: a different element.
        assert!(table.search(&Keyed::new(2, 1)).is_none());
        assert!(table.delete(&Keyed::new(2, 1)).is_none());
        assert_eq!(table.stuffed(), 2);
    }

    #[test]
    fn replace_in_borrowed_cell() {
        let mut table = keyed_table(8);
        table.insert(Keyed::with_payload(1, 0, "a"));
        table.insert(Keyed::with_payload(2, 0, "b"));

        let previous = table.insert(Keyed::with_payload(2, 0, "c"));
        assert_eq!(previous.unwrap().payload, "b");
        assert_eq!(table.stuffed(), 2);
        assert_eq!(table.cells[1].value.as_ref().unwrap().payload, "c");
    }

    #[test]
    fn growth_rebuilds_chains() {
        let mut table = keyed_table(4);
        for key in 0..4 {
            table.insert(Keyed::new(key, key * 4));
        }
        assert_eq!(table.capacity(), 4);

        table.insert(Keyed::new(4, 16));
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.stuffed(), 5);
        for key in 0..5 {
            assert!(table.contains(&Keyed::new(key, key * 4)));
        }
        assert_chains_consistent(&table);
    }

    #[test]
    fn custom_guess_strategy() {
        let mut table: MixedTable<Keyed, ByKey, DoubleHashing> =
            MixedTable::with_probe_sequence(64, DoubleHashing, ByKey);
        table.insert(Keyed::new(1, 1));
        table.insert(Keyed::new(2, 1));

        // Step for hash 1 is 30.
        assert_eq!(table.cells[1].next, Some(31));
        assert_eq!(table.cells[31].value.as_ref().unwrap().key, 2);

        let mut table = MixedTable::with_probe_sequence(8, Probing::Quadratic, ByKey);
        for key in 0..6 {
            table.insert(Keyed::new(key, 0));
        }
        assert_chains_consistent(&table);
    }

    #[test]
    fn drops_every_element_once() {
        let drops = Rc::new(DropCount::new(0));
        {
            let mut table = keyed_table(1);
            for key in 0..25 {
                table.insert(Keyed::counted(key, key % 3, &drops));
            }
            assert_eq!(drops.get(), 0);
            drop(table.delete(&Keyed::new(4, 1)));
            drop(table.insert(Keyed::counted(5, 2, &drops)));
            assert_eq!(drops.get(), 2);
        }
        assert_eq!(drops.get(), 26);
    }

    #[test]
    fn debug_shows_links() {
        let mut table: MixedTable<u8, _> =
            MixedTable::with_capacity_and_contract(4, testing::Identity);
        table.insert(0);
        table.insert(4);
        table.insert(8);
        assert_eq!(
            alloc::format!("{:?}", table),
            "MixedTable { capacity: 4, stuffed: 3, cells: [0 -> 1, 4 -> 2, 8, Empty] }"
        );
    }

    #[test]
    fn clear_and_iter() {
        let mut table = keyed_table(8);
        for key in 0..5 {
            table.insert(Keyed::new(key, key % 2));
        }
        let mut keys: Vec<u64> = table.iter().map(|k| k.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, [0, 1, 2, 3, 4]);
        assert_eq!(table.iter().len(), 5);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 8);
        assert!(table.search(&Keyed::new(0, 0)).is_none());
    }

    #[test]
    fn string_elements() {
        let mut table: MixedTable<String, Natural<SipHashBuilder>> = MixedTable::with_capacity(2);
        for word in ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"] {
            table.insert(word.to_string());
        }
        assert_eq!(table.stuffed(), 6);
        assert_eq!(table.delete(&"beta".to_string()).as_deref(), Some("beta"));
        assert!(!table.contains(&"beta".to_string()));
        assert!(table.contains(&"epsilon".to_string()));
    }

    #[test]
    fn table_properties() {
        testing::check_table_properties(|capacity| {
            MixedTable::<u64, _, Linear>::with_capacity_and_contract(
                capacity,
                Natural::with_hasher(SipHashBuilder::default()),
            )
        });
    }

    #[test]
    fn adversarial_hashes() {
        testing::check_against_oracle(keyed_table(1), 21);
        testing::check_against_oracle(keyed_table(5), 22);
    }

    #[test]
    fn chains_stay_consistent_under_churn() {
        use rand::Rng;
        use rand::SeedableRng;
        use rand::rngs::SmallRng;

        testing::init_logging();
        let mut rng = SmallRng::seed_from_u64(0xce11);
        let mut table = keyed_table(2);
        for _ in 0..2_000 {
            let key = rng.random_range(0..40u64);
            let hash = key % 11;
            if rng.random_bool(0.6) {
                table.insert(Keyed::new(key, hash));
            } else {
                table.delete(&Keyed::new(key, hash));
            }
            assert_chains_consistent(&table);
        }
    }
}
