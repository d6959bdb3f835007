//! Helpers shared by the per-table test modules.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::cmp::Ordering;
use core::hash::BuildHasher;

use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use siphasher::sip::SipHasher;

use crate::Table;
use crate::contract::Contract;
use crate::raw;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Debug)]
pub(crate) struct SipHashBuilder {
    k0: u64,
    k1: u64,
}

impl BuildHasher for SipHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new_with_keys(self.k0, self.k1)
    }
}

impl Default for SipHashBuilder {
    fn default() -> Self {
        let mut rng = OsRng;
        Self {
            k0: rng.try_next_u64().unwrap_or(0),
            k1: rng.try_next_u64().unwrap_or(0),
        }
    }
}

/// Element whose hash is chosen by the test, so collisions can be staged.
#[derive(Clone, Debug)]
pub(crate) struct Keyed {
    pub(crate) key: u64,
    pub(crate) hash: u64,
    pub(crate) payload: &'static str,
    drops: Option<Rc<Cell<usize>>>,
}

impl Keyed {
    pub(crate) fn new(key: u64, hash: u64) -> Self {
        Self::with_payload(key, hash, "")
    }

    pub(crate) fn with_payload(key: u64, hash: u64, payload: &'static str) -> Self {
        Self {
            key,
            hash,
            payload,
            drops: None,
        }
    }

    /// Bumps `drops` when dropped.
    pub(crate) fn counted(key: u64, hash: u64, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            key,
            hash,
            payload: "",
            drops: Some(Rc::clone(drops)),
        }
    }
}

impl Drop for Keyed {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.set(drops.get() + 1);
        }
    }
}

/// Hashes a [`Keyed`] to its staged hash and compares keys only.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ByKey;

impl Contract<Keyed> for ByKey {
    fn hash(&self, elem: &Keyed) -> u64 {
        elem.hash
    }

    fn compare(&self, a: &Keyed, b: &Keyed) -> Ordering {
        a.key.cmp(&b.key)
    }
}

/// Uses an integer as its own hash.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Identity;

impl<T> Contract<T> for Identity
where
    T: Copy + Ord + Into<u64>,
{
    fn hash(&self, elem: &T) -> u64 {
        (*elem).into()
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Checks the behaviour every table variant promises, on tables built by
/// `factory` for a range of initial capacities.
pub(crate) fn check_table_properties<T>(factory: impl Fn(usize) -> T)
where
    T: Table<u64>,
{
    init_logging();

    for capacity in [1usize, 2, 3, 4, 5, 8, 10, 16, 33] {
        // Insert then search.
        let mut table = factory(capacity);
        for key in 0..50u64 {
            assert_eq!(table.insert(key), None);
            assert_eq!(table.search(&key), Some(&key));
            assert!(table.stuffed() <= table.capacity());
        }
        assert_eq!(table.stuffed(), 50);

        // Deleting a present key removes exactly one element.
        for key in (0..50u64).step_by(3) {
            let before = table.stuffed();
            assert_eq!(table.delete(&key), Some(key));
            assert_eq!(table.stuffed(), before - 1);
            assert_eq!(table.search(&key), None);
        }

        // Deleting an absent key changes nothing.
        let before = table.stuffed();
        assert_eq!(table.delete(&0), None);
        assert_eq!(table.delete(&1_000), None);
        assert_eq!(table.stuffed(), before);
        for key in 0..50u64 {
            assert_eq!(table.contains(&key), key % 3 != 0, "key {key}");
        }

        // The fallible path reports insert and replace the same way.
        let mut table = factory(capacity);
        assert_eq!(table.try_insert(7), Ok(None));
        assert_eq!(table.try_insert(7), Ok(Some(7)));
        assert_eq!(table.stuffed(), 1);
        assert_eq!(table.search(&7), Some(&7));

        // Growth: one past the load limit forces at least one doubling.
        let mut table = factory(capacity);
        let initial = table.capacity();
        let count = raw::max_stuffed(initial) as u64 + 2;
        for key in 0..count {
            table.insert(key);
        }
        assert!(table.capacity() >= initial * 2, "capacity {initial}");
        for key in 0..count {
            assert_eq!(table.search(&key), Some(&key));
        }

        // A table of four holds four elements; the fifth insert doubles it.
        if capacity == 4 {
            let mut table = factory(capacity);
            for key in 0..4u64 {
                table.insert(key);
            }
            assert_eq!(table.capacity(), 4);
            assert_eq!(table.stuffed(), 4);
            table.insert(4);
            assert_eq!(table.capacity(), 8);
            assert_eq!(table.stuffed(), 5);
        }

        // Tombstones and relocated cells never block a refill.
        let mut table = factory(capacity);
        for key in 0..40u64 {
            table.insert(key);
        }
        for key in 0..40u64 {
            assert_eq!(table.delete(&key), Some(key));
        }
        assert!(table.is_empty());
        for key in 100..140u64 {
            assert_eq!(table.insert(key), None);
        }
        assert_eq!(table.stuffed(), 40);
        for key in 100..140u64 {
            assert_eq!(table.search(&key), Some(&key));
        }
        for key in 0..40u64 {
            assert_eq!(table.search(&key), None);
        }

        // Explicit rehash keeps every element.
        let old_capacity = table.capacity();
        table.rehash();
        assert_eq!(table.capacity(), old_capacity * 2);
        assert_eq!(table.stuffed(), 40);
        assert_eq!(table.try_rehash(), Ok(()));
        assert_eq!(table.capacity(), old_capacity * 4);
        for key in 100..140u64 {
            assert!(table.contains(&key));
        }
    }
}

/// Runs a random workload over keys with heavily colliding hashes and checks
/// every step against `hashbrown::HashMap`.
pub(crate) fn check_against_oracle<T>(mut table: T, seed: u64)
where
    T: Table<Keyed>,
{
    const PAYLOADS: [&str; 4] = ["north", "south", "east", "west"];

    init_logging();

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut oracle: hashbrown::HashMap<u64, &'static str> = hashbrown::HashMap::new();

    for _ in 0..4_000 {
        let key = rng.random_range(0..96u64);
        let hash = key % 7;
        match rng.random_range(0..10u32) {
            0..=4 => {
                let payload = PAYLOADS[rng.random_range(0..PAYLOADS.len())];
                let previous = table.insert(Keyed::with_payload(key, hash, payload));
                let expected = oracle.insert(key, payload);
                assert_eq!(previous.map(|p| p.payload), expected, "insert {key}");
            }
            5..=7 => {
                let removed = table.delete(&Keyed::new(key, hash));
                let expected = oracle.remove(&key);
                assert_eq!(removed.map(|r| r.payload), expected, "delete {key}");
            }
            _ => {
                let found = table.search(&Keyed::new(key, hash));
                assert_eq!(found.map(|f| f.payload), oracle.get(&key).copied());
            }
        }

        assert_eq!(table.stuffed(), oracle.len());
        assert!(table.stuffed() <= table.capacity());
    }

    let mut keys: Vec<u64> = oracle.keys().copied().collect();
    keys.sort_unstable();
    for key in keys {
        let found = table.search(&Keyed::new(key, key % 7));
        assert_eq!(found.map(|f| f.payload), oracle.get(&key).copied());
    }
}
