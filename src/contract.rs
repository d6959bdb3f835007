use core::cmp::Ordering;
use core::fmt;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// Hasher builder used by [`Natural`] when none is given.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// Hasher builder used by [`Natural`] when none is given.
        pub type DefaultHashBuilder = std::collections::hash_map::RandomState;
    } else {
        /// Placeholder hasher builder for builds without a default hasher.
        ///
        /// It cannot be constructed; pick a concrete `BuildHasher` with
        /// [`Natural::with_hasher`] instead.
        #[derive(Clone, Copy, Debug)]
        pub enum DefaultHashBuilder {}
    }
}

/// Identity of stored elements.
///
/// A table never looks inside the values it holds. Everything it needs to
/// know comes from a contract: where an element lives (`hash`) and whether two
/// elements carry the same key (`compare`). Copying and destruction are the
/// element type's own `Clone` and `Drop`.
///
/// Implementations must be consistent: elements that compare `Equal` must
/// hash identically, and `hash` must be stable across calls.
pub trait Contract<T: ?Sized> {
    /// Hashes an element. Tables reduce the result modulo their capacity.
    fn hash(&self, elem: &T) -> u64;

    /// Orders two elements; `Ordering::Equal` means they share a key.
    fn compare(&self, a: &T, b: &T) -> Ordering;

    /// Returns `true` when `a` and `b` share a key.
    #[inline]
    fn same_key(&self, a: &T, b: &T) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Contract for element types that hash and order themselves.
///
/// The whole element is the key: `hash` runs the element's `Hash` impl through
/// the hasher builder `S` and `compare` is its `Ord` impl.
///
/// # Examples
///
/// ```rust
/// use probe_hash::Contract;
/// use probe_hash::Natural;
///
/// let contract = Natural::with_hasher(std::hash::RandomState::new());
/// assert!(contract.same_key("ab", "ab"));
/// assert_eq!(contract.hash("ab"), contract.hash("ab"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct Natural<S = DefaultHashBuilder> {
    hash_builder: S,
}

impl<S> Natural<S> {
    /// Creates a contract hashing through `hash_builder`.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self { hash_builder }
    }

    /// Returns the hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }
}

impl<T, S> Contract<T> for Natural<S>
where
    T: Hash + Ord + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, elem: &T) -> u64 {
        self.hash_builder.hash_one(elem)
    }

    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Contract assembled from two caller-supplied functions.
///
/// Built with [`from_fns`]. Useful when the key is only part of the element,
/// or when the hash must take a particular value.
#[derive(Clone, Copy)]
pub struct FnContract<H, C> {
    hash: H,
    compare: C,
}

impl<H, C> Debug for FnContract<H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnContract").finish_non_exhaustive()
    }
}

/// Builds a contract from a hash function and a comparison function.
///
/// # Examples
///
/// ```rust
/// use probe_hash::ChainedTable;
/// use probe_hash::contract;
///
/// #[derive(Debug)]
/// struct Contact {
///     name: &'static str,
///     phone: &'static str,
/// }
///
/// let by_name = contract::from_fns(
///     |c: &Contact| c.name.len() as u64,
///     |a: &Contact, b: &Contact| a.name.cmp(b.name),
/// );
/// let mut table = ChainedTable::with_capacity_and_contract(4, by_name);
/// table.insert(Contact { name: "ada", phone: "555-0100" });
/// table.insert(Contact { name: "ada", phone: "555-0199" });
///
/// let probe = Contact { name: "ada", phone: "" };
/// assert_eq!(table.stuffed(), 1);
/// assert_eq!(table.search(&probe).unwrap().phone, "555-0199");
/// ```
pub fn from_fns<T, H, C>(hash: H, compare: C) -> FnContract<H, C>
where
    T: ?Sized,
    H: Fn(&T) -> u64,
    C: Fn(&T, &T) -> Ordering,
{
    FnContract { hash, compare }
}

impl<T, H, C> Contract<T> for FnContract<H, C>
where
    T: ?Sized,
    H: Fn(&T) -> u64,
    C: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn hash(&self, elem: &T) -> u64 {
        (self.hash)(elem)
    }

    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}
