use std::borrow::Borrow;
use std::fmt;
use std::slice;

use buffer_pool::{PoolProvider, ThreadShared};

use crate::index::{HashIndex, Lookup};
use crate::{Cursor, DefaultComparer, KeyComparer, Result};

/// A hash set that keeps its items in a dense array rented from a buffer pool.
///
/// This is the engine of [`Dictionary`](crate::Dictionary) without values: items live in one
/// contiguous array that [`as_slice()`](Self::as_slice) exposes directly, and a robin-hood
/// hashed table of compact slots maps hashes to positions in that array.
///
/// Besides the usual membership operations, the set offers in-place set algebra
/// ([`union_with()`](Self::union_with), [`intersect_with()`](Self::intersect_with) and
/// friends) and comparisons against any sequence of items
/// ([`is_subset_of()`](Self::is_subset_of) and friends).
///
/// # Examples
///
/// ```
/// use dense_hash::Set;
///
/// let mut primes: Set<u32> = [2, 3, 5, 7].into_iter().collect();
///
/// assert!(primes.contains(&5).unwrap());
/// assert!(!primes.insert(7).unwrap());
///
/// primes.intersect_with([1, 2, 3, 4]).unwrap();
/// assert_eq!(primes.len(), 2);
/// assert!(primes.set_equals([3, 2]).unwrap());
/// ```
pub struct Set<T: 'static, C = DefaultComparer, A: PoolProvider = ThreadShared> {
    index: HashIndex<T, (), C, A>,
}

impl<T: 'static> Set<T> {
    /// Creates an empty set that rents from the pools of the current thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparer(DefaultComparer::new())
    }

    /// Creates an empty set that holds at least `capacity` items before growing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if `capacity`
    /// exceeds the largest supported table.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_comparer_in(capacity, DefaultComparer::new(), ThreadShared)
    }
}

impl<T: 'static, C> Set<T, C> {
    /// Creates an empty set that compares items with the given comparer.
    #[must_use]
    pub fn with_comparer(comparer: C) -> Self {
        Self::with_capacity_and_comparer_in(0, comparer, ThreadShared)
            .expect("an empty table is always within limits")
    }
}

impl<T: 'static, A: PoolProvider> Set<T, DefaultComparer, A> {
    /// Creates an empty set that rents its storage from the given provider.
    #[must_use]
    pub fn new_in(provider: A) -> Self {
        Self::with_capacity_and_comparer_in(0, DefaultComparer::new(), provider)
            .expect("an empty table is always within limits")
    }
}

impl<T: 'static, C, A: PoolProvider> Set<T, C, A> {
    /// Creates an empty set with every setting given explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if `capacity`
    /// exceeds the largest supported table.
    pub fn with_capacity_and_comparer_in(
        capacity: usize,
        comparer: C,
        provider: A,
    ) -> Result<Self> {
        Ok(Self {
            index: HashIndex::new(capacity, comparer, provider)?,
        })
    }

    /// The number of items. Zero once disposed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the set has no items. Always true once disposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many items fit before the next insertion grows the storage. Zero once disposed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// Whether [`dispose()`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.index.is_disposed()
    }

    /// The comparer that hashes and compares items.
    #[must_use]
    pub fn comparer(&self) -> &C {
        self.index.comparer()
    }

    /// The provider the storage is rented from.
    #[must_use]
    pub fn provider(&self) -> &A {
        self.index.provider()
    }

    /// The items, in iteration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn as_slice(&self) -> Result<&[T]> {
        Ok(self.index.tables()?.keys())
    }

    /// An iterator over the items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn iter(&self) -> Result<slice::Iter<'_, T>> {
        Ok(self.as_slice()?.iter())
    }

    /// Creates a cursor positioned before the first item. See [`Cursor`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn cursor(&self) -> Result<Cursor> {
        self.index.cursor()
    }

    /// Yields the item at the position of the cursor and advances it, or `None` past the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignCursor`](crate::Error::ForeignCursor) if the cursor was created
    /// by another collection,
    /// [`Error::ConcurrentModification`](crate::Error::ConcurrentModification) if the set was
    /// structurally modified since the cursor was created, or
    /// [`Error::Disposed`](crate::Error::Disposed) if it has been disposed.
    pub fn next_item(&self, cursor: &mut Cursor) -> Result<Option<&T>> {
        let items = self.as_slice()?;

        cursor.advance(self.index.id(), self.index.version(), |position| {
            items.get(position)
        })
    }

    /// Removes every item, keeping the storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn clear(&mut self) -> Result<()> {
        self.index.clear()
    }

    /// Drops every item and hands all storage back to the provider. Every later fallible
    /// operation fails with [`Error::Disposed`](crate::Error::Disposed).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if already disposed, or
    /// [`Error::Pool`](crate::Error::Pool) if the provider rejects the storage being handed
    /// back. The set is disposed either way.
    pub fn dispose(&mut self) -> Result<()> {
        self.index.dispose()
    }

    pub(crate) fn engine(&self) -> &HashIndex<T, (), C, A> {
        &self.index
    }

    pub(crate) fn engine_mut(&mut self) -> &mut HashIndex<T, (), C, A> {
        &mut self.index
    }
}

impl<T: 'static, C, A> Set<T, C, A>
where
    C: KeyComparer<T>,
    A: PoolProvider,
{
    /// Adds the item. Returns whether it was added; if an equal item is already present the set
    /// is unchanged and `item` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if the set cannot
    /// grow to hold another item.
    pub fn insert(&mut self, item: T) -> Result<bool> {
        self.index
            .insert_if_absent(item, ())
            .map(|(_, inserted)| inserted)
    }

    /// Whether an item equal to `item` is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn contains<Q>(&self, item: &Q) -> Result<bool>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        Ok(self.index.find(item)?.is_some())
    }

    /// The stored item equal to `item`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn get<Q>(&self, item: &Q) -> Result<Option<&T>>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let Some(value_index) = self.index.find(item)? else {
            return Ok(None);
        };

        Ok(Some(self.index.tables()?.key_at(value_index)))
    }

    /// The stored item equal to `item`, adding the one made by `create` if absent.
    ///
    /// `create` receives the lookup form and must return an owned item equal to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use dense_hash::Set;
    ///
    /// let mut interned: Set<String> = Set::new();
    ///
    /// let first = interned.get_or_insert_with("tag", str::to_string).unwrap().as_ptr();
    /// let second = interned.get_or_insert_with("tag", |_| unreachable!()).unwrap().as_ptr();
    ///
    /// assert_eq!(first, second);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if the set cannot
    /// grow to hold another item.
    pub fn get_or_insert_with<Q>(&mut self, item: &Q, create: impl FnOnce(&Q) -> T) -> Result<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let value_index = match self.index.lookup(item)? {
            Lookup::Occupied(value_index) => value_index,
            Lookup::Vacant(vacancy) => self.index.insert_vacant(vacancy, create(item), ())?,
        };

        Ok(self.index.tables()?.key_at(value_index))
    }

    /// Removes the item equal to `item`. Returns whether it was present.
    ///
    /// The last item in iteration order moves into the position of the removed one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn remove<Q>(&mut self, item: &Q) -> Result<bool>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        Ok(self.index.remove(item)?.is_some())
    }

    /// Removes and returns the stored item equal to `item`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn take<Q>(&mut self, item: &Q) -> Result<Option<T>>
    where
        T: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        Ok(self.index.remove(item)?.map(|(item, ())| item))
    }

    /// Grows the storage so that at least `capacity` items fit without further growth.
    /// Never shrinks. Returns the resulting capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if `capacity` exceeds
    /// the largest supported table, or [`Error::Disposed`](crate::Error::Disposed) if the set
    /// has been disposed.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.index.ensure_capacity(capacity)
    }

    /// Verifies the internal invariants of the set. Does nothing once disposed.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violation found.
    pub fn integrity_check(&self) {
        self.index.check_integrity();
    }
}

impl<T: 'static> Default for Set<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, C, A> Extend<T> for Set<T, C, A>
where
    C: KeyComparer<T>,
    A: PoolProvider,
{
    /// Adds every item that is not already present.
    ///
    /// # Panics
    ///
    /// Panics if the set has been disposed or cannot grow.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            if let Err(error) = self.insert(item) {
                panic!("cannot extend set: {error}");
            }
        }
    }
}

impl<T: 'static, C, A> FromIterator<T> for Set<T, C, A>
where
    C: KeyComparer<T> + Default,
    A: PoolProvider + Default,
{
    /// # Panics
    ///
    /// Panics if the items do not fit in the largest supported table.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();

        let mut set =
            match Self::with_capacity_and_comparer_in(iter.size_hint().0, C::default(), A::default())
            {
                Ok(set) => set,
                Err(error) => panic!("cannot collect into set: {error}"),
            };

        set.extend(iter);
        set
    }
}

impl<T: 'static, C, A> PartialEq for Set<T, C, A>
where
    C: KeyComparer<T>,
    A: PoolProvider,
{
    /// Two sets are equal if they hold equal items, in any order. Two disposed sets are equal to
    /// each other and to nothing else.
    fn eq(&self, other: &Self) -> bool {
        let (Ok(items), Ok(_)) = (self.as_slice(), other.as_slice()) else {
            return self.is_disposed() && other.is_disposed();
        };

        self.len() == other.len()
            && items
                .iter()
                .all(|item| matches!(other.contains(item), Ok(true)))
    }
}

impl<T: 'static, C, A> Eq for Set<T, C, A>
where
    C: KeyComparer<T>,
    A: PoolProvider,
{
}

impl<T: 'static + fmt::Debug, C, A: PoolProvider> fmt::Debug for Set<T, C, A> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_slice() {
            Ok(items) => f.debug_set().entries(items).finish(),
            Err(_) => f.write_str("Set(disposed)"),
        }
    }
}

impl<'a, T: 'static, C, A: PoolProvider> IntoIterator for &'a Set<T, C, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    /// # Panics
    ///
    /// Panics if the set has been disposed.
    fn into_iter(self) -> Self::IntoIter {
        match self.iter() {
            Ok(iter) => iter,
            Err(error) => panic!("cannot iterate set: {error}"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::rc::Rc;

    use buffer_pool::{PoolMode, PoolSet};
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::Error;

    assert_impl_all!(Set<String>: Send, Sync);
    assert_not_impl_any!(Set<Rc<u8>>: Send, Sync);

    #[test]
    fn insert_contains_remove() {
        let mut set = Set::new();

        assert!(set.insert("a".to_string()).unwrap());
        assert!(set.insert("b".to_string()).unwrap());
        assert!(!set.insert("a".to_string()).unwrap());

        assert_eq!(set.len(), 2);
        assert!(set.contains("a").unwrap());
        assert!(!set.contains("c").unwrap());
        assert_eq!(set.get("b").unwrap().map(String::as_str), Some("b"));

        assert!(set.remove("a").unwrap());
        assert!(!set.remove("a").unwrap());
        assert_eq!(set.take("b").unwrap().as_deref(), Some("b"));
        assert!(set.is_empty());
        set.integrity_check();
    }

    #[test]
    fn removal_moves_last_item_forward() {
        let mut set: Set<u16> = (10..15).collect();

        set.remove(&10).unwrap();

        assert_eq!(set.as_slice().unwrap(), [14, 11, 12, 13]);
        set.integrity_check();
    }

    #[test]
    fn cursor_detects_insert() {
        let mut set: Set<u8> = [1, 2, 3].into_iter().collect();

        let mut cursor = set.cursor().unwrap();
        assert_eq!(set.next_item(&mut cursor).unwrap(), Some(&1));

        set.insert(4).unwrap();

        assert!(matches!(
            set.next_item(&mut cursor),
            Err(Error::ConcurrentModification { .. })
        ));

        // A fresh cursor sees the new item.
        let mut cursor = set.cursor().unwrap();
        let mut seen = Vec::new();
        while let Some(item) = set.next_item(&mut cursor).unwrap() {
            seen.push(*item);
        }
        assert_eq!(seen, [1, 2, 3, 4]);
    }

    #[test]
    fn cursor_is_bound_to_its_set() {
        let first: Set<u8> = [1, 2].into_iter().collect();
        let second: Set<u8> = [3, 4].into_iter().collect();

        let mut cursor = first.cursor().unwrap();

        // Both sets went through the same number of structural modifications.
        assert!(matches!(
            second.next_item(&mut cursor),
            Err(Error::ForeignCursor)
        ));
        assert_eq!(cursor.position(), 0);

        assert_eq!(first.next_item(&mut cursor).unwrap(), Some(&1));
    }

    #[test]
    fn failed_insert_keeps_cursor_valid() {
        let mut set: Set<u8> = [1, 2].into_iter().collect();
        let mut cursor = set.cursor().unwrap();

        assert!(!set.insert(1).unwrap());
        assert!(!set.remove(&9).unwrap());

        assert_eq!(set.next_item(&mut cursor).unwrap(), Some(&1));
    }

    #[test]
    fn equality_and_debug() {
        let forward: Set<i32> = (0..10).collect();
        let backward: Set<i32> = (0..10).rev().collect();
        let shorter: Set<i32> = (0..9).collect();

        assert_eq!(forward, backward);
        assert_ne!(forward, shorter);

        let single: Set<i32> = [7].into_iter().collect();
        assert_eq!(format!("{single:?}"), "{7}");
    }

    #[test]
    fn dispose_returns_storage() {
        let pools = PoolSet::builder()
            .smallest_length(1)
            .build_set(PoolMode::Diagnostic);

        let mut set = Set::new_in(&pools);
        set.extend(0..100_u64);
        assert_eq!(set.len(), 100);

        set.dispose().unwrap();
        pools.assert_all_returned();

        assert!(matches!(set.insert(1), Err(Error::Disposed)));
        assert!(matches!(set.contains(&1), Err(Error::Disposed)));
        assert!(matches!(set.as_slice(), Err(Error::Disposed)));
        assert!(matches!(set.dispose(), Err(Error::Disposed)));
        assert_eq!(format!("{set:?}"), "Set(disposed)");
    }

    #[test]
    fn ensure_capacity_avoids_growth() {
        let mut set = Set::new();
        let capacity = set.ensure_capacity(1000).unwrap();
        assert!(capacity >= 1000);

        for item in 0..1000_u32 {
            set.insert(item).unwrap();
        }

        assert_eq!(set.capacity(), capacity);
    }

    #[test]
    #[should_panic]
    fn iterating_disposed_panics() {
        let mut set: Set<u8> = Set::new();
        set.dispose().unwrap();

        for _ in &set {}
    }
}
