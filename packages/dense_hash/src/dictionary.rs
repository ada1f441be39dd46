use std::borrow::Borrow;
use std::fmt;
use std::iter::FusedIterator;
use std::mem;
use std::ops::Index;
use std::slice;

use buffer_pool::{PoolProvider, ThreadShared};

use crate::index::{HashIndex, Lookup};
use crate::{Cursor, DefaultComparer, Error, KeyComparer, Result};

/// A hash map that keeps its entries in dense arrays rented from a buffer pool.
///
/// Keys and values live in two contiguous arrays in insertion order (until the first removal,
/// which moves the last entry into the vacated position). A separate robin-hood hashed table
/// of compact slots maps hashes to positions in those arrays, so iteration is a linear walk
/// and [`keys()`](Self::keys) and [`values()`](Self::values) are plain slices.
///
/// All storage is rented from the pool provider `A` and handed back when the dictionary
/// grows, is disposed or is dropped. By default this is the pool set of the current thread.
///
/// Keys are hashed and compared by the comparer `C`, by default their [`Hash`](std::hash::Hash)
/// and [`Eq`] implementations with a randomly seeded hasher.
///
/// # Examples
///
/// ```
/// use dense_hash::Dictionary;
///
/// let mut stock = Dictionary::new();
/// stock.insert("apples".to_string(), 3).unwrap();
/// stock.insert("pears".to_string(), 5).unwrap();
///
/// *stock.get_mut("apples").unwrap().unwrap() += 1;
///
/// assert_eq!(stock["apples"], 4);
/// assert_eq!(stock.values().unwrap(), [4, 5]);
///
/// stock.dispose().unwrap();
/// assert!(stock.get("pears").is_err());
/// ```
///
/// # Failures
///
/// Fallible operations return [`Error::Disposed`] once the dictionary has been
/// [disposed](Self::dispose). Observers such as [`len()`](Self::len) report an empty
/// dictionary instead.
///
/// # Thread safety
///
/// The dictionary is [`Send`] and [`Sync`] if its keys, values, comparer and provider are.
/// With the default provider, storage handed back on another thread goes to the pools of that
/// thread.
pub struct Dictionary<K: 'static, V: 'static, C = DefaultComparer, A: PoolProvider = ThreadShared>
{
    index: HashIndex<K, V, C, A>,
}

impl<K: 'static, V: 'static> Dictionary<K, V> {
    /// Creates an empty dictionary that rents from the pools of the current thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_comparer(DefaultComparer::new())
    }

    /// Creates an empty dictionary that holds at least `capacity` entries before growing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if `capacity` exceeds the largest supported table.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_comparer_in(capacity, DefaultComparer::new(), ThreadShared)
    }
}

impl<K: 'static, V: 'static, C> Dictionary<K, V, C> {
    /// Creates an empty dictionary that compares keys with the given comparer.
    #[must_use]
    pub fn with_comparer(comparer: C) -> Self {
        Self::with_capacity_and_comparer_in(0, comparer, ThreadShared)
            .expect("an empty table is always within limits")
    }
}

impl<K: 'static, V: 'static, A: PoolProvider> Dictionary<K, V, DefaultComparer, A> {
    /// Creates an empty dictionary that rents its storage from the given provider.
    #[must_use]
    pub fn new_in(provider: A) -> Self {
        Self::with_capacity_and_comparer_in(0, DefaultComparer::new(), provider)
            .expect("an empty table is always within limits")
    }
}

impl<K: 'static, V: 'static, C, A: PoolProvider> Dictionary<K, V, C, A> {
    /// Creates an empty dictionary with every setting given explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if `capacity` exceeds the largest supported table.
    pub fn with_capacity_and_comparer_in(
        capacity: usize,
        comparer: C,
        provider: A,
    ) -> Result<Self> {
        Ok(Self {
            index: HashIndex::new(capacity, comparer, provider)?,
        })
    }

    /// The number of entries. Zero once disposed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the dictionary has no entries. Always true once disposed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many entries fit before the next insertion grows the storage. Zero once disposed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    /// Whether [`dispose()`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.index.is_disposed()
    }

    /// The comparer that hashes and compares keys.
    #[must_use]
    pub fn comparer(&self) -> &C {
        self.index.comparer()
    }

    /// The provider the storage is rented from.
    #[must_use]
    pub fn provider(&self) -> &A {
        self.index.provider()
    }

    /// The keys, in iteration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn keys(&self) -> Result<&[K]> {
        Ok(self.index.tables()?.keys())
    }

    /// The values, in iteration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn values(&self) -> Result<&[V]> {
        Ok(self.index.tables()?.values())
    }

    /// The values, in iteration order, for modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn values_mut(&mut self) -> Result<&mut [V]> {
        Ok(self.index.tables_mut()?.values_mut())
    }

    /// An iterator over the entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn iter(&self) -> Result<Iter<'_, K, V>> {
        let tables = self.index.tables()?;

        Ok(Iter {
            keys: tables.keys().iter(),
            values: tables.values().iter(),
        })
    }

    /// An iterator over the entries, with mutable access to the values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn iter_mut(&mut self) -> Result<IterMut<'_, K, V>> {
        let (keys, values) = self.index.tables_mut()?.entries_mut();

        Ok(IterMut {
            keys: keys.iter(),
            values: values.iter_mut(),
        })
    }

    /// Creates a cursor positioned before the first entry. See [`Cursor`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn cursor(&self) -> Result<Cursor> {
        self.index.cursor()
    }

    /// Yields the entry at the position of the cursor and advances it, or `None` past the end.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignCursor`] if the cursor was created by another collection,
    /// [`Error::ConcurrentModification`] if the dictionary was structurally modified since the
    /// cursor was created, or [`Error::Disposed`] if it has been disposed.
    pub fn next_entry(&self, cursor: &mut Cursor) -> Result<Option<(&K, &V)>> {
        let tables = self.index.tables()?;

        cursor.advance(self.index.id(), self.index.version(), |position| {
            Some((tables.keys().get(position)?, tables.values().get(position)?))
        })
    }

    /// Removes every entry, keeping the storage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn clear(&mut self) -> Result<()> {
        self.index.clear()
    }

    /// Drops every entry and hands all storage back to the provider. Every later fallible
    /// operation fails with [`Error::Disposed`].
    ///
    /// Dropping the dictionary does the same, but can only report a rejected buffer by
    /// panicking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if already disposed, or [`Error::Pool`] if the provider
    /// rejects the storage being handed back. The dictionary is disposed either way.
    pub fn dispose(&mut self) -> Result<()> {
        self.index.dispose()
    }
}

impl<K: 'static, V: 'static, C, A> Dictionary<K, V, C, A>
where
    C: KeyComparer<K>,
    A: PoolProvider,
{
    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] if an entry with an equal key is already present, in
    /// which case the dictionary is unchanged and `key` and `value` are dropped.
    /// Returns [`Error::CapacityOverflow`] if the dictionary cannot grow to hold another entry.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        if self.try_insert(key, value)? {
            Ok(())
        } else {
            Err(Error::DuplicateKey)
        }
    }

    /// Adds an entry if no entry with an equal key is present. Returns whether it was added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the dictionary cannot grow to hold another entry.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<bool> {
        self.index
            .insert_if_absent(key, value)
            .map(|(_, inserted)| inserted)
    }

    /// Adds an entry or replaces the value of the entry with an equal key, returning the
    /// previous value. When replacing, the key already in the dictionary is kept.
    ///
    /// Replacing a value is not a structural modification: cursors remain valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the dictionary cannot grow to hold another entry.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>> {
        match self.index.lookup(&key)? {
            Lookup::Occupied(value_index) => {
                let slot = self.index.tables_mut()?.value_at_mut(value_index);
                Ok(Some(mem::replace(slot, value)))
            }
            Lookup::Vacant(vacancy) => {
                self.index.insert_vacant(vacancy, key, value)?;
                Ok(None)
            }
        }
    }

    /// The value for the key, creating the entry with `create` if it is absent.
    ///
    /// `create` receives the lookup key and must return an owned key equal to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use dense_hash::Dictionary;
    ///
    /// let mut word_counts: Dictionary<String, usize> = Dictionary::new();
    ///
    /// for word in "the cat saw the dog".split(' ') {
    ///     *word_counts
    ///         .get_or_insert_with(word, |word| (word.to_string(), 0))
    ///         .unwrap() += 1;
    /// }
    ///
    /// assert_eq!(word_counts["the"], 2);
    /// assert_eq!(word_counts.len(), 4);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the dictionary cannot grow to hold another entry.
    pub fn get_or_insert_with<Q>(
        &mut self,
        key: &Q,
        create: impl FnOnce(&Q) -> (K, V),
    ) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let value_index = match self.index.lookup(key)? {
            Lookup::Occupied(value_index) => value_index,
            Lookup::Vacant(vacancy) => {
                let (key, value) = create(key);
                self.index.insert_vacant(vacancy, key, value)?
            }
        };

        Ok(self.index.tables_mut()?.value_at_mut(value_index))
    }

    /// The value for the key, inserting the default value if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if the dictionary cannot grow to hold another entry.
    pub fn get_or_insert_default(&mut self, key: K) -> Result<&mut V>
    where
        V: Default,
    {
        let value_index = match self.index.lookup(&key)? {
            Lookup::Occupied(value_index) => value_index,
            Lookup::Vacant(vacancy) => self.index.insert_vacant(vacancy, key, V::default())?,
        };

        Ok(self.index.tables_mut()?.value_at_mut(value_index))
    }

    /// The value for the key, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<&V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let Some(value_index) = self.index.find(key)? else {
            return Ok(None);
        };

        Ok(Some(self.index.tables()?.value_at(value_index)))
    }

    /// The value for the key, if present, for modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<Option<&mut V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let Some(value_index) = self.index.find(key)? else {
            return Ok(None);
        };

        Ok(Some(self.index.tables_mut()?.value_at_mut(value_index)))
    }

    /// The stored key and the value for the key, if present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn get_key_value<Q>(&self, key: &Q) -> Result<Option<(&K, &V)>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let Some(value_index) = self.index.find(key)? else {
            return Ok(None);
        };

        let tables = self.index.tables()?;
        Ok(Some((tables.key_at(value_index), tables.value_at(value_index))))
    }

    /// The value for a key that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] if the key is absent, or [`Error::Disposed`] if the
    /// dictionary has been disposed.
    pub fn value<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        self.get(key)?.ok_or(Error::KeyNotFound)
    }

    /// Whether an entry with the key is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn contains_key<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        Ok(self.index.find(key)?.is_some())
    }

    /// Removes the entry with the key, returning its value.
    ///
    /// The last entry in iteration order moves into the position of the removed one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        Ok(self.index.remove(key)?.map(|(_, value)| value))
    }

    /// Removes the entry with the key, returning the stored key and its value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] if the dictionary has been disposed.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Result<Option<(K, V)>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        self.index.remove(key)
    }

    /// Grows the storage so that at least `capacity` entries fit without further growth.
    /// Never shrinks. Returns the resulting capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if `capacity` exceeds the largest supported table, or
    /// [`Error::Disposed`] if the dictionary has been disposed.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.index.ensure_capacity(capacity)
    }

    /// Verifies the internal invariants of the dictionary. Does nothing once disposed.
    ///
    /// Meant for tests: the check visits every slot and rehashes every key.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violation found.
    pub fn integrity_check(&self) {
        self.index.check_integrity();
    }
}

impl<K: 'static, V: 'static> Default for Dictionary<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: 'static, Q, V: 'static, C, A> Index<&Q> for Dictionary<K, V, C, A>
where
    K: Borrow<Q>,
    Q: ?Sized,
    C: KeyComparer<K> + KeyComparer<Q>,
    A: PoolProvider,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is absent or the dictionary has been disposed.
    fn index(&self, key: &Q) -> &V {
        match self.value(key) {
            Ok(value) => value,
            Err(error) => panic!("cannot index dictionary: {error}"),
        }
    }
}

impl<K: 'static, V: 'static, C, A> Extend<(K, V)> for Dictionary<K, V, C, A>
where
    C: KeyComparer<K>,
    A: PoolProvider,
{
    /// Adds every entry, replacing values of keys that are already present.
    ///
    /// # Panics
    ///
    /// Panics if the dictionary has been disposed or cannot grow.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            if let Err(error) = self.set(key, value) {
                panic!("cannot extend dictionary: {error}");
            }
        }
    }
}

impl<K: 'static, V: 'static, C, A> FromIterator<(K, V)> for Dictionary<K, V, C, A>
where
    C: KeyComparer<K> + Default,
    A: PoolProvider + Default,
{
    /// # Panics
    ///
    /// Panics if the entries do not fit in the largest supported table.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();

        let mut dictionary =
            match Self::with_capacity_and_comparer_in(iter.size_hint().0, C::default(), A::default())
            {
                Ok(dictionary) => dictionary,
                Err(error) => panic!("cannot collect into dictionary: {error}"),
            };

        dictionary.extend(iter);
        dictionary
    }
}

impl<K: 'static, V: 'static, C, A> PartialEq for Dictionary<K, V, C, A>
where
    V: PartialEq,
    C: KeyComparer<K>,
    A: PoolProvider,
{
    /// Two dictionaries are equal if they hold equal entries, in any order. Two disposed
    /// dictionaries are equal to each other and to nothing else.
    fn eq(&self, other: &Self) -> bool {
        let (Ok(mut entries), Ok(_)) = (self.iter(), other.index.tables()) else {
            return self.is_disposed() && other.is_disposed();
        };

        self.len() == other.len()
            && entries.all(|(key, value)| {
                matches!(other.get(key), Ok(Some(other_value)) if value == other_value)
            })
    }
}

impl<K: 'static, V: 'static, C, A> Eq for Dictionary<K, V, C, A>
where
    V: Eq,
    C: KeyComparer<K>,
    A: PoolProvider,
{
}

impl<K: 'static, V: 'static, C, A> fmt::Debug for Dictionary<K, V, C, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: PoolProvider,
{
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.iter() {
            Ok(entries) => f.debug_map().entries(entries).finish(),
            Err(_) => f.write_str("Dictionary(disposed)"),
        }
    }
}

impl<'a, K: 'static, V: 'static, C, A: PoolProvider> IntoIterator for &'a Dictionary<K, V, C, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    /// # Panics
    ///
    /// Panics if the dictionary has been disposed.
    fn into_iter(self) -> Self::IntoIter {
        match self.iter() {
            Ok(iter) => iter,
            Err(error) => panic!("cannot iterate dictionary: {error}"),
        }
    }
}

impl<'a, K: 'static, V: 'static, C, A: PoolProvider> IntoIterator for &'a mut Dictionary<K, V, C, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    /// # Panics
    ///
    /// Panics if the dictionary has been disposed.
    fn into_iter(self) -> Self::IntoIter {
        match self.iter_mut() {
            Ok(iter) => iter,
            Err(error) => panic!("cannot iterate dictionary: {error}"),
        }
    }
}

/// Iterator over the entries of a [`Dictionary`], created by [`Dictionary::iter()`].
#[derive(Clone, Debug)]
pub struct Iter<'a, K, V> {
    keys: slice::Iter<'a, K>,
    values: slice::Iter<'a, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.keys.next()?, self.values.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        Some((self.keys.next_back()?, self.values.next_back()?))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over the entries of a [`Dictionary`] with mutable access to the values, created by
/// [`Dictionary::iter_mut()`].
#[derive(Debug)]
pub struct IterMut<'a, K, V> {
    keys: slice::Iter<'a, K>,
    values: slice::IterMut<'a, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        Some((self.keys.next()?, self.values.next()?))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        Some((self.keys.next_back()?, self.values.next_back()?))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}
