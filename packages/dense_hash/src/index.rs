use std::any::type_name;
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use buffer_pool::PoolProvider;

use crate::cursor::Cursor;
use crate::slot;
use crate::storage::Storage;
use crate::table::{self, MAX_TABLE_LENGTH, Probe, Tables};
use crate::{Error, KeyComparer, Result};

/// Where a key that is not present would be inserted.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Vacancy {
    mixed: u32,
    slot: usize,
    fingerprint: u32,
}

/// The outcome of looking up a key for insertion.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Lookup {
    /// The key is present at this dense index.
    Occupied(usize),
    Vacant(Vacancy),
}

/// Source of the identities that bind cursors to the index that created them.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// The engine shared by [`Dictionary`](crate::Dictionary) and [`Set`](crate::Set): tables
/// rented from a pool provider, the comparer that hashes keys into them and a version counter
/// that advances with every structural modification.
pub(crate) struct HashIndex<K: 'static, V: 'static, C, A: PoolProvider> {
    storage: Storage<K, V>,
    comparer: C,
    provider: A,

    /// Unique among all indexes of the process.
    id: u64,
    version: u64,
}

impl<K: 'static, V: 'static, C, A: PoolProvider> HashIndex<K, V, C, A> {
    /// Creates an index that holds `capacity` entries before it first grows.
    pub(crate) fn new(capacity: usize, comparer: C, provider: A) -> Result<Self> {
        let table_length = table::table_length_for(capacity)?;
        let tables = Tables::new(&provider, table_length);

        tracing::trace!(
            requested = capacity,
            table_length = tables.table_length(),
            "created hash index"
        );

        Ok(Self {
            storage: Storage::Live(tables),
            comparer,
            provider,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
        })
    }

    pub(crate) fn comparer(&self) -> &C {
        &self.comparer
    }

    pub(crate) fn provider(&self) -> &A {
        &self.provider
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.storage.is_disposed()
    }

    /// The number of entries, zero once disposed.
    pub(crate) fn len(&self) -> usize {
        self.storage.live().map_or(0, Tables::len)
    }

    /// Entries held before the next insertion grows the tables, zero once disposed.
    pub(crate) fn capacity(&self) -> usize {
        self.storage.live().map_or(0, Tables::capacity)
    }

    pub(crate) fn tables(&self) -> Result<&Tables<K, V>> {
        self.storage.live()
    }

    pub(crate) fn tables_mut(&mut self) -> Result<&mut Tables<K, V>> {
        self.storage.live_mut()
    }

    pub(crate) fn cursor(&self) -> Result<Cursor> {
        self.storage.live()?;
        Ok(Cursor::new(self.id, self.version))
    }

    pub(crate) fn clear(&mut self) -> Result<()> {
        self.storage.live_mut()?.clear();
        self.bump_version();
        Ok(())
    }

    /// Drops every entry and hands all storage back to the provider.
    pub(crate) fn dispose(&mut self) -> Result<()> {
        let tables = self.storage.take().ok_or(Error::Disposed)?;
        self.bump_version();

        tracing::debug!(
            entries = tables.len(),
            table_length = tables.table_length(),
            "disposing hash index"
        );

        tables.release(&self.provider)
    }

    fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl<K: 'static, V: 'static, C, A> HashIndex<K, V, C, A>
where
    C: KeyComparer<K>,
    A: PoolProvider,
{
    /// The dense index of the entry with the given key.
    pub(crate) fn find<Q>(&self, key: &Q) -> Result<Option<usize>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let tables = self.storage.live()?;
        let mixed = slot::mix(KeyComparer::<Q>::hash(&self.comparer, key));

        match tables.probe(mixed, |candidate| {
            KeyComparer::<Q>::equals(&self.comparer, candidate.borrow(), key)
        }) {
            Probe::Found { value_index, .. } => Ok(Some(value_index)),
            Probe::Vacant { .. } => Ok(None),
        }
    }

    /// Looks up the key, remembering where it would go if absent.
    pub(crate) fn lookup<Q>(&self, key: &Q) -> Result<Lookup>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let tables = self.storage.live()?;
        let mixed = slot::mix(KeyComparer::<Q>::hash(&self.comparer, key));

        match tables.probe(mixed, |candidate| {
            KeyComparer::<Q>::equals(&self.comparer, candidate.borrow(), key)
        }) {
            Probe::Found { value_index, .. } => Ok(Lookup::Occupied(value_index)),
            Probe::Vacant { slot, fingerprint } => Ok(Lookup::Vacant(Vacancy {
                mixed,
                slot,
                fingerprint,
            })),
        }
    }

    /// Inserts an entry whose key was just found to be absent, growing first if needed.
    /// Returns the dense index of the new entry.
    ///
    /// The key must be equal to the one the vacancy was looked up with.
    pub(crate) fn insert_vacant(&mut self, vacancy: Vacancy, key: K, value: V) -> Result<usize> {
        let mut vacancy = vacancy;

        if self.storage.live()?.needs_growth() {
            self.grow()?;

            if let Probe::Vacant { slot, fingerprint } =
                self.storage.live()?.vacancy_probe(vacancy.mixed)
            {
                vacancy.slot = slot;
                vacancy.fingerprint = fingerprint;
            }
        }

        let value_index =
            self.storage
                .live_mut()?
                .insert_at(vacancy.slot, vacancy.fingerprint, key, value);
        self.bump_version();

        Ok(value_index)
    }

    /// Inserts the entry if no entry with an equal key is present.
    ///
    /// Returns the dense index of the entry with that key and whether it was inserted. If it was
    /// not, the key and value are dropped.
    pub(crate) fn insert_if_absent(&mut self, key: K, value: V) -> Result<(usize, bool)> {
        match self.lookup(&key)? {
            Lookup::Occupied(value_index) => Ok((value_index, false)),
            Lookup::Vacant(vacancy) => Ok((self.insert_vacant(vacancy, key, value)?, true)),
        }
    }

    /// Removes the entry with the given key.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Result<Option<(K, V)>>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyComparer<Q>,
    {
        let tables = self.storage.live_mut()?;
        let mixed = slot::mix(KeyComparer::<Q>::hash(&self.comparer, key));

        let Probe::Found { slot, .. } = tables.probe(mixed, |candidate| {
            KeyComparer::<Q>::equals(&self.comparer, candidate.borrow(), key)
        }) else {
            return Ok(None);
        };

        let entry = tables.remove_at(slot, |moved| {
            slot::mix(KeyComparer::<K>::hash(&self.comparer, moved))
        });
        self.bump_version();

        Ok(Some(entry))
    }

    /// Removes the entry at the given dense index.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub(crate) fn remove_dense(&mut self, value_index: usize) -> Result<(K, V)> {
        let tables = self.storage.live_mut()?;
        assert!(
            value_index < tables.len(),
            "dense index {value_index} out of bounds for length {}",
            tables.len()
        );

        let mixed = slot::mix(self.comparer.hash(tables.key_at(value_index)));
        let slot = tables.slot_of(mixed, value_index);

        let entry = tables.remove_at(slot, |moved| {
            slot::mix(KeyComparer::<K>::hash(&self.comparer, moved))
        });
        self.bump_version();

        Ok(entry)
    }

    /// Grows the tables so that `capacity` entries fit without further growth.
    /// Returns the resulting capacity.
    pub(crate) fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        let tables = self.storage.live_mut()?;

        if capacity <= tables.capacity() {
            return Ok(tables.capacity());
        }

        let table_length = table::table_length_for(capacity)?;
        self.resize(table_length)?;

        self.storage.live().map(Tables::capacity)
    }

    /// Doubles the table length.
    fn grow(&mut self) -> Result<()> {
        let tables = self.storage.live()?;
        let requested = tables.len().saturating_add(1);

        let table_length = tables
            .table_length()
            .checked_mul(2)
            .filter(|length| *length <= MAX_TABLE_LENGTH)
            .ok_or(Error::CapacityOverflow { requested })?;

        self.resize(table_length)
    }

    fn resize(&mut self, table_length: usize) -> Result<()> {
        let tables = self.storage.live_mut()?;
        let previous_length = tables.table_length();

        tables.resize(&self.provider, table_length, |key| {
            slot::mix(self.comparer.hash(key))
        })?;

        tracing::debug!(
            entries = tables.len(),
            previous_length,
            table_length = tables.table_length(),
            "resized hash index"
        );

        self.bump_version();
        Ok(())
    }

    /// Verifies the structural invariants of the tables. Does nothing once disposed.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violation found.
    pub(crate) fn check_integrity(&self) {
        if let Ok(tables) = self.storage.live() {
            tables.check_integrity(|key| slot::mix(self.comparer.hash(key)));
        }
    }
}

impl<K: 'static, V: 'static, C, A: PoolProvider> Drop for HashIndex<K, V, C, A> {
    fn drop(&mut self) {
        let Some(tables) = self.storage.take() else {
            return;
        };

        if let Err(error) = tables.release(&self.provider) {
            // A second panic while unwinding would abort; the storage is simply lost then.
            if !thread::panicking() {
                panic!("collection storage was rejected by its pool: {error}");
            }
        }
    }
}

impl<K: 'static, V: 'static, C, A: PoolProvider> fmt::Debug for HashIndex<K, V, C, A> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("disposed", &self.is_disposed())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
