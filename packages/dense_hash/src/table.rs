//! Robin-hood open addressing over pooled storage.
//!
//! The table keeps three rented arrays:
//!
//! * a metadata table of [`Slot`]s whose length is a power of two;
//! * dense key and value arrays whose first `len` elements are initialized.
//!
//! Every occupied slot refers to one dense position and every dense position below `len` is
//! referred to by exactly one slot. Removal swaps the last dense element into the vacated
//! position, so the dense arrays never have holes.
//!
//! This type knows nothing about hashing keys. Callers pass in mixed hashes and equality
//! predicates, which keeps user code (hashers, `Eq` implementations) out of the sections that
//! mutate the table.

use std::mem::{self, MaybeUninit};
use std::ptr;
use std::slice;

use buffer_pool::{PoolProvider, UninitBuffer};

use crate::slot::{self, DISPLACED, DISTANCE_UNIT, Slot};
use crate::{Error, Result};

/// The largest metadata table the collections will grow to.
pub(crate) const MAX_TABLE_LENGTH: usize = 1 << 30;

/// How many entries a table of the given length holds before it must grow: 25/32 of the
/// table length, rounded up.
#[must_use]
pub(crate) fn max_entries(table_length: usize) -> usize {
    // Split so that neither product can overflow for any power of two.
    let whole = (table_length >> 5).wrapping_mul(25);
    let rest = (table_length & 31).wrapping_mul(25).div_ceil(32);

    whole.wrapping_add(rest)
}

/// The smallest power-of-two table length that holds `entries` without growing.
pub(crate) fn table_length_for(entries: usize) -> Result<usize> {
    let mut length = 1_usize;

    while max_entries(length) < entries {
        if length >= MAX_TABLE_LENGTH {
            return Err(Error::CapacityOverflow { requested: entries });
        }

        length = length.wrapping_shl(1);
    }

    Ok(length)
}

/// The outcome of probing for a key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Probe {
    /// The key is present.
    Found {
        slot: usize,
        value_index: usize,
    },

    /// The key is absent. If inserted now, it would be placed at `slot` with `fingerprint`.
    Vacant { slot: usize, fingerprint: u32 },
}

pub(crate) struct Tables<K, V> {
    slots: Box<[Slot]>,
    keys: UninitBuffer<K>,
    values: UninitBuffer<V>,

    len: usize,

    mask: usize,

    /// Right shift that maps a mixed hash to its home slot (32 - log2 of the table length).
    shift: u32,
}

impl<K: 'static, V: 'static> Tables<K, V> {
    /// Rents storage for a table of at least `table_length` slots.
    ///
    /// The pool may hand out a longer metadata array than requested; the whole array is used.
    pub(crate) fn new<A: PoolProvider>(provider: &A, table_length: usize) -> Self {
        let slots = rent_filled(provider, table_length, Slot::EMPTY);
        let length = slots.len();
        debug_assert!(length.is_power_of_two());

        let entries = max_entries(length);
        let keys = rent_pooled::<K, A>(provider, entries);
        let values = rent_pooled::<V, A>(provider, entries);
        debug_assert!(keys.len() >= entries && values.len() >= entries);

        Self {
            slots,
            keys,
            values,
            len: 0,
            mask: length.wrapping_sub(1),
            shift: 32_u32.saturating_sub(length.trailing_zeros()),
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub(crate) fn table_length(&self) -> usize {
        self.slots.len()
    }

    /// Entries this table holds before the next insertion grows it.
    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        max_entries(self.table_length())
    }

    /// Whether an insertion must grow the table first (`len * 32 >= table_length * 25`).
    #[must_use]
    pub(crate) fn needs_growth(&self) -> bool {
        self.len >= self.capacity()
    }

    #[must_use]
    pub(crate) fn keys(&self) -> &[K] {
        // SAFETY: The first `len` keys are initialized and `MaybeUninit<K>` has the layout of K.
        unsafe { slice::from_raw_parts(self.keys.as_ptr().cast::<K>(), self.len) }
    }

    #[must_use]
    pub(crate) fn values(&self) -> &[V] {
        // SAFETY: The first `len` values are initialized and `MaybeUninit<V>` has the layout of V.
        unsafe { slice::from_raw_parts(self.values.as_ptr().cast::<V>(), self.len) }
    }

    pub(crate) fn values_mut(&mut self) -> &mut [V] {
        // SAFETY: The first `len` values are initialized and `MaybeUninit<V>` has the layout of V.
        unsafe { slice::from_raw_parts_mut(self.values.as_mut_ptr().cast::<V>(), self.len) }
    }

    /// The keys together with mutable access to the values.
    pub(crate) fn entries_mut(&mut self) -> (&[K], &mut [V]) {
        // SAFETY: The first `len` keys are initialized and `MaybeUninit<K>` has the layout of K.
        let keys = unsafe { slice::from_raw_parts(self.keys.as_ptr().cast::<K>(), self.len) };
        // SAFETY: As above, in a separate allocation from the keys.
        let values =
            unsafe { slice::from_raw_parts_mut(self.values.as_mut_ptr().cast::<V>(), self.len) };

        (keys, values)
    }

    #[must_use]
    pub(crate) fn key_at(&self, value_index: usize) -> &K {
        debug_assert!(value_index < self.len);

        // SAFETY: Callers only pass dense indexes below `len`, which are initialized.
        unsafe { self.keys.get_unchecked(value_index).assume_init_ref() }
    }

    #[must_use]
    pub(crate) fn value_at(&self, value_index: usize) -> &V {
        debug_assert!(value_index < self.len);

        // SAFETY: Callers only pass dense indexes below `len`, which are initialized.
        unsafe { self.values.get_unchecked(value_index).assume_init_ref() }
    }

    pub(crate) fn value_at_mut(&mut self, value_index: usize) -> &mut V {
        debug_assert!(value_index < self.len);

        // SAFETY: Callers only pass dense indexes below `len`, which are initialized.
        unsafe { self.values.get_unchecked_mut(value_index).assume_init_mut() }
    }

    /// Looks for the key with the given mixed hash, using `eq` to confirm fingerprint matches.
    ///
    /// Stops as soon as it meets a slot with a lower fingerprint than the probe carries: the
    /// robin-hood ordering guarantees the key cannot be further along.
    #[inline]
    pub(crate) fn probe(&self, mixed: u32, mut eq: impl FnMut(&K) -> bool) -> Probe {
        let mut index = self.home(mixed);
        let mut fingerprint = slot::home_fingerprint(mixed);

        // Most probes end within one displacement, so the first two steps are unrolled.
        if let Some(probe) = self.probe_step(index, fingerprint, &mut eq) {
            return probe;
        }

        index = self.next(index);
        fingerprint = slot::next_fingerprint(fingerprint);

        if let Some(probe) = self.probe_step(index, fingerprint, &mut eq) {
            return probe;
        }

        loop {
            index = self.next(index);
            fingerprint = slot::next_fingerprint(fingerprint);

            if let Some(probe) = self.probe_step(index, fingerprint, &mut eq) {
                return probe;
            }
        }
    }

    #[inline]
    fn probe_step(
        &self,
        index: usize,
        fingerprint: u32,
        eq: &mut impl FnMut(&K) -> bool,
    ) -> Option<Probe> {
        let resident = self.slot(index);

        if resident.fingerprint == fingerprint && eq(self.key_at(resident.value_index())) {
            Some(Probe::Found {
                slot: index,
                value_index: resident.value_index(),
            })
        } else if resident.fingerprint < fingerprint {
            Some(Probe::Vacant {
                slot: index,
                fingerprint,
            })
        } else {
            None
        }
    }

    /// Where a key known to be absent would be placed.
    fn vacancy(&self, mixed: u32) -> (usize, u32) {
        let mut index = self.home(mixed);
        let mut fingerprint = slot::home_fingerprint(mixed);

        while self.slot(index).fingerprint >= fingerprint {
            index = self.next(index);
            fingerprint = slot::next_fingerprint(fingerprint);
        }

        (index, fingerprint)
    }

    /// Recomputes the vacancy for an absent key, for use after the table was resized.
    pub(crate) fn vacancy_probe(&self, mixed: u32) -> Probe {
        let (slot, fingerprint) = self.vacancy(mixed);
        Probe::Vacant { slot, fingerprint }
    }

    /// Appends the entry to the dense arrays and places it in the metadata table, starting at
    /// a vacancy produced by probing the current table. Returns the dense index of the entry.
    ///
    /// # Panics
    ///
    /// Panics if the table has no room; callers grow it first.
    pub(crate) fn insert_at(&mut self, slot: usize, fingerprint: u32, key: K, value: V) -> usize {
        assert!(
            self.len < self.capacity(),
            "insertion into a table that needed to grow first"
        );

        let value_index = self.len;

        self.keys
            .get_mut(value_index)
            .expect("dense arrays hold at least as many elements as the table capacity")
            .write(key);
        self.values
            .get_mut(value_index)
            .expect("dense arrays hold at least as many elements as the table capacity")
            .write(value);
        self.len = value_index.wrapping_add(1);

        self.place(
            slot,
            Slot {
                fingerprint,
                value_index: dense_index_u32(value_index),
            },
        );

        value_index
    }

    /// Robin-hood placement: whenever the carried entry is poorer (larger fingerprint) than the
    /// resident, they trade places and the resident is carried on one slot further.
    fn place(&mut self, start: usize, mut carried: Slot) {
        let mut index = start;

        loop {
            let resident = self.slot_mut(index);

            if resident.is_empty() {
                *resident = carried;
                return;
            }

            if resident.fingerprint < carried.fingerprint {
                mem::swap(resident, &mut carried);
            }

            index = self.next(index);
            carried.fingerprint = slot::next_fingerprint(carried.fingerprint);
        }
    }

    /// Removes the entry in the given slot and returns it.
    ///
    /// `rehash` is called for the last dense entry (if that is not the one being removed) before
    /// anything is modified, because that entry moves into the vacated dense position and its
    /// slot must be found to be patched.
    pub(crate) fn remove_at(&mut self, slot: usize, rehash: impl FnOnce(&K) -> u32) -> (K, V) {
        let value_index = self.slot(slot).value_index();
        let last = self
            .len
            .checked_sub(1)
            .expect("an occupied slot implies a non-empty table");

        let relocated = (value_index != last).then(|| rehash(self.key_at(last)));

        self.backward_shift(slot);

        // SAFETY: The entry at `value_index` is initialized. It is treated as uninitialized from
        // here on: either `len` shrinks past it or the last entry is moved on top of it.
        let key = unsafe { self.keys.get_unchecked(value_index).assume_init_read() };
        // SAFETY: As above.
        let value = unsafe { self.values.get_unchecked(value_index).assume_init_read() };

        if let Some(mixed) = relocated {
            let moved = self.slot_of(mixed, last);

            self.keys.swap(value_index, last);
            self.values.swap(value_index, last);
            self.slot_mut(moved).value_index = dense_index_u32(value_index);
        }

        self.len = last;

        (key, value)
    }

    /// The slot referring to the dense entry with the given index and mixed hash.
    pub(crate) fn slot_of(&self, mixed: u32, value_index: usize) -> usize {
        let mut index = self.home(mixed);

        loop {
            let resident = self.slot(index);

            if !resident.is_empty() && resident.value_index() == value_index {
                return index;
            }

            index = self.next(index);
        }
    }

    /// Empties the slot by pulling every displaced successor back one position.
    fn backward_shift(&mut self, slot: usize) {
        let mut hole = slot;

        loop {
            let next = self.next(hole);
            let successor = self.slot(next);

            // Empty, or already in its home slot.
            if successor.fingerprint < DISPLACED {
                break;
            }

            *self.slot_mut(hole) = Slot {
                fingerprint: successor.fingerprint.wrapping_sub(DISTANCE_UNIT),
                value_index: successor.value_index,
            };
            hole = next;
        }

        *self.slot_mut(hole) = Slot::EMPTY;
    }

    /// Drops every entry, keeping the storage.
    pub(crate) fn clear(&mut self) {
        let len = mem::replace(&mut self.len, 0);
        self.slots.fill(Slot::EMPTY);

        // SAFETY: The first `len` elements were initialized and `len` is already reset, so they
        // are never touched again.
        unsafe {
            drop_prefix(&mut self.keys, len);
        }
        // SAFETY: As above.
        unsafe {
            drop_prefix(&mut self.values, len);
        }
    }

    /// Moves every entry into new storage for a table of at least `table_length` slots and
    /// returns the old storage to the provider.
    ///
    /// The new metadata is built from the existing keys before anything moves, so a panic in
    /// `rehash` leaves this table untouched.
    pub(crate) fn resize<A: PoolProvider>(
        &mut self,
        provider: &A,
        table_length: usize,
        mut rehash: impl FnMut(&K) -> u32,
    ) -> Result<()> {
        let mut resized = Self::new(provider, table_length);
        assert!(
            resized.capacity() >= self.len,
            "resize target cannot hold the existing entries"
        );

        for value_index in 0..self.len {
            let mixed = rehash(self.key_at(value_index));
            let (slot, fingerprint) = resized.vacancy(mixed);

            resized.place(
                slot,
                Slot {
                    fingerprint,
                    value_index: dense_index_u32(value_index),
                },
            );
        }

        // SAFETY: Both arrays hold at least `len` elements, they are distinct allocations and the
        // source elements are treated as uninitialized from here on (`len` of self is reset).
        unsafe {
            ptr::copy_nonoverlapping(self.keys.as_ptr(), resized.keys.as_mut_ptr(), self.len);
        }
        // SAFETY: As above.
        unsafe {
            ptr::copy_nonoverlapping(self.values.as_ptr(), resized.values.as_mut_ptr(), self.len);
        }

        resized.len = mem::replace(&mut self.len, 0);

        mem::replace(self, resized).return_storage(provider)
    }

    /// Drops every entry and returns all storage to the provider.
    pub(crate) fn release<A: PoolProvider>(mut self, provider: &A) -> Result<()> {
        self.clear();
        self.return_storage(provider)
    }

    /// Returns all storage to the provider. Entries still in the dense arrays are leaked.
    fn return_storage<A: PoolProvider>(self, provider: &A) -> Result<()> {
        debug_assert_eq!(self.len, 0);

        let Self {
            slots,
            keys,
            values,
            ..
        } = self;

        let slots = provider.give_back(into_uninit(slots), false);
        let keys = provider.give_back(keys, false);
        let values = provider.give_back(values, false);

        slots.and(keys).and(values).map_err(Error::from)
    }

    /// Verifies every structural invariant of the table.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violation found.
    #[cfg_attr(test, mutants::skip)] // Only ever reports problems, cannot cause them.
    pub(crate) fn check_integrity(&self, mut rehash: impl FnMut(&K) -> u32) {
        assert!(
            self.len <= self.capacity(),
            "{} entries exceed the capacity {} of a table with {} slots",
            self.len,
            self.capacity(),
            self.table_length()
        );

        let mut referenced = vec![false; self.len];
        let mut occupied = 0_usize;

        for (index, resident) in self.slots.iter().enumerate() {
            if resident.is_empty() {
                continue;
            }

            occupied = occupied.wrapping_add(1);

            let value_index = resident.value_index();
            let seen = referenced.get_mut(value_index).unwrap_or_else(|| {
                panic!(
                    "slot {index} refers to dense index {value_index} beyond length {}",
                    self.len
                )
            });
            assert!(!*seen, "dense index {value_index} is referenced twice");
            *seen = true;

            let mixed = rehash(self.key_at(value_index));
            let home = self.home(mixed);

            // Walk from home: every slot passed must keep a lookup going.
            let mut probe = home;
            let mut fingerprint = slot::home_fingerprint(mixed);

            while probe != index {
                let passed = self.slot(probe);
                assert!(
                    passed.fingerprint >= fingerprint,
                    "lookup for the entry in slot {index} (home {home}) would stop early at slot {probe}"
                );

                probe = self.next(probe);
                fingerprint = slot::next_fingerprint(fingerprint);
            }

            assert_eq!(
                resident.fingerprint,
                fingerprint,
                "slot {index} encodes distance {} and tag {}, expected distance {} from home {home}",
                resident.distance(),
                resident.tag(),
                fingerprint >> 8
            );
        }

        assert_eq!(
            occupied, self.len,
            "occupied slot count differs from the dense length"
        );
    }

    #[inline]
    fn home(&self, mixed: u32) -> usize {
        mixed.checked_shr(self.shift).unwrap_or(0) as usize
    }

    #[inline]
    fn next(&self, index: usize) -> usize {
        index.wrapping_add(1) & self.mask
    }

    #[inline]
    fn slot(&self, index: usize) -> Slot {
        debug_assert!(index <= self.mask);

        // SAFETY: Every index is masked to the table length, a power of two.
        *unsafe { self.slots.get_unchecked(index) }
    }

    #[inline]
    fn slot_mut(&mut self, index: usize) -> &mut Slot {
        debug_assert!(index <= self.mask);

        // SAFETY: Every index is masked to the table length, a power of two.
        unsafe { self.slots.get_unchecked_mut(index) }
    }
}

/// Dense indexes are stored as `u32` in the metadata; the table length limit keeps them in range.
fn dense_index_u32(value_index: usize) -> u32 {
    u32::try_from(value_index).expect("dense index is bounded by the maximum table length")
}

/// Rents a buffer of at least `length` elements.
///
/// The request is rounded up to a power of two, the only length a provider takes back once it
/// exceeds the largest size class.
pub(crate) fn rent_pooled<T, A>(provider: &A, length: usize) -> UninitBuffer<T>
where
    T: 'static,
    A: PoolProvider,
{
    provider.rent::<T>(length.checked_next_power_of_two().unwrap_or(length))
}

/// Rents a buffer of at least `length` elements, all set to `value`.
pub(crate) fn rent_filled<T, A>(provider: &A, length: usize, value: T) -> Box<[T]>
where
    T: Copy + 'static,
    A: PoolProvider,
{
    let mut buffer = rent_pooled::<T, A>(provider, length);
    buffer.fill(MaybeUninit::new(value));

    // SAFETY: Every element was initialized just above.
    unsafe { buffer.assume_init() }
}

/// Turns a buffer from [`rent_filled()`] back into the shape the provider takes back.
pub(crate) fn into_uninit<T: Copy>(buffer: Box<[T]>) -> UninitBuffer<T> {
    let raw = Box::into_raw(buffer) as *mut [MaybeUninit<T>];

    // SAFETY: `MaybeUninit<T>` has the same layout as `T`, so the allocation is described by
    // the same layout as before and ownership passes straight through.
    unsafe { Box::from_raw(raw) }
}

/// Drops the first `len` elements of the buffer in place.
///
/// # Safety
///
/// The first `len` elements must be initialized and must not be used again afterwards.
unsafe fn drop_prefix<T>(buffer: &mut [MaybeUninit<T>], len: usize) {
    if !mem::needs_drop::<T>() {
        return;
    }

    let prefix = buffer
        .get_mut(..len)
        .expect("initialized prefix never exceeds the buffer");
    let prefix = ptr::from_mut(prefix) as *mut [T];

    // SAFETY: Forwarding the guarantee of the caller; the cast keeps the slice length.
    unsafe {
        ptr::drop_in_place(prefix);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::rc::Rc;

    use buffer_pool::{PoolMode, PoolSet};

    use super::*;

    /// Mixed hashes chosen by hand, so that collisions are exact.
    fn mixed_for_home(home: u32, tag: u32, table_length: usize) -> u32 {
        let bits = table_length.trailing_zeros();
        (home << (32 - bits)) | tag
    }

    fn small_pools() -> PoolSet {
        PoolSet::builder()
            .smallest_length(1)
            .build_set(PoolMode::Diagnostic)
    }

    /// A table of `u32` keys whose hash is the key itself, which lets tests place entries.
    fn insert(tables: &mut Tables<u32, u32>, mixed: u32, value: u32) {
        match tables.probe(mixed, |key| *key == mixed) {
            Probe::Vacant { slot, fingerprint } => {
                tables.insert_at(slot, fingerprint, mixed, value);
            }
            Probe::Found { .. } => panic!("key {mixed:#x} already present"),
        }

        tables.check_integrity(|key| *key);
    }

    fn find(tables: &Tables<u32, u32>, mixed: u32) -> Option<u32> {
        match tables.probe(mixed, |key| *key == mixed) {
            Probe::Found { value_index, .. } => Some(*tables.value_at(value_index)),
            Probe::Vacant { .. } => None,
        }
    }

    fn remove(tables: &mut Tables<u32, u32>, mixed: u32) -> Option<u32> {
        let Probe::Found { slot, .. } = tables.probe(mixed, |key| *key == mixed) else {
            return None;
        };

        let (key, value) = tables.remove_at(slot, |key| *key);
        assert_eq!(key, mixed);
        tables.check_integrity(|key| *key);

        Some(value)
    }

    #[test]
    fn max_entries_is_25_of_32() {
        assert_eq!(max_entries(1), 1);
        assert_eq!(max_entries(2), 2);
        assert_eq!(max_entries(4), 4);
        assert_eq!(max_entries(8), 7);
        assert_eq!(max_entries(16), 13);
        assert_eq!(max_entries(32), 25);
        assert_eq!(max_entries(1 << 20), 25 << 15);
        assert_eq!(max_entries(MAX_TABLE_LENGTH), 25 << 25);
    }

    #[test]
    fn table_length_for_entries() {
        assert_eq!(table_length_for(0).unwrap(), 1);
        assert_eq!(table_length_for(1).unwrap(), 1);
        assert_eq!(table_length_for(7).unwrap(), 8);
        assert_eq!(table_length_for(8).unwrap(), 16);
        assert_eq!(table_length_for(25).unwrap(), 32);
        assert_eq!(table_length_for(26).unwrap(), 64);

        assert!(matches!(
            table_length_for(usize::MAX),
            Err(Error::CapacityOverflow {
                requested: usize::MAX
            })
        ));
    }

    #[test]
    fn collisions_are_displaced_and_shifted_back() {
        let pools = small_pools();
        let mut tables = Tables::<u32, u32>::new(&pools, 16);
        assert_eq!(tables.table_length(), 16);

        // Three keys with home 3 and one with home 4.
        let a = mixed_for_home(3, 1, 16);
        let b = mixed_for_home(3, 2, 16);
        let c = mixed_for_home(3, 3, 16);
        let d = mixed_for_home(4, 4, 16);

        insert(&mut tables, a, 10);
        insert(&mut tables, d, 40);
        insert(&mut tables, b, 20);
        insert(&mut tables, c, 30);

        // The home-4 key was robbed of its slot and now sits behind the home-3 run.
        assert_eq!(tables.slot(3).distance(), 1);
        assert_eq!(tables.slot(4).distance(), 2);
        assert_eq!(tables.slot(5).distance(), 3);
        assert_eq!(tables.slot(6).distance(), 3);

        assert_eq!(remove(&mut tables, a), Some(10));

        // The run behind the removed entry moved back one slot.
        assert_eq!(tables.slot(3).distance(), 1);
        assert_eq!(tables.slot(4).distance(), 2);
        assert_eq!(tables.slot(5).distance(), 2);
        assert!(tables.slot(6).is_empty());

        assert_eq!(find(&tables, b), Some(20));
        assert_eq!(find(&tables, c), Some(30));
        assert_eq!(find(&tables, d), Some(40));
        assert_eq!(find(&tables, a), None);

        tables.release(&pools).unwrap();
        pools.assert_all_returned();
    }

    #[test]
    fn probes_wrap_around_the_end() {
        let pools = small_pools();
        let mut tables = Tables::<u32, u32>::new(&pools, 8);

        let keys: Vec<u32> = (1..=4).map(|tag| mixed_for_home(7, tag, 8)).collect();
        for (value, key) in (0..).zip(&keys) {
            insert(&mut tables, *key, value);
        }

        for (value, key) in (0..).zip(&keys) {
            assert_eq!(find(&tables, *key), Some(value));
        }

        assert_eq!(remove(&mut tables, keys[1]), Some(1));
        assert_eq!(find(&tables, keys[3]), Some(3));

        tables.release(&pools).unwrap();
    }

    #[test]
    fn dense_arrays_stay_compact() {
        let pools = small_pools();
        let mut tables = Tables::<u32, u32>::new(&pools, 16);

        for key in 0_u32..10 {
            insert(&mut tables, key.wrapping_mul(0x1234_5679), key);
        }

        remove(&mut tables, 0);
        remove(&mut tables, 5_u32.wrapping_mul(0x1234_5679));

        assert_eq!(tables.len(), 8);
        let mut values = tables.values().to_vec();
        values.sort_unstable();
        assert_eq!(values, [1, 2, 3, 4, 6, 7, 8, 9]);

        tables.release(&pools).unwrap();
    }

    #[test]
    fn resize_keeps_entries_and_order() {
        let pools = small_pools();
        let mut tables = Tables::<u32, u32>::new(&pools, 4);

        for key in 0_u32..4 {
            insert(&mut tables, key.wrapping_mul(0x9E37_79B9), key);
        }
        assert!(tables.needs_growth());

        tables.resize(&pools, 8, |key| *key).unwrap();
        tables.check_integrity(|key| *key);

        assert_eq!(tables.table_length(), 8);
        assert_eq!(tables.values(), [0, 1, 2, 3]);
        for key in 0_u32..4 {
            assert_eq!(find(&tables, key.wrapping_mul(0x9E37_79B9)), Some(key));
        }

        tables.release(&pools).unwrap();
        pools.assert_all_returned();
    }

    #[test]
    fn full_single_slot_table() {
        let pools = small_pools();
        let mut tables = Tables::<u32, u32>::new(&pools, 1);

        insert(&mut tables, 77, 1);
        assert!(tables.needs_growth());
        assert_eq!(find(&tables, 78), None);
        assert_eq!(remove(&mut tables, 77), Some(1));

        tables.release(&pools).unwrap();
    }

    #[test]
    fn clear_and_release_drop_entries() {
        let pools = small_pools();
        let tracked = Rc::new(());

        let mut tables = Tables::<u32, Rc<()>>::new(&pools, 8);
        for key in 0..5_u32 {
            let (slot, fingerprint) = tables.vacancy(key << 29);
            tables.insert_at(slot, fingerprint, key << 29, Rc::clone(&tracked));
        }
        assert_eq!(Rc::strong_count(&tracked), 6);

        tables.clear();
        assert_eq!(Rc::strong_count(&tracked), 1);
        assert_eq!(tables.len(), 0);
        assert!(tables.slots.iter().all(|slot| slot.is_empty()));

        let (slot, fingerprint) = tables.vacancy(0);
        tables.insert_at(slot, fingerprint, 0, Rc::clone(&tracked));
        tables.release(&pools).unwrap();
        assert_eq!(Rc::strong_count(&tracked), 1);

        pools.assert_all_returned();
    }

    #[test]
    #[should_panic]
    fn integrity_check_catches_corruption() {
        let pools = small_pools();
        let mut tables = Tables::<u32, u32>::new(&pools, 8);

        insert(&mut tables, mixed_for_home(2, 1, 8), 1);
        *tables.slot_mut(2) = Slot::EMPTY;
        *tables.slot_mut(3) = Slot {
            fingerprint: slot::home_fingerprint(1),
            value_index: 0,
        };

        tables.check_integrity(|key| *key);
    }
}
