use std::iter;
use std::mem;

use crate::PoolPolicy;

/// A stack array that is not currently owned by any size class, kept so that the next size
/// class that needs to grow can adopt it instead of allocating.
pub(crate) type ReserveSlot<B> = Option<Box<[Option<B>]>>;

const INITIAL_STACK_CAPACITY: usize = 4;

/// The spare buffers of a single size class.
///
/// Every buffer stored here has exactly the length of the size class. The stack records how
/// often it was touched since the last trim; a trim only releases buffers if the stack was idle.
#[derive(Debug)]
pub(crate) struct PoolStack<B> {
    /// Slots `[0, count)` are occupied, the rest are `None`.
    items: Box<[Option<B>]>,

    count: usize,

    /// Pops and pushes since the last trim, saturating.
    rentals_since_trim: usize,
}

impl<B> PoolStack<B> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            items: Box::default(),
            count: 0,
            rentals_since_trim: 0,
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Takes the most recently pushed buffer, if any.
    #[must_use]
    pub(crate) fn try_pop(&mut self) -> Option<B> {
        self.record_rental();

        let top = self.count.checked_sub(1)?;
        self.count = top;

        let buffer = self
            .items
            .get_mut(top)
            .and_then(Option::take)
            .expect("slots below the high-water index are always occupied");

        Some(buffer)
    }

    /// Parks a buffer if there is a free slot, otherwise hands it back to the caller.
    pub(crate) fn try_push(&mut self, buffer: B) -> Result<(), B> {
        self.record_rental();

        let Some(slot) = self.items.get_mut(self.count) else {
            return Err(buffer);
        };

        debug_assert!(slot.is_none());
        *slot = Some(buffer);
        self.count = self
            .count
            .checked_add(1)
            .expect("count is bounded by the slot array length");

        Ok(())
    }

    /// Whether any stored buffer is the one identified by `identity`.
    #[must_use]
    pub(crate) fn contains<P>(&self, policy: &P, identity: usize) -> bool
    where
        P: PoolPolicy<Buffer = B>,
    {
        self.occupied()
            .iter()
            .flatten()
            .any(|buffer| policy.identity(buffer) == Some(identity))
    }

    /// Grows the slot array so a following [`try_push()`](Self::try_push) succeeds.
    ///
    /// A spare array from `reserve` that is larger than the current one is adopted first, with
    /// the current array left behind in its place. Otherwise a new array of double the size is
    /// allocated and the current one is donated to the reserve for another size class to adopt.
    ///
    /// Returns `false` without doing anything if the stack already holds `limit` slots.
    pub(crate) fn expand(&mut self, reserve: &mut [ReserveSlot<B>], limit: usize) -> bool {
        let current = self.items.len();

        if current >= limit {
            return false;
        }

        let adoptable = reserve
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|array| (index, array.len())))
            .filter(|&(_, len)| len > current)
            .min_by_key(|&(_, len)| len)
            .map(|(index, _)| index);

        if let Some(index) = adoptable {
            let slot = reserve
                .get_mut(index)
                .expect("we just found this index in the reserve");

            let mut adopted = slot
                .take()
                .expect("we only selected occupied reserve slots");

            self.move_items_into(&mut adopted);
            let displaced = mem::replace(&mut self.items, adopted);

            *slot = (!displaced.is_empty()).then_some(displaced);

            tracing::trace!(
                from = current,
                to = self.items.len(),
                "pool stack adopted reserve array"
            );
            return true;
        }

        let target = current
            .saturating_mul(2)
            .max(INITIAL_STACK_CAPACITY)
            .min(limit);

        let mut grown: Box<[Option<B>]> = iter::repeat_with(|| None).take(target).collect();
        self.move_items_into(&mut grown);
        let displaced = mem::replace(&mut self.items, grown);

        donate(reserve, displaced);

        tracing::debug!(from = current, to = target, "pool stack grew");
        true
    }

    /// Releases half of the stored buffers if the stack has been idle since the previous trim.
    ///
    /// Always starts a new idle period. Returns the number of buffers released.
    pub(crate) fn trim<P>(&mut self, policy: &P) -> usize
    where
        P: PoolPolicy<Buffer = B>,
    {
        let was_idle = self.rentals_since_trim == 0;
        self.rentals_since_trim = 0;

        if !was_idle {
            return 0;
        }

        let release_count = self.count.div_ceil(2);

        for _ in 0..release_count {
            let top = self
                .count
                .checked_sub(1)
                .expect("we never release more than we hold");
            self.count = top;

            if let Some(buffer) = self.items.get_mut(top).and_then(Option::take) {
                policy.release(buffer);
            }
        }

        release_count
    }

    /// Releases every stored buffer.
    pub(crate) fn drain<P>(&mut self, policy: &P)
    where
        P: PoolPolicy<Buffer = B>,
    {
        for slot in &mut self.items {
            if let Some(buffer) = slot.take() {
                policy.release(buffer);
            }
        }

        self.count = 0;
    }

    fn occupied(&self) -> &[Option<B>] {
        self.items.get(..self.count).unwrap_or_default()
    }

    fn move_items_into(&mut self, target: &mut [Option<B>]) {
        debug_assert!(target.len() >= self.count);

        for (from, to) in self.items.iter_mut().zip(target.iter_mut()) {
            *to = from.take();
        }
    }

    #[cfg_attr(test, mutants::skip)] // Saturation is unobservable in practice.
    fn record_rental(&mut self) {
        self.rentals_since_trim = self.rentals_since_trim.saturating_add(1);
    }
}

/// Offers a no longer needed stack array to the reserve: it takes an empty slot if there is one,
/// otherwise it replaces the smallest reserved array if that one is smaller.
fn donate<B>(reserve: &mut [ReserveSlot<B>], array: Box<[Option<B>]>) {
    if array.is_empty() {
        return;
    }

    debug_assert!(array.iter().all(Option::is_none));

    if let Some(empty) = reserve.iter_mut().find(|slot| slot.is_none()) {
        *empty = Some(array);
        return;
    }

    let smallest = reserve
        .iter_mut()
        .filter_map(|slot| {
            let len = slot.as_ref().map(|reserved| reserved.len())?;
            Some((slot, len))
        })
        .min_by_key(|(_, len)| *len);

    if let Some((slot, len)) = smallest {
        if len < array.len() {
            *slot = Some(array);
        }
    }
}
