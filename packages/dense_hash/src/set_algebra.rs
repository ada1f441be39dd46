//! In-place set algebra and set comparisons.
//!
//! Operations that need to know which items of the set were seen in the other sequence keep a
//! bitmap of dense positions, rented from the provider of the set for the duration of the call.

use std::borrow::Borrow;
use std::mem;

use buffer_pool::PoolProvider;

use crate::table::{into_uninit, rent_filled};
use crate::{KeyComparer, Result, Set};

/// How the items of a set relate to the items of another sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Survey {
    /// Distinct items of the set that the sequence contains.
    found: usize,

    /// Whether the sequence contains anything the set does not.
    has_missing: bool,
}

impl<T: 'static, C, A> Set<T, C, A>
where
    C: KeyComparer<T>,
    A: PoolProvider,
{
    /// Adds every item of `other` that is not already present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if the set cannot
    /// grow to hold another item, or [`Error::Disposed`](crate::Error::Disposed) if it has been
    /// disposed.
    pub fn union_with(&mut self, other: impl IntoIterator<Item = T>) -> Result<()> {
        self.engine().tables()?;

        for item in other {
            self.insert(item)?;
        }

        Ok(())
    }

    /// Removes every item that `other` does not contain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn intersect_with(&mut self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<()> {
        let len = self.engine().tables()?.len();
        let mut seen = rent_filled(self.provider(), len, false);

        for item in other {
            if let Some(value_index) = self.engine().find::<T>(item.borrow())? {
                mark(&mut seen, value_index);
            }
        }

        let removed = self.remove_marked(&seen, len, false);
        let returned = self.provider().give_back(into_uninit(seen), false);

        removed?;
        returned.map_err(Into::into)
    }

    /// Removes every item that `other` contains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn except_with(&mut self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<()> {
        self.engine().tables()?;

        for item in other {
            self.remove::<T>(item.borrow())?;
        }

        Ok(())
    }

    /// Keeps only the items that are in exactly one of the set and `other`: items of `other`
    /// that are present are removed, the others are added.
    ///
    /// Repeated items in `other` count once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`](crate::Error::CapacityOverflow) if the set cannot
    /// grow to hold another item, or [`Error::Disposed`](crate::Error::Disposed) if it has been
    /// disposed.
    pub fn symmetric_except_with(&mut self, other: impl IntoIterator<Item = T>) -> Result<()> {
        let original_len = self.engine().tables()?.len();
        let mut seen = rent_filled(self.provider(), original_len, false);

        let merged = self.add_unseen(&mut seen, original_len, other);
        let removed = merged.and_then(|()| self.remove_marked(&seen, original_len, true));
        let returned = self.provider().give_back(into_uninit(seen), false);

        removed?;
        returned.map_err(Into::into)
    }

    /// Whether `other` contains every item of the set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn is_subset_of(&self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<bool> {
        let survey = self.survey(other)?;
        Ok(survey.found == self.len())
    }

    /// Whether `other` contains every item of the set and at least one more.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn is_proper_subset_of(
        &self,
        other: impl IntoIterator<Item = impl Borrow<T>>,
    ) -> Result<bool> {
        let survey = self.survey(other)?;
        Ok(survey.found == self.len() && survey.has_missing)
    }

    /// Whether the set contains every item of `other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn is_superset_of(&self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<bool> {
        for item in other {
            if !self.contains::<T>(item.borrow())? {
                return Ok(false);
            }
        }

        // An empty sequence says nothing about a disposed set.
        self.engine().tables()?;
        Ok(true)
    }

    /// Whether the set contains every item of `other` and at least one more.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn is_proper_superset_of(
        &self,
        other: impl IntoIterator<Item = impl Borrow<T>>,
    ) -> Result<bool> {
        let survey = self.survey(other)?;
        Ok(!survey.has_missing && survey.found < self.len())
    }

    /// Whether the set and `other` have at least one item in common.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn overlaps(&self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<bool> {
        self.engine().tables()?;

        for item in other {
            if self.contains::<T>(item.borrow())? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Whether the set and `other` contain the same items, ignoring order and repetition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) if the set has been disposed.
    pub fn set_equals(&self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<bool> {
        let survey = self.survey(other)?;
        Ok(!survey.has_missing && survey.found == self.len())
    }

    fn survey(&self, other: impl IntoIterator<Item = impl Borrow<T>>) -> Result<Survey> {
        let len = self.engine().tables()?.len();
        let mut seen = rent_filled(self.provider(), len, false);

        let mut survey = Survey {
            found: 0,
            has_missing: false,
        };

        for item in other {
            match self.engine().find::<T>(item.borrow())? {
                Some(value_index) => {
                    if mark(&mut seen, value_index) {
                        survey.found = survey.found.wrapping_add(1);
                    }
                }
                None => survey.has_missing = true,
            }
        }

        self.provider().give_back(into_uninit(seen), false)?;
        Ok(survey)
    }

    /// Marks the present items of `other` that were in the set before the call and adds the
    /// absent ones.
    fn add_unseen(
        &mut self,
        seen: &mut [bool],
        original_len: usize,
        other: impl IntoIterator<Item = T>,
    ) -> Result<()> {
        for item in other {
            let (value_index, inserted) = self.engine_mut().insert_if_absent(item, ())?;

            // Items added by this call sit at or beyond the original length.
            if !inserted && value_index < original_len {
                mark(seen, value_index);
            }
        }

        Ok(())
    }

    /// Removes the original items whose mark equals `marked`.
    ///
    /// Walks the dense positions backwards, so that the entry moved into a vacated position by
    /// a removal has always been visited already.
    fn remove_marked(&mut self, seen: &[bool], original_len: usize, marked: bool) -> Result<()> {
        for value_index in (0..original_len).rev() {
            let is_marked = seen.get(value_index).copied().unwrap_or_default();

            if is_marked == marked {
                self.engine_mut().remove_dense(value_index)?;
            }
        }

        Ok(())
    }
}

/// Sets the mark of a dense position. Returns whether it was newly set.
fn mark(seen: &mut [bool], value_index: usize) -> bool {
    let slot = seen
        .get_mut(value_index)
        .expect("marks cover every dense position of the set");

    !mem::replace(slot, true)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use buffer_pool::{PoolMode, PoolSet};

    use crate::{DefaultComparer, Error};

    use super::*;

    fn set_of(items: &[u32]) -> Set<u32> {
        items.iter().copied().collect()
    }

    fn sorted(set: &Set<u32>) -> Vec<u32> {
        let mut items = set.as_slice().unwrap().to_vec();
        items.sort_unstable();
        items
    }

    #[test]
    fn union() {
        let mut set = set_of(&[1, 2, 3]);
        set.union_with([3, 4, 5, 4]).unwrap();

        assert_eq!(sorted(&set), [1, 2, 3, 4, 5]);
        set.integrity_check();
    }

    #[test]
    fn intersection() {
        let mut set = set_of(&[1, 2, 3, 4, 5, 6]);
        set.intersect_with([6, 2, 4, 8, 2]).unwrap();

        assert_eq!(sorted(&set), [2, 4, 6]);
        set.integrity_check();

        set.intersect_with(Vec::<u32>::new()).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn intersection_with_borrowed_items() {
        let mut set = set_of(&[1, 2, 3]);
        let other = set_of(&[2, 3, 4]);

        set.intersect_with(&other).unwrap();

        assert_eq!(sorted(&set), [2, 3]);
    }

    #[test]
    fn except() {
        let mut set = set_of(&[1, 2, 3, 4]);
        set.except_with([2, 4, 9]).unwrap();

        assert_eq!(sorted(&set), [1, 3]);
        set.integrity_check();
    }

    #[test]
    fn symmetric_except() {
        let mut set = set_of(&[1, 2, 3, 4]);
        set.symmetric_except_with([3, 4, 5, 6, 5, 3]).unwrap();

        assert_eq!(sorted(&set), [1, 2, 5, 6]);
        set.integrity_check();
    }

    #[test]
    fn symmetric_except_with_growth() {
        let mut set = set_of(&[0, 1]);
        set.symmetric_except_with(1..200).unwrap();

        let expected: Vec<u32> = [0].into_iter().chain(2..200).collect();
        assert_eq!(sorted(&set), expected);
        set.integrity_check();
    }

    #[test]
    fn subset_and_superset() {
        let small = set_of(&[1, 2]);

        assert!(small.is_subset_of([1, 2]).unwrap());
        assert!(small.is_subset_of([2, 1, 3]).unwrap());
        assert!(!small.is_subset_of([1, 3]).unwrap());

        assert!(!small.is_proper_subset_of([1, 2, 2]).unwrap());
        assert!(small.is_proper_subset_of([1, 2, 3]).unwrap());

        assert!(small.is_superset_of([1]).unwrap());
        assert!(small.is_superset_of(Vec::<u32>::new()).unwrap());
        assert!(!small.is_superset_of([1, 3]).unwrap());

        assert!(small.is_proper_superset_of([1, 1]).unwrap());
        assert!(!small.is_proper_superset_of([1, 2]).unwrap());
        assert!(!small.is_proper_superset_of([1, 3]).unwrap());
    }

    #[test]
    fn empty_set_comparisons() {
        let empty = set_of(&[]);

        assert!(empty.is_subset_of([1]).unwrap());
        assert!(empty.is_proper_subset_of([1]).unwrap());
        assert!(!empty.is_proper_subset_of(Vec::<u32>::new()).unwrap());
        assert!(!empty.overlaps([1]).unwrap());
        assert!(empty.set_equals(Vec::<u32>::new()).unwrap());
    }

    #[test]
    fn overlap_and_equality() {
        let set = set_of(&[1, 2, 3]);

        assert!(set.overlaps([9, 3]).unwrap());
        assert!(!set.overlaps([9, 8]).unwrap());

        assert!(set.set_equals([3, 2, 1, 1]).unwrap());
        assert!(!set.set_equals([1, 2]).unwrap());
        assert!(!set.set_equals([1, 2, 3, 4]).unwrap());
    }

    #[test]
    fn marks_are_returned() {
        let pools = PoolSet::builder()
            .smallest_length(1)
            .build_set(PoolMode::Diagnostic);

        let mut set: Set<u32, DefaultComparer, &PoolSet> = Set::new_in(&pools);
        set.extend(0..50);

        set.intersect_with(0..40).unwrap();
        set.symmetric_except_with(30..60).unwrap();
        assert!(set.is_subset_of(0..60).unwrap());
        assert_eq!(sorted_in(&set), (0..30).chain(40..60).collect::<Vec<_>>());

        set.dispose().unwrap();
        pools.assert_all_returned();
    }

    fn sorted_in(set: &Set<u32, DefaultComparer, &PoolSet>) -> Vec<u32> {
        let mut items = set.as_slice().unwrap().to_vec();
        items.sort_unstable();
        items
    }

    #[test]
    fn disposed_set_rejects_algebra() {
        let mut set = set_of(&[1]);
        set.dispose().unwrap();

        assert!(matches!(set.union_with([1]), Err(Error::Disposed)));
        assert!(matches!(set.intersect_with([1]), Err(Error::Disposed)));
        assert!(matches!(set.except_with([1]), Err(Error::Disposed)));
        assert!(matches!(set.symmetric_except_with([1]), Err(Error::Disposed)));
        assert!(matches!(set.is_subset_of([1]), Err(Error::Disposed)));
        assert!(matches!(
            set.is_superset_of(Vec::<u32>::new()),
            Err(Error::Disposed)
        ));
        assert!(matches!(set.overlaps([1]), Err(Error::Disposed)));
    }
}
