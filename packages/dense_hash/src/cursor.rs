use crate::{Error, Result};

/// A position in the iteration order of a collection, bound to the collection it was created
/// from and to the version of that collection at the time.
///
/// Unlike a borrowing iterator, a cursor does not hold on to the collection between steps, so
/// the collection may be modified while a cursor exists. Advancing the cursor after a
/// structural modification (an insertion, removal, resize, clear or dispose) fails with
/// [`Error::ConcurrentModification`]. Overwriting the value of an existing entry is not a
/// structural modification. Advancing it against any other collection fails with
/// [`Error::ForeignCursor`].
///
/// # Examples
///
/// ```
/// use dense_hash::{Dictionary, Error};
///
/// let mut scores = Dictionary::new();
/// scores.insert("ada", 3).unwrap();
/// scores.insert("grace", 5).unwrap();
///
/// let mut cursor = scores.cursor().unwrap();
/// assert!(scores.next_entry(&mut cursor).unwrap().is_some());
///
/// scores.insert("linus", 1).unwrap();
///
/// assert!(matches!(
///     scores.next_entry(&mut cursor),
///     Err(Error::ConcurrentModification { .. })
/// ));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cursor {
    owner: u64,
    position: usize,
    version: u64,
}

impl Cursor {
    pub(crate) fn new(owner: u64, version: u64) -> Self {
        Self {
            owner,
            position: 0,
            version,
        }
    }

    /// How many items the cursor has yielded so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Yields the item at the current position and moves past it, if `owner` created the cursor
    /// and is still at the version the cursor was created from.
    pub(crate) fn advance<T>(
        &mut self,
        owner: u64,
        version: u64,
        item_at: impl FnOnce(usize) -> Option<T>,
    ) -> Result<Option<T>> {
        if owner != self.owner {
            return Err(Error::ForeignCursor);
        }

        if version != self.version {
            return Err(Error::ConcurrentModification {
                expected: self.version,
                actual: version,
            });
        }

        let item = item_at(self.position);

        if item.is_some() {
            self.position = self.position.wrapping_add(1);
        }

        Ok(item)
    }
}
