use std::result;

use thiserror::Error;

/// Errors raised by the collections in this crate.
///
/// Every variant indicates a violated contract that is surfaced at the point of detection.
/// Nothing is retried or repaired internally.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The collection was disposed and no longer owns any storage.
    #[error("the collection has been disposed")]
    Disposed,

    /// An entry with an equal key is already present.
    #[error("an entry with an equal key is already present")]
    DuplicateKey,

    /// A lookup that requires the key to be present did not find it.
    #[error("the key is not present in the collection")]
    KeyNotFound,

    /// Growing to the requested number of entries would exceed the largest supported table.
    #[error("{requested} entries exceed the largest supported hash table")]
    CapacityOverflow {
        /// The number of entries the collection was asked to hold.
        requested: usize,
    },

    /// The collection was structurally modified after a cursor was created.
    #[error(
        "the collection was modified during iteration (cursor version {expected}, collection version {actual})"
    )]
    ConcurrentModification {
        /// The version captured by the cursor.
        expected: u64,

        /// The version of the collection when the cursor was advanced.
        actual: u64,
    },

    /// A cursor was advanced against a collection other than the one that created it.
    #[error("the cursor was created by a different collection")]
    ForeignCursor,

    /// The buffer pool rejected storage handed back by the collection.
    #[error(transparent)]
    Pool(#[from] buffer_pool::Error),
}

/// A specialized `Result` type for collection operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn concurrent_modification_names_both_versions() {
        let error = Error::ConcurrentModification {
            expected: 3,
            actual: 4,
        };

        let message = error.to_string();
        assert!(message.contains("cursor version 3"));
        assert!(message.contains("collection version 4"));
    }

    #[test]
    fn pool_errors_pass_through() {
        let error = Error::from(buffer_pool::Error::NotPooled { length: 24 });

        assert!(matches!(error, Error::Pool(_)));
        assert_eq!(error.to_string(), "buffer of length 24 is not a pooled object");
    }
}
