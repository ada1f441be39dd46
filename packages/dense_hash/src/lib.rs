#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A hash dictionary and a hash set whose entries live in dense arrays rented from a
//! [`buffer_pool`].
//!
//! Both collections share one engine: a robin-hood open-addressing table of compact
//! `(fingerprint, position)` slots that indexes into gap-free key and value arrays. This gives
//!
//! * iteration that is a linear walk over contiguous memory, with the keys and values also
//!   available directly as slices;
//! * lookups that stop as soon as the robin-hood ordering rules the key out, usually within one
//!   or two slots;
//! * deletion without tombstones, by shifting displaced neighbors back into the vacated slot;
//! * no allocations in the steady state, as all storage (including the old storage when
//!   growing) is rented from and handed back to a pool.
//!
//! # Example
//!
//! ```
//! use dense_hash::{Dictionary, Set};
//!
//! let mut ages = Dictionary::new();
//! ages.insert("ada".to_string(), 36).unwrap();
//! ages.insert("alan".to_string(), 41).unwrap();
//!
//! // Lookups accept borrowed forms of the key.
//! assert_eq!(ages.get("ada").unwrap(), Some(&36));
//!
//! let adults: Set<String> = ages
//!     .iter()
//!     .unwrap()
//!     .filter(|(_, age)| **age >= 18)
//!     .map(|(name, _)| name.clone())
//!     .collect();
//! assert_eq!(adults.len(), 2);
//! ```
//!
//! # Storage
//!
//! By default, collections rent from the pools of the current thread ([`ThreadShared`]). Any
//! [`PoolProvider`] can be supplied instead, for example a diagnostic [`PoolSet`] in tests to
//! verify that every buffer finds its way back:
//!
//! ```
//! use buffer_pool::PoolSet;
//! use dense_hash::Dictionary;
//!
//! let pools = PoolSet::diagnostic();
//!
//! let mut squares = Dictionary::new_in(&pools);
//! for n in 0..100_u64 {
//!     squares.insert(n, n * n).unwrap();
//! }
//! drop(squares);
//!
//! pools.assert_all_returned();
//! ```
//!
//! # Disposal
//!
//! Storage is handed back when a collection is dropped. [`Dictionary::dispose()`] and
//! [`Set::dispose()`] do the same explicitly and report a rejected buffer as an error instead
//! of panicking. A disposed collection reports itself as empty and fails every fallible
//! operation with [`Error::Disposed`].
//!
//! # Iteration and modification
//!
//! Borrowing iterators cannot outlive a modification. For walks that interleave with
//! modifications there is [`Cursor`], which detects structural changes made since it was
//! created and fails with [`Error::ConcurrentModification`].
//!
//! # Features
//!
//! * `serde` (default): [`Serialize`](::serde::Serialize) and
//!   [`Deserialize`](::serde::Deserialize) for both collections.

mod comparer;
mod cursor;
mod dictionary;
mod error;
mod index;
#[cfg(feature = "serde")]
mod serialization;
mod set;
mod set_algebra;
mod slot;
mod storage;
mod table;

pub use buffer_pool::{PoolProvider, PoolSet, ThreadShared};
pub use comparer::{DefaultComparer, KeyComparer};
pub use cursor::Cursor;
pub use dictionary::{Dictionary, Iter, IterMut};
pub use error::{Error, Result};
pub use set::Set;
