use std::hash::{BuildHasher, Hash};

use foldhash::fast::RandomState;

/// Hashes and compares keys of type `Q` on behalf of a collection.
///
/// A collection with keys of type `K` requires `KeyComparer<K>` for insertion. Lookups by an
/// alternate form `Q` of the key (where `K: Borrow<Q>`) additionally require `KeyComparer<Q>`,
/// which must agree with the implementation for `K`: a key and its borrowed form must hash
/// identically and compare equal to the same keys.
///
/// The comparer is resolved at compile time, so the default comparer compiles down to the
/// `Hash` and `Eq` implementations of the key type.
///
/// # Examples
///
/// A comparer that ignores ASCII case:
///
/// ```
/// use std::hash::{BuildHasher, Hasher};
///
/// use dense_hash::{Dictionary, KeyComparer};
///
/// #[derive(Default)]
/// struct IgnoreAsciiCase(foldhash::fast::FixedState);
///
/// impl KeyComparer<str> for IgnoreAsciiCase {
///     fn hash(&self, key: &str) -> u64 {
///         let mut hasher = self.0.build_hasher();
///         for byte in key.bytes() {
///             hasher.write_u8(byte.to_ascii_lowercase());
///         }
///         hasher.finish()
///     }
///
///     fn equals(&self, left: &str, right: &str) -> bool {
///         left.eq_ignore_ascii_case(right)
///     }
/// }
///
/// impl KeyComparer<String> for IgnoreAsciiCase {
///     fn hash(&self, key: &String) -> u64 {
///         KeyComparer::<str>::hash(self, key)
///     }
///
///     fn equals(&self, left: &String, right: &String) -> bool {
///         KeyComparer::<str>::equals(self, left, right)
///     }
/// }
///
/// let mut headers = Dictionary::with_comparer(IgnoreAsciiCase::default());
/// headers.insert("Content-Type".to_string(), 1).unwrap();
///
/// assert_eq!(headers.get("content-type").unwrap(), Some(&1));
/// ```
pub trait KeyComparer<Q: ?Sized> {
    /// Hashes the key.
    fn hash(&self, key: &Q) -> u64;

    /// Whether two keys are equal.
    fn equals(&self, left: &Q, right: &Q) -> bool;
}

/// Compares keys with their [`Hash`] and [`Eq`] implementations.
///
/// The hash function comes from the [`BuildHasher`] `S`, by default a randomly seeded
/// [`foldhash`] hasher.
#[derive(Clone, Debug, Default)]
pub struct DefaultComparer<S = RandomState> {
    hasher: S,
}

impl DefaultComparer {
    /// Creates a comparer with a randomly seeded hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> DefaultComparer<S> {
    /// Creates a comparer that hashes with the given hasher.
    #[must_use]
    pub fn with_hasher(hasher: S) -> Self {
        Self { hasher }
    }

    /// The hasher used by this comparer.
    #[must_use]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }
}

impl<Q, S> KeyComparer<Q> for DefaultComparer<S>
where
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    #[inline]
    fn equals(&self, left: &Q, right: &Q) -> bool {
        left == right
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use foldhash::fast::FixedState;

    use super::*;

    #[test]
    fn owned_and_borrowed_forms_hash_alike() {
        let comparer = DefaultComparer::with_hasher(FixedState::with_seed(7));

        let owned = "needle".to_string();
        assert_eq!(
            KeyComparer::<String>::hash(&comparer, &owned),
            KeyComparer::<str>::hash(&comparer, "needle")
        );
    }

    #[test]
    fn equality_follows_eq() {
        let comparer = DefaultComparer::new();

        assert!(comparer.equals(&5_u32, &5));
        assert!(!comparer.equals(&5_u32, &6));
    }

    #[test]
    fn seeded_hashers_are_deterministic() {
        let first = DefaultComparer::with_hasher(FixedState::with_seed(42));
        let second = DefaultComparer::with_hasher(FixedState::with_seed(42));

        assert_eq!(first.hash(&1234_u64), second.hash(&1234_u64));
    }
}
