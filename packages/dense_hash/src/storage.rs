use std::mem;

use crate::table::Tables;
use crate::{Error, Result};

/// The storage of a collection: either live tables or nothing, once disposed.
pub(crate) enum Storage<K, V> {
    Live(Tables<K, V>),
    Disposed,
}

impl<K, V> Storage<K, V> {
    pub(crate) fn live(&self) -> Result<&Tables<K, V>> {
        match self {
            Self::Live(tables) => Ok(tables),
            Self::Disposed => Err(Error::Disposed),
        }
    }

    pub(crate) fn live_mut(&mut self) -> Result<&mut Tables<K, V>> {
        match self {
            Self::Live(tables) => Ok(tables),
            Self::Disposed => Err(Error::Disposed),
        }
    }

    /// Takes the tables out, leaving the storage disposed.
    pub(crate) fn take(&mut self) -> Option<Tables<K, V>> {
        match mem::replace(self, Self::Disposed) {
            Self::Live(tables) => Some(tables),
            Self::Disposed => None,
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use buffer_pool::PoolSet;

    use super::*;

    #[test]
    fn disposed_storage_rejects_access() {
        let mut storage = Storage::<u8, u8>::Disposed;

        assert!(storage.is_disposed());
        assert!(matches!(storage.live(), Err(Error::Disposed)));
        assert!(matches!(storage.live_mut(), Err(Error::Disposed)));
        assert!(storage.take().is_none());
    }

    #[test]
    fn take_disposes() {
        let pools = PoolSet::new();
        let mut storage = Storage::Live(Tables::<u8, u8>::new(&pools, 4));

        assert!(!storage.is_disposed());
        // Rounded up to the smallest size class of the pool.
        assert_eq!(storage.live().unwrap().table_length(), 16);

        let tables = storage.take().unwrap();
        assert!(storage.is_disposed());

        tables.release(&pools).unwrap();
    }
}
