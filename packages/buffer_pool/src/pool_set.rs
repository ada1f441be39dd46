use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use foldhash::fast::RandomState;

use crate::builder::PoolConfig;
use crate::{
    BufferPool, BufferPoolBuilder, DiagnosticBufferPool, Error, Pool, PoolPolicy, Result,
    UninitBuffer, UninitSlicePolicy,
};

/// Which pool variant a [`PoolSet`] creates for each element type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum PoolMode {
    /// [`BufferPool`]: no tracking, clearing only where needed.
    #[default]
    Fast,

    /// [`DiagnosticBufferPool`]: rentals are tracked and misuse is reported.
    Diagnostic,
}

/// Supplies uninitialized storage to collections that rent their backing arrays.
///
/// Implemented by [`PoolSet`], by references to and [`Rc`]s of any provider, and by
/// [`ThreadShared`], which forwards to a pool set owned by the current thread.
pub trait PoolProvider {
    /// Rents storage for at least `minimum_length` elements of `T`.
    fn rent<T: 'static>(&self, minimum_length: usize) -> UninitBuffer<T>;

    /// Hands storage previously obtained from [`rent()`](Self::rent) back to the provider.
    ///
    /// The caller must have dropped every initialized element before handing the storage back.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying pool if it rejects the buffer.
    fn give_back<T: 'static>(&self, buffer: UninitBuffer<T>, clear: bool) -> Result<()>;
}

/// A set of pools of [`UninitBuffer`]s, one per element type, created on first use.
///
/// This is the unit of sharing for collections: every collection that is given the same set
/// draws its storage from the same per-type pools.
///
/// # Thread safety
///
/// The set is single-threaded. Use one per thread, for example via [`ThreadShared`].
///
/// # Examples
///
/// ```
/// use buffer_pool::{PoolMode, PoolSet};
///
/// let pools = PoolSet::new();
///
/// let bytes = pools.rent::<u8>(100);
/// let words = pools.rent::<u64>(100);
/// assert_eq!(bytes.len(), 128);
/// assert_eq!(words.len(), 128);
///
/// pools.give_back(bytes, false).unwrap();
/// pools.give_back(words, false).unwrap();
///
/// assert_eq!(pools.mode(), PoolMode::Fast);
/// pools.detect_leaks().unwrap();
/// ```
pub struct PoolSet {
    config: PoolConfig,
    mode: PoolMode,

    pools: RefCell<HashMap<TypeId, Box<dyn ErasedPool>, RandomState>>,
}

impl PoolSet {
    pub(crate) fn new_inner(config: PoolConfig, mode: PoolMode) -> Self {
        Self {
            config,
            mode,
            pools: RefCell::new(HashMap::default()),
        }
    }

    /// Creates a set of fast pools with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build_set(PoolMode::Fast)
    }

    /// Creates a set of diagnostic pools with the default configuration.
    #[must_use]
    pub fn diagnostic() -> Self {
        Self::builder().build_set(PoolMode::Diagnostic)
    }

    /// Starts building a new pool set. Finish with [`build_set()`](BufferPoolBuilder::build_set).
    pub fn builder() -> BufferPoolBuilder {
        BufferPoolBuilder::new()
    }

    /// The variant of the pools in this set.
    #[must_use]
    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    /// Rents storage for at least `minimum_length` elements of `T` from the pool for `T`.
    #[must_use]
    pub fn rent<T: 'static>(&self, minimum_length: usize) -> UninitBuffer<T> {
        self.with_pool::<T, _>(|pool| pool.rent(minimum_length))
    }

    /// Hands storage back to the pool for `T`.
    ///
    /// # Errors
    ///
    /// Returns the error of the pool for `T` if it rejects the buffer.
    pub fn give_back<T: 'static>(&self, buffer: UninitBuffer<T>, clear: bool) -> Result<()> {
        self.with_pool::<T, _>(|pool| pool.give_back(buffer, clear))
    }

    /// Trims every pool in the set. Returns whether any buffer was released.
    ///
    /// See [`BufferPool::trim_excess()`].
    pub fn trim_excess(&self) -> bool {
        self.pools
            .borrow_mut()
            .values_mut()
            .fold(false, |released, pool| pool.trim_excess() | released)
    }

    /// Reports rentals that were never returned, across all pools in the set.
    ///
    /// Always succeeds for sets of fast pools.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Leaked`] with the total number of outstanding rentals and the call stack
    /// of the oldest outstanding rental of the first pool that reported one.
    pub fn detect_leaks(&self) -> Result<()> {
        let pools = self.pools.borrow();

        let mut leaked: Option<(usize, String)> = None;

        for pool in pools.values() {
            match pool.detect_leaks() {
                Ok(()) => {}
                Err(Error::Leaked { count, capture }) => {
                    let total = leaked.take().map_or((count, capture), |(total, first)| {
                        (total.saturating_add(count), first)
                    });
                    leaked = Some(total);
                }
                Err(error) => return Err(error),
            }
        }

        match leaked {
            None => Ok(()),
            Some((count, capture)) => Err(Error::Leaked { count, capture }),
        }
    }

    /// Asserts that every rental from the pools of this set has been returned.
    ///
    /// # Panics
    ///
    /// Panics with the [`Error::Leaked`] report if any rental is outstanding.
    #[track_caller]
    pub fn assert_all_returned(&self) {
        if let Err(error) = self.detect_leaks() {
            panic!("{error}");
        }
    }

    fn with_pool<T: 'static, R>(
        &self,
        f: impl FnOnce(&mut dyn Pool<Buffer = UninitBuffer<T>>) -> R,
    ) -> R {
        let mut pools = self.pools.borrow_mut();

        let erased = pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(TypedPool::<T>::new(self.config, self.mode)));

        let typed = erased
            .as_any_mut()
            .downcast_mut::<TypedPool<T>>()
            .expect("pools are keyed by the TypeId of their element type");

        f(typed.pool.as_mut())
    }
}

impl Default for PoolSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSet")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field(
                "element_types",
                &self.pools.try_borrow().map_or(0, |pools| pools.len()),
            )
            .finish()
    }
}

impl PoolProvider for PoolSet {
    fn rent<T: 'static>(&self, minimum_length: usize) -> UninitBuffer<T> {
        Self::rent(self, minimum_length)
    }

    fn give_back<T: 'static>(&self, buffer: UninitBuffer<T>, clear: bool) -> Result<()> {
        Self::give_back(self, buffer, clear)
    }
}

impl<P: PoolProvider> PoolProvider for &P {
    fn rent<T: 'static>(&self, minimum_length: usize) -> UninitBuffer<T> {
        P::rent(self, minimum_length)
    }

    fn give_back<T: 'static>(&self, buffer: UninitBuffer<T>, clear: bool) -> Result<()> {
        P::give_back(self, buffer, clear)
    }
}

impl<P: PoolProvider> PoolProvider for Rc<P> {
    fn rent<T: 'static>(&self, minimum_length: usize) -> UninitBuffer<T> {
        P::rent(self, minimum_length)
    }

    fn give_back<T: 'static>(&self, buffer: UninitBuffer<T>, clear: bool) -> Result<()> {
        P::give_back(self, buffer, clear)
    }
}

/// Type-erased view of one per-type pool, enough for set-wide maintenance.
trait ErasedPool {
    fn trim_excess(&mut self) -> bool;

    fn detect_leaks(&self) -> Result<()>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct TypedPool<T> {
    pool: Box<dyn Pool<Buffer = UninitBuffer<T>>>,
}

impl<T: 'static> TypedPool<T> {
    fn new(config: PoolConfig, mode: PoolMode) -> Self {
        let policy = UninitSlicePolicy::<T>::new();

        let pool: Box<dyn Pool<Buffer = UninitBuffer<T>>> = match mode {
            PoolMode::Fast => Box::new(BufferPool::new_inner(config, policy)),
            PoolMode::Diagnostic => Box::new(DiagnosticBufferPool::new_inner(config, policy)),
        };

        tracing::debug!(
            element_type = type_name::<T>(),
            ?mode,
            largest_pooled_length = config.largest_length(),
            "created pool for element type"
        );

        Self { pool }
    }
}

impl<T: 'static> ErasedPool for TypedPool<T> {
    fn trim_excess(&mut self) -> bool {
        self.pool.trim_excess()
    }

    fn detect_leaks(&self) -> Result<()> {
        self.pool.detect_leaks()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

thread_local! {
    static SHARED: PoolSet = PoolSet::new();
}

/// Forwards to a set of fast pools owned by the current thread.
///
/// This is the default storage provider of collections. It is a zero-sized handle, so
/// collections that use it carry no extra state for it.
///
/// While the current thread is being torn down, rentals fall back to plain allocation and
/// returned storage is released.
///
/// # Examples
///
/// ```
/// use buffer_pool::{PoolProvider, ThreadShared};
///
/// let buffer = ThreadShared.rent::<u32>(10);
/// assert_eq!(buffer.len(), 16);
/// ThreadShared.give_back(buffer, false).unwrap();
///
/// // Spare buffers decay when the thread's pools are trimmed while idle.
/// ThreadShared::trim_excess();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ThreadShared;

impl ThreadShared {
    /// Calls `f` with the pool set of the current thread.
    ///
    /// # Panics
    ///
    /// Panics if called while the current thread is being torn down.
    pub fn with<R>(f: impl FnOnce(&PoolSet) -> R) -> R {
        SHARED.with(f)
    }

    /// Trims the pool set of the current thread. Returns whether any buffer was released.
    pub fn trim_excess() -> bool {
        SHARED.try_with(PoolSet::trim_excess).unwrap_or(false)
    }
}

impl PoolProvider for ThreadShared {
    fn rent<T: 'static>(&self, minimum_length: usize) -> UninitBuffer<T> {
        SHARED
            .try_with(|set| set.rent::<T>(minimum_length))
            .unwrap_or_else(|_| UninitSlicePolicy::<T>::new().create(minimum_length))
    }

    fn give_back<T: 'static>(&self, buffer: UninitBuffer<T>, clear: bool) -> Result<()> {
        // If the pool set of the thread is already gone, the closure and the buffer it owns are
        // dropped without being called.
        SHARED
            .try_with(move |set| set.give_back(buffer, clear))
            .unwrap_or(Ok(()))
    }
}
