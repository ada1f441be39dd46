use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use crate::{BufferPool, DiagnosticBufferPool, PoolMode, PoolPolicy, PoolSet};

const DEFAULT_SMALLEST_LENGTH: usize = 16;
const DEFAULT_SIZE_CLASSES: u32 = 27;
const DEFAULT_RESERVE_SLOTS: usize = 4;
const DEFAULT_MAX_BUFFERS_PER_CLASS: usize = 64;
const DEFAULT_CLEAR_PATTERN: u8 = 0xCD;

/// Builder for creating a [`BufferPool`], a [`DiagnosticBufferPool`] or a [`PoolSet`].
///
/// `P` is the policy of the pool being built. Builders for a [`PoolSet`] have no policy of their
/// own, as the set picks one per element type.
///
/// Every setting is optional. The defaults serve buffers from 16 up to 2^30 elements in
/// power-of-two size classes, keeping at most 64 spare buffers per class.
///
/// # Examples
///
/// ```
/// use buffer_pool::{BufferPool, SlicePolicy};
///
/// let mut pool = BufferPool::<SlicePolicy<u8>>::builder()
///     .smallest_length(64)
///     .size_classes(8)
///     .build();
///
/// // Requests are rounded up to the smallest size class.
/// assert_eq!(pool.rent(10).len(), 64);
///
/// // Requests beyond the largest class (64 << 7) are allocated exactly.
/// assert_eq!(pool.rent(10_000).len(), 10_000);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]).
#[must_use]
pub struct BufferPoolBuilder<P = ()> {
    config: PoolConfig,

    _policy: PhantomData<fn() -> P>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<P> BufferPoolBuilder<P> {
    pub(crate) fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            _policy: PhantomData,
            _not_sync: PhantomData,
        }
    }

    /// Sets the length of the buffers in the smallest size class.
    ///
    /// # Panics
    ///
    /// Panics if `length` is not a power of two.
    pub fn smallest_length(mut self, length: usize) -> Self {
        assert!(
            length.is_power_of_two(),
            "smallest pooled length must be a power of two, got {length}"
        );
        self.config.smallest_length = length;
        self
    }

    /// Sets how many power-of-two size classes the pool serves, starting at the smallest length.
    ///
    /// Requests larger than the largest class bypass the pool and are allocated exactly.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn size_classes(mut self, count: u32) -> Self {
        assert!(count > 0, "a buffer pool needs at least one size class");
        self.config.size_classes = count;
        self
    }

    /// Sets how many spare stack arrays are kept to be recycled between size classes when a
    /// size class needs to grow the array that holds its spare buffers.
    pub fn reserve_slots(mut self, count: usize) -> Self {
        self.config.reserve_slots = count;
        self
    }

    /// Sets the maximum number of spare buffers a single size class keeps. Buffers returned
    /// beyond this are released to the allocator.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn max_buffers_per_class(mut self, count: usize) -> Self {
        assert!(count > 0, "each size class must be able to hold at least one buffer");
        self.config.max_buffers_per_class = count;
        self
    }

    /// Sets the byte the diagnostic pool writes over returned buffers of plain-data elements,
    /// so that use-after-return shows up as recognizable garbage.
    ///
    /// Ignored by the fast pool.
    pub fn clear_pattern(mut self, pattern: u8) -> Self {
        self.config.clear_pattern = pattern;
        self
    }

    /// Builds a [`PoolSet`] whose per-type pools are created with this configuration.
    ///
    /// # Panics
    ///
    /// Panics if the largest size class would not fit in `usize`.
    #[must_use]
    pub fn build_set(self, mode: PoolMode) -> PoolSet {
        PoolSet::new_inner(self.validated(), mode)
    }

    fn validated(self) -> PoolConfig {
        let shift = self.config.smallest_length.trailing_zeros();

        assert!(
            shift
                .checked_add(self.config.size_classes)
                .is_some_and(|bits| bits < usize::BITS),
            "largest size class ({} << {}) does not fit in usize",
            self.config.smallest_length,
            self.config.size_classes.saturating_sub(1)
        );

        self.config
    }
}

impl<P: PoolPolicy> BufferPoolBuilder<P> {
    /// Builds a fast pool using the given policy.
    ///
    /// # Panics
    ///
    /// Panics if the largest size class would not fit in `usize`.
    #[must_use]
    pub fn build_with_policy(self, policy: P) -> BufferPool<P> {
        BufferPool::new_inner(self.validated(), policy)
    }

    /// Builds a diagnostic pool using the given policy.
    ///
    /// # Panics
    ///
    /// Panics if the largest size class would not fit in `usize`.
    #[must_use]
    pub fn build_diagnostic_with_policy(self, policy: P) -> DiagnosticBufferPool<P> {
        DiagnosticBufferPool::new_inner(self.validated(), policy)
    }
}

impl<P: PoolPolicy + Default> BufferPoolBuilder<P> {
    /// Builds a fast pool using the default instance of the policy.
    ///
    /// # Panics
    ///
    /// Panics if the largest size class would not fit in `usize`.
    #[must_use]
    pub fn build(self) -> BufferPool<P> {
        self.build_with_policy(P::default())
    }

    /// Builds a diagnostic pool using the default instance of the policy.
    ///
    /// # Panics
    ///
    /// Panics if the largest size class would not fit in `usize`.
    #[must_use]
    pub fn build_diagnostic(self) -> DiagnosticBufferPool<P> {
        self.build_diagnostic_with_policy(P::default())
    }
}

impl<P> fmt::Debug for BufferPoolBuilder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Where a returned buffer belongs, judged by its length alone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Placement {
    /// Empty buffers are never pooled.
    Empty,

    /// The buffer belongs to the size class with this index.
    Class(usize),

    /// Larger than the largest size class; released instead of pooled.
    Oversized,

    /// Not a length the pool ever hands out.
    Foreign,
}

/// Size class arithmetic and tuning shared by both pool variants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PoolConfig {
    smallest_length: usize,
    size_classes: u32,
    pub(crate) reserve_slots: usize,
    pub(crate) max_buffers_per_class: usize,
    pub(crate) clear_pattern: u8,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            smallest_length: DEFAULT_SMALLEST_LENGTH,
            size_classes: DEFAULT_SIZE_CLASSES,
            reserve_slots: DEFAULT_RESERVE_SLOTS,
            max_buffers_per_class: DEFAULT_MAX_BUFFERS_PER_CLASS,
            clear_pattern: DEFAULT_CLEAR_PATTERN,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub(crate) fn size_classes(&self) -> usize {
        self.size_classes as usize
    }

    /// Length of every buffer stored in the size class with the given index.
    #[must_use]
    pub(crate) fn class_length(&self, index: usize) -> usize {
        debug_assert!(index < self.size_classes());

        self.smallest_length << index
    }

    #[must_use]
    pub(crate) fn largest_length(&self) -> usize {
        self.class_length(self.size_classes().wrapping_sub(1))
    }

    /// The size class serving a request for at least `minimum_length` elements, or `None` if the
    /// request is larger than the largest class.
    #[must_use]
    pub(crate) fn class_for_rent(&self, minimum_length: usize) -> Option<usize> {
        let rounded = minimum_length.checked_next_power_of_two()?;

        let index = rounded
            .trailing_zeros()
            .saturating_sub(self.smallest_length.trailing_zeros()) as usize;

        (index < self.size_classes()).then_some(index)
    }

    #[must_use]
    pub(crate) fn placement(&self, length: usize) -> Placement {
        if length == 0 {
            Placement::Empty
        } else if length > self.largest_length() {
            Placement::Oversized
        } else if length.is_power_of_two() && length >= self.smallest_length {
            let index = length
                .trailing_zeros()
                .wrapping_sub(self.smallest_length.trailing_zeros());
            Placement::Class(index as usize)
        } else {
            Placement::Foreign
        }
    }
}
