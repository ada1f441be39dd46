use std::cell::Cell;
use std::fmt;
use std::iter;
use std::marker::PhantomData;

use crate::builder::{Placement, PoolConfig};
use crate::pool_stack::{PoolStack, ReserveSlot};
use crate::{BufferPoolBuilder, Error, Fill, Pool, PoolPolicy, Result};

/// A pool of reusable buffers, grouped into power-of-two size classes.
///
/// Requests are rounded up to the next power of two and served from the spare buffers of the
/// matching size class, falling back to allocating a buffer of exactly the class length.
/// Requests larger than the largest size class bypass the pool and are allocated at exactly the
/// requested length.
///
/// Spare buffers are handed out in last-in-first-out order, so a buffer that was just returned
/// is the next one rented from its size class.
///
/// # Resource usage
///
/// Buffers the pool keeps are only released by [`trim_excess()`][1], which releases half of the
/// spare buffers of each size class that was not used since the previous call, or when the pool
/// is dropped. Call it periodically (e.g. once per frame or per batch) to let memory decay after
/// load subsides.
///
/// # Thread safety
///
/// The pool is single-owner: it is [`Send`] when its buffers are, but never [`Sync`]. The usual
/// way to share pooled buffers across a program is one pool per thread.
///
/// # Examples
///
/// ```
/// use buffer_pool::{BufferPool, SlicePolicy};
///
/// let mut pool = BufferPool::<SlicePolicy<u32>>::new();
///
/// let mut buffer = pool.rent(100);
/// assert_eq!(buffer.len(), 128);
/// buffer[0] = 42;
///
/// pool.give_back(buffer, true).unwrap();
///
/// // The same storage comes back, cleared.
/// let buffer = pool.rent(128);
/// assert_eq!(buffer[0], 0);
/// ```
///
/// [1]: Self::trim_excess
pub struct BufferPool<P: PoolPolicy> {
    policy: P,
    config: PoolConfig,

    /// One stack per size class, created on first use.
    stacks: Box<[Option<PoolStack<P::Buffer>>]>,

    /// Spare stack arrays shared between the size classes.
    reserve: Box<[ReserveSlot<P::Buffer>]>,

    _not_sync: PhantomData<Cell<()>>,
}

impl<P: PoolPolicy> BufferPool<P> {
    pub(crate) fn new_inner(config: PoolConfig, policy: P) -> Self {
        Self {
            policy,
            stacks: iter::repeat_with(|| None)
                .take(config.size_classes())
                .collect(),
            reserve: iter::repeat_with(|| None)
                .take(config.reserve_slots)
                .collect(),
            config,
            _not_sync: PhantomData,
        }
    }

    /// Creates a pool with the default configuration.
    #[must_use]
    pub fn new() -> Self
    where
        P: Default,
    {
        Self::builder().build()
    }

    /// Starts building a new pool.
    ///
    /// Use this when you want to customize the size classes or the policy instance.
    pub fn builder() -> BufferPoolBuilder<P> {
        BufferPoolBuilder::new()
    }

    /// The policy that creates, clears and releases the buffers of this pool.
    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The length above which requests bypass the pool.
    #[must_use]
    pub fn largest_pooled_length(&self) -> usize {
        self.config.largest_length()
    }

    /// The number of spare buffers currently kept by the pool, across all size classes.
    #[must_use]
    pub fn pooled_count(&self) -> usize {
        self.stacks.iter().flatten().map(PoolStack::len).sum()
    }

    /// Rents a buffer of at least `minimum_length` elements.
    ///
    /// The length of the returned buffer is the smallest size class that fits the request, or
    /// exactly `minimum_length` if the request exceeds the largest size class. A request for
    /// zero elements returns an empty buffer that is not associated with any size class.
    ///
    /// # Examples
    ///
    /// ```
    /// use buffer_pool::{BufferPool, SlicePolicy};
    ///
    /// let mut pool = BufferPool::<SlicePolicy<u8>>::new();
    ///
    /// assert_eq!(pool.rent(0).len(), 0);
    /// assert_eq!(pool.rent(1).len(), 16);
    /// assert_eq!(pool.rent(17).len(), 32);
    /// ```
    #[must_use]
    pub fn rent(&mut self, minimum_length: usize) -> P::Buffer {
        if minimum_length == 0 {
            return self.policy.create(0);
        }

        let Some(index) = self.config.class_for_rent(minimum_length) else {
            tracing::debug!(
                minimum_length,
                largest = self.config.largest_length(),
                "request exceeds largest size class, allocating unpooled buffer"
            );
            return self.policy.create(minimum_length);
        };

        let stack = stack_for_class(&mut self.stacks, index);

        stack
            .try_pop()
            .unwrap_or_else(|| self.policy.create(self.config.class_length(index)))
    }

    /// Hands a previously rented buffer back to the pool.
    ///
    /// Set `clear` when the buffer holds data that should not survive into the next rental.
    /// Buffers whose elements own resources are cleared regardless, so the pool never extends
    /// the lifetime of anything they reference.
    ///
    /// Empty buffers are accepted and ignored. Buffers beyond the largest size class are accepted
    /// and released if their length is a power of two. Unpooled rentals of any other length are
    /// not tracked by this pool, so the pool cannot tell them from foreign buffers; drop them
    /// instead of handing them back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPooled`] if the length of the buffer is not one the pool hands out.
    /// The buffer is released in that case.
    pub fn give_back(&mut self, mut buffer: P::Buffer, clear: bool) -> Result<()> {
        let length = self.policy.length(&buffer);

        match self.config.placement(length) {
            Placement::Empty => Ok(()),
            Placement::Oversized if length.is_power_of_two() => {
                self.policy.release(buffer);
                Ok(())
            }
            Placement::Oversized | Placement::Foreign => {
                self.policy.release(buffer);
                Err(Error::NotPooled { length })
            }
            Placement::Class(index) => {
                if clear || self.policy.holds_resources() {
                    self.policy.clear(&mut buffer, Fill::Zero);
                }

                self.park(index, buffer);
                Ok(())
            }
        }
    }

    /// Releases half of the spare buffers of every size class that has not rented or received
    /// a buffer since the previous call.
    ///
    /// Returns `true` if any buffer was released.
    ///
    /// # Examples
    ///
    /// ```
    /// use buffer_pool::{BufferPool, SlicePolicy};
    ///
    /// let mut pool = BufferPool::<SlicePolicy<u8>>::new();
    ///
    /// let buffers = [pool.rent(16), pool.rent(16)];
    /// for buffer in buffers {
    ///     pool.give_back(buffer, false).unwrap();
    /// }
    ///
    /// // The class was busy since the last trim, so nothing is released yet.
    /// assert!(!pool.trim_excess());
    /// assert_eq!(pool.pooled_count(), 2);
    ///
    /// // It stayed idle since, so half of its buffers go.
    /// assert!(pool.trim_excess());
    /// assert_eq!(pool.pooled_count(), 1);
    /// ```
    pub fn trim_excess(&mut self) -> bool {
        let released: usize = self
            .stacks
            .iter_mut()
            .flatten()
            .map(|stack| stack.trim(&self.policy))
            .sum();

        if released > 0 {
            tracing::debug!(released, remaining = self.pooled_count(), "trimmed buffer pool");
        }

        released > 0
    }

    pub(crate) fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Whether the size class with the given index currently holds the buffer with this identity.
    #[must_use]
    pub(crate) fn is_parked(&self, index: usize, identity: usize) -> bool {
        self.stacks
            .get(index)
            .and_then(Option::as_ref)
            .is_some_and(|stack| stack.contains(&self.policy, identity))
    }

    /// Stores a buffer of exactly the class length in its size class, growing the class if
    /// needed and releasing the buffer if the class is at its limit.
    pub(crate) fn park(&mut self, index: usize, buffer: P::Buffer) {
        debug_assert_eq!(
            self.policy.length(&buffer),
            self.config.class_length(index)
        );

        let stack = stack_for_class(&mut self.stacks, index);

        let Err(buffer) = stack.try_push(buffer) else {
            return;
        };

        if !stack.expand(&mut self.reserve, self.config.max_buffers_per_class) {
            tracing::trace!(index, "size class is full, releasing returned buffer");
            self.policy.release(buffer);
            return;
        }

        if let Err(buffer) = stack.try_push(buffer) {
            self.policy.release(buffer);
        }
    }
}

fn stack_for_class<B>(stacks: &mut [Option<PoolStack<B>>], index: usize) -> &mut PoolStack<B> {
    stacks
        .get_mut(index)
        .expect("size class index is always computed from the pool configuration")
        .get_or_insert_with(PoolStack::new)
}

impl<P: PoolPolicy + Default> Default for BufferPool<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PoolPolicy> Drop for BufferPool<P> {
    fn drop(&mut self) {
        for stack in self.stacks.iter_mut().flatten() {
            stack.drain(&self.policy);
        }
    }
}

impl<P: PoolPolicy + fmt::Debug> fmt::Debug for BufferPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("policy", &self.policy)
            .field("config", &self.config)
            .field("pooled_count", &self.pooled_count())
            .finish_non_exhaustive()
    }
}

impl<P: PoolPolicy> Pool for BufferPool<P> {
    type Buffer = P::Buffer;

    fn rent(&mut self, minimum_length: usize) -> Self::Buffer {
        Self::rent(self, minimum_length)
    }

    fn give_back(&mut self, buffer: Self::Buffer, clear: bool) -> Result<()> {
        Self::give_back(self, buffer, clear)
    }

    fn trim_excess(&mut self) -> bool {
        Self::trim_excess(self)
    }
}
