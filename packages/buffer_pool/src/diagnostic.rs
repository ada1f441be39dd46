use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt;

use foldhash::fast::RandomState;

use crate::builder::Placement;
use crate::{BufferPool, BufferPoolBuilder, Error, Fill, Pool, PoolPolicy, Result};

/// A [`BufferPool`] that checks how it is used.
///
/// On top of the behavior of the fast pool, this variant:
///
/// * records every rental together with the call stack that made it;
/// * rejects buffers it did not rent ([`Error::NotPooled`]) and buffers that are already back in
///   the pool ([`Error::AlreadyReturned`]);
/// * always clears returned buffers, writing a recognizable byte pattern over plain-data elements
///   so that use-after-return shows up as garbage rather than plausible data;
/// * reports rentals that were never returned when [`detect_leaks()`][1] is called.
///
/// Rental tracking is keyed by the address of the buffer storage. Buffers without distinct
/// storage (empty buffers and buffers of zero-sized elements) are not tracked.
///
/// Capturing call stacks is expensive and depends on `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
/// Use this pool in tests and debugging sessions, not in production hot paths.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
///
/// use buffer_pool::{DiagnosticBufferPool, Error, SharedSlicePolicy};
///
/// let mut pool = DiagnosticBufferPool::<SharedSlicePolicy<u8>>::new();
///
/// let buffer = pool.rent(16);
/// let alias = Rc::clone(&buffer);
///
/// pool.give_back(buffer, false).unwrap();
///
/// // The alias refers to storage that is already back in the pool.
/// assert!(matches!(
///     pool.give_back(alias, false),
///     Err(Error::AlreadyReturned { .. })
/// ));
/// ```
///
/// [1]: Self::detect_leaks
pub struct DiagnosticBufferPool<P: PoolPolicy> {
    inner: BufferPool<P>,

    /// Outstanding rentals, keyed by buffer identity.
    outstanding: HashMap<usize, Rental, RandomState>,

    /// Rentals whose storage was freed without being returned and then handed out again by the
    /// allocator. They can never be returned any more.
    abandoned: Vec<Rental>,

    next_sequence: u64,
}

struct Rental {
    length: usize,
    sequence: u64,
    capture: Backtrace,
}

impl<P: PoolPolicy> DiagnosticBufferPool<P> {
    pub(crate) fn new_inner(config: crate::builder::PoolConfig, policy: P) -> Self {
        Self {
            inner: BufferPool::new_inner(config, policy),
            outstanding: HashMap::default(),
            abandoned: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Creates a diagnostic pool with the default configuration.
    #[must_use]
    pub fn new() -> Self
    where
        P: Default,
    {
        Self::builder().build_diagnostic()
    }

    /// Starts building a new diagnostic pool. Finish with
    /// [`build_diagnostic()`](BufferPoolBuilder::build_diagnostic).
    pub fn builder() -> BufferPoolBuilder<P> {
        BufferPoolBuilder::new()
    }

    /// The policy that creates, clears and releases the buffers of this pool.
    #[must_use]
    pub fn policy(&self) -> &P {
        self.inner.policy()
    }

    /// The number of spare buffers currently kept by the pool, across all size classes.
    #[must_use]
    pub fn pooled_count(&self) -> usize {
        self.inner.pooled_count()
    }

    /// The number of tracked rentals that have not been returned yet.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.len().saturating_add(self.abandoned.len())
    }

    /// Rents a buffer of at least `minimum_length` elements and records the rental.
    ///
    /// See [`BufferPool::rent()`] for how the length of the buffer is chosen.
    #[must_use]
    pub fn rent(&mut self, minimum_length: usize) -> P::Buffer {
        let buffer = self.inner.rent(minimum_length);

        if let Some(identity) = self.inner.policy().identity(&buffer) {
            let rental = Rental {
                length: self.inner.policy().length(&buffer),
                sequence: self.next_sequence,
                capture: Backtrace::capture(),
            };
            self.next_sequence = self.next_sequence.wrapping_add(1);

            if let Some(previous) = self.outstanding.insert(identity, rental) {
                // The earlier rental was dropped by its renter and the allocator reused its storage.
                tracing::trace!(
                    length = previous.length,
                    "storage of an unreturned rental was reused"
                );
                self.abandoned.push(previous);
            }
        }

        buffer
    }

    /// Hands a previously rented buffer back to the pool after validating it.
    ///
    /// The buffer is always cleared; `clear` is accepted for contract compatibility with the
    /// fast pool.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyReturned`] if the same storage is already parked in the pool.
    /// * [`Error::NotPooled`] if the length is not one the pool hands out or if there is no
    ///   outstanding rental for the buffer.
    ///
    /// The buffer is released when an error is returned.
    pub fn give_back(&mut self, mut buffer: P::Buffer, clear: bool) -> Result<()> {
        _ = clear;

        let policy = self.inner.policy();
        let length = policy.length(&buffer);
        let identity = policy.identity(&buffer);

        match self.inner.config().placement(length) {
            Placement::Empty => Ok(()),
            Placement::Foreign => {
                self.inner.policy().release(buffer);
                Err(Error::NotPooled { length })
            }
            Placement::Oversized => {
                let result = self.end_rental(identity, length);
                self.inner.policy().release(buffer);
                result
            }
            Placement::Class(index) => {
                if identity.is_some_and(|identity| self.inner.is_parked(index, identity)) {
                    self.inner.policy().release(buffer);
                    return Err(Error::AlreadyReturned { length });
                }

                if let Err(error) = self.end_rental(identity, length) {
                    self.inner.policy().release(buffer);
                    return Err(error);
                }

                let policy = self.inner.policy();
                let fill = if policy.holds_resources() {
                    Fill::Zero
                } else {
                    Fill::Pattern(self.inner.config().clear_pattern)
                };
                policy.clear(&mut buffer, fill);

                self.inner.park(index, buffer);
                Ok(())
            }
        }
    }

    /// See [`BufferPool::trim_excess()`].
    pub fn trim_excess(&mut self) -> bool {
        self.inner.trim_excess()
    }

    /// Reports buffers that were rented but never returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Leaked`] carrying the number of outstanding rentals and the call stack
    /// captured when the oldest of them was rented.
    pub fn detect_leaks(&self) -> Result<()> {
        let Some(oldest) = self
            .outstanding
            .values()
            .chain(&self.abandoned)
            .min_by_key(|rental| rental.sequence)
        else {
            return Ok(());
        };

        let count = self.outstanding();

        tracing::warn!(
            count,
            oldest_length = oldest.length,
            "rented buffers were never returned to the pool"
        );

        Err(Error::Leaked {
            count,
            capture: oldest.capture.to_string(),
        })
    }

    /// Asserts that every tracked rental has been returned.
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

    fn end_rental(&mut self, identity: Option<usize>, length: usize) -> Result<()> {
        let Some(identity) = identity else {
            return Ok(());
        };

        match self.outstanding.remove(&identity) {
            Some(rental) => {
                debug_assert_eq!(rental.length, length);
                Ok(())
            }
            None => Err(Error::NotPooled { length }),
        }
    }
}

impl<P: PoolPolicy + Default> Default for DiagnosticBufferPool<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PoolPolicy> Drop for DiagnosticBufferPool<P> {
    fn drop(&mut self) {
        if self.outstanding() > 0 {
            tracing::warn!(
                count = self.outstanding(),
                "diagnostic buffer pool dropped while rentals are outstanding"
            );
        }
    }
}

impl<P: PoolPolicy + fmt::Debug> fmt::Debug for DiagnosticBufferPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticBufferPool")
            .field("inner", &self.inner)
            .field("outstanding", &self.outstanding())
            .finish_non_exhaustive()
    }
}

impl<P: PoolPolicy> Pool for DiagnosticBufferPool<P> {
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

    fn detect_leaks(&self) -> Result<()> {
        Self::detect_leaks(self)
    }
}
