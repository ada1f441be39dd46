use crate::Result;

/// The rent/return contract shared by [`BufferPool`][crate::BufferPool] and
/// [`DiagnosticBufferPool`][crate::DiagnosticBufferPool].
///
/// A rented buffer is owned by the caller until it is handed back. Its length is at least the
/// requested minimum and may be larger; callers must use the actual length of the buffer rather
/// than assume the requested one.
pub trait Pool {
    /// The buffer type handed out by the pool.
    type Buffer;

    /// Rents a buffer of at least `minimum_length` elements.
    ///
    /// A zero-length request produces an empty buffer without touching the pool.
    fn rent(&mut self, minimum_length: usize) -> Self::Buffer;

    /// Hands a previously rented buffer back to the pool.
    ///
    /// Set `clear` whenever the buffer may hold values whose lifetime should not be extended by
    /// the pool; pools clear buffers of resource-owning element types regardless.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer was not rented from a pool of this shape or (diagnostic
    /// pools only) if it was already returned.
    fn give_back(&mut self, buffer: Self::Buffer, clear: bool) -> Result<()>;

    /// Releases part of the spare buffers of every size class that has been idle since the
    /// previous call. Returns whether anything was released.
    fn trim_excess(&mut self) -> bool;

    /// Reports rented buffers that were never handed back.
    ///
    /// Only diagnostic pools track rentals; other pools always report success.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Leaked`][crate::Error::Leaked] if any rental is outstanding.
    fn detect_leaks(&self) -> Result<()> {
        Ok(())
    }
}
