use std::result;

use thiserror::Error;

/// Errors raised when a buffer pool is used in violation of its rent/return contract.
///
/// All of these indicate a programmer error in the caller. They are surfaced at the point
/// of detection and are never retried or repaired by the pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The buffer handed back to the pool does not match any size class the pool serves,
    /// or (for the diagnostic pool) it was never rented from this pool.
    #[error("buffer of length {length} is not a pooled object")]
    NotPooled {
        /// Length of the buffer that was rejected.
        length: usize,
    },

    /// The buffer handed back to the pool is already parked in the pool.
    ///
    /// Only the diagnostic pool detects this.
    #[error("buffer of length {length} has already been returned to the pool")]
    AlreadyReturned {
        /// Length of the buffer that was returned twice.
        length: usize,
    },

    /// One or more rented buffers were never returned.
    ///
    /// Only the diagnostic pool detects this, and only when leak detection is requested.
    #[error("{count} rented buffer(s) were never returned; oldest rental captured at:\n{capture}")]
    Leaked {
        /// Number of buffers still outstanding.
        count: usize,

        /// The call stack captured when the oldest outstanding buffer was rented.
        ///
        /// Whether this contains frames depends on `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`.
        capture: String,
    },
}

/// A specialized `Result` type for buffer pool operations, returning the crate's
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
    fn messages_name_the_length() {
        let error = Error::NotPooled { length: 17 };
        assert_eq!(error.to_string(), "buffer of length 17 is not a pooled object");

        let error = Error::AlreadyReturned { length: 32 };
        assert!(error.to_string().contains("already been returned"));
    }

    #[test]
    fn leak_message_carries_capture() {
        let error = Error::Leaked {
            count: 2,
            capture: "at some_frame".to_string(),
        };

        let message = error.to_string();
        assert!(message.starts_with("2 rented buffer(s)"));
        assert!(message.ends_with("at some_frame"));
    }
}
