#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Size-classed buffer pools that rent and reclaim backing storage instead of allocating it.
//!
//! Code that repeatedly needs temporary arrays (collections growing and shrinking, per-frame
//! scratch space, serialization buffers) can rent them from a pool and hand them back when done.
//! The pool keeps returned buffers in power-of-two size classes and serves later requests from
//! them, so the steady state performs no allocations at all.
//!
//! # Pool variants
//!
//! * [`BufferPool`] is the fast variant. It trusts its callers and only clears buffers when asked
//!   to or when the elements own resources.
//! * [`DiagnosticBufferPool`] implements the same contract but tracks every rental. It rejects
//!   buffers it did not hand out and buffers that are already back in the pool, poisons returned
//!   memory with a byte pattern and reports buffers that were never returned.
//!
//! Both implement the [`Pool`] trait, so code can be written against either.
//!
//! # Buffer shapes
//!
//! What a pool stores is decided by its [`PoolPolicy`]:
//!
//! * [`UninitSlicePolicy`] pools `Box<[MaybeUninit<T>]>`, the storage that collections use.
//! * [`SlicePolicy`] pools `Box<[T]>` of always-initialized elements.
//! * [`SharedSlicePolicy`] pools `Rc<[Cell<T>]>`, cloneable handles to shared storage.
//!
//! # Pools for collections
//!
//! Collections need storage for several element types. A [`PoolSet`] holds one pool of
//! uninitialized storage per element type and creates them on demand. Collections are generic
//! over a [`PoolProvider`], which is implemented by pool sets and by [`ThreadShared`], a handle
//! to a pool set owned by the current thread.
//!
//! # Example
//!
//! ```
//! use buffer_pool::{BufferPool, SlicePolicy};
//!
//! let mut pool = BufferPool::<SlicePolicy<f32>>::new();
//!
//! for frame in 0..3 {
//!     let mut scratch = pool.rent(1000);
//!     assert_eq!(scratch.len(), 1024);
//!
//!     scratch[0] = frame as f32;
//!     pool.give_back(scratch, true).unwrap();
//! }
//!
//! // Only one buffer was ever allocated.
//! assert_eq!(pool.pooled_count(), 1);
//! ```
//!
//! # Resource usage
//!
//! Pools never release spare buffers on their own. Call `trim_excess()` periodically to let the
//! number of spare buffers decay once demand subsides. Leak detection is likewise explicit: call
//! `detect_leaks()` on a diagnostic pool at a point where every rental should have been returned.

mod builder;
mod diagnostic;
mod error;
mod policy;
mod pool;
mod pool_set;
mod pool_stack;
mod rental;

pub use builder::BufferPoolBuilder;
pub use diagnostic::DiagnosticBufferPool;
pub use error::{Error, Result};
pub use policy::*;
pub use pool::BufferPool;
pub use pool_set::{PoolMode, PoolProvider, PoolSet, ThreadShared};
pub use rental::Pool;
