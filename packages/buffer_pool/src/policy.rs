use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::iter;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::rc::Rc;

/// Storage used by collections that manage element initialization themselves.
///
/// The pool never reads the contents. A collection renting one of these is responsible for
/// tracking which elements are initialized and for dropping them before handing the buffer back.
pub type UninitBuffer<T> = Box<[MaybeUninit<T>]>;

/// How a pool overwrites the contents of a buffer when clearing it on return.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum Fill {
    /// Reset to the "empty" state of the element type (zero bytes or `Default::default()`).
    #[default]
    Zero,

    /// Fill with a recognizable byte pattern, where the element type allows arbitrary bytes.
    ///
    /// Policies whose element type has validity requirements treat this the same as [`Zero`].
    ///
    /// [`Zero`]: Fill::Zero
    Pattern(u8),
}

/// Knows how to allocate a buffer of a given length and how to view it as a flat span.
///
/// This is what makes a pool agnostic of the shape of the storage it manages: the pool itself
/// only ever deals in lengths, identities and the operations below.
pub trait PoolPolicy {
    /// The buffer handed out by the pool.
    type Buffer;

    /// The element type of the flat span a buffer represents.
    type Item;

    /// Allocates a new buffer of exactly `length` elements.
    fn create(&self, length: usize) -> Self::Buffer;

    /// Views a buffer as a flat span of elements.
    fn view<'b>(&self, buffer: &'b Self::Buffer) -> &'b [Self::Item];

    /// Overwrites every element of the buffer, releasing anything the elements own.
    fn clear(&self, buffer: &mut Self::Buffer, fill: Fill);

    /// Whether elements may own resources that the pool would keep alive if it parked the
    /// buffer without clearing it. Pools clear such buffers on return even when not asked to.
    fn holds_resources(&self) -> bool {
        mem::needs_drop::<Self::Item>()
    }

    /// Disposes of a buffer the pool has decided not to keep.
    fn release(&self, buffer: Self::Buffer) {
        drop(buffer);
    }

    /// The number of elements in the buffer.
    fn length(&self, buffer: &Self::Buffer) -> usize {
        self.view(buffer).len()
    }

    /// An address that uniquely identifies the buffer's storage while it is alive.
    ///
    /// Returns `None` when the buffer has no distinct storage (empty buffers and buffers of
    /// zero-sized elements all share a dangling address).
    fn identity(&self, buffer: &Self::Buffer) -> Option<usize> {
        let items = self.view(buffer);

        if items.is_empty() || size_of::<Self::Item>() == 0 {
            None
        } else {
            Some(items.as_ptr().addr())
        }
    }
}

/// Pools `Box<[MaybeUninit<T>]>` buffers.
///
/// This is the storage collections rent: they initialize and drop elements on their own, so the
/// pool may overwrite returned memory with any byte pattern.
pub struct UninitSlicePolicy<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> UninitSlicePolicy<T> {
    /// Creates the policy.
    #[must_use]
    pub const fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T> PoolPolicy for UninitSlicePolicy<T> {
    type Buffer = UninitBuffer<T>;
    type Item = MaybeUninit<T>;

    fn create(&self, length: usize) -> Self::Buffer {
        Box::new_uninit_slice(length)
    }

    fn view<'b>(&self, buffer: &'b Self::Buffer) -> &'b [Self::Item] {
        buffer
    }

    fn clear(&self, buffer: &mut Self::Buffer, fill: Fill) {
        let byte = match fill {
            Fill::Zero => 0,
            Fill::Pattern(byte) => byte,
        };

        // SAFETY: The pointer and length come from a live slice and `MaybeUninit<T>` places no
        // validity requirement on its bytes, so any byte value is acceptable.
        unsafe {
            buffer.as_mut_ptr().write_bytes(byte, buffer.len());
        }
    }

    // The wrapper never drops anything itself; what matters is whether the payload would.
    fn holds_resources(&self) -> bool {
        mem::needs_drop::<T>()
    }
}

/// Pools `Box<[T]>` buffers whose elements are always initialized.
///
/// Clearing resets every element to `T::default()`, which drops whatever the element held.
pub struct SlicePolicy<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> SlicePolicy<T> {
    /// Creates the policy.
    #[must_use]
    pub const fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T: Default> PoolPolicy for SlicePolicy<T> {
    type Buffer = Box<[T]>;
    type Item = T;

    fn create(&self, length: usize) -> Self::Buffer {
        iter::repeat_with(T::default).take(length).collect()
    }

    fn view<'b>(&self, buffer: &'b Self::Buffer) -> &'b [Self::Item] {
        buffer
    }

    fn clear(&self, buffer: &mut Self::Buffer, _fill: Fill) {
        buffer.fill_with(T::default);
    }
}

/// Pools `Rc<[Cell<T>]>` buffers: cloneable handles to a single-threaded shared span.
///
/// Because handles can be cloned, the same storage can be handed back to a pool more than once.
/// The diagnostic pool catches this; the fast pool does not.
pub struct SharedSlicePolicy<T> {
    _item: PhantomData<fn() -> T>,
}

impl<T> SharedSlicePolicy<T> {
    /// Creates the policy.
    #[must_use]
    pub const fn new() -> Self {
        Self { _item: PhantomData }
    }
}

impl<T: Copy + Default> PoolPolicy for SharedSlicePolicy<T> {
    type Buffer = Rc<[Cell<T>]>;
    type Item = Cell<T>;

    fn create(&self, length: usize) -> Self::Buffer {
        iter::repeat_with(|| Cell::new(T::default()))
            .take(length)
            .collect()
    }

    fn view<'b>(&self, buffer: &'b Self::Buffer) -> &'b [Self::Item] {
        buffer
    }

    fn clear(&self, buffer: &mut Self::Buffer, _fill: Fill) {
        for cell in buffer.iter() {
            cell.set(T::default());
        }
    }
}

macro_rules! policy_boilerplate {
    ($($policy:ident),*) => {
        $(
            impl<T> Clone for $policy<T> {
                fn clone(&self) -> Self {
                    *self
                }
            }

            impl<T> Copy for $policy<T> {}

            impl<T> Default for $policy<T> {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl<T> fmt::Debug for $policy<T> {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.debug_struct(stringify!($policy))
                        .field("item_type", &format_args!("{}", type_name::<T>()))
                        .finish()
                }
            }
        )*
    };
}

policy_boilerplate!(UninitSlicePolicy, SlicePolicy, SharedSlicePolicy);
