use core::fmt;
use core::num::NonZeroUsize;

/// The identity of an exception allocation.
///
/// A handle is the address the allocator handed out for the thrown object, or a value derived from
/// it by a base/derived pointer adjustment. [`Handle::NULL`] is the "no exception" value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Wrap a raw address.
    #[inline]
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    /// Wrap a pointer, discarding its provenance.
    #[inline]
    #[must_use]
    pub fn from_ptr<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<()>().addr())
    }

    /// The raw address.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// Whether this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Adjust the handle by `delta` bytes, as a base/derived pointer cast would.
    #[inline]
    #[must_use]
    pub const fn offset(self, delta: isize) -> Self {
        Self(self.0.wrapping_add_signed(delta))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An opaque reference to a type descriptor.
///
/// The meaning of the value is owned by the [`TypeInfo`](crate::TypeInfo) implementation. A
/// missing type is expressed as `Option<TypeTag>::None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TypeTag(NonZeroUsize);

impl TypeTag {
    /// Wrap a raw descriptor reference. Returns `None` for zero.
    #[inline]
    #[must_use]
    pub const fn new(raw: usize) -> Option<Self> {
        match NonZeroUsize::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// The raw descriptor reference.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({:#x})", self.0.get())
    }
}
