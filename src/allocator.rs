use super::{error::Error, handle::Handle};
use core::alloc::Layout;
use std::alloc;
use std::collections::BTreeMap;

/// Backing storage for thrown exception objects.
///
/// This is a thin bridge: the context never inspects the memory behind a handle, it only asks for
/// storage when an exception is allocated and hands it back when the last reference goes away.
pub trait ExceptionAllocator {
    /// Allocate `size` bytes of exception storage.
    ///
    /// Allocation failure is not reported to the caller; implementations are expected to abort,
    /// like the global allocator does.
    fn allocate(&mut self, size: usize) -> Handle;

    /// Release storage previously returned by [`ExceptionAllocator::allocate`].
    ///
    /// # Errors
    ///
    /// Implementations may refuse handles they don't recognize. The context logs and swallows
    /// such errors.
    fn free(&mut self, handle: Handle) -> Result<(), Error>;
}

/// Alignment of exception objects. Matches the strictest fundamental alignment on the platforms
/// C++ exceptions are lowered to.
pub const EXCEPTION_ALIGN: usize = 16;

/// A heap-backed allocator.
///
/// Every allocation is aligned to [`EXCEPTION_ALIGN`], and its size is rounded up to a multiple
/// of it. The layout of each live allocation is remembered so that `free` only needs the handle.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    live: BTreeMap<Handle, Layout>,
}

impl HeapAllocator {
    /// Create an allocator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            live: BTreeMap::new(),
        }
    }

    /// Number of allocations that have not been freed yet.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.len()
    }

    /// The layout for an exception object of `size` bytes, or `None` if it is too large.
    fn checked_layout(size: usize) -> Option<Layout> {
        // Zero-sized exception objects still need a unique address.
        let size = size.max(1).checked_next_multiple_of(EXCEPTION_ALIGN)?;
        Layout::from_size_align(size, EXCEPTION_ALIGN).ok()
    }

    fn layout(size: usize) -> Layout {
        match Self::checked_layout(size) {
            Some(layout) => layout,
            None => crate::abort(&format!(
                "cannot allocate an exception object of {size} bytes\n"
            )),
        }
    }
}

impl ExceptionAllocator for HeapAllocator {
    fn allocate(&mut self, size: usize) -> Handle {
        let layout = Self::layout(size);
        // SAFETY: `checked_layout` never produces a zero-sized layout.
        let ptr = unsafe { alloc::alloc(layout) };
        if ptr.is_null() {
            alloc::handle_alloc_error(layout);
        }
        let handle = Handle::from_addr(ptr.expose_provenance());
        self.live.insert(handle, layout);
        handle
    }

    fn free(&mut self, handle: Handle) -> Result<(), Error> {
        let layout = self
            .live
            .remove(&handle)
            .ok_or(Error::UnknownAllocation { handle })?;
        let ptr = core::ptr::with_exposed_provenance_mut::<u8>(handle.addr());
        // SAFETY: `handle` was produced by `allocate` with this exact layout and is removed from
        // the live set, so it can't be freed twice.
        unsafe { alloc::dealloc(ptr, layout) }
        Ok(())
    }
}

impl Drop for HeapAllocator {
    fn drop(&mut self) {
        for (handle, layout) in core::mem::take(&mut self.live) {
            let ptr = core::ptr::with_exposed_provenance_mut::<u8>(handle.addr());
            // SAFETY: Every entry of `live` is an outstanding allocation with its layout.
            unsafe { alloc::dealloc(ptr, layout) }
        }
    }
}
