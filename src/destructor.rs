use super::{error::Error, handle::Handle};

/// The destructor of a thrown object.
///
/// Invoked exactly once, right before the object's storage is released, with the original
/// (unadjusted) handle.
pub trait Destructor {
    fn destroy(&mut self, handle: Handle);
}

impl<F: FnMut(Handle)> Destructor for F {
    #[inline]
    fn destroy(&mut self, handle: Handle) {
        self(handle);
    }
}

/// A table of destructors addressed by index.
///
/// Code generators that lower destructor references to integer indices register the callables
/// here once and resolve the index when the exception is thrown, so that an invalid index is
/// reported at the throw site rather than when the last reference is dropped.
#[derive(Default)]
pub struct DestructorTable {
    entries: Vec<Option<fn(Handle)>>,
}

impl DestructorTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `destructor` at `index`, replacing any previous entry.
    pub fn register(&mut self, index: usize, destructor: fn(Handle)) {
        if self.entries.len() <= index {
            self.entries.resize(index.saturating_add(1), None);
        }
        self.entries[index] = Some(destructor);
    }

    /// Resolve `index` into a destructor capability.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDestructor`] if nothing is registered at `index`.
    pub fn resolve(&self, index: usize) -> Result<Box<dyn Destructor>, Error> {
        match self.entries.get(index).copied().flatten() {
            Some(destructor) => Ok(Box::new(destructor)),
            None => Err(Error::InvalidDestructor { index }),
        }
    }
}
