use super::{
    destructor::Destructor,
    handle::{Handle, TypeTag},
};
use core::fmt;
use std::collections::BTreeSet;

/// Bookkeeping for one live thrown allocation.
// Invariants:
// - `aliases` always contains `handle`.
// - The record is destroyed exactly when `refcount` drops to 0 while `rethrown` is false.
pub struct ExceptionRecord {
    handle: Handle,
    aliases: BTreeSet<Handle>,
    type_tag: Option<TypeTag>,
    pub(crate) destructor: Option<Box<dyn Destructor>>,
    pub(crate) refcount: usize,
    pub(crate) caught: bool,
    pub(crate) rethrown: bool,
}

impl ExceptionRecord {
    pub(crate) fn new(
        handle: Handle,
        type_tag: Option<TypeTag>,
        destructor: Option<Box<dyn Destructor>>,
    ) -> Self {
        Self {
            handle,
            aliases: BTreeSet::from([handle]),
            type_tag,
            destructor,
            refcount: 0,
            caught: false,
            rethrown: false,
        }
    }

    /// The original handle, which is also the registry key.
    #[must_use]
    pub const fn handle(&self) -> Handle {
        self.handle
    }

    /// All handle values known to refer to this exception, the original one included.
    pub fn aliases(&self) -> impl ExactSizeIterator<Item = Handle> + '_ {
        self.aliases.iter().copied()
    }

    #[must_use]
    pub fn has_alias(&self, handle: Handle) -> bool {
        self.aliases.contains(&handle)
    }

    pub(crate) fn add_alias(&mut self, handle: Handle) {
        self.aliases.insert(handle);
    }

    #[must_use]
    pub const fn type_tag(&self) -> Option<TypeTag> {
        self.type_tag
    }

    #[must_use]
    pub const fn refcount(&self) -> usize {
        self.refcount
    }

    /// Whether any handler has accepted the exception yet.
    #[must_use]
    pub const fn is_caught(&self) -> bool {
        self.caught
    }

    /// Whether a rethrow is in flight, which keeps the record alive at refcount 0.
    #[must_use]
    pub const fn is_rethrown(&self) -> bool {
        self.rethrown
    }

    #[must_use]
    pub fn has_destructor(&self) -> bool {
        self.destructor.is_some()
    }
}

impl fmt::Debug for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionRecord")
            .field("handle", &self.handle)
            .field("aliases", &self.aliases)
            .field("type_tag", &self.type_tag)
            .field("destructor", &self.destructor.is_some())
            .field("refcount", &self.refcount)
            .field("caught", &self.caught)
            .field("rethrown", &self.rethrown)
            .finish()
    }
}
