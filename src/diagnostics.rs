use super::handle::{Handle, TypeTag};

/// An exception lifecycle event, as seen by a [`DiagnosticSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    Throw {
        handle: Handle,
        type_tag: Option<TypeTag>,
    },
    Resume {
        handle: Handle,
    },
    BeginCatch {
        handle: Handle,
        depth: usize,
    },
    EndCatch {
        handle: Handle,
        depth: usize,
    },
    Rethrow {
        handle: Handle,
        depth: usize,
    },
    AddRef {
        handle: Handle,
        refcount: usize,
    },
    DecRef {
        handle: Handle,
        refcount: usize,
    },
    /// The destructor ran (if any) and the storage was released.
    Destroy {
        handle: Handle,
    },
    /// `find_matching_catch` selected a catch clause, or fell back if `selector` is the thrown
    /// type itself.
    Match {
        handle: Handle,
        adjusted: Handle,
        selector: Option<TypeTag>,
        pointer: bool,
    },
    Unexpected {
        handle: Handle,
    },
}

/// An observer of exception lifecycle events.
///
/// Sinks are purely observational: nothing they do can change how exceptions are handled. Events
/// are also logged through the [`log`] facade regardless of whether a sink is installed.
pub trait DiagnosticSink {
    fn observe(&mut self, event: &Event);
}

impl<F: FnMut(&Event)> DiagnosticSink for F {
    #[inline]
    fn observe(&mut self, event: &Event) {
        self(event);
    }
}
