use super::handle::Handle;
use thiserror::Error;

/// Errors reported by the collaborators of a [`Context`](crate::Context).
///
/// None of these are recoverable in the sense of a retried operation: an invalid destructor is a
/// configuration error that aborts once it reaches the context, and a failed free is logged and
/// swallowed.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A destructor index does not name a registered destructor.
    #[error("destructor index {index} is not registered")]
    InvalidDestructor {
        /// The unresolved index.
        index: usize,
    },

    /// The allocator was asked to free a handle it never allocated.
    #[error("exception storage {handle} was not allocated by this allocator")]
    UnknownAllocation {
        /// The offending handle.
        handle: Handle,
    },
}

/// A misuse of the exception protocol by the calling code.
///
/// Violations are only diagnosed when the crate is built with `protocol_checks = "on"` (the
/// default for debug builds). In that case they panic with this value's message. Otherwise the
/// offending step is skipped and nothing is reported, so callers must not rely on detection.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolViolation {
    #[error("refcount underflow: exception {0} is already at refcount 0")]
    RefcountUnderflow(Handle),

    #[error("unbalanced end_catch: the catch stack is empty")]
    UnbalancedEndCatch,

    #[error("rethrow without an active exception")]
    RethrowWithoutException,

    #[error("alias {alias} of exception {owner} already resolves to exception {other}")]
    AliasCollision {
        alias: Handle,
        owner: Handle,
        other: Handle,
    },
}

impl ProtocolViolation {
    /// Report the violation if protocol checks are enabled.
    #[cfg(protocol_checks = "on")]
    #[cold]
    #[track_caller]
    pub(crate) fn report(self) {
        panic!("exception protocol violation: {self}");
    }

    /// Report the violation if protocol checks are enabled.
    #[cfg(not(protocol_checks = "on"))]
    #[inline(always)]
    pub(crate) fn report(self) {
        let _ = self;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            Error::InvalidDestructor { index: 3 }.to_string(),
            "destructor index 3 is not registered",
        );
        assert_eq!(
            ProtocolViolation::RefcountUnderflow(Handle::from_addr(0x40)).to_string(),
            "refcount underflow: exception 0x40 is already at refcount 0",
        );
    }

    #[cfg(protocol_checks = "on")]
    #[test]
    #[should_panic(expected = "unbalanced end_catch")]
    fn report_panics_when_checked() {
        ProtocolViolation::UnbalancedEndCatch.report();
    }
}
