use super::handle::Handle;

/// A diverging control-transfer primitive.
///
/// Transferring an exception is a mechanism of forcefully "returning" through multiple call
/// frames, up until a special call frame, called *interceptor*. This roughly corresponds to the
/// `resume_unwind`/`catch_unwind` pair on Rust and `throw`/`catch` pair on C++.
///
/// The transport knows nothing about exception lifetime: it carries a [`Handle`] from the throwing
/// frame to the closest (most nested) interceptor, running destructors of locals on the way, as if
/// `return` was called. Matching catch clauses and reference counting are the job of the
/// [`Context`](crate::Context) the handler frames consult once control reaches them.
///
/// Several exceptions can be in flight at once, even in a single thread, when a destructor that
/// uses exceptions (without letting them escape past `drop`) runs while another exception
/// propagates. Interceptors are reached in the reverse order of transfers.
pub trait Transport {
    /// Transfer control to the closest interceptor, delivering `handle`.
    ///
    /// This never returns. Any code after a call to it is unreachable.
    fn transfer(handle: Handle) -> !;

    /// Run `func`, intercepting transfers.
    ///
    /// Returns `Ok` if `func` returns normally, or `Err` with the transferred handle if a transfer
    /// reached this frame. Unrelated unwinding (e.g. Rust panics) passes through untouched.
    fn intercept<Func: FnOnce() -> R, R>(func: Func) -> Result<R, Handle>;
}

mod panic;

pub use panic::PanicTransport;
