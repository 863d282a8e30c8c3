use super::Transport;
use crate::handle::Handle;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};

/// Control transfer on top of Rust unwinding.
///
/// The handle travels as a private panic payload, so `catch_unwind` frames that don't belong to
/// this transport see an ordinary panic. `resume_unwind` skips the panic hook, so transfers are
/// silent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicTransport;

impl Transport for PanicTransport {
    fn transfer(handle: Handle) -> ! {
        resume_unwind(Box::new(InFlight(handle)));
    }

    fn intercept<Func: FnOnce() -> R, R>(func: Func) -> Result<R, Handle> {
        catch_unwind(AssertUnwindSafe(func)).map_err(|payload| match payload.downcast::<InFlight>() {
            Ok(in_flight) => in_flight.0,
            Err(payload) => resume_unwind(payload),
        })
    }
}

struct InFlight(Handle);
