use super::{
    allocator::ExceptionAllocator, context::Context, diagnostics::Event, error::ProtocolViolation,
    handle::Handle, matching::TypeInfo, transport::Transport,
};

impl<R: TypeInfo, A: ExceptionAllocator, T: Transport> Context<R, A, T> {
    /// Rethrow the exception of the innermost catch scope (`throw;`).
    ///
    /// A rethrown exception is caught twice: the catch scope that rethrows it still ends with
    /// [`Context::end_catch`] while unwinding, and the handler further out begins a scope of its
    /// own. The exception therefore stays on the catch stack for the rethrowing scope and is
    /// marked as rethrown, which keeps it alive when the rethrowing scope drops its reference.
    ///
    /// If the innermost scope was pushed by [`Context::rethrow_primary_exception`], it is popped
    /// for good instead.
    ///
    /// Rethrowing without an active catch scope terminates the process. This never returns.
    pub fn rethrow(&mut self) -> ! {
        if self.caught.is_empty() {
            ProtocolViolation::RethrowWithoutException.report();
            crate::abort("rethrow without an active exception. The process will now terminate.\n");
        }
        let handle = self.registry.de_adjust(self.caught.pop());
        match self.registry.get_mut(handle) {
            Some(record) if record.rethrown => {}
            Some(record) => {
                record.rethrown = true;
                self.caught.push(handle);
            }
            None => {
                log::warn!("rethrowing unknown exception {handle}");
                self.caught.push(handle);
            }
        }
        let depth = self.caught.len();
        log::debug!("rethrowing exception {handle}, {depth} catch scopes");
        self.last = handle;
        self.threw = true;
        self.emit(Event::Rethrow { handle, depth });
        T::transfer(handle);
    }

    /// Capture the exception of the innermost catch scope (`std::current_exception`).
    ///
    /// The returned handle owns a reference, to be released with
    /// [`Context::decrement_exception_refcount`]. Without an active catch scope, returns
    /// [`Handle::NULL`] and touches nothing.
    pub fn current_primary_exception(&mut self) -> Handle {
        let top = self.caught.top();
        if top.is_null() {
            return Handle::NULL;
        }
        let handle = self.registry.de_adjust(top);
        self.add_ref(handle);
        handle
    }

    /// Rethrow an exception captured by [`Context::current_primary_exception`]
    /// (`std::rethrow_exception`), possibly long after its catch scope ended.
    ///
    /// Returns immediately for [`Handle::NULL`]. Otherwise this never returns.
    pub fn rethrow_primary_exception(&mut self, handle: Handle) {
        if handle.is_null() {
            return;
        }
        let handle = self.registry.de_adjust(handle);
        let Some(record) = self.registry.get_mut(handle) else {
            log::warn!("rethrowing unknown primary exception {handle}");
            self.last = handle;
            self.threw = true;
            self.emit(Event::Rethrow {
                handle,
                depth: self.caught.len(),
            });
            T::transfer(handle);
        };
        record.rethrown = true;
        self.caught.push(handle);
        self.rethrow();
    }

    /// An exception escaped a boundary that forbids it, such as a `noexcept` function.
    ///
    /// This is not handled here: the context is marked as aborted and the exception continues
    /// to the transport's interceptor, whose owner decides how to terminate.
    pub fn call_unexpected(&mut self, handle: Handle) -> ! {
        log::error!("unexpected exception {handle} thrown, this is not properly supported - aborting");
        self.aborted = true;
        self.emit(Event::Unexpected { handle });
        T::transfer(handle);
    }
}
