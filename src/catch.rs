use super::{
    allocator::ExceptionAllocator, context::Context, diagnostics::Event, error::ProtocolViolation,
    handle::Handle, matching::TypeInfo, transport::Transport,
};

impl<R: TypeInfo, A: ExceptionAllocator, T: Transport> Context<R, A, T> {
    /// Enter a catch scope for `handle`, which may be the adjusted value returned by
    /// [`Context::find_matching_catch`].
    ///
    /// The first catch of an exception takes it off the uncaught count. Catching also ends any
    /// rethrow in flight and takes a reference that lasts until [`Context::end_catch`].
    ///
    /// Returns the original handle.
    pub fn begin_catch(&mut self, handle: Handle) -> Handle {
        let handle = self.registry.de_adjust(handle);
        if let Some(record) = self.registry.get_mut(handle) {
            if !record.caught {
                record.caught = true;
                self.uncaught = self.uncaught.saturating_sub(1);
            }
            record.rethrown = false;
        }
        self.caught.push(handle);
        let depth = self.caught.len();
        log::debug!("begin_catch {handle}, {depth} catch scopes");
        self.emit(Event::BeginCatch { handle, depth });
        self.add_ref(handle);
        handle
    }

    /// Leave the innermost catch scope, releasing the reference taken by
    /// [`Context::begin_catch`].
    ///
    /// This also clears the thrown-state flag.
    pub fn end_catch(&mut self) {
        self.threw = false;
        if self.caught.is_empty() {
            ProtocolViolation::UnbalancedEndCatch.report();
            return;
        }
        let handle = self.caught.pop();
        let depth = self.caught.len();
        log::debug!("end_catch popped {handle}, last thrown {}, {depth} catch scopes", self.last);
        self.emit(Event::EndCatch { handle, depth });
        if !handle.is_null() {
            let handle = self.registry.de_adjust(handle);
            self.dec_ref(handle);
            self.last = Handle::NULL;
        }
    }

    /// The address of the thrown object for a handle obtained from the landing pad.
    ///
    /// Handles are addresses, so this is the identity.
    pub const fn get_exception_ptr(&self, handle: Handle) -> Handle {
        handle
    }
}
