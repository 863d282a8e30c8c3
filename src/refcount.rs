use super::{
    allocator::ExceptionAllocator, context::Context, diagnostics::Event, error::ProtocolViolation,
    handle::Handle, matching::TypeInfo, transport::Transport,
};

impl<R: TypeInfo, A: ExceptionAllocator, T: Transport> Context<R, A, T> {
    /// Take a reference to the exception keyed by `handle`.
    ///
    /// `handle` must be an original handle; use [`Context::increment_exception_refcount`] for
    /// values that may be adjusted. Null and unknown handles are ignored.
    pub fn add_ref(&mut self, handle: Handle) {
        if handle.is_null() {
            return;
        }
        let Some(record) = self.registry.get_mut(handle) else {
            log::trace!("addref on unknown exception {handle}");
            return;
        };
        record.refcount = record.refcount.saturating_add(1);
        let refcount = record.refcount;
        log::trace!("addref {handle} -> {refcount}");
        self.emit(Event::AddRef { handle, refcount });
    }

    /// Release a reference to the exception keyed by `handle`.
    ///
    /// When the count reaches zero, the destructor runs, the record is forgotten and the storage
    /// is released, unless a rethrow is in flight: the handler that catches the rethrown exception
    /// takes a new reference and drops it again later.
    pub fn dec_ref(&mut self, handle: Handle) {
        if handle.is_null() {
            return;
        }
        let Some(record) = self.registry.get_mut(handle) else {
            log::trace!("decref on unknown exception {handle}");
            return;
        };
        if record.refcount == 0 {
            ProtocolViolation::RefcountUnderflow(handle).report();
            return;
        }
        record.refcount -= 1;
        let refcount = record.refcount;
        let destroy = refcount == 0 && !record.rethrown;
        log::trace!("decref {handle} -> {refcount}");
        self.emit(Event::DecRef { handle, refcount });
        if destroy {
            self.destroy(handle);
        }
    }

    /// Run the destructor of a dead exception and release it.
    fn destroy(&mut self, handle: Handle) {
        let Some(mut record) = self.registry.remove(handle) else {
            return;
        };
        if let Some(destructor) = &mut record.destructor {
            destructor.destroy(handle);
        }
        drop(record);
        self.free_exception(handle);
        log::debug!(
            "decref freeing exception {handle}, last thrown {}, {} catch scopes",
            self.last,
            self.caught.len(),
        );
        self.emit(Event::Destroy { handle });
    }

    /// [`Context::add_ref`] for a possibly adjusted handle, as done when copying an
    /// `exception_ptr`.
    pub fn increment_exception_refcount(&mut self, handle: Handle) {
        let handle = self.registry.de_adjust(handle);
        self.add_ref(handle);
    }

    /// [`Context::dec_ref`] for a possibly adjusted handle, as done when destroying an
    /// `exception_ptr`.
    pub fn decrement_exception_refcount(&mut self, handle: Handle) {
        let handle = self.registry.de_adjust(handle);
        self.dec_ref(handle);
    }
}
