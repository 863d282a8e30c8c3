use super::{
    allocator::{ExceptionAllocator, HeapAllocator},
    catch_stack::CatchStack,
    destructor::{Destructor, DestructorTable},
    diagnostics::{DiagnosticSink, Event},
    handle::{Handle, TypeTag},
    matching::TypeInfo,
    record::ExceptionRecord,
    registry::Registry,
    transport::{PanicTransport, Transport},
};
use core::marker::PhantomData;

/// Exception-handling state of one thread of execution.
///
/// A context owns everything a C++ runtime would otherwise keep in globals: the registry of live
/// exceptions, the stack of active catch scopes, the most recently thrown exception and the count
/// of thrown-but-uncaught exceptions. Code lowered from C++ calls into it at the points where a
/// native runtime would call `__cxa_*` functions.
///
/// Contexts are not meant to be shared. Give each thread of execution its own, either by passing
/// it around explicitly or through [`thread_context`](crate::thread_context).
///
/// Dropping a context releases the storage of exceptions that are still alive, without running
/// their destructors.
pub struct Context<R: TypeInfo, A: ExceptionAllocator = HeapAllocator, T: Transport = PanicTransport>
{
    pub(crate) rtti: R,
    pub(crate) allocator: A,
    pub(crate) registry: Registry,
    pub(crate) caught: CatchStack,
    pub(crate) last: Handle,
    pub(crate) uncaught: usize,
    pub(crate) threw: bool,
    pub(crate) aborted: bool,
    sink: Option<Box<dyn DiagnosticSink>>,
    transport: PhantomData<fn() -> T>,
}

impl<R: TypeInfo> Context<R> {
    /// Create a context backed by the global allocator and Rust unwinding.
    #[must_use]
    pub fn new(rtti: R) -> Self {
        Self::with_parts(rtti, HeapAllocator::new())
    }
}

impl<R: TypeInfo, A: ExceptionAllocator, T: Transport> Context<R, A, T> {
    /// Create a context from its collaborators. The transport is chosen by the type parameter.
    #[must_use]
    pub fn with_parts(rtti: R, allocator: A) -> Self {
        Self {
            rtti,
            allocator,
            registry: Registry::new(),
            caught: CatchStack::new(),
            last: Handle::NULL,
            uncaught: 0,
            threw: false,
            aborted: false,
            sink: None,
            transport: PhantomData,
        }
    }

    /// Install an observer of lifecycle events, replacing the previous one.
    pub fn set_sink(&mut self, sink: impl DiagnosticSink + 'static) {
        self.sink = Some(Box::new(sink));
    }

    pub fn rtti(&self) -> &R {
        &self.rtti
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub(crate) fn emit(&mut self, event: Event) {
        if let Some(sink) = &mut self.sink {
            sink.observe(&event);
        }
    }

    /// Allocate storage for an exception object of `size` bytes.
    pub fn allocate_exception(&mut self, size: usize) -> Handle {
        self.allocator.allocate(size)
    }

    /// Release exception storage directly, e.g. when constructing the object failed before it
    /// could be thrown.
    ///
    /// Failures are logged and swallowed.
    pub fn free_exception(&mut self, handle: Handle) {
        if let Err(err) = self.allocator.free(handle) {
            log::warn!("exception during free_exception: {err}");
        }
    }

    /// Throw the exception stored at `handle`.
    ///
    /// `type_tag` describes the thrown object for catch matching, and `destructor` runs once the
    /// last reference to it is released.
    ///
    /// This never returns: control continues at the closest handler frame of the transport.
    pub fn throw(
        &mut self,
        handle: Handle,
        type_tag: Option<TypeTag>,
        destructor: Option<Box<dyn Destructor>>,
    ) -> ! {
        log::debug!("throwing exception {handle} ({type_tag:?})");
        let record = ExceptionRecord::new(handle, type_tag, destructor);
        if let Some(stale) = self.registry.insert(record) {
            log::warn!("exception {handle} was thrown again while still alive");
            if !stale.is_caught() {
                self.uncaught = self.uncaught.saturating_sub(1);
            }
        }
        self.last = handle;
        self.uncaught = self.uncaught.saturating_add(1);
        self.threw = true;
        self.emit(Event::Throw { handle, type_tag });
        T::transfer(handle);
    }

    /// Throw with a destructor given by index into `table`, as emitted by code generators that
    /// address functions through a table.
    ///
    /// An index that doesn't resolve is a configuration error and aborts the process before
    /// anything is thrown.
    pub fn throw_indexed(
        &mut self,
        handle: Handle,
        type_tag: Option<TypeTag>,
        table: &DestructorTable,
        destructor: Option<usize>,
    ) -> ! {
        let destructor = match destructor.map(|index| table.resolve(index)).transpose() {
            Ok(destructor) => destructor,
            Err(err) => crate::abort(&format!(
                "cannot throw exception {handle}: {err}. The process will now terminate.\n"
            )),
        };
        self.throw(handle, type_tag, destructor);
    }

    /// Continue propagating an exception from a landing pad that did not handle it.
    ///
    /// If no exception is recorded as thrown, `handle` becomes the subject of future matching.
    pub fn resume(&mut self, handle: Handle) -> ! {
        log::debug!("resuming exception {handle}, last thrown {}", self.last);
        if self.last.is_null() {
            self.last = handle;
        }
        self.threw = true;
        self.emit(Event::Resume { handle });
        T::transfer(handle);
    }

    /// Map a handle adjusted during matching back to its original handle.
    ///
    /// Handles that aren't known are returned unchanged; see [`Context::find_matching_catch`].
    pub fn de_adjust(&self, handle: Handle) -> Handle {
        self.registry.de_adjust(handle)
    }

    /// The number of exceptions that have been thrown and not yet caught.
    pub const fn uncaught_exceptions(&self) -> usize {
        self.uncaught
    }

    /// Whether any exception has been thrown and not yet caught.
    pub const fn uncaught_exception(&self) -> bool {
        self.uncaught > 0
    }

    /// The most recently thrown or resumed exception, until its catch scope ends.
    pub const fn last_thrown(&self) -> Handle {
        self.last
    }

    /// The thrown-state flag polled by the code generation layer after calls that may throw.
    pub const fn threw(&self) -> bool {
        self.threw
    }

    pub fn set_threw(&mut self, threw: bool) {
        self.threw = threw;
    }

    /// Whether an exception escaped a boundary that forbids it, see
    /// [`Context::call_unexpected`].
    pub const fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Number of active catch scopes.
    pub fn catch_depth(&self) -> usize {
        self.caught.len()
    }

    /// Number of exceptions that are still alive.
    pub fn live_exceptions(&self) -> usize {
        self.registry.len()
    }

    /// The bookkeeping for the exception `handle` (or one of its aliases) refers to.
    pub fn record(&self, handle: Handle) -> Option<&ExceptionRecord> {
        self.registry.get(self.registry.de_adjust(handle))
    }

    /// All live exceptions.
    pub fn records(&self) -> impl Iterator<Item = &ExceptionRecord> {
        self.registry.iter()
    }
}

impl<R: TypeInfo, A: ExceptionAllocator, T: Transport> Drop for Context<R, A, T> {
    fn drop(&mut self) {
        let leaked = self.registry.take_all();
        if !leaked.is_empty() {
            log::warn!("{} exceptions still alive at teardown", leaked.len());
        }
        for handle in leaked.into_keys() {
            if let Err(err) = self.allocator.free(handle) {
                log::warn!("exception during teardown: {err}");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{rtti::Hierarchy, test_util::*};

    #[test]
    fn throw_registers_and_transfers() {
        let mut ctx = Context::new(Hierarchy::new());
        let h = ctx.allocate_exception(8);
        assert_eq!(ctx.uncaught_exceptions(), 0);
        assert!(!ctx.uncaught_exception());

        let result = PanicTransport::intercept(|| ctx.throw(h, None, None));
        assert_eq!(result.unwrap_err(), h);
        assert_eq!(ctx.last_thrown(), h);
        assert!(ctx.threw());
        assert_eq!(ctx.uncaught_exceptions(), 1);
        assert!(ctx.uncaught_exception());

        let record = ctx.record(h).unwrap();
        assert_eq!(record.refcount(), 0);
        assert!(!record.is_caught());
        assert!(!record.is_rethrown());
        assert!(!record.has_destructor());
        assert_eq!(record.aliases().collect::<Vec<_>>(), [h]);
    }

    #[test]
    fn records_lists_live_exceptions() {
        let (_, destructor) = counting_destructor();
        let mut ctx = Context::new(Hierarchy::new());
        let plain = ctx.allocate_exception(8);
        let owned = ctx.allocate_exception(8);
        throw_to_handler(&mut ctx, plain, None);
        throw_with_destructor(&mut ctx, owned, destructor);

        let mut live: Vec<_> = ctx
            .records()
            .map(|record| (record.handle(), record.has_destructor()))
            .collect();
        live.sort();
        let mut expected = vec![(plain, false), (owned, true)];
        expected.sort();
        assert_eq!(live, expected);

        ctx.begin_catch(plain);
        ctx.end_catch();
        assert_eq!(
            ctx.records().map(ExceptionRecord::handle).collect::<Vec<_>>(),
            [owned],
        );
    }

    #[test]
    fn threw_flag_is_shared_with_the_caller() {
        let mut ctx = Context::new(Hierarchy::new());
        assert!(!ctx.threw());
        ctx.set_threw(true);
        assert!(ctx.threw());
        ctx.set_threw(false);
        assert!(!ctx.threw());

        let h = ctx.allocate_exception(8);
        throw_to_handler(&mut ctx, h, None);
        assert!(ctx.threw());
        ctx.set_threw(false);
        ctx.begin_catch(h);
        ctx.end_catch();
        assert!(!ctx.threw());
    }

    #[test]
    fn throw_runs_local_destructors() {
        struct Guard<'a>(&'a mut bool);
        impl Drop for Guard<'_> {
            fn drop(&mut self) {
                *self.0 = true;
            }
        }

        let mut ctx = Context::new(Hierarchy::new());
        let h = ctx.allocate_exception(8);
        let mut dropped = false;
        let result = PanicTransport::intercept(|| {
            let _guard = Guard(&mut dropped);
            ctx.throw(h, None, None);
        });
        assert!(result.is_err());
        assert!(dropped);
    }

    #[test]
    fn throw_indexed_resolves_destructor() {
        fn destroy(_: Handle) {
            DESTROYED.with(|d| d.set(d.get() + 1));
        }
        std::thread_local! {
            static DESTROYED: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
        }

        let mut table = DestructorTable::new();
        table.register(5, destroy);
        let mut ctx = Context::new(Hierarchy::new());
        let h = ctx.allocate_exception(8);
        let result = PanicTransport::intercept(|| ctx.throw_indexed(h, None, &table, Some(5)));
        assert_eq!(result.unwrap_err(), h);
        ctx.begin_catch(h);
        ctx.end_catch();
        assert_eq!(DESTROYED.with(core::cell::Cell::get), 1);
    }

    #[test]
    fn resume_keeps_last_thrown() {
        let mut ctx = Context::new(Hierarchy::new());
        let h = ctx.allocate_exception(8);
        throw_to_handler(&mut ctx, h, None);
        let result = PanicTransport::intercept(|| ctx.resume(Handle::from_addr(0x77)));
        assert_eq!(result.unwrap_err(), Handle::from_addr(0x77));
        assert_eq!(ctx.last_thrown(), h);
    }

    #[test]
    fn resume_sets_last_thrown_when_clear() {
        let mut ctx = Context::new(Hierarchy::new());
        let h = Handle::from_addr(0x77);
        let result = PanicTransport::intercept(|| ctx.resume(h));
        assert_eq!(result.unwrap_err(), h);
        assert_eq!(ctx.last_thrown(), h);
        assert!(ctx.threw());
    }

    #[test]
    fn free_exception_swallows_errors() {
        let mut ctx = Context::new(Hierarchy::new());
        let h = ctx.allocate_exception(8);
        ctx.free_exception(h);
        ctx.free_exception(h);
        assert_eq!(ctx.allocator().live(), 0);
    }

    #[test]
    fn teardown_releases_leaked_exceptions() {
        let (destroyed, destructor) = counting_destructor();
        let mut ctx = Context::new(Hierarchy::new());
        let h = ctx.allocate_exception(8);
        let result = PanicTransport::intercept(|| ctx.throw(h, None, Some(destructor)));
        assert!(result.is_err());
        assert_eq!(ctx.live_exceptions(), 1);
        drop(ctx);
        assert_eq!(destroyed.get(), 0);
    }

    #[test]
    fn lifecycle_is_observed() {
        let mut ctx = Context::new(Hierarchy::new());
        let events = record_events(&mut ctx);
        let h = ctx.allocate_exception(8);
        throw_to_handler(&mut ctx, h, None);
        ctx.begin_catch(h);
        ctx.end_catch();
        assert_eq!(
            *events.borrow(),
            [
                Event::Throw {
                    handle: h,
                    type_tag: None,
                },
                Event::BeginCatch { handle: h, depth: 1 },
                Event::AddRef {
                    handle: h,
                    refcount: 1,
                },
                Event::EndCatch { handle: h, depth: 0 },
                Event::DecRef {
                    handle: h,
                    refcount: 0,
                },
                Event::Destroy { handle: h },
            ],
        );
    }

    #[test]
    fn caught_through_secondary_base_is_not_uncaught() {
        // struct Exception : Base, std::exception {};
        // try { throw Exception(); } catch (const std::exception&) {}
        let mut types = Hierarchy::new();
        let base = types.declare("Base");
        let std_exception = types.declare("std::exception");
        let exception = types.declare("Exception");
        types.add_base(exception, base, 0);
        types.add_base(exception, std_exception, 8);

        let (destroyed, destructor) = counting_destructor();
        let mut ctx = Context::new(types);
        let h = ctx.allocate_exception(16);
        let result = PanicTransport::intercept(|| ctx.throw(h, Some(exception), Some(destructor)));
        assert_eq!(result.unwrap_err(), h);

        let matched = ctx.find_matching_catch(&[std_exception]);
        assert_eq!(matched.exception, h.offset(8));
        ctx.begin_catch(matched.exception);
        ctx.end_catch();

        assert!(!ctx.uncaught_exception());
        assert_eq!(destroyed.get(), 1);
        assert_eq!(ctx.live_exceptions(), 0);
    }

    #[test]
    fn well_nested_sequences_leave_nothing_behind() {
        let mut types = Hierarchy::new();
        let a = types.declare("A");
        let b = types.declare("B");
        types.add_base(b, a, 4);
        let mut ctx = Context::new(types);

        for depth in 1..=4 {
            let mut handles = Vec::new();
            for level in 0..depth {
                let h = ctx.allocate_exception(8);
                let ty = if level % 2 == 0 { a } else { b };
                let result = PanicTransport::intercept(|| ctx.throw(h, Some(ty), None));
                assert_eq!(result.unwrap_err(), h);
                assert_eq!(ctx.uncaught_exceptions(), 1);
                let matched = ctx.find_matching_catch(&[a]);
                assert_eq!(ctx.begin_catch(matched.exception), h);
                assert_eq!(ctx.uncaught_exceptions(), 0);
                handles.push(h);
            }
            for _ in &handles {
                ctx.end_catch();
            }
            assert_eq!(ctx.live_exceptions(), 0);
            assert_eq!(ctx.uncaught_exceptions(), 0);
            assert_eq!(ctx.catch_depth(), 0);
        }
        assert_eq!(ctx.allocator().live(), 0);
    }
}
