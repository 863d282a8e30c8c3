use super::{
    allocator::ExceptionAllocator,
    context::Context,
    diagnostics::Event,
    handle::{Handle, TypeTag},
    record::ExceptionRecord,
    transport::Transport,
};

/// Type predicates of the RTTI subsystem.
///
/// The context never interprets [`TypeTag`]s itself: whether a catch clause accepts a thrown
/// object, and where the accepted subobject lives, is decided here.
pub trait TypeInfo {
    /// Whether `ty` describes a pointer type.
    fn is_pointer_type(&self, ty: TypeTag) -> bool;

    /// Whether a catch clause for `catch_type` accepts an object of `thrown_type`.
    ///
    /// On success, `adjusted` may be rewritten to point at the subobject the clause should
    /// receive (e.g. a non-primary base). On failure it must be left unchanged.
    fn can_catch(&self, catch_type: TypeTag, thrown_type: TypeTag, adjusted: &mut Handle) -> bool;
}

impl<R: TypeInfo + ?Sized> TypeInfo for &R {
    #[inline]
    fn is_pointer_type(&self, ty: TypeTag) -> bool {
        (**self).is_pointer_type(ty)
    }

    #[inline]
    fn can_catch(&self, catch_type: TypeTag, thrown_type: TypeTag, adjusted: &mut Handle) -> bool {
        (**self).can_catch(catch_type, thrown_type, adjusted)
    }
}

/// The outcome of [`Context::find_matching_catch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedCatch {
    /// The value to deliver to the catch clause, adjusted to the selected type.
    pub exception: Handle,
    /// The selected catch type. `None` if there is nothing to match against.
    pub selector: Option<TypeTag>,
}

impl MatchedCatch {
    /// No exception is in flight.
    pub const NONE: Self = Self {
        exception: Handle::NULL,
        selector: None,
    };
}

impl<R: TypeInfo, A: ExceptionAllocator, T: Transport> Context<R, A, T> {
    /// Select the catch clause for the exception in flight.
    ///
    /// This is what a personality routine does with the unwind tables, minus the unwinding: the
    /// landing pad passes the types of its catch clauses, and gets back the clause to run
    /// together with the (possibly pointer-adjusted) exception value to bind.
    ///
    /// Candidates are tried in the order given and the first one accepted by
    /// [`TypeInfo::can_catch`] wins. There is no reordering by specificity: listing the clauses
    /// most-derived first, as they appear in the source, is up to the caller. Whether that
    /// reproduces C++ handler selection for every multi-clause shape is not something this
    /// function guarantees.
    ///
    /// - Without an exception in flight, returns [`MatchedCatch::NONE`].
    /// - If the exception carries no type, it is passed through with no selector.
    /// - If no candidate accepts it, the exception is returned unadjusted with its own type, so
    ///   that the caller can decide to terminate.
    ///
    /// An adjusted value is remembered as an alias of the exception, so that later calls with it
    /// resolve back to the original handle.
    pub fn find_matching_catch(&mut self, candidates: &[TypeTag]) -> MatchedCatch {
        let thrown = self.registry.de_adjust(self.last);
        if thrown.is_null() {
            return MatchedCatch::NONE;
        }
        let Some(thrown_type) = self.registry.get(thrown).and_then(ExceptionRecord::type_tag)
        else {
            return MatchedCatch {
                exception: thrown,
                selector: None,
            };
        };
        let pointer = self.rtti.is_pointer_type(thrown_type);
        log::debug!("can_catch on {thrown} ({thrown_type:?}, pointer: {pointer})");

        let selected = candidates.iter().find_map(|&candidate| {
            let mut adjusted = thrown;
            self.rtti
                .can_catch(candidate, thrown_type, &mut adjusted)
                .then_some((adjusted, candidate))
        });

        let matched = match selected {
            Some((adjusted, candidate)) => {
                self.registry.add_alias(thrown, adjusted);
                log::debug!("can_catch found {adjusted} for {candidate:?}");
                MatchedCatch {
                    exception: adjusted,
                    selector: Some(candidate),
                }
            }
            None => {
                log::debug!("no catch clause accepts {thrown}");
                MatchedCatch {
                    exception: thrown,
                    selector: Some(thrown_type),
                }
            }
        };
        self.emit(Event::Match {
            handle: thrown,
            adjusted: matched.exception,
            selector: matched.selector,
            pointer,
        });
        matched
    }
}
