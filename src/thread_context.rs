//! A per-thread [`Context`](crate::Context) for code that can't thread one through its calls.
//!
//! Lowered C++ code calls the runtime from arbitrary depths, often through a fixed ABI with no room
//! for an extra argument. This module keeps one context per thread behind [`install`] and
//! [`uninstall`], and lends it out with [`with`].
//!
//! The context is borrowed only for the duration of the closure passed to [`with`], so each runtime
//! entry point should use its own short `with` call. A throw that leaves the closure releases the
//! borrow while unwinding. Nested `with` calls on the same thread panic.

use core::any::Any;
use core::cell::RefCell;

std::thread_local! {
    static CONTEXT: RefCell<Option<Box<dyn Any>>> = const { RefCell::new(None) };
}

/// Install `ctx` as this thread's context.
///
/// # Errors
///
/// If a context is already installed, `ctx` is handed back untouched.
pub fn install<C: 'static>(ctx: C) -> Result<(), C> {
    CONTEXT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(ctx);
        }
        *slot = Some(Box::new(ctx));
        Ok(())
    })
}

/// Remove this thread's context, if it has type `C`.
///
/// Dropping the returned context tears it down. If the installed context has a different type,
/// it stays installed and `None` is returned.
pub fn uninstall<C: 'static>() -> Option<C> {
    CONTEXT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if !slot.as_ref().is_some_and(|ctx| ctx.is::<C>()) {
            return None;
        }
        slot.take()?.downcast::<C>().ok().map(|ctx| *ctx)
    })
}

/// Whether a context of type `C` is installed on this thread.
pub fn is_installed<C: 'static>() -> bool {
    CONTEXT.with(|slot| slot.borrow().as_ref().is_some_and(|ctx| ctx.is::<C>()))
}

/// Run `func` with this thread's context.
///
/// Returns `None` without calling `func` if no context of type `C` is installed.
///
/// # Panics
///
/// Panics if called from within `func` of another `with` on the same thread.
pub fn with<C: 'static, Ret>(func: impl FnOnce(&mut C) -> Ret) -> Option<Ret> {
    CONTEXT.with(|slot| {
        let mut slot = slot.borrow_mut();
        let ctx = slot.as_mut()?.downcast_mut::<C>()?;
        Some(func(ctx))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        Context, Handle, rtti::Hierarchy, test_util::counting_destructor,
        transport::{PanicTransport, Transport},
    };

    type Ctx = Context<Hierarchy>;

    #[test]
    fn install_with_uninstall() {
        assert!(!is_installed::<Ctx>());
        assert!(install(Ctx::new(Hierarchy::new())).is_ok());
        assert!(is_installed::<Ctx>());
        assert!(install(Ctx::new(Hierarchy::new())).is_err());

        assert_eq!(with(|ctx: &mut Ctx| ctx.catch_depth()), Some(0));
        assert_eq!(with(|_: &mut u32| ()), None);
        assert!(uninstall::<u32>().is_none());
        assert!(is_installed::<Ctx>());

        assert!(uninstall::<Ctx>().is_some());
        assert!(!is_installed::<Ctx>());
        assert_eq!(with(|ctx: &mut Ctx| ctx.catch_depth()), None);
    }

    #[test]
    fn throw_through_with() {
        let (destroyed, destructor) = counting_destructor();
        assert!(install(Ctx::new(Hierarchy::new())).is_ok());
        let h = with(|ctx: &mut Ctx| ctx.allocate_exception(8)).unwrap();

        let result = PanicTransport::intercept(|| {
            with(|ctx: &mut Ctx| ctx.throw(h, None, Some(destructor)));
        });
        assert_eq!(result.unwrap_err(), h);

        // The borrow was released by the transfer.
        assert_eq!(with(|ctx: &mut Ctx| ctx.uncaught_exceptions()), Some(1));
        assert_eq!(with(|ctx: &mut Ctx| ctx.begin_catch(h)), Some(h));
        with(|ctx: &mut Ctx| ctx.end_catch());
        assert_eq!(destroyed.get(), 1);
        assert_eq!(with(|ctx: &mut Ctx| ctx.live_exceptions()), Some(0));
        drop(uninstall::<Ctx>());
    }

    #[test]
    fn threads_are_isolated() {
        assert!(install(Ctx::new(Hierarchy::new())).is_ok());
        let handle = Handle::from_addr(0x40);
        let _ = PanicTransport::intercept(|| {
            with(|ctx: &mut Ctx| ctx.throw(handle, None, None));
        });
        let other = std::thread::spawn(|| {
            assert!(!is_installed::<Ctx>());
            assert!(install(Ctx::new(Hierarchy::new())).is_ok());
            with(|ctx: &mut Ctx| ctx.uncaught_exceptions())
        })
        .join()
        .unwrap();
        assert_eq!(other, Some(0));
        assert_eq!(with(|ctx: &mut Ctx| ctx.uncaught_exceptions()), Some(1));
        drop(uninstall::<Ctx>());
    }
}
