//! C++ exception lifetime and catch matching for hosts without native unwinding.
//!
//! When C++ is compiled for a host that offers no stack unwinding of its own, only a one-shot
//! control transfer and indirect calls, the work normally done by the personality routine and the
//! unwind tables has to happen in ordinary code. This crate is that code: it keeps thrown
//! exceptions alive for exactly as long as handlers reference them, runs their destructors once,
//! selects catch clauses, supports `throw;`, `std::current_exception` and
//! `std::rethrow_exception`, and answers `std::uncaught_exceptions`.
//!
//!
//! # Usage
//!
//! All state lives in a [`Context`], one per thread of execution. Lowered code calls into it where
//! a native runtime would call `__cxa_*` functions:
//!
//! ```rust
//! use cxa_shim::{Context, PanicTransport, Transport, rtti::Hierarchy};
//!
//! let mut types = Hierarchy::new();
//! let base = types.declare("Base");
//! let derived = types.declare("Derived");
//! types.add_base(derived, base, 0);
//!
//! let mut ctx = Context::new(types);
//! let ex = ctx.allocate_exception(16);
//!
//! // try { throw Derived(); }
//! let landed = PanicTransport::intercept(|| ctx.throw(ex, Some(derived), None));
//! assert_eq!(landed.unwrap_err(), ex);
//! assert_eq!(ctx.uncaught_exceptions(), 1);
//!
//! // catch (const Base&) { ... }
//! let matched = ctx.find_matching_catch(&[base]);
//! assert_eq!(matched.selector, Some(base));
//! ctx.begin_catch(matched.exception);
//! assert_eq!(ctx.uncaught_exceptions(), 0);
//! ctx.end_catch();
//!
//! assert_eq!(ctx.live_exceptions(), 0);
//! ```
//!
//!
//! # Collaborators
//!
//! The context is generic over the pieces that belong to the host:
//!
//! - [`TypeInfo`] answers whether a catch clause accepts a thrown type and how to adjust the
//!   exception pointer. [`rtti::Hierarchy`] is a table-driven implementation.
//! - [`ExceptionAllocator`] provides exception storage. [`HeapAllocator`] uses the global
//!   allocator.
//! - [`Transport`] moves control from the throw site to the closest handler frame and never
//!   returns. [`PanicTransport`] uses Rust unwinding.
//!
//! Lifecycle events are logged through the [`log`] facade, and can additionally be observed with a
//! [`DiagnosticSink`].
//!
//!
//! # Protocol checks
//!
//! Misuse by the calling code, such as releasing a reference that was never taken or ending a catch
//! scope that was never begun, panics when the crate is built with `protocol_checks = "on"`. This is
//! the default for the `debug` profile and can be overridden with the `CXA_SHIM_PROTOCOL_CHECKS`
//! environment variable at build time. With checks off, the offending step is skipped silently.

#![warn(
    clippy::cargo,
    clippy::pedantic,
    clippy::allow_attributes,
    clippy::as_underscore,
    clippy::clone_on_ref_ptr,
    clippy::decimal_literal_representation,
    clippy::deref_by_slicing,
    clippy::else_if_without_else,
    clippy::empty_drop,
    clippy::empty_enum_variants_with_brackets,
    clippy::empty_structs_with_brackets,
    clippy::format_push_string,
    clippy::infinite_loop,
    clippy::mem_forget,
    clippy::missing_assert_message,
    clippy::mixed_read_write_in_expression,
    clippy::multiple_unsafe_ops_per_block,
    clippy::needless_raw_strings,
    clippy::pub_without_shorthand,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::redundant_type_annotations,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::semicolon_inside_block,
    clippy::separated_literal_suffix,
    clippy::string_lit_chars_any,
    clippy::string_to_string,
    clippy::try_err,
    clippy::undocumented_unsafe_blocks,
    clippy::unnecessary_safety_comment,
    clippy::unnecessary_safety_doc,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::unused_result_ok,
)]

mod allocator;
mod catch;
mod catch_stack;
mod context;
mod destructor;
mod diagnostics;
mod error;
mod handle;
mod matching;
mod record;
mod refcount;
mod registry;
mod rethrow;
pub mod rtti;
#[cfg(feature = "thread-local")]
pub mod thread_context;
mod transport;

#[cfg(test)]
mod test_util;

pub use allocator::{EXCEPTION_ALIGN, ExceptionAllocator, HeapAllocator};
pub use context::Context;
pub use destructor::{Destructor, DestructorTable};
pub use diagnostics::{DiagnosticSink, Event};
pub use error::{Error, ProtocolViolation};
pub use handle::{Handle, TypeTag};
pub use matching::{MatchedCatch, TypeInfo};
pub use record::ExceptionRecord;
pub use transport::{PanicTransport, Transport};

/// Terminate the process after a fatal configuration error.
#[cold]
pub(crate) fn abort(message: &str) -> ! {
    use std::io::Write;

    log::error!("{}", message.trim_end());
    let _ = std::io::stderr().write_all(message.as_bytes());
    std::process::abort();
}
