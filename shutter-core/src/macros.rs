//! Call-site macros over the emit surface.
//!
//! Each expansion declares a static [`ScopeSite`](crate::event::ScopeSite)
//! so the descriptor is interned once per call site, then emits through
//! the given [`ThreadHandle`](crate::runtime::ThreadHandle).

/// Trace a scope covering the rest of the enclosing block.
///
/// Expands to a guard value: the scope is entered here and left when the
/// guard drops. The descriptor must be a string literal of the form
/// `"Name: argname1, argname2"`, with the argument values following it.
///
/// ```
/// use shutter_core::{trace_scope, Runtime};
///
/// let handle = Runtime::global().register_thread("worker").unwrap();
/// for index in 0..3u32 {
///     let _scope = trace_scope!(handle, "worker#iteration: index", index);
/// }
/// ```
#[macro_export]
macro_rules! trace_scope {
    ($handle:expr, $descriptor:expr) => {{
        static SITE: $crate::event::ScopeSite = $crate::event::ScopeSite::new($descriptor);
        $handle.scope(&SITE)
    }};
    ($handle:expr, $descriptor:expr, $($arg:expr),+ $(,)?) => {{
        static SITE: $crate::event::ScopeSite = $crate::event::ScopeSite::new($descriptor);
        $handle.scope_with(&SITE, &[$($crate::event::ArgValue::from($arg)),+])
    }};
}

/// Trace an instantaneous event.
///
/// ```
/// use shutter_core::{trace_event, Runtime};
///
/// let handle = Runtime::global().register_thread("worker").unwrap();
/// trace_event!(handle, "worker#started");
/// trace_event!(handle, "worker#batch: size", 128u32);
/// ```
#[macro_export]
macro_rules! trace_event {
    ($handle:expr, $descriptor:expr) => {{
        static SITE: $crate::event::ScopeSite = $crate::event::ScopeSite::new($descriptor);
        let scope = $handle.resolve(&SITE);
        $handle.instant(scope, &[]);
    }};
    ($handle:expr, $descriptor:expr, $($arg:expr),+ $(,)?) => {{
        static SITE: $crate::event::ScopeSite = $crate::event::ScopeSite::new($descriptor);
        let scope = $handle.resolve(&SITE);
        $handle.instant(scope, &[$($crate::event::ArgValue::from($arg)),+]);
    }};
}
